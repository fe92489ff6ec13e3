use std::marker::PhantomData;

use crate::reference::{ReferenceId, ReferenceResolver};

use super::{
    error::FieldError,
    field_value::{FieldValue, SyncValue},
    member::{ReferenceMember, SyncMember},
    mutator::FieldMutator,
    observer::{ObserverId, ObserverList},
    sync_ref::{resolve_target, ReferenceState, Referent},
};

/// Passed to observers each time one list element resolves to a new target
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ElementTargetChange {
    pub field: ReferenceId,
    pub index: usize,
    pub target: Option<ReferenceId>,
}

#[derive(Clone, Copy)]
struct Element {
    id: ReferenceId,
    state: ReferenceState,
    target: Option<ReferenceId>,
    // last target announced for this position; None if never announced
    observed: Option<Option<ReferenceId>>,
}

impl Element {
    fn resolved(target: Option<ReferenceId>) -> Self {
        Self {
            id: target.unwrap_or(ReferenceId::NULL),
            state: ReferenceState::Resolved,
            target,
            observed: None,
        }
    }
}

/// A replicated list of object references, each element resolved with the
/// same rules as [`SyncRef`](super::sync_ref::SyncRef)
pub struct SyncRefList<T: Referent> {
    name: &'static str,
    id: ReferenceId,
    elements: Vec<Element>,
    dirty: bool,
    mutator: Option<FieldMutator>,
    observers: ObserverList<ElementTargetChange>,
    phantom_t: PhantomData<fn() -> T>,
}

impl<T: Referent> SyncRefList<T> {
    pub fn new(name: &'static str) -> Self {
        Self {
            name,
            id: ReferenceId::NULL,
            elements: Vec::new(),
            dirty: false,
            mutator: None,
            observers: ObserverList::new(),
            phantom_t: PhantomData,
        }
    }

    pub fn id(&self) -> ReferenceId {
        self.id
    }

    pub fn len(&self) -> usize {
        self.elements.len()
    }

    pub fn is_empty(&self) -> bool {
        self.elements.is_empty()
    }

    pub fn ids(&self) -> Vec<ReferenceId> {
        self.elements.iter().map(|element| element.id).collect()
    }

    /// Resolved targets; `None` for null, pending or unknown elements
    pub fn targets(&self) -> Vec<Option<ReferenceId>> {
        self.elements
            .iter()
            .map(|element| match element.state {
                ReferenceState::Resolved => element.target,
                _ => None,
            })
            .collect()
    }

    pub fn state(&self, index: usize) -> Option<ReferenceState> {
        self.elements.get(index).map(|element| element.state)
    }

    pub fn is_fully_resolved(&self) -> bool {
        self.elements
            .iter()
            .all(|element| element.state == ReferenceState::Resolved)
    }

    pub fn push(&mut self, target: Option<ReferenceId>) {
        self.elements.push(Element::resolved(target));
        let index = self.elements.len() - 1;
        self.announce(index);
        self.changed_locally();
    }

    pub fn set(&mut self, index: usize, target: Option<ReferenceId>) -> bool {
        let id = target.unwrap_or(ReferenceId::NULL);
        let Some(element) = self.elements.get_mut(index) else {
            return false;
        };
        if element.id == id {
            return false;
        }
        let observed = element.observed;
        *element = Element::resolved(target);
        element.observed = observed;
        self.announce(index);
        self.changed_locally();
        true
    }

    pub fn remove(&mut self, index: usize) -> Option<ReferenceId> {
        if index >= self.elements.len() {
            return None;
        }
        let removed = self.elements.remove(index);
        self.changed_locally();
        Some(removed.id)
    }

    pub fn clear(&mut self) {
        if self.elements.is_empty() {
            return;
        }
        self.elements.clear();
        self.changed_locally();
    }

    pub fn consume_dirty(&mut self) -> bool {
        std::mem::replace(&mut self.dirty, false)
    }

    pub fn on_target_changed(
        &mut self,
        observer: impl FnMut(&ElementTargetChange) + Send + 'static,
    ) -> ObserverId {
        self.observers.subscribe(observer)
    }

    fn changed_locally(&mut self) {
        self.dirty = true;
        if let Some(mutator) = &self.mutator {
            mutator.mutate(self.id);
            mutator.reference_changed(self.id);
        }
    }

    fn announce(&mut self, index: usize) -> bool {
        let Some(element) = self.elements.get_mut(index) else {
            return false;
        };
        if element.state != ReferenceState::Resolved || element.observed == Some(element.target) {
            return false;
        }
        element.observed = Some(element.target);
        let change = ElementTargetChange {
            field: self.id,
            index,
            target: element.target,
        };
        self.observers.notify(&change);
        true
    }
}

impl<T: Referent> SyncMember for SyncRefList<T> {
    fn member_name(&self) -> &'static str {
        self.name
    }

    fn member_id(&self) -> ReferenceId {
        self.id
    }

    fn bind(&mut self, id: ReferenceId, mutator: &FieldMutator) {
        self.id = id;
        self.mutator = Some(mutator.clone());
    }

    fn encode(&self) -> FieldValue {
        FieldValue::List(
            self.elements
                .iter()
                .map(|element| element.id.to_field_value())
                .collect(),
        )
    }

    fn apply_remote(&mut self, value: &FieldValue) -> Result<bool, FieldError> {
        let FieldValue::List(values) = value else {
            return Err(FieldError::ArchetypeMismatch {
                member: self.name,
                expected: "list",
                found: value.archetype(),
            });
        };
        let mut ids = Vec::with_capacity(values.len());
        for (index, element) in values.iter().enumerate() {
            let id = ReferenceId::from_field_value(element).ok_or(FieldError::ElementMismatch {
                member: self.name,
                expected: ReferenceId::ARCHETYPE,
                found: element.archetype(),
                index,
            })?;
            ids.push(id);
        }
        if ids == self.ids() {
            return Ok(false);
        }

        let mut elements = Vec::with_capacity(ids.len());
        for (index, id) in ids.into_iter().enumerate() {
            let observed = self.elements.get(index).and_then(|element| element.observed);
            elements.push(Element {
                id,
                state: ReferenceState::Unknown,
                target: None,
                observed,
            });
        }
        self.elements = elements;
        self.dirty = true;
        Ok(true)
    }

    fn is_dirty(&self) -> bool {
        self.dirty
    }

    fn consume_dirty(&mut self) -> bool {
        SyncRefList::consume_dirty(self)
    }

    fn as_reference(&self) -> Option<&dyn ReferenceMember> {
        Some(self)
    }

    fn as_reference_mut(&mut self) -> Option<&mut dyn ReferenceMember> {
        Some(self)
    }
}

impl<T: Referent> ReferenceMember for SyncRefList<T> {
    fn invalidate(&mut self) {
        for element in self.elements.iter_mut() {
            element.state = ReferenceState::Unknown;
            element.target = None;
        }
    }

    fn refresh(&mut self, resolver: &ReferenceResolver) -> bool {
        let mut fired = false;
        for index in 0..self.elements.len() {
            let element = &mut self.elements[index];
            let (state, target) = resolve_target(element.id, T::KIND, resolver, self.name);
            element.state = state;
            element.target = target;
            if state == ReferenceState::Pending {
                element.observed = None;
            }
            fired |= self.announce(index);
        }
        fired
    }

    fn referenced_ids(&self) -> Vec<ReferenceId> {
        let mut ids: Vec<ReferenceId> = self
            .elements
            .iter()
            .map(|element| element.id)
            .filter(|id| !id.is_null())
            .collect();
        ids.sort();
        ids.dedup();
        ids
    }

    fn is_pending(&self) -> bool {
        self.elements
            .iter()
            .any(|element| element.state == ReferenceState::Pending)
    }
}
