use std::marker::PhantomData;

use log::warn;

use crate::reference::{ObjectKind, ReferenceId, ReferenceResolver};

use super::{
    error::FieldError,
    field_value::FieldValue,
    member::{ReferenceMember, SyncMember},
    mutator::FieldMutator,
    observer::{ObserverId, ObserverList},
    sync_field::{FieldChange, SyncField},
};

/// Something a [`SyncRef`] can point at
pub trait Referent {
    const KIND: ObjectKind;
}

/// Marker for references to any component, whatever its concrete type
pub struct AnyComponent;

impl Referent for AnyComponent {
    const KIND: ObjectKind = ObjectKind::Component;
}

/// Resolution state of a reference field
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ReferenceState {
    /// The id itself has not been decoded yet
    Unknown,
    /// The id is known and non-null, but nothing is registered under it
    Pending,
    /// The id is null, or resolves to a live object of the expected kind
    Resolved,
}

/// Passed to target observers each time a reference resolves to a new target
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct TargetChange {
    pub field: ReferenceId,
    /// `None` when the reference resolved to null
    pub target: Option<ReferenceId>,
}

pub(crate) fn resolve_target(
    id: ReferenceId,
    expected: ObjectKind,
    resolver: &ReferenceResolver,
    member: &'static str,
) -> (ReferenceState, Option<ReferenceId>) {
    if id.is_null() {
        return (ReferenceState::Resolved, None);
    }
    match resolver.kind_of(&id) {
        Some(kind) if kind == expected => (ReferenceState::Resolved, Some(id)),
        Some(kind) => {
            warn!(
                "Reference '{}' points at {:?} which is a {:?}, expected {:?}. Treating as null",
                member, id, kind, expected
            );
            (ReferenceState::Resolved, None)
        }
        None => (ReferenceState::Pending, None),
    }
}

/// A replicated object-reference field.
///
/// The replicated payload is the target's [`ReferenceId`]; the live target is
/// resolved through the world's resolver, so the id may arrive before the
/// object it names.
pub struct SyncRef<T: Referent> {
    field: SyncField<ReferenceId>,
    state: ReferenceState,
    target: Option<ReferenceId>,
    decoded: bool,
    announced: bool,
    observed: Option<ReferenceId>,
    observers: ObserverList<TargetChange>,
    phantom_t: PhantomData<fn() -> T>,
}

impl<T: Referent> SyncRef<T> {
    /// A locally-created reference, resolved to null
    pub fn new(name: &'static str) -> Self {
        Self {
            field: SyncField::new(name, ReferenceId::NULL),
            state: ReferenceState::Resolved,
            target: None,
            decoded: true,
            announced: false,
            observed: None,
            observers: ObserverList::new(),
            phantom_t: PhantomData,
        }
    }

    pub fn id(&self) -> ReferenceId {
        self.field.id()
    }

    pub fn name(&self) -> &'static str {
        self.field.name()
    }

    /// The replicated target id, whether or not it resolves
    pub fn target_id(&self) -> ReferenceId {
        *self.field.get()
    }

    /// The resolved target, or `None` when null, pending or unknown
    pub fn target(&self) -> Option<ReferenceId> {
        match self.state {
            ReferenceState::Resolved => self.target,
            ReferenceState::Pending | ReferenceState::Unknown => None,
        }
    }

    pub fn state(&self) -> ReferenceState {
        self.state
    }

    /// Resolved, and resolved to null
    pub fn is_null(&self) -> bool {
        self.state == ReferenceState::Resolved && self.target.is_none()
    }

    /// Local write of the target. The caller vouches that `target` is live
    /// in this world; the world re-validates it on its next flush.
    pub fn set_target(&mut self, target: Option<ReferenceId>) -> bool {
        let id = target.unwrap_or(ReferenceId::NULL);
        if !self.field.set(id) {
            return false;
        }
        self.decoded = true;
        self.state = ReferenceState::Resolved;
        self.target = target;
        if let Some(mutator) = self.field.mutator() {
            mutator.reference_changed(self.field.id());
        }
        self.announce(target);
        true
    }

    /// Observers of resolved-target transitions
    pub fn on_target_changed(
        &mut self,
        observer: impl FnMut(&TargetChange) + Send + 'static,
    ) -> ObserverId {
        self.observers.subscribe(observer)
    }

    /// Observers of the raw id value, fired in wire order during decode
    pub fn on_id_changed(
        &mut self,
        observer: impl FnMut(&FieldChange<ReferenceId>) + Send + 'static,
    ) -> ObserverId {
        self.field.on_changed(observer)
    }

    pub fn remove_observer(&mut self, id: ObserverId) -> bool {
        self.observers.unsubscribe(id)
    }

    /// Marks the field as created from the wire with no value decoded yet
    pub(crate) fn await_decode(&mut self) {
        self.decoded = false;
        self.state = ReferenceState::Unknown;
        self.target = None;
    }

    fn announce(&mut self, target: Option<ReferenceId>) -> bool {
        if self.announced && self.observed == target {
            return false;
        }
        self.announced = true;
        self.observed = target;
        let change = TargetChange {
            field: self.field.id(),
            target,
        };
        self.observers.notify(&change);
        true
    }
}

impl<T: Referent> SyncMember for SyncRef<T> {
    fn member_name(&self) -> &'static str {
        self.field.name()
    }

    fn member_id(&self) -> ReferenceId {
        self.field.id()
    }

    fn bind(&mut self, id: ReferenceId, mutator: &FieldMutator) {
        self.field.bind(id, mutator);
    }

    fn encode(&self) -> FieldValue {
        self.field.encode()
    }

    fn apply_remote(&mut self, value: &FieldValue) -> Result<bool, FieldError> {
        let was_decoded = self.decoded;
        let changed = self.field.apply_remote(value)?;
        self.decoded = true;
        if changed || !was_decoded {
            self.state = ReferenceState::Unknown;
            self.target = None;
            return Ok(true);
        }
        Ok(false)
    }

    fn is_dirty(&self) -> bool {
        self.field.is_dirty()
    }

    fn consume_dirty(&mut self) -> bool {
        self.field.consume_dirty()
    }

    fn as_reference(&self) -> Option<&dyn ReferenceMember> {
        Some(self)
    }

    fn as_reference_mut(&mut self) -> Option<&mut dyn ReferenceMember> {
        Some(self)
    }
}

impl<T: Referent> ReferenceMember for SyncRef<T> {
    fn invalidate(&mut self) {
        self.state = ReferenceState::Unknown;
        self.target = None;
    }

    fn refresh(&mut self, resolver: &ReferenceResolver) -> bool {
        if !self.decoded {
            self.state = ReferenceState::Unknown;
            return false;
        }
        let (state, target) = resolve_target(self.target_id(), T::KIND, resolver, self.name());
        self.state = state;
        self.target = target;
        match state {
            ReferenceState::Resolved => self.announce(target),
            ReferenceState::Pending => {
                self.observed = None;
                false
            }
            ReferenceState::Unknown => false,
        }
    }

    fn referenced_ids(&self) -> Vec<ReferenceId> {
        let id = self.target_id();
        if id.is_null() {
            Vec::new()
        } else {
            vec![id]
        }
    }

    fn is_pending(&self) -> bool {
        self.state == ReferenceState::Pending
    }
}
