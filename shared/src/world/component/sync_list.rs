use crate::reference::ReferenceId;

use super::{
    error::FieldError,
    field_value::{FieldValue, SyncValue},
    member::SyncMember,
    mutator::FieldMutator,
    observer::{ObserverId, ObserverList},
    sync_field::{ChangeOrigin, FieldChange},
};

/// A replicated list of values. Replicates by whole-list replacement.
pub struct SyncList<T: SyncValue> {
    name: &'static str,
    id: ReferenceId,
    items: Vec<T>,
    dirty: bool,
    mutator: Option<FieldMutator>,
    observers: ObserverList<FieldChange<Vec<T>>>,
}

impl<T: SyncValue> SyncList<T> {
    pub fn new(name: &'static str) -> Self {
        Self {
            name,
            id: ReferenceId::NULL,
            items: Vec::new(),
            dirty: false,
            mutator: None,
            observers: ObserverList::new(),
        }
    }

    pub fn id(&self) -> ReferenceId {
        self.id
    }

    pub fn get(&self) -> &[T] {
        &self.items
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn push(&mut self, value: T) {
        self.items.push(value);
        self.changed(ChangeOrigin::Local);
    }

    pub fn insert(&mut self, index: usize, value: T) -> bool {
        if index > self.items.len() {
            return false;
        }
        self.items.insert(index, value);
        self.changed(ChangeOrigin::Local);
        true
    }

    pub fn remove(&mut self, index: usize) -> Option<T> {
        if index >= self.items.len() {
            return None;
        }
        let removed = self.items.remove(index);
        self.changed(ChangeOrigin::Local);
        Some(removed)
    }

    /// Replaces one element; no-op when equal
    pub fn set(&mut self, index: usize, value: T) -> bool {
        match self.items.get_mut(index) {
            Some(item) if *item != value => {
                *item = value;
                self.changed(ChangeOrigin::Local);
                true
            }
            _ => false,
        }
    }

    pub fn clear(&mut self) {
        if self.items.is_empty() {
            return;
        }
        self.items.clear();
        self.changed(ChangeOrigin::Local);
    }

    /// Replaces every element; no-op when equal
    pub fn replace(&mut self, items: Vec<T>) -> bool {
        if self.items == items {
            return false;
        }
        self.items = items;
        self.changed(ChangeOrigin::Local);
        true
    }

    pub fn set_silently(&mut self, items: Vec<T>) -> bool {
        if self.items == items {
            return false;
        }
        self.items = items;
        self.changed(ChangeOrigin::Remote);
        true
    }

    pub fn consume_dirty(&mut self) -> bool {
        std::mem::replace(&mut self.dirty, false)
    }

    pub fn on_changed(
        &mut self,
        observer: impl FnMut(&FieldChange<Vec<T>>) + Send + 'static,
    ) -> ObserverId {
        self.observers.subscribe(observer)
    }

    fn changed(&mut self, origin: ChangeOrigin) {
        self.dirty = true;
        if origin == ChangeOrigin::Local {
            if let Some(mutator) = &self.mutator {
                mutator.mutate(self.id);
            }
        }
        if !self.observers.is_empty() {
            let change = FieldChange {
                field: self.id,
                value: self.items.clone(),
                origin,
            };
            self.observers.notify(&change);
        }
    }
}

impl<T: SyncValue> SyncMember for SyncList<T> {
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
        FieldValue::List(self.items.iter().map(SyncValue::to_field_value).collect())
    }

    fn apply_remote(&mut self, value: &FieldValue) -> Result<bool, FieldError> {
        let FieldValue::List(elements) = value else {
            return Err(FieldError::ArchetypeMismatch {
                member: self.name,
                expected: "list",
                found: value.archetype(),
            });
        };
        let mut items = Vec::with_capacity(elements.len());
        for (index, element) in elements.iter().enumerate() {
            let item = T::from_field_value(element).ok_or(FieldError::ElementMismatch {
                member: self.name,
                expected: T::ARCHETYPE,
                found: element.archetype(),
                index,
            })?;
            items.push(item);
        }
        Ok(self.set_silently(items))
    }

    fn is_dirty(&self) -> bool {
        self.dirty
    }

    fn consume_dirty(&mut self) -> bool {
        SyncList::consume_dirty(self)
    }
}
