use std::ops::Deref;

use crate::reference::ReferenceId;

use super::{
    error::FieldError,
    field_value::{FieldValue, SyncValue},
    member::SyncMember,
    mutator::FieldMutator,
    observer::{ObserverId, ObserverList},
};

/// Where a value change came from
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ChangeOrigin {
    /// Written on this peer, replicated outward
    Local,
    /// Applied from an inbound update
    Remote,
}

/// Passed to value observers after every effective change
#[derive(Clone, Debug, PartialEq)]
pub struct FieldChange<T> {
    pub field: ReferenceId,
    pub value: T,
    pub origin: ChangeOrigin,
}

/// A replicated value cell with change tracking.
///
/// An unbound field (one never attached to a world) behaves like a local
/// property: it tracks dirtiness and notifies observers but nothing is ever
/// queued for replication.
pub struct SyncField<T: SyncValue> {
    name: &'static str,
    id: ReferenceId,
    value: T,
    dirty: bool,
    mutator: Option<FieldMutator>,
    observers: ObserverList<FieldChange<T>>,
}

impl<T: SyncValue> SyncField<T> {
    pub fn new(name: &'static str, value: T) -> Self {
        Self {
            name,
            id: ReferenceId::NULL,
            value,
            dirty: false,
            mutator: None,
            observers: ObserverList::new(),
        }
    }

    pub fn id(&self) -> ReferenceId {
        self.id
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn get(&self) -> &T {
        &self.value
    }

    /// Local write. No-op when `value` equals the current value; otherwise
    /// stores it, marks dirty, notifies observers and queues it outbound.
    pub fn set(&mut self, value: T) -> bool {
        if !self.store(value, ChangeOrigin::Local) {
            return false;
        }
        if let Some(mutator) = &self.mutator {
            mutator.mutate(self.id);
        }
        true
    }

    /// Applies an already-replicated value: same storage and notification
    /// as `set`, never queued outbound.
    pub fn set_silently(&mut self, value: T) -> bool {
        self.store(value, ChangeOrigin::Remote)
    }

    fn store(&mut self, value: T, origin: ChangeOrigin) -> bool {
        if self.value == value {
            return false;
        }
        self.value = value;
        self.dirty = true;
        if !self.observers.is_empty() {
            let change = FieldChange {
                field: self.id,
                value: self.value.clone(),
                origin,
            };
            self.observers.notify(&change);
        }
        true
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    pub fn consume_dirty(&mut self) -> bool {
        std::mem::replace(&mut self.dirty, false)
    }

    pub fn is_bound(&self) -> bool {
        !self.id.is_null()
    }

    pub(crate) fn mutator(&self) -> Option<&FieldMutator> {
        self.mutator.as_ref()
    }

    pub fn on_changed(
        &mut self,
        observer: impl FnMut(&FieldChange<T>) + Send + 'static,
    ) -> ObserverId {
        self.observers.subscribe(observer)
    }

    pub fn remove_observer(&mut self, id: ObserverId) -> bool {
        self.observers.unsubscribe(id)
    }
}

impl<T: SyncValue> Deref for SyncField<T> {
    type Target = T;

    fn deref(&self) -> &Self::Target {
        &self.value
    }
}

impl<T: SyncValue> SyncMember for SyncField<T> {
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
        self.value.to_field_value()
    }

    fn apply_remote(&mut self, value: &FieldValue) -> Result<bool, FieldError> {
        let decoded = T::from_field_value(value).ok_or(FieldError::ArchetypeMismatch {
            member: self.name,
            expected: T::ARCHETYPE,
            found: value.archetype(),
        })?;
        Ok(self.set_silently(decoded))
    }

    fn is_dirty(&self) -> bool {
        self.dirty
    }

    fn consume_dirty(&mut self) -> bool {
        SyncField::consume_dirty(self)
    }
}
