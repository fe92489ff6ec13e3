use crate::reference::{ReferenceId, ReferenceResolver};

use super::{error::FieldError, field_value::FieldValue, mutator::FieldMutator};

/// Capability shared by every replicated member of a slot or component.
///
/// Members are declared explicitly by their owner, in a fixed order; a
/// member's position in that order determines its id offset from the owner.
pub trait SyncMember: Send {
    fn member_name(&self) -> &'static str;

    /// Null until the member is bound to a world
    fn member_id(&self) -> ReferenceId;

    /// Assigns the member's id and the world's change log
    fn bind(&mut self, id: ReferenceId, mutator: &FieldMutator);

    fn encode(&self) -> FieldValue;

    /// Applies an inbound value on the silent path: observers run, nothing
    /// is queued for outbound replication. Returns whether the value changed.
    fn apply_remote(&mut self, value: &FieldValue) -> Result<bool, FieldError>;

    fn is_dirty(&self) -> bool;

    /// Returns true once per change, then false until the next change
    fn consume_dirty(&mut self) -> bool;

    fn as_reference(&self) -> Option<&dyn ReferenceMember> {
        None
    }

    fn as_reference_mut(&mut self) -> Option<&mut dyn ReferenceMember> {
        None
    }
}

/// Capability of members whose payload is one or more [`ReferenceId`]s
pub trait ReferenceMember {
    /// Drops the current resolution until the next `refresh`. Used when a
    /// fresh id arrives during batch decode.
    fn invalidate(&mut self);

    /// Re-resolves against `resolver`, firing target-changed observers for
    /// every transition to a new resolved target. Returns whether any fired.
    fn refresh(&mut self, resolver: &ReferenceResolver) -> bool;

    /// Non-null ids currently referenced
    fn referenced_ids(&self) -> Vec<ReferenceId>;

    fn is_pending(&self) -> bool;
}
