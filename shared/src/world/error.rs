use thiserror::Error;

use crate::reference::{ReferenceId, ReferenceIdError, ResolverError};

use super::{
    component::error::{ComponentError, FieldError, LifecycleError},
    state::WorldState,
};

/// Errors that can occur during World operations
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum WorldError {
    /// Operation on a world that was already destroyed
    #[error("World has been destroyed")]
    Destroyed,

    /// State change not allowed for this peer's role
    #[error("World cannot move from {from:?} to {to:?}")]
    InvalidTransition { from: WorldState, to: WorldState },

    /// No slot is registered under the id
    #[error("Slot {id:?} does not exist in this world")]
    SlotNotFound { id: ReferenceId },

    /// No component is registered under the id
    #[error("Component {id:?} does not exist in this world")]
    ComponentNotFound { id: ReferenceId },

    /// Record names an id with nothing registered under it
    #[error("Nothing is registered under {id:?}")]
    UnknownId { id: ReferenceId },

    /// Record names a registered id of the wrong kind
    #[error("{id:?} is registered as a different kind of object")]
    KindMismatch { id: ReferenceId },

    /// Creation record for an id that is already live
    #[error("Object {id:?} already exists")]
    AlreadyExists { id: ReferenceId },

    /// The root slot cannot be reparented or destroyed
    #[error("The root slot cannot be modified")]
    RootImmutable,

    /// Reparenting would make a slot its own ancestor
    #[error("Parenting slot {slot:?} under {parent:?} would create a cycle")]
    CycleDetected {
        slot: ReferenceId,
        parent: ReferenceId,
    },

    /// Structural change attempted by a peer not allowed to make it
    #[error("Only the authority may create or destroy objects unless replica creation is allowed")]
    CreationNotPermitted,

    /// Replica tried to allocate ids before receiving its authority segment
    #[error("No authority segment assigned yet, ids cannot be allocated")]
    NoAuthoritySegment,

    /// Segment reserved for world-intrinsic objects, or reassigning the authority
    #[error("Authority segment {segment} cannot be assigned to this peer")]
    InvalidAuthoritySegment { segment: u8 },

    /// Cross-context task queue is at capacity
    #[error("World task queue is full")]
    TaskQueueFull,

    #[error(transparent)]
    Reference(#[from] ReferenceIdError),

    #[error(transparent)]
    Resolver(#[from] ResolverError),

    #[error(transparent)]
    Field(#[from] FieldError),

    #[error(transparent)]
    Component(#[from] ComponentError),

    #[error(transparent)]
    Lifecycle(#[from] LifecycleError),
}
