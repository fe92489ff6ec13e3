use thiserror::Error;

use super::lifecycle::LifecycleState;

/// Errors that can occur while applying a value to a sync member
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FieldError {
    /// The inbound value has a different archetype than the member
    #[error("Member '{member}' expects a {expected} value but received {found}")]
    ArchetypeMismatch {
        member: &'static str,
        expected: &'static str,
        found: &'static str,
    },

    /// A list element has a different archetype than the list
    #[error("List member '{member}' expects {expected} elements, element {index} is {found}")]
    ElementMismatch {
        member: &'static str,
        expected: &'static str,
        found: &'static str,
        index: usize,
    },
}

/// Errors that can occur while advancing a component lifecycle
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LifecycleError {
    /// Transition skips a state or goes backwards
    #[error("Component lifecycle cannot move from {from:?} to {to:?}")]
    InvalidTransition {
        from: LifecycleState,
        to: LifecycleState,
    },

    /// Component was already destroyed
    #[error("Component lifecycle already reached Destroyed, cannot move to {to:?}")]
    AlreadyDestroyed { to: LifecycleState },
}

/// Errors that can occur while creating components by kind
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ComponentError {
    /// Component kind not registered with the ComponentRegistry
    #[error("Component kind '{kind}' is not registered. Must call `ComponentRegistry::add()` before creating it")]
    KindNotRegistered { kind: String },
}
