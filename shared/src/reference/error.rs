use thiserror::Error;

use super::ReferenceId;

/// Errors that can occur while building or parsing a ReferenceId
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ReferenceIdError {
    /// The local segment does not fit in 56 bits
    #[error("Local segment {local} does not fit in a ReferenceId")]
    LocalSegmentOverflow { local: u64 },

    /// Parsed an empty string
    #[error("Cannot parse a ReferenceId from an empty string")]
    Empty,

    /// Parsed a string that is not a decimal u64
    #[error("'{input}' is not a canonical ReferenceId")]
    Malformed { input: String },
}

/// Errors that can occur during ReferenceResolver operations
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ResolverError {
    /// Attempted to register the null id
    #[error("Cannot register an object under the null ReferenceId")]
    NullRegistration,

    /// An object is already registered under this id
    #[error("An object is already registered under {id:?}")]
    AlreadyRegistered { id: ReferenceId },

    /// `end_batch()` called without a matching `begin_batch()`
    #[error("end_batch() called while no batch decode is active")]
    BatchNotActive,
}
