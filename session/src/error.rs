use std::time::Duration;

use thiserror::Error;

use trellis_shared::WorldError;

/// Errors that can occur while parsing a join address
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AddressError {
    /// Not a URL at all
    #[error("Invalid join address: {0}")]
    Invalid(#[from] url::ParseError),

    /// A URL with a scheme other than `trellis`
    #[error("Unsupported join address scheme '{scheme}'")]
    UnsupportedScheme { scheme: String },

    #[error("Join address has no host")]
    MissingHost,
}

/// Errors reported by a transport
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransportError {
    /// Could not establish the connection
    #[error("Failed to connect: {reason}")]
    ConnectFailed { reason: String },

    /// The connection dropped after it was established
    #[error("Connection lost: {reason}")]
    ConnectionLost { reason: String },

    /// Data could not be sent
    #[error("Failed to send: {reason}")]
    SendFailed { reason: String },

    /// Operation on a transport that is not connected
    #[error("Transport is not connected")]
    NotConnected,
}

/// Errors that end a session, each surfaced exactly once by `Session::poll`
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SessionError {
    /// The transport failed to connect, or dropped
    #[error("Transport failure: {0}")]
    Transport(#[from] TransportError),

    /// The authority refused the join
    #[error("Join rejected: {reason}")]
    Rejected { reason: String },

    /// The join watchdog elapsed before the world was running
    #[error("Join timed out after {elapsed:?}")]
    Timeout { elapsed: Duration },

    /// The world refused an operation the session needed
    #[error("World error: {0}")]
    World(#[from] WorldError),

    /// Operation only valid on the hosting peer
    #[error("Only the authority can admit peers")]
    NotAuthority,

    /// Operation only valid once the world is running
    #[error("Session is not running")]
    NotRunning,

    /// Every authority segment has been handed out
    #[error("No authority segments left to grant")]
    SegmentsExhausted,

    /// The join task ended without producing a session
    #[error("Join aborted")]
    Aborted,
}

/// Errors that can occur when starting a loading operation
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LoadingError {
    /// A join is already in progress for this loading slot
    #[error("A loading operation is already active")]
    AlreadyActive,

    /// `begin_join` was called outside a tokio runtime
    #[error("No tokio runtime available to drive the join")]
    NoRuntime,
}
