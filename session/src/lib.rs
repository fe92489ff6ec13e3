//! # Trellis Session
//! Joins and hosts trellis worlds: the connection state machine with its
//! watchdog, and a cancellable loading operation that reports progress.

#![deny(trivial_numeric_casts, unstable_features, unused_import_braces)]

mod address;
mod config;
mod error;
mod loading;
mod session;
mod transport;

pub use address::JoinAddress;
pub use config::SessionConfig;
pub use error::{AddressError, LoadingError, SessionError, TransportError};
pub use loading::{JoinRequest, LoadingListener, LoadingOperation, LoadingOutcome, LoadingSlot};
pub use session::{PeerAdmission, Session};
pub use transport::{ConnectionStatus, DataStatus, GrantStatus, JoinGrant, Transport};
