use trellis_shared::UpdateBatch;

use crate::{address::JoinAddress, error::TransportError};

pub enum ConnectionStatus {
    Waiting,
    Connected,
    Failed(TransportError),
}

/// Issued by the authority to a peer it admits
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct JoinGrant {
    /// Segment the peer allocates its own ReferenceIds from
    pub authority_segment: u8,
}

pub enum GrantStatus {
    Waiting,
    Granted(JoinGrant),
    Rejected(String),
}

pub enum DataStatus {
    /// Nothing new since the last poll
    Waiting,
    /// One decoded batch. `total` is how many batches the initial data model
    /// is split into, or 0 when unknown
    Batch { batch: UpdateBatch, total: usize },
    /// The initial data model has been fully delivered
    Complete,
    Failed(TransportError),
}

/// The constructed lower layer a session joins through.
///
/// Every `poll_*` call returns immediately; the session polls again later
/// instead of blocking.
pub trait Transport: Send {
    /// Starts connecting. Progress is reported by `poll_connection`
    fn connect(&mut self, address: &JoinAddress) -> Result<(), TransportError>;

    fn poll_connection(&mut self) -> ConnectionStatus;

    fn poll_grant(&mut self) -> GrantStatus;

    /// Inbound batches, first the initial data model, then live updates
    fn poll_data(&mut self) -> DataStatus;

    fn send(&mut self, batch: UpdateBatch) -> Result<(), TransportError>;

    fn disconnect(&mut self);
}
