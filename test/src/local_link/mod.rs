/// In-memory transport for session testing
/// Plays a scripted connect / grant / data sequence without network I/O
use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard};

use trellis_session::{
    ConnectionStatus, DataStatus, GrantStatus, JoinAddress, JoinGrant, PeerAdmission, Transport,
    TransportError,
};
use trellis_shared::{SyncRecord, UpdateBatch};

#[derive(Default)]
struct LinkState {
    // None: the connection never comes up
    connect_after: Option<usize>,
    refuse_connect: Option<TransportError>,
    drop_connection: Option<TransportError>,
    // None: the authority never answers
    grant: Option<Result<JoinGrant, String>>,
    initial: VecDeque<UpdateBatch>,
    initial_total: usize,
    withhold_complete: bool,
    complete_sent: bool,
    live: VecDeque<UpdateBatch>,
    data_failure: Option<TransportError>,
    sent: Vec<UpdateBatch>,
    address: Option<JoinAddress>,
    connection_polls: usize,
    disconnected: bool,
}

type SharedLink = Arc<Mutex<LinkState>>;

fn lock(state: &SharedLink) -> MutexGuard<'_, LinkState> {
    state.lock().unwrap()
}

/// Builds a scripted [`LocalTransport`] and the handle a test drives it with
pub struct LocalLink {
    state: LinkState,
}

impl LocalLink {
    pub fn builder() -> Self {
        Self {
            state: LinkState {
                connect_after: Some(0),
                ..LinkState::default()
            },
        }
    }

    /// The connection comes up on the given poll
    pub fn connect_after(mut self, polls: usize) -> Self {
        self.state.connect_after = Some(polls);
        self
    }

    pub fn never_connect(mut self) -> Self {
        self.state.connect_after = None;
        self
    }

    /// `connect` itself fails
    pub fn refuse_connect(mut self, reason: &str) -> Self {
        self.state.refuse_connect = Some(TransportError::ConnectFailed {
            reason: reason.to_string(),
        });
        self
    }

    /// The connection attempt fails while being polled
    pub fn drop_connection(mut self, reason: &str) -> Self {
        self.state.drop_connection = Some(TransportError::ConnectionLost {
            reason: reason.to_string(),
        });
        self
    }

    pub fn grant(mut self, authority_segment: u8) -> Self {
        self.state.grant = Some(Ok(JoinGrant { authority_segment }));
        self
    }

    pub fn reject(mut self, reason: &str) -> Self {
        self.state.grant = Some(Err(reason.to_string()));
        self
    }

    pub fn initial_data(mut self, batches: Vec<UpdateBatch>) -> Self {
        self.state.initial_total = batches.len();
        self.state.initial = batches.into();
        self
    }

    /// Answers with what the authority handed out on admission, the
    /// snapshot split into `chunks` batches
    pub fn admitted(self, admission: PeerAdmission, chunks: usize) -> Self {
        let batches = split_batch(admission.snapshot, chunks);
        self.grant(admission.grant.authority_segment)
            .initial_data(batches)
    }

    /// The initial data never finishes arriving
    pub fn withhold_complete(mut self) -> Self {
        self.state.withhold_complete = true;
        self
    }

    pub fn build(self) -> (LocalTransport, LinkHandle) {
        let state = Arc::new(Mutex::new(self.state));
        (
            LocalTransport {
                state: state.clone(),
            },
            LinkHandle { state },
        )
    }
}

/// Splits a batch into `chunks` batches of roughly equal size, keeping order
pub fn split_batch(batch: UpdateBatch, chunks: usize) -> Vec<UpdateBatch> {
    let records: Vec<SyncRecord> = batch.into_records();
    let size = records.len().div_ceil(chunks.max(1)).max(1);
    records
        .chunks(size)
        .map(|chunk| UpdateBatch::from(chunk.to_vec()))
        .collect()
}

/// Test-side view of a link: feeds live batches, inspects what was sent
#[derive(Clone)]
pub struct LinkHandle {
    state: SharedLink,
}

impl LinkHandle {
    pub fn push_live(&self, batch: UpdateBatch) {
        lock(&self.state).live.push_back(batch);
    }

    pub fn fail_data(&self, reason: &str) {
        lock(&self.state).data_failure = Some(TransportError::ConnectionLost {
            reason: reason.to_string(),
        });
    }

    pub fn take_sent(&self) -> Vec<UpdateBatch> {
        std::mem::take(&mut lock(&self.state).sent)
    }

    pub fn is_disconnected(&self) -> bool {
        lock(&self.state).disconnected
    }

    pub fn connection_polls(&self) -> usize {
        lock(&self.state).connection_polls
    }

    pub fn address(&self) -> Option<JoinAddress> {
        lock(&self.state).address.clone()
    }
}

pub struct LocalTransport {
    state: SharedLink,
}

impl Transport for LocalTransport {
    fn connect(&mut self, address: &JoinAddress) -> Result<(), TransportError> {
        let mut state = lock(&self.state);
        state.address = Some(address.clone());
        match state.refuse_connect.take() {
            Some(error) => Err(error),
            None => Ok(()),
        }
    }

    fn poll_connection(&mut self) -> ConnectionStatus {
        let mut state = lock(&self.state);
        if let Some(error) = state.drop_connection.take() {
            return ConnectionStatus::Failed(error);
        }
        let Some(after) = state.connect_after else {
            state.connection_polls += 1;
            return ConnectionStatus::Waiting;
        };
        if state.connection_polls >= after {
            return ConnectionStatus::Connected;
        }
        state.connection_polls += 1;
        ConnectionStatus::Waiting
    }

    fn poll_grant(&mut self) -> GrantStatus {
        match &lock(&self.state).grant {
            None => GrantStatus::Waiting,
            Some(Ok(grant)) => GrantStatus::Granted(*grant),
            Some(Err(reason)) => GrantStatus::Rejected(reason.clone()),
        }
    }

    fn poll_data(&mut self) -> DataStatus {
        let mut state = lock(&self.state);
        if let Some(error) = state.data_failure.take() {
            return DataStatus::Failed(error);
        }
        if let Some(batch) = state.initial.pop_front() {
            return DataStatus::Batch {
                batch,
                total: state.initial_total,
            };
        }
        if !state.complete_sent {
            if state.withhold_complete {
                return DataStatus::Waiting;
            }
            state.complete_sent = true;
            return DataStatus::Complete;
        }
        match state.live.pop_front() {
            Some(batch) => DataStatus::Batch { batch, total: 0 },
            None => DataStatus::Waiting,
        }
    }

    fn send(&mut self, batch: UpdateBatch) -> Result<(), TransportError> {
        let mut state = lock(&self.state);
        if state.disconnected {
            return Err(TransportError::NotConnected);
        }
        state.sent.push(batch);
        Ok(())
    }

    fn disconnect(&mut self) {
        lock(&self.state).disconnected = true;
    }
}
