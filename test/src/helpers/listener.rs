use std::sync::{Arc, Mutex};

use trellis_session::{JoinAddress, LoadingListener, SessionError};
use trellis_shared::WorldState;

#[derive(Clone, Debug, PartialEq)]
pub enum LoadingEvent {
    Started(String),
    Progress(WorldState, f32),
    Completed,
    Failed(SessionError),
    Cancelled,
}

/// Listener that records every hook call for later inspection
#[derive(Clone, Default)]
pub struct RecordingListener {
    events: Arc<Mutex<Vec<LoadingEvent>>>,
}

impl RecordingListener {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<LoadingEvent> {
        self.events.lock().unwrap().clone()
    }

    pub fn progress_values(&self) -> Vec<f32> {
        self.events()
            .into_iter()
            .filter_map(|event| match event {
                LoadingEvent::Progress(_, value) => Some(value),
                _ => None,
            })
            .collect()
    }

    /// Events other than progress updates, in order
    pub fn milestones(&self) -> Vec<LoadingEvent> {
        self.events()
            .into_iter()
            .filter(|event| !matches!(event, LoadingEvent::Progress(..)))
            .collect()
    }

    fn record(&self, event: LoadingEvent) {
        self.events.lock().unwrap().push(event);
    }
}

impl LoadingListener for RecordingListener {
    fn started(&mut self, address: &JoinAddress) {
        self.record(LoadingEvent::Started(address.to_string()));
    }

    fn progress(&mut self, phase: WorldState, progress: f32, _status: &str) {
        self.record(LoadingEvent::Progress(phase, progress));
    }

    fn completed(&mut self) {
        self.record(LoadingEvent::Completed);
    }

    fn failed(&mut self, error: &SessionError) {
        self.record(LoadingEvent::Failed(error.clone()));
    }

    fn cancelled(&mut self) {
        self.record(LoadingEvent::Cancelled);
    }
}
