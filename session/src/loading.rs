use std::{
    fmt,
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc, Mutex, MutexGuard,
    },
};

use log::{info, warn};
use tokio::{runtime::Handle, task::JoinHandle};

use trellis_shared::{ComponentRegistry, WorldState};

use crate::{
    address::JoinAddress,
    config::SessionConfig,
    error::{LoadingError, SessionError},
    session::Session,
    transport::Transport,
};

/// Presentation-side hooks for a join. Every hook defaults to a no-op and
/// runs on the join task.
pub trait LoadingListener: Send {
    fn started(&mut self, _address: &JoinAddress) {}

    fn progress(&mut self, _phase: WorldState, _progress: f32, _status: &str) {}

    fn completed(&mut self) {}

    fn failed(&mut self, _error: &SessionError) {}

    fn cancelled(&mut self) {}
}

struct SilentListener;

impl LoadingListener for SilentListener {}

/// Everything a join needs, handed to [`LoadingSlot::begin_join`]
pub struct JoinRequest {
    config: SessionConfig,
    registry: ComponentRegistry,
    address: JoinAddress,
    transport: Box<dyn Transport>,
    listener: Box<dyn LoadingListener>,
}

impl JoinRequest {
    pub fn new(
        address: JoinAddress,
        transport: impl Transport + 'static,
        registry: ComponentRegistry,
    ) -> Self {
        Self {
            config: SessionConfig::default(),
            registry,
            address,
            transport: Box::new(transport),
            listener: Box::new(SilentListener),
        }
    }

    pub fn with_config(mut self, config: SessionConfig) -> Self {
        self.config = config;
        self
    }

    pub fn with_listener(mut self, listener: impl LoadingListener + 'static) -> Self {
        self.listener = Box::new(listener);
        self
    }
}

pub enum LoadingOutcome {
    Completed(Box<Session>),
    Failed(SessionError),
    Cancelled,
}

impl fmt::Debug for LoadingOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LoadingOutcome::Completed(session) => {
                f.debug_tuple("Completed").field(&session.state()).finish()
            }
            LoadingOutcome::Failed(error) => f.debug_tuple("Failed").field(error).finish(),
            LoadingOutcome::Cancelled => f.write_str("Cancelled"),
        }
    }
}

impl LoadingOutcome {
    pub fn is_completed(&self) -> bool {
        matches!(self, LoadingOutcome::Completed(_))
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self, LoadingOutcome::Cancelled)
    }

    pub fn session(self) -> Option<Box<Session>> {
        match self {
            LoadingOutcome::Completed(session) => Some(session),
            _ => None,
        }
    }

    pub fn error(&self) -> Option<&SessionError> {
        match self {
            LoadingOutcome::Failed(error) => Some(error),
            _ => None,
        }
    }
}

/// Progress of a join as a single 0..=1 scalar.
///
/// Connecting maps to 0-20%, waiting for the grant to 20-40%, downloading
/// the data model to 40-95% and starting to 95-100%. The value never
/// decreases.
#[derive(Clone, Debug)]
struct Progress {
    phase: WorldState,
    value: f32,
    status: String,
}

impl Progress {
    const GRANT_START: f32 = 0.2;
    const DATA_START: f32 = 0.4;
    const RUNNING_START: f32 = 0.95;

    fn new() -> Self {
        Self {
            phase: WorldState::Connecting,
            value: 0.0,
            status: String::from("Connecting"),
        }
    }

    fn phase_value(phase: WorldState, data_fraction: f32) -> Option<f32> {
        match phase {
            WorldState::Connecting => Some(0.0),
            WorldState::WaitingForJoinGrant => Some(Self::GRANT_START),
            WorldState::InitializingDataModel => Some(
                Self::DATA_START
                    + (Self::RUNNING_START - Self::DATA_START) * data_fraction.clamp(0.0, 1.0),
            ),
            WorldState::Running => Some(Self::RUNNING_START),
            WorldState::Failed | WorldState::Destroyed => None,
        }
    }

    /// Returns whether anything visible changed
    fn update(&mut self, phase: WorldState, value: f32, status: String) -> bool {
        let value = value.max(self.value);
        if phase == self.phase && value == self.value && status == self.status {
            return false;
        }
        self.phase = phase;
        self.value = value;
        self.status = status;
        true
    }
}

type SharedProgress = Arc<Mutex<Progress>>;

fn lock(progress: &SharedProgress) -> MutexGuard<'_, Progress> {
    progress
        .lock()
        .unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// Holds the claim on a [`LoadingSlot`] for the lifetime of a join task
struct SlotClaim {
    active: Arc<AtomicBool>,
}

impl Drop for SlotClaim {
    fn drop(&mut self) {
        self.active.store(false, Ordering::Release);
    }
}

/// Admits at most one outstanding join at a time. A second request while
/// one is active is rejected, not queued.
#[derive(Clone, Default)]
pub struct LoadingSlot {
    active: Arc<AtomicBool>,
}

impl LoadingSlot {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_active(&self) -> bool {
        self.active.load(Ordering::Acquire)
    }

    /// Starts the join on the current tokio runtime
    pub fn begin_join(&self, request: JoinRequest) -> Result<LoadingOperation, LoadingError> {
        let handle = Handle::try_current().map_err(|_| LoadingError::NoRuntime)?;
        if self
            .active
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            warn!("Join to {} rejected: another join is active", request.address);
            return Err(LoadingError::AlreadyActive);
        }
        let claim = SlotClaim {
            active: self.active.clone(),
        };

        let progress: SharedProgress = Arc::new(Mutex::new(Progress::new()));
        let cancel = Arc::new(AtomicBool::new(false));
        let task = handle.spawn(run_join(request, progress.clone(), cancel.clone(), claim));

        Ok(LoadingOperation {
            progress,
            cancel,
            task,
        })
    }
}

/// One join attempt in flight
pub struct LoadingOperation {
    progress: SharedProgress,
    cancel: Arc<AtomicBool>,
    task: JoinHandle<LoadingOutcome>,
}

impl LoadingOperation {
    pub fn phase(&self) -> WorldState {
        lock(&self.progress).phase
    }

    pub fn progress(&self) -> f32 {
        lock(&self.progress).value
    }

    pub fn status(&self) -> String {
        lock(&self.progress).status.clone()
    }

    /// Requests cancellation. Takes effect at the join's next check; a join
    /// cancelled before it completes resolves to `Cancelled`.
    pub fn cancel(&self) {
        self.cancel.store(true, Ordering::Release);
    }

    pub fn is_cancel_requested(&self) -> bool {
        self.cancel.load(Ordering::Acquire)
    }

    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }

    /// Waits for the terminal outcome
    pub async fn outcome(self) -> LoadingOutcome {
        match self.task.await {
            Ok(outcome) => outcome,
            Err(error) => {
                warn!("Join task ended abnormally: {}", error);
                LoadingOutcome::Failed(SessionError::Aborted)
            }
        }
    }
}

struct JoinTask {
    progress: SharedProgress,
    cancel: Arc<AtomicBool>,
    listener: Box<dyn LoadingListener>,
}

impl JoinTask {
    fn cancel_requested(&self) -> bool {
        self.cancel.load(Ordering::Acquire)
    }

    fn report(&mut self, phase: WorldState, value: f32, status: String) {
        let changed = lock(&self.progress).update(phase, value, status);
        if changed {
            let snapshot = lock(&self.progress).clone();
            self.listener
                .progress(snapshot.phase, snapshot.value, &snapshot.status);
        }
    }

    fn report_phase(&mut self, session: &Session) {
        let phase = session.state();
        let Some(value) = Progress::phase_value(phase, session.data_progress()) else {
            return;
        };
        let status = match phase {
            WorldState::Connecting => String::from("Connecting"),
            WorldState::WaitingForJoinGrant => String::from("Waiting for join grant"),
            WorldState::InitializingDataModel => format!(
                "Loading world data ({:.0}%)",
                session.data_progress() * 100.0
            ),
            _ => String::from("Starting world"),
        };
        self.report(phase, value, status);
    }

    fn cancelled(&mut self, mut session: Session) -> LoadingOutcome {
        info!("Join cancelled in {:?}", session.state());
        session.destroy();
        self.listener.cancelled();
        LoadingOutcome::Cancelled
    }

    fn failed(&mut self, mut session: Session, error: SessionError) -> LoadingOutcome {
        session.destroy();
        self.listener.failed(&error);
        LoadingOutcome::Failed(error)
    }
}

async fn run_join(
    request: JoinRequest,
    progress: SharedProgress,
    cancel: Arc<AtomicBool>,
    _claim: SlotClaim,
) -> LoadingOutcome {
    let JoinRequest {
        config,
        registry,
        address,
        transport,
        mut listener,
    } = request;
    let poll_interval = config.poll_interval;

    listener.started(&address);
    let mut task = JoinTask {
        progress,
        cancel,
        listener,
    };
    task.report(
        WorldState::Connecting,
        0.0,
        format!("Connecting to {}", address),
    );

    let mut session = match Session::join(config, registry, address, transport) {
        Ok(session) => session,
        Err(error) => {
            task.listener.failed(&error);
            return LoadingOutcome::Failed(error);
        }
    };

    loop {
        if task.cancel_requested() {
            return task.cancelled(session);
        }
        match session.poll() {
            Ok(WorldState::Running) => break,
            Ok(WorldState::Failed) | Ok(WorldState::Destroyed) => {
                let error = session.failure().cloned().unwrap_or(SessionError::Aborted);
                return task.failed(session, error);
            }
            Ok(_) => task.report_phase(&session),
            Err(error) => return task.failed(session, error),
        }
        tokio::time::sleep(poll_interval).await;
    }

    // checked once more now that the world runs
    if task.cancel_requested() {
        return task.cancelled(session);
    }
    task.report_phase(&session);
    task.report(WorldState::Running, 1.0, String::from("Joined"));
    task.listener.completed();
    LoadingOutcome::Completed(Box::new(session))
}
