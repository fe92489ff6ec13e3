use std::time::{Duration, Instant};

use log::{debug, info, warn};

use trellis_shared::{ComponentRegistry, PeerRole, ReferenceId, UpdateBatch, World, WorldState};

use crate::{
    address::JoinAddress,
    config::SessionConfig,
    error::{SessionError, TransportError},
    transport::{ConnectionStatus, DataStatus, GrantStatus, JoinGrant, Transport},
};

/// What the authority hands a peer it admits
#[derive(Clone, Debug)]
pub struct PeerAdmission {
    pub grant: JoinGrant,
    /// The full data model as of admission
    pub snapshot: UpdateBatch,
}

/// One peer's membership in a replicated world: drives the world through
/// the join phases and owns it afterwards.
///
/// Failures are surfaced exactly once, as the `Err` of the `poll` call that
/// observed them. Later polls report the `Failed` state.
pub struct Session {
    config: SessionConfig,
    world: World,
    transport: Option<Box<dyn Transport>>,
    address: Option<JoinAddress>,
    started_at: Instant,
    history: Vec<WorldState>,
    failure: Option<SessionError>,
    failure_reported: bool,
    batches_received: usize,
    batches_expected: usize,
    next_segment: u8,
}

impl Session {
    /// Creates the authority world. It originates the data model, so it goes
    /// straight from Connecting to Running.
    pub fn host(config: SessionConfig, registry: ComponentRegistry) -> Result<Self, SessionError> {
        let world = World::new_authority(config.world.clone(), registry)?;
        let mut session = Self::new(config, world, None, None);
        session.transition(WorldState::Running)?;
        Ok(session)
    }

    /// Begins joining the world at `address` through `transport`. A transport
    /// that refuses to connect fails the session; the failure is reported
    /// by the first `poll`.
    pub fn join(
        config: SessionConfig,
        registry: ComponentRegistry,
        address: JoinAddress,
        mut transport: Box<dyn Transport>,
    ) -> Result<Self, SessionError> {
        let world = World::new_replica(config.world.clone(), registry)?;
        info!("Joining {}", address);
        let connected = transport.connect(&address);
        let mut session = Self::new(config, world, Some(transport), Some(address));
        if let Err(error) = connected {
            session.fail(error.into());
        }
        Ok(session)
    }

    fn new(
        config: SessionConfig,
        world: World,
        transport: Option<Box<dyn Transport>>,
        address: Option<JoinAddress>,
    ) -> Self {
        let history = vec![world.state()];
        Self {
            config,
            world,
            transport,
            address,
            started_at: Instant::now(),
            history,
            failure: None,
            failure_reported: false,
            batches_received: 0,
            batches_expected: 0,
            next_segment: World::HOST_SEGMENT + 1,
        }
    }

    // Accessors

    pub fn state(&self) -> WorldState {
        self.world.state()
    }

    pub fn role(&self) -> PeerRole {
        self.world.role()
    }

    pub fn is_authority(&self) -> bool {
        self.world.is_authority()
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    pub fn address(&self) -> Option<&JoinAddress> {
        self.address.as_ref()
    }

    pub fn world(&self) -> &World {
        &self.world
    }

    pub fn world_mut(&mut self) -> &mut World {
        &mut self.world
    }

    /// Every state the world has been in, in order
    pub fn state_history(&self) -> &[WorldState] {
        &self.history
    }

    pub fn failure(&self) -> Option<&SessionError> {
        self.failure.as_ref()
    }

    pub fn elapsed(&self) -> Duration {
        self.started_at.elapsed()
    }

    /// Fraction of the initial data model received, 0 when the total is
    /// not known yet
    pub fn data_progress(&self) -> f32 {
        if self.batches_expected == 0 {
            return 0.0;
        }
        (self.batches_received as f32 / self.batches_expected as f32).min(1.0)
    }

    // Join

    /// Advances the join by whatever the transport has ready and returns
    /// the resulting state. Never blocks.
    pub fn poll(&mut self) -> Result<WorldState, SessionError> {
        match self.world.state() {
            WorldState::Destroyed => return Ok(WorldState::Destroyed),
            WorldState::Failed => return self.report_failure(),
            state if !state.is_running() => {
                let elapsed = self.started_at.elapsed();
                if elapsed >= self.config.join_timeout {
                    warn!("Join watchdog elapsed after {:?}", elapsed);
                    self.fail(SessionError::Timeout { elapsed });
                    return self.report_failure();
                }
            }
            _ => {}
        }

        let result = match self.world.state() {
            WorldState::Connecting => self.poll_connecting(),
            WorldState::WaitingForJoinGrant => self.poll_grant(),
            WorldState::InitializingDataModel | WorldState::Running => self.poll_data(),
            WorldState::Failed | WorldState::Destroyed => Ok(()),
        };
        if let Err(error) = result {
            self.fail(error);
            return self.report_failure();
        }
        Ok(self.world.state())
    }

    fn transport(&mut self) -> Result<&mut Box<dyn Transport>, SessionError> {
        self.transport
            .as_mut()
            .ok_or(SessionError::Transport(TransportError::NotConnected))
    }

    fn poll_connecting(&mut self) -> Result<(), SessionError> {
        let status = self.transport()?.poll_connection();
        match status {
            ConnectionStatus::Waiting => Ok(()),
            ConnectionStatus::Connected => {
                debug!("Transport connected");
                self.transition(WorldState::WaitingForJoinGrant)
            }
            ConnectionStatus::Failed(error) => Err(error.into()),
        }
    }

    fn poll_grant(&mut self) -> Result<(), SessionError> {
        let status = self.transport()?.poll_grant();
        match status {
            GrantStatus::Waiting => Ok(()),
            GrantStatus::Granted(grant) => {
                self.world.assign_authority_segment(grant.authority_segment)?;
                info!("Join granted with authority segment {}", grant.authority_segment);
                self.transition(WorldState::InitializingDataModel)
            }
            GrantStatus::Rejected(reason) => Err(SessionError::Rejected { reason }),
        }
    }

    /// Drains every batch the transport has ready
    fn poll_data(&mut self) -> Result<(), SessionError> {
        if self.transport.is_none() {
            // hosting; peers' batches arrive through the host's own plumbing
            return Ok(());
        }
        loop {
            let status = self.transport()?.poll_data();
            match status {
                DataStatus::Waiting => return Ok(()),
                DataStatus::Batch { batch, total } => {
                    let report = self.world.apply_batch(&batch)?;
                    if !self.world.state().is_running() {
                        self.batches_received += 1;
                        self.batches_expected = self.batches_expected.max(total);
                        debug!(
                            "Initial batch {}/{}: {} records, {} skipped",
                            self.batches_received,
                            self.batches_expected,
                            report.applied,
                            report.skipped
                        );
                    }
                }
                DataStatus::Complete => {
                    if !self.world.state().is_running() {
                        self.batches_expected = self.batches_received;
                        self.transition(WorldState::Running)?;
                        info!("Joined in {:?}", self.started_at.elapsed());
                    }
                    return Ok(());
                }
                DataStatus::Failed(error) => return Err(error.into()),
            }
        }
    }

    fn transition(&mut self, next: WorldState) -> Result<(), SessionError> {
        self.world.set_state(next)?;
        self.history.push(next);
        Ok(())
    }

    fn report_failure(&mut self) -> Result<WorldState, SessionError> {
        if self.failure_reported {
            return Ok(self.world.state());
        }
        self.failure_reported = true;
        Err(self.failure.clone().unwrap_or(SessionError::Aborted))
    }

    /// Moves the session to Failed and drops the connection. Only the first
    /// failure is kept.
    pub fn fail(&mut self, error: SessionError) {
        let state = self.world.state();
        if state == WorldState::Failed || state.is_terminal() {
            return;
        }
        warn!("Session failed: {}", error);
        if let Err(world_error) = self.transition(WorldState::Failed) {
            warn!("Could not mark world failed: {}", world_error);
        }
        self.failure = Some(error);
        if let Some(transport) = self.transport.as_mut() {
            transport.disconnect();
        }
    }

    /// Tears the session down, releasing the world. Idempotent.
    pub fn destroy(&mut self) {
        if self.world.state().is_terminal() {
            return;
        }
        if let Some(transport) = self.transport.as_mut() {
            transport.disconnect();
        }
        self.transport = None;
        self.world.destroy();
        self.history.push(WorldState::Destroyed);
        info!("Session destroyed");
    }

    // Running

    /// Runs one world tick
    pub fn tick(&mut self) -> Result<(), SessionError> {
        self.world.tick()?;
        Ok(())
    }

    /// Sends everything changed locally since the last flush. Returns the
    /// number of records sent.
    pub fn flush_outbound(&mut self) -> Result<usize, SessionError> {
        if !self.world.state().is_running() {
            return Err(SessionError::NotRunning);
        }
        let batch = self.world.collect_outbound();
        if batch.is_empty() {
            return Ok(0);
        }
        let count = batch.len();
        self.transport()?.send(batch)?;
        Ok(count)
    }

    /// Admits a new peer: hands out the next free authority segment and the
    /// current data model
    pub fn admit_peer(&mut self) -> Result<PeerAdmission, SessionError> {
        if !self.is_authority() {
            return Err(SessionError::NotAuthority);
        }
        if !self.world.state().is_running() {
            return Err(SessionError::NotRunning);
        }
        let segment = self.next_segment;
        if segment == ReferenceId::WORLD_SEGMENT {
            return Err(SessionError::SegmentsExhausted);
        }
        // wraps to the world segment once every segment is handed out
        self.next_segment = segment.wrapping_add(1);
        info!("Admitting peer with authority segment {}", segment);

        Ok(PeerAdmission {
            grant: JoinGrant {
                authority_segment: segment,
            },
            snapshot: self.world.snapshot(),
        })
    }
}
