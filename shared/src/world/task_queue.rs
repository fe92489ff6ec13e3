//! Cross-context hand-off: other threads enqueue closures, the world runs
//! them in FIFO order at the start of its next tick.

use crossbeam_channel::{bounded, Receiver, Sender, TrySendError};
use log::warn;

use super::{error::WorldError, world::World};

pub type WorldTask = Box<dyn FnOnce(&mut World) + Send + 'static>;

pub(crate) struct WorldTaskQueue {
    sender: Sender<WorldTask>,
    // None once closed; senders then see a disconnected queue
    receiver: Option<Receiver<WorldTask>>,
}

impl WorldTaskQueue {
    pub(crate) fn new(capacity: usize) -> Self {
        let (sender, receiver) = bounded(capacity.max(1));
        Self {
            sender,
            receiver: Some(receiver),
        }
    }

    pub(crate) fn sender(&self) -> WorldTaskSender {
        WorldTaskSender {
            sender: self.sender.clone(),
        }
    }

    /// Tasks queued so far, oldest first. Tasks enqueued while these run
    /// wait for the next drain.
    pub(crate) fn drain(&self) -> Vec<WorldTask> {
        match &self.receiver {
            Some(receiver) => receiver.try_iter().take(receiver.len()).collect(),
            None => Vec::new(),
        }
    }

    /// Stops accepting tasks and returns the ones still queued
    pub(crate) fn close(&mut self) -> Vec<WorldTask> {
        let pending = self.drain();
        self.receiver = None;
        pending
    }

    pub(crate) fn len(&self) -> usize {
        self.receiver.as_ref().map_or(0, Receiver::len)
    }
}

/// Handle for running work on a world from another context. Cheap to clone.
#[derive(Clone)]
pub struct WorldTaskSender {
    sender: Sender<WorldTask>,
}

impl WorldTaskSender {
    /// Queues `task` to run on the world's next tick
    pub fn run_on_world<F>(&self, task: F) -> Result<(), WorldError>
    where
        F: FnOnce(&mut World) + Send + 'static,
    {
        match self.sender.try_send(Box::new(task)) {
            Ok(()) => Ok(()),
            Err(TrySendError::Full(_)) => {
                warn!("World task queue full, dropping task");
                Err(WorldError::TaskQueueFull)
            }
            Err(TrySendError::Disconnected(_)) => Err(WorldError::Destroyed),
        }
    }

    pub fn queued(&self) -> usize {
        self.sender.len()
    }
}
