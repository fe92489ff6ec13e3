use std::default::Default;

/// Contains World configuration options
#[derive(Clone, Debug)]
pub struct WorldConfig {
    /// Lets replicas create and destroy slots and components locally, and
    /// lets the authority accept such structural records from replicas
    pub allow_replica_creation: bool,
    /// A reference member that stays Pending for this many ticks is logged
    /// once. `None` disables the warning
    pub pending_reference_warning_ticks: Option<u64>,
    /// Capacity of the queue other contexts use to run work on the world
    pub task_queue_capacity: usize,
}

impl Default for WorldConfig {
    fn default() -> Self {
        Self {
            allow_replica_creation: false,
            pending_reference_warning_ticks: Some(300),
            task_queue_capacity: 1024,
        }
    }
}
