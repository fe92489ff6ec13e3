use std::{default::Default, time::Duration};

use trellis_shared::WorldConfig;

/// Contains Session configuration options
#[derive(Clone, Debug)]
pub struct SessionConfig {
    /// Wall-clock watchdog; a join that is not running by then fails
    pub join_timeout: Duration,
    /// Delay between polls while a loading operation waits on the transport
    pub poll_interval: Duration,
    /// Configuration for the world the session owns
    pub world: WorldConfig,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            join_timeout: Duration::from_secs(60),
            poll_interval: Duration::from_millis(10),
            world: WorldConfig::default(),
        }
    }
}
