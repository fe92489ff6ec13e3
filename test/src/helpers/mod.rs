pub mod assertions;
pub mod components;
pub mod listener;

pub use assertions::{assert_fully_attached, assert_non_decreasing, assert_same_tree};
pub use components::{sample_registry, Beacon, Spin};
pub use listener::{LoadingEvent, RecordingListener};

use trellis_session::JoinAddress;

/// Address every test join points at
pub fn test_address() -> JoinAddress {
    JoinAddress::new("127.0.0.1", JoinAddress::DEFAULT_PORT).unwrap()
}
