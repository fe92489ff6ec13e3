pub mod component;
pub mod config;
pub mod error;
pub mod record;
pub mod slot;
pub mod state;
pub mod task_queue;
pub mod world;
