pub mod event_bus;
pub mod job_runner;

pub use event_bus::BroadcastEventBus;
pub use job_runner::{JobRunner, JobRunnerConfig};
