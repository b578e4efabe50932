pub mod config;
pub mod controller;
pub mod output;
pub mod state;

pub use config::RunConfig;
pub use controller::{RunOutcome, Scheduler};
pub use state::{SchedulerState, SchedulerStatus};
