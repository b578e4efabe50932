pub mod error;
pub mod export;
pub mod fingerprint;
pub mod models;
pub mod notify;
pub mod scheduler;
pub mod sensing;
pub mod settings;
pub mod utils;

pub use error::{EngineError, SourceError};
pub use models::{Dataset, Reading, Round};
pub use notify::{Completion, CompletionNotifier};
pub use scheduler::{RunConfig, RunOutcome, Scheduler, SchedulerStatus};
pub use sensing::SampleSource;

/// Initialise `env_logger`. `RUST_LOG` wins when set; otherwise the level is
/// `info`, or `debug` with `ROUNDSCAN_DEBUG=1`.
pub fn init_logging() {
    let debug = std::env::var("ROUNDSCAN_DEBUG")
        .map(|value| value == "1" || value.eq_ignore_ascii_case("true"))
        .unwrap_or(false);
    let default_level = if debug { "debug" } else { "info" };

    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_level))
        .init();
}
