//! End-of-run notification.
//!
//! The scheduler calls [`CompletionNotifier::notify`] once per completed run,
//! after both exports are on disk. Errors are logged by the caller and never
//! affect the run.

use anyhow::{anyhow, Result};
use chrono::{DateTime, Utc};
use log::info;
use serde::Serialize;
use tokio::sync::mpsc;
use uuid::Uuid;

use crate::export::ExportArtifacts;

/// Summary of a completed run handed to the notifier.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Completion {
    pub run_id: Uuid,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub rounds: usize,
    pub readings: usize,
    #[serde(skip)]
    pub artifacts: ExportArtifacts,
}

pub trait CompletionNotifier: Send + Sync {
    fn notify(&self, completion: &Completion) -> Result<()>;
}

/// Writes the completion to the log.
pub struct LogNotifier;

impl CompletionNotifier for LogNotifier {
    fn notify(&self, completion: &Completion) -> Result<()> {
        info!(
            "run {} completed: {} rounds, {} readings -> {}",
            completion.run_id,
            completion.rounds,
            completion.readings,
            completion.artifacts.structured.display()
        );
        Ok(())
    }
}

/// Prints a one-line summary to stdout.
pub struct ConsoleNotifier;

impl CompletionNotifier for ConsoleNotifier {
    fn notify(&self, completion: &Completion) -> Result<()> {
        let elapsed = completion.finished_at - completion.started_at;
        println!(
            "Scan finished in {}s: {} rounds, {} readings\n  {}\n  {}",
            elapsed.num_seconds(),
            completion.rounds,
            completion.readings,
            completion.artifacts.structured.display(),
            completion.artifacts.tabular.display()
        );
        Ok(())
    }
}

/// Forwards completions to a channel, for embedders that want to await the
/// terminal state from another task.
pub struct ChannelNotifier {
    tx: mpsc::UnboundedSender<Completion>,
}

impl ChannelNotifier {
    pub fn channel() -> (Self, mpsc::UnboundedReceiver<Completion>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }
}

impl CompletionNotifier for ChannelNotifier {
    fn notify(&self, completion: &Completion) -> Result<()> {
        self.tx
            .send(completion.clone())
            .map_err(|_| anyhow!("completion receiver dropped"))
    }
}
