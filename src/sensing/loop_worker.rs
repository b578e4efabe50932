use std::path::PathBuf;
use std::sync::Arc;

use tokio::fs::File;
use tokio::io::AsyncWriteExt;
use tokio::time::{Duration, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::error::EngineError;
use crate::models::{Dataset, Reading};

use super::{RoundAccumulator, SampleSource};

const ENABLE_LOGS: bool = true;

use crate::{log_debug, log_error, log_info, log_warn};

/// Everything one run of the loop needs; moved into the worker task.
pub struct LoopParams {
    pub run_id: Uuid,
    pub total_rounds: u32,
    pub interval: Duration,
    pub poll_timeout: Duration,
    pub journal_path: PathBuf,
}

pub enum LoopExit {
    Finished(Dataset),
    Cancelled { rounds_completed: u32 },
}

/// Collect `total_rounds` rounds, one per interval tick.
///
/// Each tick polls the source, stores the round, asks the source to refresh
/// for the next tick, appends the round's table lines to the journal, then
/// waits for the next tick. A round therefore holds the results available at
/// tick N, which may trail the refresh requested at tick N-1 by up to one
/// interval.
pub async fn sampling_loop(
    params: LoopParams,
    source: Arc<dyn SampleSource>,
    cancel_token: CancellationToken,
) -> Result<LoopExit, EngineError> {
    let mut accumulator = RoundAccumulator::new();
    let mut journal = Journal::open(params.journal_path.clone()).await;

    let mut ticker = tokio::time::interval(params.interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    // first tick completes immediately
    ticker.tick().await;

    for index in 1..=params.total_rounds {
        let readings = tokio::select! {
            biased;
            _ = cancel_token.cancelled() => {
                return Ok(cancelled(&params, journal, index - 1).await);
            }
            readings = poll_source(&source, params.poll_timeout, index) => readings,
        };

        let reading_count = readings.len();
        let lines = match accumulator.add_round(index, readings) {
            Ok(lines) => lines,
            Err(err) => {
                log_error!(
                    "run {} aborted at round {index}: {err}; partial table kept at {}",
                    params.run_id,
                    params.journal_path.display()
                );
                journal.close().await;
                return Err(err);
            }
        };

        source.trigger_refresh();
        journal.append(&lines).await;
        log_info!(
            "run {} round {index}/{}: {reading_count} readings",
            params.run_id,
            params.total_rounds
        );

        tokio::select! {
            biased;
            _ = cancel_token.cancelled() => {
                return Ok(cancelled(&params, journal, index).await);
            }
            _ = ticker.tick() => {}
        }
    }

    journal.close().await;
    if accumulator.unencodable() > 0 {
        log_warn!(
            "run {}: {} readings could not be written to the table",
            params.run_id,
            accumulator.unencodable()
        );
    }
    Ok(LoopExit::Finished(accumulator.into_dataset()))
}

async fn cancelled(params: &LoopParams, journal: Journal, rounds_completed: u32) -> LoopExit {
    log_info!(
        "run {} cancelled after {rounds_completed} of {} rounds; discarding",
        params.run_id,
        params.total_rounds
    );
    journal.discard().await;
    LoopExit::Cancelled { rounds_completed }
}

async fn poll_source(source: &Arc<dyn SampleSource>, timeout: Duration, index: u32) -> Vec<Reading> {
    let source = Arc::clone(source);
    let poll = tokio::task::spawn_blocking(move || source.poll());

    match tokio::time::timeout(timeout, poll).await {
        Ok(Ok(readings)) => readings,
        Ok(Err(err)) => {
            log_error!("round {index}: sample source poll failed: {err}");
            Vec::new()
        }
        Err(_) => {
            log_warn!(
                "round {index}: sample source poll timed out (> {}s), recording empty round",
                timeout.as_secs()
            );
            Vec::new()
        }
    }
}

/// Append-only copy of the table lines written while a run is in progress.
/// Journal failures are logged and disable the journal; they never stop
/// sampling.
struct Journal {
    path: PathBuf,
    file: Option<File>,
}

impl Journal {
    async fn open(path: PathBuf) -> Self {
        let file = match File::create(&path).await {
            Ok(file) => Some(file),
            Err(err) => {
                log_warn!("cannot open journal {}: {err}", path.display());
                None
            }
        };
        Self { path, file }
    }

    async fn append(&mut self, lines: &str) {
        if lines.is_empty() {
            return;
        }
        let Some(file) = self.file.as_mut() else {
            return;
        };

        let mut written = file.write_all(lines.as_bytes()).await;
        if written.is_ok() {
            written = file.flush().await;
        }

        if let Err(err) = written {
            log_warn!("journal write to {} failed, disabling: {err}", self.path.display());
            self.file = None;
        }
    }

    async fn close(&mut self) {
        if let Some(mut file) = self.file.take() {
            if let Err(err) = file.sync_all().await {
                log_debug!("journal sync failed for {}: {err}", self.path.display());
            }
        }
    }

    async fn discard(mut self) {
        self.close().await;
        if let Err(err) = tokio::fs::remove_file(&self.path).await {
            log_debug!("could not remove journal {}: {err}", self.path.display());
        }
    }
}
