use std::path::PathBuf;
use std::sync::Arc;

use chrono::{DateTime, Local, Utc};
use log::{debug, error, info, warn};
use tokio::sync::{watch, Mutex};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::error::EngineError;
use crate::export::{journal_path, run_stamp, write_artifacts, ExportArtifacts};
use crate::models::Dataset;
use crate::notify::{Completion, CompletionNotifier};
use crate::sensing::loop_worker::{sampling_loop, LoopExit, LoopParams};
use crate::sensing::SampleSource;

use super::output::{ensure_output_writable, OutputClaim};
use super::{RunConfig, SchedulerState, SchedulerStatus};

/// How a run ended.
#[derive(Debug, Clone)]
pub enum RunOutcome {
    Completed(Completion),
    Cancelled { run_id: Uuid, rounds_completed: u32 },
}

/// A finished run whose dataset is kept so its export can be retried.
struct CompletedRun {
    run_id: Uuid,
    dataset: Arc<Dataset>,
    output_dir: PathBuf,
    stamp: String,
    started_at: DateTime<Utc>,
    artifacts: Option<ExportArtifacts>,
    notified: bool,
}

impl CompletedRun {
    fn completion(&self, finished_at: DateTime<Utc>, artifacts: ExportArtifacts) -> Completion {
        Completion {
            run_id: self.run_id,
            started_at: self.started_at,
            finished_at,
            rounds: self.dataset.len(),
            readings: self.dataset.reading_count(),
            artifacts,
        }
    }
}

type RunHandle = JoinHandle<Result<RunOutcome, EngineError>>;

/// Drives sampling runs on the tokio runtime.
///
/// At most one run is active per scheduler, and per output directory across
/// the process. The caller only issues `start`/`cancel` and observes the
/// terminal state through `wait`, `subscribe` or the notifier.
#[derive(Clone)]
pub struct Scheduler {
    source: Arc<dyn SampleSource>,
    notifier: Arc<dyn CompletionNotifier>,
    state: Arc<Mutex<SchedulerState>>,
    completed: Arc<Mutex<Option<CompletedRun>>>,
    handle: Arc<Mutex<Option<RunHandle>>>,
    cancel_token: Arc<Mutex<Option<CancellationToken>>>,
    status_tx: Arc<watch::Sender<SchedulerStatus>>,
}

impl Scheduler {
    pub fn new(source: Arc<dyn SampleSource>, notifier: Arc<dyn CompletionNotifier>) -> Self {
        let (status_tx, _) = watch::channel(SchedulerStatus::Idle);
        Self {
            source,
            notifier,
            state: Arc::new(Mutex::new(SchedulerState::new())),
            completed: Arc::new(Mutex::new(None)),
            handle: Arc::new(Mutex::new(None)),
            cancel_token: Arc::new(Mutex::new(None)),
            status_tx: Arc::new(status_tx),
        }
    }

    /// Validate `config`, check the output directory and spawn the loop.
    ///
    /// Nothing is sampled if this returns an error.
    pub async fn start(&self, config: RunConfig) -> Result<Uuid, EngineError> {
        config.validate()?;

        let mut state = self.state.lock().await;
        if state.is_running() {
            return Err(EngineError::AlreadyRunning(config.output_dir.clone()));
        }

        let output_dir = ensure_output_writable(&config.output_dir).await?;
        let claim = OutputClaim::acquire(&output_dir)?;

        let run_id = Uuid::new_v4();
        let stamp = run_stamp(Local::now());
        let started_at = Utc::now();

        state.begin_run(
            run_id,
            stamp.clone(),
            config.total_rounds,
            config.interval_secs,
            started_at,
        );
        *self.completed.lock().await = None;

        let params = LoopParams {
            run_id,
            total_rounds: config.total_rounds,
            interval: config.interval(),
            poll_timeout: config.poll_timeout(),
            journal_path: journal_path(&output_dir, &stamp),
        };
        let run = RunTask {
            run_id,
            stamp,
            output_dir,
            started_at,
            claim: Some(claim),
            notifier: Arc::clone(&self.notifier),
            state: Arc::clone(&self.state),
            completed: Arc::clone(&self.completed),
            cancel_slot: Arc::clone(&self.cancel_token),
            status_tx: Arc::clone(&self.status_tx),
        };

        let cancel_token = CancellationToken::new();
        let handle = tokio::spawn(supervise(
            run,
            params,
            Arc::clone(&self.source),
            cancel_token.clone(),
        ));

        *self.handle.lock().await = Some(handle);
        *self.cancel_token.lock().await = Some(cancel_token);
        self.status_tx.send_replace(SchedulerStatus::Running);

        info!(
            "run {run_id} started: {} rounds every {}s into {}",
            config.total_rounds,
            config.interval_secs,
            config.output_dir.display()
        );
        Ok(run_id)
    }

    /// Request cancellation of the active run. The loop stops before its next
    /// tick and discards what it collected. Returns `false` if nothing was
    /// running or the run has already collected all its rounds and is being
    /// exported.
    pub async fn cancel(&self) -> bool {
        let state = self.state.lock().await;
        if !state.is_running() {
            return false;
        }

        match self.cancel_token.lock().await.as_ref() {
            Some(token) => {
                token.cancel();
                info!("cancellation requested for run {:?}", state.run_id);
                true
            }
            None => false,
        }
    }

    /// Wait for the latest run to end. A panic in the run task has already
    /// moved the status to Failed by the time this returns.
    pub async fn wait(&self) -> Result<RunOutcome, EngineError> {
        let handle = self
            .handle
            .lock()
            .await
            .take()
            .ok_or(EngineError::NoActiveRun)?;

        match handle.await {
            Ok(result) => result,
            Err(join_err) => {
                let mut state = self.state.lock().await;
                if state.is_running() {
                    state.finish(SchedulerStatus::Failed, None, Utc::now());
                    self.status_tx.send_replace(SchedulerStatus::Failed);
                }
                Err(EngineError::Worker(join_err.to_string()))
            }
        }
    }

    /// Cancel the active run and wait for the loop to wind down.
    pub async fn cancel_and_wait(&self) -> Result<RunOutcome, EngineError> {
        self.cancel().await;
        self.wait().await
    }

    pub async fn status(&self) -> SchedulerStatus {
        self.state.lock().await.status
    }

    pub async fn snapshot(&self) -> SchedulerState {
        self.state.lock().await.clone()
    }

    /// Status updates, for UIs that react to terminal states.
    pub fn subscribe(&self) -> watch::Receiver<SchedulerStatus> {
        self.status_tx.subscribe()
    }

    /// Dataset of the last completed run.
    pub async fn completed_dataset(&self) -> Option<Arc<Dataset>> {
        self.completed
            .lock()
            .await
            .as_ref()
            .map(|run| Arc::clone(&run.dataset))
    }

    /// Files of the last completed run, if its export succeeded.
    pub async fn completed_artifacts(&self) -> Option<ExportArtifacts> {
        self.completed
            .lock()
            .await
            .as_ref()
            .and_then(|run| run.artifacts.clone())
    }

    /// Write the exports of the last completed run again, e.g. after a
    /// serialization or disk failure. Notifies if the run has not been
    /// announced yet.
    pub async fn retry_export(&self) -> Result<ExportArtifacts, EngineError> {
        let mut guard = self.completed.lock().await;
        let run = guard.as_mut().ok_or(EngineError::NoCompletedRun)?;

        let artifacts = write_artifacts(&run.dataset, &run.output_dir, &run.stamp).await?;
        remove_journal(&run.output_dir, &run.stamp).await;
        run.artifacts = Some(artifacts.clone());

        let pending = if run.notified {
            None
        } else {
            run.notified = true;
            Some(run.completion(Utc::now(), artifacts.clone()))
        };
        drop(guard);

        if let Some(completion) = pending {
            deliver(self.notifier.as_ref(), &completion);
        }
        Ok(artifacts)
    }
}

/// State owned by the spawned worker for one run.
struct RunTask {
    run_id: Uuid,
    stamp: String,
    output_dir: PathBuf,
    started_at: DateTime<Utc>,
    claim: Option<OutputClaim>,
    notifier: Arc<dyn CompletionNotifier>,
    state: Arc<Mutex<SchedulerState>>,
    completed: Arc<Mutex<Option<CompletedRun>>>,
    cancel_slot: Arc<Mutex<Option<CancellationToken>>>,
    status_tx: Arc<watch::Sender<SchedulerStatus>>,
}

/// Run `task` on its own tokio task so a panic inside the loop or an
/// exporter ends the run as Failed instead of leaving it Running.
async fn supervise(
    task: RunTask,
    params: LoopParams,
    source: Arc<dyn SampleSource>,
    cancel_token: CancellationToken,
) -> Result<RunOutcome, EngineError> {
    let run_id = task.run_id;
    let state = Arc::clone(&task.state);
    let cancel_slot = Arc::clone(&task.cancel_slot);
    let status_tx = Arc::clone(&task.status_tx);

    match tokio::spawn(task.drive(params, source, cancel_token)).await {
        Ok(result) => result,
        Err(join_err) => {
            // the claim was released when the task unwound
            let mut state = state.lock().await;
            cancel_slot.lock().await.take();
            if state.is_running() {
                state.finish(SchedulerStatus::Failed, None, Utc::now());
                status_tx.send_replace(SchedulerStatus::Failed);
            }
            error!("run {run_id} task failed: {join_err}");
            Err(EngineError::Worker(join_err.to_string()))
        }
    }
}

impl RunTask {
    async fn drive(
        mut self,
        params: LoopParams,
        source: Arc<dyn SampleSource>,
        cancel_token: CancellationToken,
    ) -> Result<RunOutcome, EngineError> {
        match sampling_loop(params, source, cancel_token).await {
            Ok(LoopExit::Cancelled { rounds_completed }) => {
                self.finish(SchedulerStatus::Cancelled, Some(rounds_completed))
                    .await;
                Ok(RunOutcome::Cancelled {
                    run_id: self.run_id,
                    rounds_completed,
                })
            }
            Ok(LoopExit::Finished(dataset)) => {
                if self.seal().await {
                    self.complete(dataset).await
                } else {
                    let rounds_completed = dataset.len() as u32;
                    info!(
                        "run {} cancelled after its last round; discarding",
                        self.run_id
                    );
                    remove_journal(&self.output_dir, &self.stamp).await;
                    self.finish(SchedulerStatus::Cancelled, Some(rounds_completed))
                        .await;
                    Ok(RunOutcome::Cancelled {
                        run_id: self.run_id,
                        rounds_completed,
                    })
                }
            }
            Err(err) => {
                self.finish(SchedulerStatus::Failed, None).await;
                Err(err)
            }
        }
    }

    async fn complete(mut self, dataset: Dataset) -> Result<RunOutcome, EngineError> {
        let dataset = Arc::new(dataset);
        let rounds = dataset.len() as u32;

        let mut run = CompletedRun {
            run_id: self.run_id,
            dataset,
            output_dir: self.output_dir.clone(),
            stamp: self.stamp.clone(),
            started_at: self.started_at,
            artifacts: None,
            notified: false,
        };

        let exported = match write_artifacts(&run.dataset, &self.output_dir, &self.stamp).await {
            Ok(artifacts) => {
                remove_journal(&self.output_dir, &self.stamp).await;
                run.artifacts = Some(artifacts.clone());
                run.notified = true;
                Ok(run.completion(Utc::now(), artifacts))
            }
            Err(err) => {
                error!(
                    "run {} export failed, dataset kept for retry: {err}",
                    self.run_id
                );
                Err(err)
            }
        };

        *self.completed.lock().await = Some(run);
        self.finish(SchedulerStatus::Completed, Some(rounds)).await;

        let completion = exported?;
        deliver(self.notifier.as_ref(), &completion);
        Ok(RunOutcome::Completed(completion))
    }

    /// Withdraw the cancellation token once every round is in. Returns
    /// `false` if a cancel request got in first. `cancel()` reads the token
    /// under the same state lock, so after this it reports `false`.
    async fn seal(&self) -> bool {
        let _state = self.state.lock().await;
        let token = self.cancel_slot.lock().await.take();
        !token.is_some_and(|token| token.is_cancelled())
    }

    async fn finish(&mut self, status: SchedulerStatus, rounds_completed: Option<u32>) {
        // release the directory before anyone can observe the terminal state
        self.claim.take();

        let mut state = self.state.lock().await;
        self.cancel_slot.lock().await.take();
        state.finish(status, rounds_completed, Utc::now());
        self.status_tx.send_replace(status);
        debug!("run {} finished with status {status:?}", self.run_id);
    }
}

fn deliver(notifier: &dyn CompletionNotifier, completion: &Completion) {
    if let Err(err) = notifier.notify(completion) {
        warn!(
            "completion notifier failed for run {}: {err:#}",
            completion.run_id
        );
    }
}

async fn remove_journal(dir: &std::path::Path, stamp: &str) {
    let path = journal_path(dir, stamp);
    if let Err(err) = tokio::fs::remove_file(&path).await {
        debug!("could not remove journal {}: {err}", path.display());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::SourceError;
    use crate::export::{from_structured, parse_tabular};
    use crate::models::Reading;
    use std::sync::atomic::{AtomicU32, AtomicUsize, Ordering};
    use std::time::Duration;

    /// Returns one fixed reading per poll, except on `fail_on` polls.
    struct ScriptedSource {
        polls: AtomicU32,
        refreshes: AtomicU32,
        fail_on: Vec<u32>,
        label: String,
    }

    impl ScriptedSource {
        fn new(fail_on: Vec<u32>) -> Self {
            Self::with_label("NetA", fail_on)
        }

        fn with_label(label: &str, fail_on: Vec<u32>) -> Self {
            Self {
                polls: AtomicU32::new(0),
                refreshes: AtomicU32::new(0),
                fail_on,
                label: label.to_string(),
            }
        }
    }

    impl SampleSource for ScriptedSource {
        fn scan(&self) -> Result<Vec<Reading>, SourceError> {
            let poll = self.polls.fetch_add(1, Ordering::SeqCst) + 1;
            if self.fail_on.contains(&poll) {
                return Err(SourceError::Unavailable("radio busy".into()));
            }
            Ok(vec![Reading::new("A1", self.label.as_str(), 2412, -50, "WPA2")])
        }

        fn trigger_refresh(&self) {
            self.refreshes.fetch_add(1, Ordering::SeqCst);
        }
    }

    #[derive(Default)]
    struct CountingNotifier {
        calls: AtomicUsize,
    }

    impl CompletionNotifier for CountingNotifier {
        fn notify(&self, _completion: &Completion) -> anyhow::Result<()> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    struct FailingNotifier;

    impl CompletionNotifier for FailingNotifier {
        fn notify(&self, _completion: &Completion) -> anyhow::Result<()> {
            anyhow::bail!("vibrator unavailable")
        }
    }

    fn files_in(dir: &std::path::Path) -> Vec<String> {
        let mut names: Vec<String> = std::fs::read_dir(dir)
            .unwrap()
            .map(|entry| entry.unwrap().file_name().to_string_lossy().into_owned())
            .collect();
        names.sort();
        names
    }

    #[tokio::test]
    async fn three_rounds_export_and_notify_once() {
        let dir = tempfile::tempdir().unwrap();
        let source = Arc::new(ScriptedSource::new(vec![]));
        let notifier = Arc::new(CountingNotifier::default());
        let scheduler = Scheduler::new(source.clone(), notifier.clone());

        scheduler.start(RunConfig::new(3, 1, dir.path())).await.unwrap();
        assert_eq!(scheduler.status().await, SchedulerStatus::Running);

        let outcome = scheduler.wait().await.unwrap();
        let RunOutcome::Completed(completion) = outcome else {
            panic!("expected a completed run");
        };

        assert_eq!(completion.rounds, 3);
        assert_eq!(scheduler.status().await, SchedulerStatus::Completed);
        assert_eq!(notifier.calls.load(Ordering::SeqCst), 1);
        assert_eq!(source.refreshes.load(Ordering::SeqCst), 3);

        let dataset = scheduler.completed_dataset().await.unwrap();
        let indices: Vec<u32> = dataset.rounds().iter().map(|r| r.index()).collect();
        assert_eq!(indices, vec![1, 2, 3]);

        let table = std::fs::read_to_string(&completion.artifacts.tabular).unwrap();
        assert_eq!(table, "A1,NetA,-50\nA1,NetA,-50\nA1,NetA,-50\n");

        let json: serde_json::Value =
            serde_json::from_slice(&std::fs::read(&completion.artifacts.structured).unwrap()).unwrap();
        for key in ["measurement 1", "measurement 2", "measurement 3"] {
            assert_eq!(json[key]["ap1"]["BSSID"], "A1");
        }
        assert_eq!(json.as_object().unwrap().len(), 3);

        // the journal is gone once the exports exist
        assert_eq!(files_in(dir.path()).len(), 2);
    }

    #[tokio::test]
    async fn failed_poll_records_an_empty_round() {
        let dir = tempfile::tempdir().unwrap();
        let notifier = Arc::new(CountingNotifier::default());
        let scheduler = Scheduler::new(Arc::new(ScriptedSource::new(vec![2])), notifier.clone());

        scheduler.start(RunConfig::new(3, 1, dir.path())).await.unwrap();
        let RunOutcome::Completed(completion) = scheduler.wait().await.unwrap() else {
            panic!("expected a completed run");
        };

        let dataset = scheduler.completed_dataset().await.unwrap();
        assert_eq!(dataset.len(), 3);
        assert!(dataset.round(2).unwrap().is_empty());

        let table = std::fs::read_to_string(&completion.artifacts.tabular).unwrap();
        assert_eq!(parse_tabular(&table).unwrap().len(), 2);
        assert_eq!(notifier.calls.load(Ordering::SeqCst), 1);

        let reparsed = from_structured(&std::fs::read(&completion.artifacts.structured).unwrap()).unwrap();
        assert_eq!(&reparsed, dataset.as_ref());
    }

    #[tokio::test]
    async fn cancel_discards_the_run() {
        let dir = tempfile::tempdir().unwrap();
        let notifier = Arc::new(CountingNotifier::default());
        let scheduler = Scheduler::new(Arc::new(ScriptedSource::new(vec![])), notifier.clone());
        let mut status_rx = scheduler.subscribe();

        scheduler.start(RunConfig::new(10, 1, dir.path())).await.unwrap();
        tokio::time::sleep(Duration::from_millis(1500)).await;

        let outcome = scheduler.cancel_and_wait().await.unwrap();
        let RunOutcome::Cancelled { rounds_completed, .. } = outcome else {
            panic!("expected a cancelled run");
        };

        assert!(rounds_completed >= 1 && rounds_completed < 10);
        assert_eq!(scheduler.status().await, SchedulerStatus::Cancelled);
        assert_eq!(*status_rx.borrow_and_update(), SchedulerStatus::Cancelled);
        assert_eq!(notifier.calls.load(Ordering::SeqCst), 0);
        assert!(files_in(dir.path()).is_empty());
        assert!(scheduler.completed_dataset().await.is_none());
    }

    #[tokio::test]
    async fn cancel_takes_effect_within_a_tick() {
        let dir = tempfile::tempdir().unwrap();
        let scheduler = Scheduler::new(
            Arc::new(ScriptedSource::new(vec![])),
            Arc::new(CountingNotifier::default()),
        );

        scheduler.start(RunConfig::new(4, 30, dir.path())).await.unwrap();
        tokio::time::sleep(Duration::from_millis(100)).await;

        let outcome = tokio::time::timeout(Duration::from_secs(5), scheduler.cancel_and_wait())
            .await
            .expect("cancel should not wait for the interval")
            .unwrap();
        assert!(matches!(
            outcome,
            RunOutcome::Cancelled { rounds_completed, .. } if rounds_completed <= 1
        ));
    }

    /// Blocks its first write until the other end is opened.
    #[cfg(unix)]
    fn make_fifo(path: &std::path::Path) {
        let status = std::process::Command::new("mkfifo").arg(path).status().unwrap();
        assert!(status.success());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn cancel_is_refused_once_all_rounds_are_in() {
        use crate::export::artifact_paths;

        let dir = tempfile::tempdir().unwrap();
        let notifier = Arc::new(CountingNotifier::default());
        let scheduler = Scheduler::new(Arc::new(ScriptedSource::new(vec![])), notifier.clone());

        scheduler.start(RunConfig::new(1, 1, dir.path())).await.unwrap();
        let stamp = scheduler.snapshot().await.stamp.unwrap();
        let output_dir = std::fs::canonicalize(dir.path()).unwrap();
        let structured = artifact_paths(&output_dir, &stamp).structured;
        make_fifo(&structured);

        // the loop ends after ~1s, then the export blocks on the fifo
        tokio::time::sleep(Duration::from_millis(2000)).await;
        assert!(!scheduler.cancel().await);

        let drained = tokio::task::spawn_blocking(move || std::fs::read(structured).unwrap());
        let outcome = scheduler.wait().await.unwrap();
        let json = drained.await.unwrap();

        assert!(matches!(outcome, RunOutcome::Completed(_)));
        assert!(from_structured(&json).is_ok());
        assert_eq!(scheduler.status().await, SchedulerStatus::Completed);
        assert_eq!(notifier.calls.load(Ordering::SeqCst), 1);
    }

    /// Panics when asked to refresh, i.e. right after the first round.
    struct PanickingSource;

    impl SampleSource for PanickingSource {
        fn scan(&self) -> Result<Vec<Reading>, SourceError> {
            Ok(Vec::new())
        }

        fn trigger_refresh(&self) {
            panic!("driver crashed");
        }
    }

    #[tokio::test]
    async fn worker_panic_is_reported_without_waiting() {
        let dir = tempfile::tempdir().unwrap();
        let notifier = Arc::new(CountingNotifier::default());
        let scheduler = Scheduler::new(Arc::new(PanickingSource), notifier.clone());
        let mut status_rx = scheduler.subscribe();

        scheduler.start(RunConfig::new(3, 1, dir.path())).await.unwrap();

        tokio::time::timeout(
            Duration::from_secs(5),
            status_rx.wait_for(|status| *status == SchedulerStatus::Failed),
        )
        .await
        .expect("status should reach Failed on its own")
        .unwrap();
        assert_eq!(scheduler.status().await, SchedulerStatus::Failed);
        assert!(!scheduler.cancel().await);

        assert!(matches!(scheduler.wait().await, Err(EngineError::Worker(_))));
        assert_eq!(notifier.calls.load(Ordering::SeqCst), 0);

        // the output directory was released
        let rival = Scheduler::new(
            Arc::new(ScriptedSource::new(vec![])),
            Arc::new(CountingNotifier::default()),
        );
        rival.start(RunConfig::new(1, 1, dir.path())).await.unwrap();
        assert!(matches!(rival.wait().await.unwrap(), RunOutcome::Completed(_)));
    }

    #[tokio::test]
    async fn invalid_config_is_rejected_before_start() {
        let dir = tempfile::tempdir().unwrap();
        let scheduler = Scheduler::new(
            Arc::new(ScriptedSource::new(vec![])),
            Arc::new(CountingNotifier::default()),
        );

        assert!(matches!(
            scheduler.start(RunConfig::new(0, 1, dir.path())).await,
            Err(EngineError::InvalidConfig(_))
        ));
        assert!(matches!(
            scheduler.start(RunConfig::new(3, 0, dir.path())).await,
            Err(EngineError::InvalidConfig(_))
        ));
        assert_eq!(scheduler.status().await, SchedulerStatus::Idle);
    }

    #[tokio::test]
    async fn unavailable_output_fails_fast() {
        let dir = tempfile::tempdir().unwrap();
        let source = Arc::new(ScriptedSource::new(vec![]));
        let scheduler = Scheduler::new(source.clone(), Arc::new(CountingNotifier::default()));

        let err = scheduler
            .start(RunConfig::new(3, 1, dir.path().join("missing")))
            .await
            .unwrap_err();

        assert!(matches!(err, EngineError::OutputUnavailable { .. }));
        assert_eq!(source.polls.load(Ordering::SeqCst), 0);
        assert!(matches!(scheduler.wait().await, Err(EngineError::NoActiveRun)));
    }

    #[tokio::test]
    async fn second_start_while_running_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let other_dir = tempfile::tempdir().unwrap();
        let scheduler = Scheduler::new(
            Arc::new(ScriptedSource::new(vec![])),
            Arc::new(CountingNotifier::default()),
        );
        let rival = Scheduler::new(
            Arc::new(ScriptedSource::new(vec![])),
            Arc::new(CountingNotifier::default()),
        );

        scheduler.start(RunConfig::new(5, 1, dir.path())).await.unwrap();

        assert!(matches!(
            scheduler.start(RunConfig::new(5, 1, other_dir.path())).await,
            Err(EngineError::AlreadyRunning(_))
        ));
        assert!(matches!(
            rival.start(RunConfig::new(5, 1, dir.path())).await,
            Err(EngineError::AlreadyRunning(_))
        ));

        scheduler.cancel_and_wait().await.unwrap();

        // the directory is free again once the run has ended
        rival.start(RunConfig::new(1, 1, dir.path())).await.unwrap();
        assert!(matches!(rival.wait().await.unwrap(), RunOutcome::Completed(_)));
    }

    #[tokio::test]
    async fn notifier_failure_does_not_fail_the_run() {
        let dir = tempfile::tempdir().unwrap();
        let scheduler = Scheduler::new(Arc::new(ScriptedSource::new(vec![])), Arc::new(FailingNotifier));

        scheduler.start(RunConfig::new(1, 1, dir.path())).await.unwrap();

        assert!(matches!(scheduler.wait().await.unwrap(), RunOutcome::Completed(_)));
        assert_eq!(scheduler.status().await, SchedulerStatus::Completed);
    }

    #[tokio::test]
    async fn serialization_failure_keeps_dataset_for_retry() {
        let dir = tempfile::tempdir().unwrap();
        let notifier = Arc::new(CountingNotifier::default());
        let scheduler = Scheduler::new(
            Arc::new(ScriptedSource::with_label("bad\0label", vec![])),
            notifier.clone(),
        );

        scheduler.start(RunConfig::new(2, 1, dir.path())).await.unwrap();
        let err = scheduler.wait().await.unwrap_err();

        assert!(matches!(err, EngineError::Serialization(_)));
        assert_eq!(scheduler.status().await, SchedulerStatus::Completed);
        assert_eq!(notifier.calls.load(Ordering::SeqCst), 0);
        assert!(scheduler.completed_artifacts().await.is_none());
        assert_eq!(scheduler.completed_dataset().await.unwrap().reading_count(), 2);
        // only the journal is on disk
        let files = files_in(dir.path());
        assert_eq!(files.len(), 1);
        assert!(files[0].ends_with(".csv.partial"));

        assert!(matches!(
            scheduler.retry_export().await,
            Err(EngineError::Serialization(_))
        ));
    }

    #[tokio::test]
    async fn retry_export_rewrites_files_without_renotifying() {
        let dir = tempfile::tempdir().unwrap();
        let notifier = Arc::new(CountingNotifier::default());
        let scheduler = Scheduler::new(Arc::new(ScriptedSource::new(vec![])), notifier.clone());

        assert!(matches!(
            scheduler.retry_export().await,
            Err(EngineError::NoCompletedRun)
        ));

        scheduler.start(RunConfig::new(1, 1, dir.path())).await.unwrap();
        let RunOutcome::Completed(completion) = scheduler.wait().await.unwrap() else {
            panic!("expected a completed run");
        };
        std::fs::remove_file(&completion.artifacts.tabular).unwrap();

        let artifacts = scheduler.retry_export().await.unwrap();

        assert_eq!(artifacts, completion.artifacts);
        assert!(artifacts.tabular.exists());
        assert_eq!(notifier.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn scheduler_can_run_again_after_a_terminal_state() {
        let dir = tempfile::tempdir().unwrap();
        let scheduler = Scheduler::new(
            Arc::new(ScriptedSource::new(vec![])),
            Arc::new(CountingNotifier::default()),
        );

        let first = scheduler.start(RunConfig::new(1, 1, dir.path())).await.unwrap();
        scheduler.wait().await.unwrap();
        let second = scheduler.start(RunConfig::new(1, 1, dir.path())).await.unwrap();

        assert_ne!(first, second);
        assert_eq!(scheduler.snapshot().await.run_id, Some(second));
        scheduler.wait().await.unwrap();
    }
}
