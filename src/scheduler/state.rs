use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "camelCase")]
pub enum SchedulerStatus {
    #[default]
    Idle,
    Running,
    Completed,
    Cancelled,
    /// The loop aborted on an internal invariant violation or I/O failure.
    Failed,
}

impl SchedulerStatus {
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            SchedulerStatus::Completed | SchedulerStatus::Cancelled | SchedulerStatus::Failed
        )
    }
}

/// Observable state of the scheduler and its latest run.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SchedulerState {
    pub status: SchedulerStatus,
    pub run_id: Option<Uuid>,
    pub stamp: Option<String>,
    pub total_rounds: u32,
    pub interval_secs: u64,
    pub started_at: Option<DateTime<Utc>>,
    pub finished_at: Option<DateTime<Utc>>,
    /// Rounds recorded by the last run; only known once it has ended.
    pub rounds_completed: Option<u32>,
}

impl SchedulerState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn begin_run(
        &mut self,
        run_id: Uuid,
        stamp: String,
        total_rounds: u32,
        interval_secs: u64,
        started_at: DateTime<Utc>,
    ) {
        *self = Self {
            status: SchedulerStatus::Running,
            run_id: Some(run_id),
            stamp: Some(stamp),
            total_rounds,
            interval_secs,
            started_at: Some(started_at),
            finished_at: None,
            rounds_completed: None,
        };
    }

    pub fn finish(
        &mut self,
        status: SchedulerStatus,
        rounds_completed: Option<u32>,
        at: DateTime<Utc>,
    ) {
        self.status = status;
        self.rounds_completed = rounds_completed;
        self.finished_at = Some(at);
    }

    pub fn is_running(&self) -> bool {
        self.status == SchedulerStatus::Running
    }
}
