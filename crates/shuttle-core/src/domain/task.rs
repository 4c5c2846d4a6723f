use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

use super::{JobId, TaskEndReason, TaskId, TaskStatus};

/// One unit of work inside a job.
///
/// Identity (`id`, preferred locations, payload) is fixed at creation. The
/// attempt bookkeeping fields are owned by the job and only change through it.
#[derive(Debug, Clone)]
pub struct Task {
    id: TaskId,
    preferred_locations: Vec<String>,
    payload: serde_json::Value,

    pub(crate) status: TaskStatus,
    /// Start of the current attempt (or of the current accounting window).
    pub(crate) start: DateTime<Utc>,
    pub(crate) host: Option<String>,
    /// Attempts launched so far.
    pub(crate) tried: u32,
    /// Execution time accumulated over all attempts.
    pub(crate) used: Duration,
}

impl Task {
    pub fn new(id: TaskId, payload: serde_json::Value) -> Self {
        Self {
            id,
            preferred_locations: Vec::new(),
            payload,
            status: TaskStatus::Starting,
            start: DateTime::<Utc>::UNIX_EPOCH,
            host: None,
            tried: 0,
            used: Duration::ZERO,
        }
    }

    /// Hosts (names or addresses) where this task's input lives.
    pub fn with_preferred_locations<I, S>(mut self, locations: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.preferred_locations = locations.into_iter().map(Into::into).collect();
        self
    }

    pub fn id(&self) -> TaskId {
        self.id
    }

    pub fn preferred_locations(&self) -> &[String] {
        &self.preferred_locations
    }

    pub fn payload(&self) -> &serde_json::Value {
        &self.payload
    }

    pub fn status(&self) -> TaskStatus {
        self.status
    }

    pub fn start(&self) -> DateTime<Utc> {
        self.start
    }

    pub fn host(&self) -> Option<&str> {
        self.host.as_deref()
    }

    pub fn tried(&self) -> u32 {
        self.tried
    }

    pub fn used(&self) -> Duration {
        self.used
    }

    /// Forget attempt history. Done once when a job takes ownership.
    pub(crate) fn reset_attempts(&mut self) {
        self.tried = 0;
        self.used = Duration::ZERO;
    }
}

impl fmt::Display for Task {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}(try {})", self.id, self.tried)
    }
}

/// What the offer loop hands to an executor when a task is placed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskLaunch {
    pub job_id: JobId,
    pub task_id: TaskId,
    pub index: usize,
    /// 1-based attempt number of this launch.
    pub attempt: u32,
    pub host: String,
    pub cpus: f64,
    /// Matched through the task's locality preferences (or it had none).
    pub preferred: bool,
    pub payload: serde_json::Value,
}

/// An asynchronous status report for one attempt of a task.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatusUpdate {
    pub task_id: TaskId,
    pub attempt: u32,
    pub status: TaskStatus,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<TaskEndReason>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<serde_json::Value>,

    /// Side data produced by the attempt (accumulator updates and the like).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub accum_updates: Option<serde_json::Value>,
}

impl StatusUpdate {
    pub fn new(task_id: TaskId, attempt: u32, status: TaskStatus) -> Self {
        Self {
            task_id,
            attempt,
            status,
            reason: None,
            result: None,
            accum_updates: None,
        }
    }

    pub fn running(task_id: TaskId, attempt: u32) -> Self {
        Self::new(task_id, attempt, TaskStatus::Running)
    }

    pub fn finished(task_id: TaskId, attempt: u32) -> Self {
        Self::new(task_id, attempt, TaskStatus::Finished)
    }

    pub fn failed(task_id: TaskId, attempt: u32, reason: TaskEndReason) -> Self {
        Self::new(task_id, attempt, TaskStatus::Failed).with_reason(reason)
    }

    pub fn lost(task_id: TaskId, attempt: u32, reason: TaskEndReason) -> Self {
        Self::new(task_id, attempt, TaskStatus::Lost).with_reason(reason)
    }

    pub fn with_reason(mut self, reason: TaskEndReason) -> Self {
        self.reason = Some(reason);
        self
    }

    pub fn with_result(mut self, result: serde_json::Value) -> Self {
        self.result = Some(result);
        self
    }

    pub fn with_accum_updates(mut self, updates: serde_json::Value) -> Self {
        self.accum_updates = Some(updates);
        self
    }
}
