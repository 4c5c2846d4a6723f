//! State - タスクの状態と終了理由

use serde::{Deserialize, Serialize};
use std::fmt;

/// Status of the current attempt of a task, as reported by the executor.
///
/// State transitions:
/// - Starting -> Running -> Finished
/// - Starting/Running -> Failed | Killed | Lost -> (back to pending)
///
/// Only `Finished` is terminal for the task index. The other end states send
/// the index back to the pending pool unless the failure budget is spent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TaskStatus {
    Starting,
    Running,
    Finished,
    Failed,
    Killed,
    Lost,
}

impl TaskStatus {
    /// Did this attempt end without success?
    pub fn is_failure(self) -> bool {
        matches!(self, TaskStatus::Failed | TaskStatus::Killed | TaskStatus::Lost)
    }

    /// Does this status count against the task's failure budget?
    ///
    /// A kill is requested by the scheduler itself (usually to drop a
    /// speculative duplicate), so it is not charged to the task.
    pub fn counts_as_failure(self) -> bool {
        matches!(self, TaskStatus::Failed | TaskStatus::Lost)
    }
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            TaskStatus::Starting => "starting",
            TaskStatus::Running => "running",
            TaskStatus::Finished => "finished",
            TaskStatus::Failed => "failed",
            TaskStatus::Killed => "killed",
            TaskStatus::Lost => "lost",
        };
        f.write_str(s)
    }
}

/// Why a task attempt ended. Passed to `Scheduler::task_ended`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind")]
pub enum TaskEndReason {
    Success,

    /// Upstream output needed by the task could not be fetched. The task is
    /// not retried; the failure is surfaced to the scheduler instead.
    FetchFailed {
        server_uri: String,
        shuffle_id: u64,
        map_id: u64,
        reduce_id: u64,
    },

    /// Any other failure, with the executor's message.
    Other { message: String },
}

impl TaskEndReason {
    pub fn fetch_failed(server_uri: impl Into<String>, shuffle_id: u64, map_id: u64, reduce_id: u64) -> Self {
        Self::FetchFailed {
            server_uri: server_uri.into(),
            shuffle_id,
            map_id,
            reduce_id,
        }
    }

    pub fn other(message: impl Into<String>) -> Self {
        Self::Other {
            message: message.into(),
        }
    }

    pub fn is_fetch_failure(&self) -> bool {
        matches!(self, TaskEndReason::FetchFailed { .. })
    }
}

impl fmt::Display for TaskEndReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TaskEndReason::Success => f.write_str("success"),
            TaskEndReason::FetchFailed {
                server_uri,
                shuffle_id,
                map_id,
                reduce_id,
            } => write!(
                f,
                "fetch failed from {server_uri} (shuffle {shuffle_id}, map {map_id}, reduce {reduce_id})"
            ),
            TaskEndReason::Other { message } => f.write_str(message),
        }
    }
}
