//! Job-level results handed to the scheduler when a job ends.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::ids::JobId;
use super::task::Task;

/// Why a job was aborted. The `Display` text becomes the cause of failure.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
pub enum AbortReason {
    #[error("task {index} failed more than {max_failures} times")]
    TooManyFailures { index: usize, max_failures: u32 },

    #[error("task {task} timed out after {tried} attempts")]
    StragglerTimeout { task: String, tried: u32 },

    #[error("resource manager error {code}: {message}")]
    ResourceManager { code: i32, message: String },

    #[error("{0}")]
    Other(String),
}

/// Execution time statistics over all tasks of a finished job.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobSummary {
    pub num_tasks: usize,
    pub elapsed: Duration,
    pub min_used: Duration,
    pub mean_used: Duration,
    pub max_used: Duration,
    pub max_tried: u32,
}

impl JobSummary {
    /// `None` for an empty task list.
    pub fn from_tasks(tasks: &[Task], elapsed: Duration) -> Option<Self> {
        let min_used = tasks.iter().map(Task::used).min()?;
        let max_used = tasks.iter().map(Task::used).max()?;
        let total: Duration = tasks.iter().map(Task::used).sum();
        let max_tried = tasks.iter().map(Task::tried).max()?;
        Some(Self {
            num_tasks: tasks.len(),
            elapsed,
            min_used,
            mean_used: total.div_f64(tasks.len() as f64),
            max_used,
            max_tried,
        })
    }
}

/// Delivered exactly once per job through `Scheduler::job_finished`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobReport {
    pub job_id: JobId,
    pub failed: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cause_of_failure: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub summary: Option<JobSummary>,
}

impl JobReport {
    pub fn succeeded(job_id: JobId, summary: Option<JobSummary>) -> Self {
        Self {
            job_id,
            failed: false,
            cause_of_failure: None,
            summary,
        }
    }

    pub fn aborted(job_id: JobId, cause: impl Into<String>) -> Self {
        Self {
            job_id,
            failed: true,
            cause_of_failure: Some(cause.into()),
            summary: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::TaskId;
    use ulid::Ulid;

    fn task_with(used_secs: u64, tried: u32) -> Task {
        let mut t = Task::new(TaskId::from_ulid(Ulid::new()), serde_json::json!({}));
        t.used = Duration::from_secs(used_secs);
        t.tried = tried;
        t
    }

    #[test]
    fn summary_over_tasks() {
        let tasks = vec![task_with(2, 1), task_with(4, 3), task_with(9, 1)];
        let s = JobSummary::from_tasks(&tasks, Duration::from_secs(20)).unwrap();
        assert_eq!(s.min_used, Duration::from_secs(2));
        assert_eq!(s.mean_used, Duration::from_secs(5));
        assert_eq!(s.max_used, Duration::from_secs(9));
        assert_eq!(s.max_tried, 3);
        assert_eq!(s.num_tasks, 3);
    }

    #[test]
    fn summary_of_no_tasks_is_none() {
        assert!(JobSummary::from_tasks(&[], Duration::ZERO).is_none());
    }

    #[test]
    fn abort_reason_text() {
        let r = AbortReason::TooManyFailures {
            index: 3,
            max_failures: 4,
        };
        assert_eq!(r.to_string(), "task 3 failed more than 4 times");
    }
}
