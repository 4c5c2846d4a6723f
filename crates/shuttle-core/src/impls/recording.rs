//! RecordingScheduler - 呼び出しを記録するだけの Scheduler
//!
//! Used by tests and the simulation CLI: every call becomes a `SchedulerEvent`
//! that can be inspected afterwards.

use std::sync::{Mutex, PoisonError};

use crate::domain::{JobId, JobReport, Task, TaskEndReason, TaskId};
use crate::ports::Scheduler;

#[derive(Debug, Clone, PartialEq)]
pub enum SchedulerEvent {
    TaskEnded {
        task_id: TaskId,
        reason: TaskEndReason,
        result: Option<serde_json::Value>,
        accum_updates: Option<serde_json::Value>,
    },
    KillTask {
        job_id: JobId,
        task_id: TaskId,
        attempt: u32,
    },
    JobFinished(JobReport),
    Shutdown,
    RequestMoreResources,
}

#[derive(Debug, Default)]
pub struct RecordingScheduler {
    events: Mutex<Vec<SchedulerEvent>>,
}

impl RecordingScheduler {
    pub fn new() -> Self {
        Self::default()
    }

    fn push(&self, event: SchedulerEvent) {
        self.events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(event);
    }

    pub fn events(&self) -> Vec<SchedulerEvent> {
        self.events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// All `job_finished` reports, in call order.
    pub fn job_reports(&self) -> Vec<JobReport> {
        self.events()
            .into_iter()
            .filter_map(|e| match e {
                SchedulerEvent::JobFinished(report) => Some(report),
                _ => None,
            })
            .collect()
    }

    pub fn finished_report(&self) -> Option<JobReport> {
        self.job_reports().into_iter().next()
    }

    /// `(task, reason)` for every `task_ended` call.
    pub fn ended(&self) -> Vec<(TaskId, TaskEndReason)> {
        self.events()
            .into_iter()
            .filter_map(|e| match e {
                SchedulerEvent::TaskEnded { task_id, reason, .. } => Some((task_id, reason)),
                _ => None,
            })
            .collect()
    }

    /// `(task, attempt)` for every kill request.
    pub fn killed(&self) -> Vec<(TaskId, u32)> {
        self.events()
            .into_iter()
            .filter_map(|e| match e {
                SchedulerEvent::KillTask {
                    task_id, attempt, ..
                } => Some((task_id, attempt)),
                _ => None,
            })
            .collect()
    }

    pub fn shutdown_requested(&self) -> bool {
        self.events()
            .iter()
            .any(|e| matches!(e, SchedulerEvent::Shutdown))
    }

    pub fn resource_requests(&self) -> usize {
        self.events()
            .iter()
            .filter(|e| matches!(e, SchedulerEvent::RequestMoreResources))
            .count()
    }
}

impl Scheduler for RecordingScheduler {
    fn task_ended(
        &self,
        task: &Task,
        reason: &TaskEndReason,
        result: Option<&serde_json::Value>,
        accum_updates: Option<&serde_json::Value>,
    ) {
        self.push(SchedulerEvent::TaskEnded {
            task_id: task.id(),
            reason: reason.clone(),
            result: result.cloned(),
            accum_updates: accum_updates.cloned(),
        });
    }

    fn kill_task(&self, job_id: JobId, task_id: TaskId, attempt: u32) {
        self.push(SchedulerEvent::KillTask {
            job_id,
            task_id,
            attempt,
        });
    }

    fn job_finished(&self, report: &JobReport) {
        self.push(SchedulerEvent::JobFinished(report.clone()));
    }

    fn shutdown(&self) {
        self.push(SchedulerEvent::Shutdown);
    }

    fn request_more_resources(&self) {
        self.push(SchedulerEvent::RequestMoreResources);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ulid::Ulid;

    #[test]
    fn records_calls_in_order() {
        let sched = RecordingScheduler::new();
        let job_id = JobId::allocate();
        let task_id = TaskId::from_ulid(Ulid::new());

        sched.kill_task(job_id, task_id, 2);
        sched.request_more_resources();
        sched.job_finished(&JobReport::aborted(job_id, "boom"));
        sched.shutdown();

        assert_eq!(sched.killed(), vec![(task_id, 2)]);
        assert_eq!(sched.resource_requests(), 1);
        assert!(sched.shutdown_requested());
        let report = sched.finished_report().unwrap();
        assert!(report.failed);
        assert_eq!(report.cause_of_failure.as_deref(), Some("boom"));
        assert_eq!(sched.events().len(), 4);
    }
}
