//! Scheduler port - ジョブから外部スケジューラへの通知
//!
//! The scheduling pool that owns jobs and talks to the cluster implements this.
//! Every method is called while the job is being mutated, so implementations
//! must not block: queue the work or hand it to another thread.

use crate::domain::{JobId, JobReport, Task, TaskEndReason, TaskId};

pub trait Scheduler: Send + Sync {
    /// A task attempt ended. Called once with `Success` per task index, or with
    /// a fetch failure reason for tasks given up without retry.
    fn task_ended(
        &self,
        task: &Task,
        reason: &TaskEndReason,
        result: Option<&serde_json::Value>,
        accum_updates: Option<&serde_json::Value>,
    );

    /// Kill one attempt of a task (a speculative duplicate that is no longer needed).
    fn kill_task(&self, job_id: JobId, task_id: TaskId, attempt: u32);

    /// The job reached a terminal state. Called exactly once per job.
    fn job_finished(&self, report: &JobReport);

    /// Stop the whole scheduler process.
    fn shutdown(&self);

    /// A slot was freed on a saturated job; ask the resource manager for more offers.
    fn request_more_resources(&self);
}
