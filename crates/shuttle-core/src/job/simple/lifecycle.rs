//! Status reports: finish, loss, retry accounting and job completion.

use super::SimpleJob;
use crate::domain::{AbortReason, JobError, StatusUpdate, TaskEndReason, TaskId, TaskStatus};
use crate::job::Job;
use crate::ports::clock::elapsed;

impl SimpleJob {
    pub(super) fn apply_status(&mut self, update: StatusUpdate) -> Result<(), JobError> {
        tracing::debug!(
            job_id = %self.id,
            task_id = %update.task_id,
            attempt = update.attempt,
            status = %update.status,
            "status update"
        );
        let Some(index) = self.index_of(update.task_id) else {
            tracing::error!(job_id = %self.id, task_id = %update.task_id, "invalid task id");
            return Err(JobError::UnknownTask(update.task_id));
        };
        if self.table.is_finished(index) {
            if update.status == TaskStatus::Finished {
                tracing::info!(
                    job_id = %self.id,
                    task_id = %update.task_id,
                    "task already finished, ignoring"
                );
            }
            return Ok(());
        }
        self.tasks[index].status = update.status;
        // the timeout scan may have unlaunched it while the attempt kept running
        self.table.mark_launched(index);

        match update.status {
            TaskStatus::Finished => self.task_finished(index, &update),
            status if status.is_failure() => {
                if self.task_lost(index, &update) {
                    return Ok(());
                }
            }
            _ => {}
        }

        self.tasks[index].start = self.clock.now();
        Ok(())
    }

    fn task_finished(&mut self, index: usize, update: &StatusUpdate) {
        let now = self.clock.now();
        self.table.mark_finished(index);

        let task = &mut self.tasks[index];
        task.used += elapsed(task.start, now);
        self.total_used += task.used;
        tracing::info!(
            job_id = %self.id,
            task_id = %update.task_id,
            used_secs = task.used.as_secs_f64(),
            finished = self.table.finished_count(),
            total = self.table.len(),
            "task finished"
        );

        let task = &self.tasks[index];
        self.scheduler.task_ended(
            task,
            &TaskEndReason::Success,
            update.result.as_ref(),
            update.accum_updates.as_ref(),
        );

        // speculative duplicates of this index are no longer needed
        for attempt in (1..=task.tried).filter(|&a| a != update.attempt) {
            self.scheduler.kill_task(self.id, task.id(), attempt);
        }

        self.report_if_complete();
    }

    /// Returns true when the report was a fetch failure and has been fully
    /// handled.
    fn task_lost(&mut self, index: usize, update: &StatusUpdate) -> bool {
        let task_id: TaskId = update.task_id;
        tracing::warn!(
            job_id = %self.id,
            index,
            task_id = %task_id,
            attempt = update.attempt,
            status = %update.status,
            reason = ?update.reason,
            "lost task"
        );

        let was_saturated = self.table.launched_count() == self.table.len();
        self.table.unlaunch(index);
        if was_saturated {
            self.scheduler.request_more_resources();
        }

        if let Some(reason) = update.reason.as_ref().filter(|r| r.is_fetch_failure()) {
            tracing::warn!(job_id = %self.id, task_id = %task_id, %reason, "loss was due to fetch failure");
            self.scheduler
                .task_ended(&self.tasks[index], reason, None, None);
            // no retry for fetch failures: the index is given up as finished
            self.table.mark_finished(index);
            self.report_if_complete();
            return true;
        }

        if update.status == TaskStatus::Failed {
            tracing::warn!(job_id = %self.id, task_id = %task_id, reason = ?update.reason, "task failed");
        }
        if update.status.counts_as_failure() {
            let failures = self.table.record_failure(index);
            let max_failures = self.options.max_task_failures;
            if failures > max_failures {
                tracing::error!(
                    job_id = %self.id,
                    index,
                    failures,
                    max_failures,
                    "task failed too many times"
                );
                self.abort(AbortReason::TooManyFailures {
                    index,
                    max_failures,
                });
            }
        }
        false
    }
}
