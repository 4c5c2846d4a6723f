//! Timeout detection.
//!
//! Two passes, run at most once per `timeout_check_interval`:
//! - stuck starts: launched tasks still `Starting` after `wait_for_running`
//!   go back to pending.
//! - stragglers: once a third of the job has finished, running tasks far
//!   slower than the average are resubmitted, oldest first.

use chrono::{DateTime, Utc};

use super::SimpleJob;
use crate::domain::{AbortReason, TaskStatus};
use crate::job::Job;
use crate::ports::clock::elapsed;

impl SimpleJob {
    pub(super) fn scan_timeouts(&mut self) -> bool {
        if self.reported {
            return false;
        }
        let now = self.clock.now();
        if let Some(last) = self.last_timeout_check
            && elapsed(last, now) < self.options.timeout_check_interval()
        {
            return false;
        }
        self.last_timeout_check = Some(now);

        let launched = match self.table.repair_launched_count() {
            Ok(n) => n,
            Err(stale) => {
                let n = self.table.launched_count();
                tracing::error!(job_id = %self.id, stale, actual = n, "launched counter drifted, repaired");
                n
            }
        };

        self.unlaunch_stuck_starts(now);
        if self.table.finished_count() > self.table.len() / 3 {
            self.resubmit_stragglers(now);
        }

        self.table.launched_count() < launched
    }

    fn unlaunch_stuck_starts(&mut self, now: DateTime<Utc>) {
        let wait = self.options.wait_for_running();
        for (index, task) in self.tasks.iter().enumerate() {
            if !self.table.is_launched(index) || task.status != TaskStatus::Starting {
                continue;
            }
            let waited = elapsed(task.start, now);
            if waited > wait {
                tracing::warn!(
                    job_id = %self.id,
                    index,
                    task_id = %task.id(),
                    waited_secs = waited.as_secs_f64(),
                    host = task.host().unwrap_or("-"),
                    "task never started running, re-assigning"
                );
                self.table.unlaunch(index);
            }
        }
    }

    fn resubmit_stragglers(&mut self, now: DateTime<Utc>) {
        let avg = self.average_task_time();
        let min_elapsed = self.options.straggler_min_elapsed();
        let max_failures = self.options.max_task_failures;

        let mut running: Vec<usize> = self.table.running_indices().collect();
        running.sort_by_key(|&i| (self.tasks[i].start, i));

        for index in running {
            let task = &mut self.tasks[index];
            let used = elapsed(task.start, now);
            if used <= avg * (task.tried + 1) || used <= min_elapsed {
                // sorted by start: the rest have run for less time
                break;
            }
            if task.tried <= max_failures {
                tracing::warn!(
                    job_id = %self.id,
                    index,
                    task_id = %task.id(),
                    used_secs = used.as_secs_f64(),
                    avg_secs = avg.as_secs_f64(),
                    tried = task.tried,
                    "straggler, resubmitting"
                );
                task.used += used;
                task.start = now;
                self.table.unlaunch(index);
            } else {
                let reason = AbortReason::StragglerTimeout {
                    task: task.id().to_string(),
                    tried: task.tried,
                };
                self.abort(reason);
                break;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::super::test_support::*;
    use crate::domain::{JobOptions, StatusUpdate, TaskEndReason};
    use crate::job::Job;
    use crate::ports::Clock;
    use rstest::rstest;
    use std::time::Duration;

    #[rstest]
    #[case::at_limit(15, false)]
    #[case::past_limit(16, true)]
    fn stuck_start_is_unlaunched_after_wait(#[case] wait_secs: u64, #[case] unlaunched: bool) {
        let mut h = harness(no_pref_tasks(2), JobOptions::default());
        h.job.slave_offer("h1", 1.0).unwrap();
        h.advance_secs(wait_secs);

        assert_eq!(h.job.check_task_timeout(), unlaunched);
        assert_eq!(h.job.is_launched(0), !unlaunched);
        // the index can be offered again
        if unlaunched {
            assert_eq!(h.job.slave_offer("h2", 1.0).unwrap().index, 0);
        }
    }

    #[test]
    fn running_task_is_not_stuck() {
        let mut h = harness(no_pref_tasks(1), JobOptions::default());
        h.job.slave_offer("h1", 1.0).unwrap();
        h.job.status_update(StatusUpdate::running(h.tid(0), 1)).unwrap();
        h.advance_secs(20);
        assert!(!h.job.check_task_timeout());
        assert!(h.job.is_launched(0));
    }

    #[test]
    fn checks_are_rate_limited() {
        let mut h = harness(no_pref_tasks(2), JobOptions::default());
        h.job.slave_offer("h1", 1.0).unwrap();
        h.advance_secs(15);
        assert!(!h.job.check_task_timeout());

        // stuck by now, but the previous check was less than 5s ago
        h.advance_secs(1);
        assert!(!h.job.check_task_timeout());
        assert!(h.job.is_launched(0));

        h.advance_secs(4);
        assert!(h.job.check_task_timeout());
        assert!(!h.job.is_launched(0));
    }

    #[test]
    fn drifted_launched_counter_is_repaired() {
        let mut h = harness(no_pref_tasks(2), JobOptions::default());
        h.job.slave_offer("h1", 1.0).unwrap();
        h.job.table.force_launched_count(2);

        assert!(!h.job.check_task_timeout());
        assert_eq!(h.job.tasks_launched(), 1);
        // the other index is still offered
        assert_eq!(h.job.slave_offer("h1", 1.0).unwrap().index, 1);
    }

    /// Three running tasks, two finish after 6s each (average 6s).
    fn two_of_three_finished(options: JobOptions) -> Harness {
        let mut h = harness(no_pref_tasks(3), options);
        for host in ["h1", "h2", "h3"] {
            h.job.slave_offer(host, 1.0).unwrap();
        }
        for i in 0..3 {
            h.job.status_update(StatusUpdate::running(h.tid(i), 1)).unwrap();
        }
        h.advance_secs(6);
        h.job.status_update(StatusUpdate::finished(h.tid(0), 1)).unwrap();
        h.job.status_update(StatusUpdate::finished(h.tid(1), 1)).unwrap();
        assert_eq!(h.job.average_task_time(), Duration::from_secs(6));
        h
    }

    #[test]
    fn straggler_is_resubmitted() {
        let mut h = two_of_three_finished(JobOptions::default());
        h.advance_secs(30);

        assert!(h.job.check_task_timeout());
        assert!(!h.job.is_launched(2));
        let task = h.job.task(2).unwrap();
        assert_eq!(task.used(), Duration::from_secs(36));
        assert_eq!(task.start(), h.clock.now());
        assert!(!h.job.is_failed());

        let retry = h.job.slave_offer("h4", 1.0).unwrap();
        assert_eq!((retry.index, retry.attempt), (2, 2));
    }

    #[test]
    fn short_tasks_are_never_stragglers() {
        // 24s is four times the average but below the 30s floor
        let mut h = two_of_three_finished(JobOptions::default());
        h.advance_secs(18);
        assert!(!h.job.check_task_timeout());
        assert!(h.job.is_launched(2));
    }

    #[test]
    fn straggler_past_retry_budget_aborts_job() {
        let options = JobOptions {
            max_task_failures: 0,
            ..JobOptions::default()
        };
        let mut h = two_of_three_finished(options);
        h.advance_secs(30);

        h.job.check_task_timeout();
        assert!(h.job.is_failed());
        let expected = format!("task {} timed out after 1 attempts", h.tid(2));
        assert_eq!(h.job.cause_of_failure(), Some(expected.as_str()));
        assert!(h.scheduler.shutdown_requested());
    }

    #[test]
    fn no_straggler_pass_until_a_third_finished() {
        let mut h = harness(no_pref_tasks(3), JobOptions::default());
        for host in ["h1", "h2", "h3"] {
            h.job.slave_offer(host, 1.0).unwrap();
        }
        for i in 0..3 {
            h.job.status_update(StatusUpdate::running(h.tid(i), 1)).unwrap();
        }
        h.job.status_update(StatusUpdate::finished(h.tid(0), 1)).unwrap();
        h.advance_secs(600);
        assert!(!h.job.check_task_timeout());
        assert_eq!(h.job.tasks_launched(), 3);
    }

    #[test]
    fn scan_stops_at_first_non_straggler() {
        let mut h = harness(no_pref_tasks(4), JobOptions::default());
        for _ in 0..4 {
            h.job.slave_offer("h1", 1.0).unwrap();
        }
        // index 2 is retried on h2: older start, but a higher threshold
        h.job
            .status_update(StatusUpdate::lost(h.tid(2), 1, TaskEndReason::other("oom")))
            .unwrap();
        let retry = h.job.slave_offer("h2", 1.0).unwrap();
        assert_eq!((retry.index, retry.attempt), (2, 2));
        h.job.status_update(StatusUpdate::running(h.tid(2), 2)).unwrap();
        h.advance_secs(1);
        h.job.status_update(StatusUpdate::running(h.tid(3), 1)).unwrap();

        h.advance_secs(11);
        h.job.status_update(StatusUpdate::finished(h.tid(0), 1)).unwrap();
        h.job.status_update(StatusUpdate::finished(h.tid(1), 1)).unwrap();
        assert_eq!(h.job.average_task_time(), Duration::from_secs(12));

        // index 2: 35s <= 12 * 3; index 3: 34s > 12 * 2 but is never reached
        h.advance_secs(23);
        assert!(!h.job.check_task_timeout());
        assert!(h.job.is_launched(2));
        assert!(h.job.is_launched(3));
    }

    #[test]
    fn finished_job_is_not_scanned() {
        let mut h = harness(no_pref_tasks(1), JobOptions::default());
        h.job.slave_offer("h1", 1.0).unwrap();
        h.job.status_update(StatusUpdate::finished(h.tid(0), 1)).unwrap();
        h.advance_secs(100);
        assert!(!h.job.check_task_timeout());
    }
}
