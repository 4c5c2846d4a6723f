//! Offer matching.
//!
//! Order of preference for an offered host:
//! 1. tasks whose preferred locations name this host (best match first)
//! 2. tasks with no preference
//! 3. any pending task, unless we are still inside the locality wait

use super::SimpleJob;
use crate::domain::{TaskLaunch, TaskStatus};
use crate::ports::clock::elapsed;

impl SimpleJob {
    /// Pick a task for `host`. Returns the index and whether it was a
    /// preferred (local or preference-free) match.
    pub(super) fn find_task(&mut self, host: &str, local_only: bool) -> Option<(usize, bool)> {
        let local = self.pending.for_host(host, &*self.resolver);
        if let Some(index) = self.table.claim_first(local, host) {
            return Some((index, true));
        }
        if let Some(index) = self.table.claim_first(self.pending.no_prefs(), host) {
            return Some((index, true));
        }
        if !local_only {
            return self
                .table
                .claim_first(self.pending.all(), host)
                .map(|index| (index, false));
        }
        None
    }

    pub(super) fn offer(&mut self, host: &str, available_cpus: f64) -> Option<TaskLaunch> {
        if self.reported {
            return None;
        }
        if available_cpus < self.options.cpus_per_task {
            tracing::debug!(job_id = %self.id, host, available_cpus, "offer too small");
            return None;
        }

        let now = self.clock.now();
        let local_only = elapsed(self.last_preferred_launch, now) < self.options.locality_wait();
        let Some((index, preferred)) = self.find_task(host, local_only) else {
            tracing::debug!(job_id = %self.id, host, local_only, "no task found");
            return None;
        };

        let task = &mut self.tasks[index];
        task.status = TaskStatus::Starting;
        task.start = now;
        task.host = Some(host.to_string());
        task.tried += 1;
        let (task_id, attempt) = (task.id(), task.tried);
        let payload = task.payload().clone();

        tracing::debug!(
            job_id = %self.id,
            index,
            task_id = %task_id,
            attempt,
            host,
            preferred,
            "starting task"
        );
        self.tid_to_index.insert(task_id, index);
        self.table.mark_launched(index);
        if preferred {
            self.last_preferred_launch = now;
        }

        Some(TaskLaunch {
            job_id: self.id,
            task_id,
            index,
            attempt,
            host: host.to_string(),
            cpus: self.options.cpus_per_task,
            preferred,
            payload,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::super::test_support::*;
    use crate::domain::{JobOptions, TaskStatus};
    use crate::impls::StaticResolver;
    use crate::job::Job;
    use crate::ports::{Clock, HostIdentity};
    use std::collections::HashSet;

    fn locality_wait(secs: u64) -> JobOptions {
        JobOptions {
            locality_wait_ms: secs * 1000,
            ..JobOptions::default()
        }
    }

    #[test]
    fn each_no_pref_task_is_assigned_exactly_once() {
        let mut h = harness(no_pref_tasks(5), JobOptions::default());
        let mut seen = HashSet::new();
        for (i, host) in ["a", "b", "a", "c", "b"].iter().enumerate() {
            let launch = h.job.slave_offer(host, 1.0).expect("task available");
            assert!(seen.insert(launch.index), "index {} repeated", launch.index);
            assert_eq!(h.job.tasks_launched(), i + 1);
        }
        assert!(h.job.slave_offer("d", 1.0).is_none());
        assert_eq!(seen.len(), 5);
    }

    #[test]
    fn launch_updates_task_bookkeeping() {
        let mut h = harness(no_pref_tasks(1), JobOptions::default());
        let launch = h.job.slave_offer("h1", 4.0).unwrap();
        assert_eq!(launch.attempt, 1);
        assert_eq!(launch.host, "h1");
        assert_eq!(launch.cpus, 1.0);

        let task = h.job.task(0).unwrap();
        assert_eq!(task.status(), TaskStatus::Starting);
        assert_eq!(task.host(), Some("h1"));
        assert_eq!(task.tried(), 1);
        assert_eq!(task.start(), h.clock.now());
        assert_eq!(h.job.index_of(launch.task_id), Some(0));
        assert!(h.job.is_launched(0));
    }

    #[test]
    fn offer_below_task_size_launches_nothing() {
        let mut h = harness(no_pref_tasks(1), JobOptions::default());
        assert!(h.job.slave_offer("h1", 0.5).is_none());
        assert_eq!(h.job.tasks_launched(), 0);
    }

    #[test]
    fn local_task_is_chosen_before_no_pref_tasks() {
        let tasks = vec![task(&[]), task(&["h1"]), task(&[])];
        let mut h = harness(tasks, JobOptions::default());
        let launch = h.job.slave_offer("h1", 1.0).unwrap();
        assert_eq!(launch.index, 1);
        assert!(launch.preferred);
    }

    #[test]
    fn other_host_does_not_take_preferred_task_during_locality_wait() {
        let tasks = vec![task(&["h1"]), task(&[])];
        let mut h = harness(tasks, locality_wait(3));

        // Within the wait: h2 gets the no-pref task, then nothing.
        let launch = h.job.slave_offer("h2", 1.0).unwrap();
        assert_eq!(launch.index, 1);
        assert!(h.job.slave_offer("h2", 1.0).is_none());
        assert!(!h.job.is_launched(0));

        // Once the wait has passed since the last preferred launch, any task goes.
        h.advance_secs(4);
        let launch = h.job.slave_offer("h2", 1.0).unwrap();
        assert_eq!(launch.index, 0);
        assert!(!launch.preferred);
    }

    #[test]
    fn without_locality_wait_any_host_takes_preferred_tasks() {
        let tasks = vec![task(&["h1"])];
        let mut h = harness(tasks, JobOptions::default());
        let launch = h.job.slave_offer("h2", 1.0).unwrap();
        assert_eq!(launch.index, 0);
        assert!(!launch.preferred);
    }

    #[test]
    fn aliases_and_addresses_count_as_local() {
        let tasks = vec![task(&[]), task(&["10.0.0.7"])];
        let resolver = StaticResolver::new().with_host(
            "worker-7",
            HostIdentity {
                canonical: "worker-7.cluster".to_string(),
                aliases: vec![],
                addresses: vec!["10.0.0.7".to_string()],
            },
        );
        let mut h = harness_with_resolver(tasks, JobOptions::default(), resolver);
        let launch = h.job.slave_offer("worker-7", 1.0).unwrap();
        assert_eq!(launch.index, 1);
    }

    #[test]
    fn host_is_not_offered_the_same_index_twice() {
        let mut h = harness(no_pref_tasks(1), JobOptions::default());
        let first = h.job.slave_offer("h1", 1.0).unwrap();
        let tid = first.task_id;
        h.job
            .status_update(crate::domain::StatusUpdate::lost(
                tid,
                1,
                crate::domain::TaskEndReason::other("oom"),
            ))
            .unwrap();
        assert!(!h.job.is_launched(0));
        // h1 already had this index; only another host can retry it.
        assert!(h.job.slave_offer("h1", 1.0).is_none());
        let retry = h.job.slave_offer("h2", 1.0).unwrap();
        assert_eq!(retry.attempt, 2);
    }

    #[test]
    fn aborted_job_launches_nothing() {
        let mut h = harness(no_pref_tasks(2), JobOptions::default());
        h.job
            .abort(crate::domain::AbortReason::Other("stop".to_string()));
        assert!(h.job.slave_offer("h1", 1.0).is_none());
    }
}
