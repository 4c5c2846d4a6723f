//! SimpleJob - a job made of independent tasks.
//!
//! The state machine is split by concern:
//! - `assign`: offer matching (`slave_offer`)
//! - `lifecycle`: status reports (`status_update`)
//! - `timeout`: stuck start and straggler detection (`check_task_timeout`)
//!
//! `table` holds per-index flags and counters, `pending` the locality index.

mod assign;
mod lifecycle;
pub mod pending;
pub mod table;
mod timeout;

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};

use self::pending::PendingTasks;
use self::table::TaskTable;
use crate::domain::{
    AbortReason, ConfigError, JobError, JobId, JobOptions, JobReport, JobSummary, StatusUpdate,
    Task, TaskId, TaskLaunch,
};
use crate::impls::SystemResolver;
use crate::job::Job;
use crate::ports::clock::elapsed;
use crate::ports::{Clock, HostIdentity, HostResolver, Scheduler, SystemClock};

/// Errors from `SimpleJobBuilder::build`.
#[derive(Debug, thiserror::Error)]
pub enum BuildError {
    #[error("a job needs at least one task")]
    NoTasks,

    #[error(transparent)]
    Options(#[from] ConfigError),
}

pub struct SimpleJob {
    id: JobId,
    start_time: DateTime<Utc>,
    options: JobOptions,

    scheduler: Arc<dyn Scheduler>,
    resolver: Arc<dyn HostResolver>,
    clock: Arc<dyn Clock>,

    tasks: Vec<Task>,
    table: TaskTable,
    pending: PendingTasks,
    /// Entries are added on launch and never removed.
    tid_to_index: HashMap<TaskId, usize>,

    /// Sum of `used` over finished tasks.
    total_used: Duration,
    last_preferred_launch: DateTime<Utc>,
    last_timeout_check: Option<DateTime<Utc>>,

    failed: bool,
    cause_of_failure: Option<String>,
    /// `job_finished` has been delivered.
    reported: bool,
}

/// Builds a `SimpleJob`.
///
/// ```ignore
/// let job = SimpleJob::builder(tasks, scheduler)
///     .options(options)
///     .resolver(Arc::new(StaticResolver::new()))
///     .build()?;
/// ```
pub struct SimpleJobBuilder {
    tasks: Vec<Task>,
    scheduler: Arc<dyn Scheduler>,
    options: JobOptions,
    resolver: Arc<dyn HostResolver>,
    clock: Arc<dyn Clock>,
}

impl SimpleJobBuilder {
    pub fn options(mut self, options: JobOptions) -> Self {
        self.options = options;
        self
    }

    pub fn resolver(mut self, resolver: Arc<dyn HostResolver>) -> Self {
        self.resolver = resolver;
        self
    }

    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn build(self) -> Result<SimpleJob, BuildError> {
        if self.tasks.is_empty() {
            return Err(BuildError::NoTasks);
        }
        self.options.validate()?;

        let mut tasks = self.tasks;
        for task in &mut tasks {
            task.reset_attempts();
        }
        let now = self.clock.now();
        let table = TaskTable::new(tasks.len());
        let pending = PendingTasks::new(&tasks);
        let id = JobId::allocate();
        tracing::debug!(job_id = %id, num_tasks = tasks.len(), "job created");

        Ok(SimpleJob {
            id,
            start_time: now,
            options: self.options,
            scheduler: self.scheduler,
            resolver: self.resolver,
            clock: self.clock,
            tasks,
            table,
            pending,
            tid_to_index: HashMap::new(),
            total_used: Duration::ZERO,
            last_preferred_launch: now,
            last_timeout_check: None,
            failed: false,
            cause_of_failure: None,
            reported: false,
        })
    }
}

impl SimpleJob {
    pub fn builder(tasks: Vec<Task>, scheduler: Arc<dyn Scheduler>) -> SimpleJobBuilder {
        SimpleJobBuilder {
            tasks,
            scheduler,
            options: JobOptions::default(),
            resolver: Arc::new(SystemResolver),
            clock: Arc::new(SystemClock),
        }
    }

    pub fn options(&self) -> &JobOptions {
        &self.options
    }

    pub fn num_tasks(&self) -> usize {
        self.tasks.len()
    }

    pub fn tasks(&self) -> &[Task] {
        &self.tasks
    }

    pub fn task(&self, index: usize) -> Option<&Task> {
        self.tasks.get(index)
    }

    /// Task index a task id was launched under.
    pub fn index_of(&self, task_id: TaskId) -> Option<usize> {
        self.tid_to_index.get(&task_id).copied()
    }

    pub fn tasks_launched(&self) -> usize {
        self.table.launched_count()
    }

    pub fn tasks_finished(&self) -> usize {
        self.table.finished_count()
    }

    /// False for an index outside the job.
    pub fn is_launched(&self, index: usize) -> bool {
        self.table.is_launched(index)
    }

    /// False for an index outside the job.
    pub fn is_finished(&self, index: usize) -> bool {
        self.table.is_finished(index)
    }

    pub fn num_failures(&self, index: usize) -> Option<u32> {
        self.table.slot(index).map(|s| s.num_failures)
    }

    pub fn is_failed(&self) -> bool {
        self.failed
    }

    pub fn cause_of_failure(&self) -> Option<&str> {
        self.cause_of_failure.as_deref()
    }

    pub fn total_used(&self) -> Duration {
        self.total_used
    }

    /// Mean execution time of finished tasks, clamped from below; a default
    /// while nothing has finished.
    pub fn average_task_time(&self) -> Duration {
        let finished = self.table.finished_count();
        if finished == 0 {
            return self.options.default_average_task_time();
        }
        let avg = self.total_used.div_f64(finished as f64);
        avg.max(self.options.min_average_task_time())
    }

    /// Deliver the success report once every task index is finished.
    fn report_if_complete(&mut self) {
        if self.reported || !self.table.all_finished() {
            return;
        }
        self.reported = true;
        let elapsed = elapsed(self.start_time, self.clock.now());
        let summary = JobSummary::from_tasks(&self.tasks, elapsed);
        if let Some(s) = &summary {
            tracing::info!(
                job_id = %self.id,
                elapsed_secs = s.elapsed.as_secs_f64(),
                min_secs = s.min_used.as_secs_f64(),
                avg_secs = s.mean_used.as_secs_f64(),
                max_secs = s.max_used.as_secs_f64(),
                max_tried = s.max_tried,
                "job finished"
            );
        }
        self.scheduler
            .job_finished(&JobReport::succeeded(self.id, summary));
    }
}

impl Job for SimpleJob {
    fn id(&self) -> JobId {
        self.id
    }

    fn start_time(&self) -> DateTime<Utc> {
        self.start_time
    }

    fn cpus_per_task(&self) -> f64 {
        self.options.cpus_per_task
    }

    fn slave_offer(&mut self, host: &str, available_cpus: f64) -> Option<TaskLaunch> {
        self.offer(host, available_cpus)
    }

    fn status_update(&mut self, update: StatusUpdate) -> Result<(), JobError> {
        self.apply_status(update)
    }

    fn check_task_timeout(&mut self) -> bool {
        self.scan_timeouts()
    }

    fn abort(&mut self, reason: AbortReason) {
        if self.reported {
            tracing::warn!(job_id = %self.id, %reason, "job already ended, ignoring abort");
            return;
        }
        let message = reason.to_string();
        tracing::error!(job_id = %self.id, reason = %message, "aborting job");
        self.failed = true;
        self.cause_of_failure = Some(message.clone());
        self.reported = true;
        self.scheduler
            .job_finished(&JobReport::aborted(self.id, message));
        self.scheduler.shutdown();
    }

    fn error(&mut self, code: i32, message: &str) {
        tracing::error!(job_id = %self.id, code, error_message = message, "resource manager error");
        self.abort(AbortReason::ResourceManager {
            code,
            message: message.to_string(),
        });
    }

    fn is_done(&self) -> bool {
        self.reported
    }

    fn host_resolver(&self) -> Option<Arc<dyn HostResolver>> {
        Some(Arc::clone(&self.resolver))
    }

    fn knows_host(&self, host: &str) -> bool {
        self.pending.knows(host)
    }

    fn learn_host(&mut self, host: &str, identity: HostIdentity) {
        self.pending.learn(host, &identity);
    }
}


#[cfg(test)]
mod tests {
    use super::test_support::*;
    use super::*;
    use crate::impls::RecordingScheduler;

    #[test]
    fn build_rejects_empty_task_list() {
        let sched = Arc::new(RecordingScheduler::new());
        let err = SimpleJob::builder(vec![], sched).build().err().unwrap();
        assert!(matches!(err, BuildError::NoTasks));
    }

    #[test]
    fn build_rejects_invalid_options() {
        let sched = Arc::new(RecordingScheduler::new());
        let options = JobOptions {
            cpus_per_task: -1.0,
            ..JobOptions::default()
        };
        let err = SimpleJob::builder(no_pref_tasks(1), sched)
            .options(options)
            .build()
            .err()
            .unwrap();
        assert!(matches!(err, BuildError::Options(ConfigError::Invalid(_))));
    }

    #[test]
    fn jobs_get_distinct_ids() {
        let a = harness(no_pref_tasks(1), JobOptions::default());
        let b = harness(no_pref_tasks(1), JobOptions::default());
        assert_ne!(a.job.id(), b.job.id());
        assert!(b.job.id() > a.job.id());
    }

    #[test]
    fn abort_reports_failure_and_shuts_down_once() {
        let mut h = harness(no_pref_tasks(2), JobOptions::default());
        h.job.abort(AbortReason::Other("operator request".to_string()));
        h.job.abort(AbortReason::Other("again".to_string()));

        assert!(h.job.is_failed());
        assert!(h.job.is_done());
        assert_eq!(h.job.cause_of_failure(), Some("operator request"));
        let reports = h.scheduler.job_reports();
        assert_eq!(reports.len(), 1);
        assert!(reports[0].failed);
        assert!(h.scheduler.shutdown_requested());
    }

    #[test]
    fn resource_manager_error_aborts() {
        let mut h = harness(no_pref_tasks(1), JobOptions::default());
        h.job.error(3, "framework removed");
        assert!(h.job.is_failed());
        assert_eq!(
            h.job.cause_of_failure(),
            Some("resource manager error 3: framework removed")
        );
    }

    #[test]
    fn average_task_time_defaults_then_clamps() {
        let h = harness(no_pref_tasks(1), JobOptions::default());
        assert_eq!(h.job.average_task_time(), Duration::from_secs(10));
    }

    #[test]
    fn accessors_tolerate_unknown_index() {
        let h = harness(no_pref_tasks(2), JobOptions::default());
        assert!(h.job.task(2).is_none());
        assert!(!h.job.is_launched(2));
        assert!(!h.job.is_finished(2));
        assert_eq!(h.job.num_failures(2), None);
        assert_eq!(h.job.num_failures(1), Some(0));
    }

    #[test]
    fn tasks_start_with_no_attempts() {
        let mut t = task(&[]);
        t.tried = 3;
        let h = harness(vec![t], JobOptions::default());
        assert_eq!(h.job.task(0).unwrap().tried(), 0);
    }
}
