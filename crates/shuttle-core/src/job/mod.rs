//! Job - the contract a scheduling pool drives.
//!
//! A pool can hold jobs of different kinds behind `Box<dyn Job>`; `SimpleJob`
//! (independent tasks, no dependencies between them) is the one provided here.
//!
//! Entry points take `&mut self` and are meant to be called one at a time. A
//! multi-threaded host must hold one lock per job across each call (see
//! `app::driver::JobDriver`).

pub mod simple;

pub use self::simple::SimpleJob;

use std::sync::Arc;

use chrono::{DateTime, Utc};

use crate::domain::{AbortReason, JobError, JobId, StatusUpdate, TaskLaunch};
use crate::ports::{HostIdentity, HostResolver};

pub trait Job: Send {
    fn id(&self) -> JobId;

    fn start_time(&self) -> DateTime<Utc>;

    /// Capacity units one task needs.
    fn cpus_per_task(&self) -> f64;

    /// Offer capacity on `host`. Launches at most one task; leftover capacity
    /// has to be offered again.
    fn slave_offer(&mut self, host: &str, available_cpus: f64) -> Option<TaskLaunch>;

    /// Apply an asynchronous status report for one task attempt.
    fn status_update(&mut self, update: StatusUpdate) -> Result<(), JobError>;

    /// Periodic scan for stuck and straggling tasks. Returns true when tasks
    /// were put back into the pending pool and offers should be solicited.
    fn check_task_timeout(&mut self) -> bool;

    /// Give up on the job: report it failed and shut the scheduler down.
    fn abort(&mut self, reason: AbortReason);

    /// The resource manager reported an error for this job.
    fn error(&mut self, code: i32, message: &str);

    /// Finished successfully or aborted.
    fn is_done(&self) -> bool;

    /// Resolver a host should be run through before its first offer. A job
    /// that returns one resolves unknown hosts inside `slave_offer` unless
    /// they were learned beforehand.
    fn host_resolver(&self) -> Option<Arc<dyn HostResolver>> {
        None
    }

    fn knows_host(&self, _host: &str) -> bool {
        true
    }

    /// Hand over an identity resolved outside the job.
    fn learn_host(&mut self, _host: &str, _identity: HostIdentity) {}
}
