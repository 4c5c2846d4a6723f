//! JobDriver - async front end for one job.
//!
//! Every entry point takes the job lock for the whole call, so offers, status
//! reports and timeout scans never interleave. The one exception is the host
//! lookup before a host's first offer, which runs on the blocking pool with
//! the lock released.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{Mutex, Notify, watch};
use tokio::task::JoinHandle;

use crate::domain::{AbortReason, JobError, JobId, StatusUpdate, TaskLaunch};
use crate::job::Job;
use crate::ports::HostIdentity;

#[derive(Clone)]
pub struct JobDriver {
    id: JobId,
    job: Arc<Mutex<Box<dyn Job>>>,
    revive: Arc<Notify>,
}

impl JobDriver {
    pub fn new(job: impl Job + 'static) -> Self {
        Self::from_boxed(Box::new(job))
    }

    pub fn from_boxed(job: Box<dyn Job>) -> Self {
        Self {
            id: job.id(),
            job: Arc::new(Mutex::new(job)),
            revive: Arc::new(Notify::new()),
        }
    }

    pub fn job_id(&self) -> JobId {
        self.id
    }

    /// Notified when a timeout scan puts tasks back into the pending pool.
    pub fn revive_signal(&self) -> Arc<Notify> {
        Arc::clone(&self.revive)
    }

    /// Offer `cpus` on `host`, re-offering what is left after each launch.
    pub async fn offer(&self, host: &str, cpus: f64) -> Vec<TaskLaunch> {
        let identity = self.identify_unknown_host(host).await;
        let mut job = self.job.lock().await;
        if let Some(identity) = identity
            && !job.knows_host(host)
        {
            job.learn_host(host, identity);
        }
        let per_task = job.cpus_per_task();
        let mut remaining = cpus;
        let mut launches = Vec::new();
        while remaining >= per_task {
            let Some(launch) = job.slave_offer(host, remaining) else {
                break;
            };
            remaining -= launch.cpus;
            launches.push(launch);
        }
        launches
    }

    /// Resolve `host` without holding the job lock, if the job has not seen it.
    async fn identify_unknown_host(&self, host: &str) -> Option<HostIdentity> {
        let resolver = {
            let job = self.job.lock().await;
            if job.knows_host(host) {
                return None;
            }
            job.host_resolver()?
        };
        let owned = host.to_string();
        match tokio::task::spawn_blocking(move || resolver.identify(&owned)).await {
            Ok(identity) => Some(identity),
            Err(err) => {
                tracing::warn!(job_id = %self.id, host, error = %err, "host lookup task failed");
                None
            }
        }
    }

    pub async fn status_update(&self, update: StatusUpdate) -> Result<(), JobError> {
        self.job.lock().await.status_update(update)
    }

    pub async fn check_task_timeout(&self) -> bool {
        let revived = self.job.lock().await.check_task_timeout();
        if revived {
            self.revive.notify_waiters();
        }
        revived
    }

    pub async fn abort(&self, reason: AbortReason) {
        self.job.lock().await.abort(reason);
    }

    pub async fn error(&self, code: i32, message: &str) {
        self.job.lock().await.error(code, message);
    }

    pub async fn is_done(&self) -> bool {
        self.job.lock().await.is_done()
    }

    /// Run `check_task_timeout` every `period` until the job is done or the
    /// ticker is shut down.
    pub fn spawn_timeout_ticker(&self, period: Duration) -> TimeoutTicker {
        let (shutdown_tx, mut shutdown_rx) = watch::channel(false);
        let driver = self.clone();

        let join = tokio::spawn(async move {
            let mut interval = tokio::time::interval(period);
            loop {
                if *shutdown_rx.borrow() {
                    break;
                }
                tokio::select! {
                    changed = shutdown_rx.changed() => {
                        // sender dropped
                        if changed.is_err() {
                            break;
                        }
                        continue;
                    }
                    _ = interval.tick() => {}
                }
                if driver.check_task_timeout().await {
                    tracing::debug!(job_id = %driver.id, "timeout scan returned tasks to pending");
                }
                if driver.is_done().await {
                    break;
                }
            }
            tracing::debug!(job_id = %driver.id, "timeout ticker stopped");
        });

        TimeoutTicker { shutdown_tx, join }
    }
}

/// Handle to a running timeout ticker.
pub struct TimeoutTicker {
    shutdown_tx: watch::Sender<bool>,
    join: JoinHandle<()>,
}

impl TimeoutTicker {
    pub fn request_shutdown(&self) {
        // the ticker may already have exited on its own
        let _ = self.shutdown_tx.send(true);
    }

    pub async fn shutdown_and_join(self) {
        self.request_shutdown();
        let _ = self.join.await;
    }
}
