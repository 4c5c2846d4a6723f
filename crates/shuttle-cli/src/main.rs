use clap::Parser;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::time::{Duration, Instant, sleep};
use tracing_subscriber::EnvFilter;

use shuttle_core::domain::{AbortReason, JobOptions, StatusUpdate, Task, TaskEndReason, TaskLaunch};
use shuttle_core::impls::{RecordingScheduler, StaticResolver};
use shuttle_core::ports::{HostIdentity, IdGenerator, SystemClock, UlidGenerator};
use shuttle_core::{JobDriver, SimpleJob};

/// Run one job against a simulated cluster and print its report.
#[derive(Parser, Debug)]
#[command(name = "shuttle")]
#[command(version)]
#[command(about = "Simulate task placement and recovery for a single job")]
struct Args {
    /// Number of tasks in the job
    #[arg(long, default_value = "20")]
    tasks: usize,

    /// Number of simulated hosts
    #[arg(long, default_value = "4")]
    hosts: usize,

    /// CPUs each host offers
    #[arg(long, default_value = "2.0")]
    cpus_per_host: f64,

    /// Probability that a task attempt is lost (0.0 - 1.0)
    #[arg(long, default_value = "0.1")]
    fail_rate: f64,

    /// Mean simulated task run time in milliseconds
    #[arg(long, default_value = "200")]
    task_ms: u64,

    /// Every Nth task prefers a host (0 disables preferences)
    #[arg(long, default_value = "3")]
    prefer_every: usize,

    /// Job options as JSON (missing fields use defaults)
    #[arg(long)]
    config: Option<PathBuf>,

    /// RNG seed for a reproducible run
    #[arg(long)]
    seed: Option<u64>,

    /// Abort the job if it has not finished after this many seconds
    #[arg(long, default_value = "120")]
    deadline_secs: u64,
}

/// Capacity handed back by a simulated executor.
struct Released {
    host: usize,
    cpus: f64,
}

fn host_name(i: usize) -> String {
    format!("node-{i}")
}

fn build_resolver(hosts: usize) -> StaticResolver {
    (0..hosts).fold(StaticResolver::new(), |resolver, i| {
        resolver.with_host(
            host_name(i),
            HostIdentity {
                canonical: format!("node-{i}.sim"),
                aliases: vec![],
                addresses: vec![format!("10.0.0.{}", i + 1)],
            },
        )
    })
}

/// Tasks get an empty payload except for their number. Preferred tasks name
/// their host by canonical name or by address, alternately.
fn build_tasks(args: &Args) -> Vec<Task> {
    let ids = UlidGenerator::new(SystemClock);
    (0..args.tasks)
        .map(|n| {
            let task = Task::new(ids.generate_task_id(), serde_json::json!({ "n": n }));
            if args.prefer_every == 0 || n % args.prefer_every != 0 {
                return task;
            }
            let host = n % args.hosts;
            let location = if (n / args.prefer_every) % 2 == 0 {
                format!("node-{host}.sim")
            } else {
                format!("10.0.0.{}", host + 1)
            };
            task.with_preferred_locations([location])
        })
        .collect()
}

async fn run_executor(
    driver: JobDriver,
    launch: TaskLaunch,
    host: usize,
    fail_rate: f64,
    task_ms: u64,
    seed: u64,
    released: mpsc::UnboundedSender<Released>,
) {
    let mut rng = StdRng::seed_from_u64(seed);
    sleep(Duration::from_millis(rng.gen_range(1..=10))).await;
    report(&driver, StatusUpdate::running(launch.task_id, launch.attempt)).await;

    sleep(Duration::from_millis(rng.gen_range(task_ms / 2..=task_ms * 3 / 2))).await;
    let update = if rng.gen_bool(fail_rate) {
        StatusUpdate::lost(
            launch.task_id,
            launch.attempt,
            TaskEndReason::other("executor lost"),
        )
    } else {
        StatusUpdate::finished(launch.task_id, launch.attempt)
            .with_result(serde_json::json!({ "index": launch.index, "host": launch.host }))
    };
    report(&driver, update).await;

    // receiver is gone once the simulation is over
    let _ = released.send(Released {
        host,
        cpus: launch.cpus,
    });
}

async fn report(driver: &JobDriver, update: StatusUpdate) {
    if let Err(err) = driver.status_update(update).await {
        tracing::warn!(error = %err, "status update rejected");
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let args = Args::parse();
    if args.tasks == 0 || args.hosts == 0 {
        return Err("--tasks and --hosts must be at least 1".into());
    }
    if !(0.0..=1.0).contains(&args.fail_rate) {
        return Err(format!("--fail-rate must be within 0.0..=1.0, got {}", args.fail_rate).into());
    }
    let task_ms = args.task_ms.max(2);

    let options = match &args.config {
        Some(path) => JobOptions::load(path)?,
        None => JobOptions::default(),
    };
    let mut rng = match args.seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_entropy(),
    };

    let scheduler = Arc::new(RecordingScheduler::new());
    let job = SimpleJob::builder(build_tasks(&args), scheduler.clone())
        .options(options)
        .resolver(Arc::new(build_resolver(args.hosts)))
        .build()?;
    let driver = JobDriver::new(job);
    tracing::info!(job_id = %driver.job_id(), tasks = args.tasks, hosts = args.hosts, "job submitted");

    let ticker = driver.spawn_timeout_ticker(Duration::from_secs(1));
    let revive = driver.revive_signal();
    let (released_tx, mut released_rx) = mpsc::unbounded_channel();
    let mut free = vec![args.cpus_per_host; args.hosts];
    let deadline = Instant::now() + Duration::from_secs(args.deadline_secs);

    while !driver.is_done().await {
        if Instant::now() >= deadline {
            driver
                .abort(AbortReason::Other(format!(
                    "simulation deadline of {}s passed",
                    args.deadline_secs
                )))
                .await;
            break;
        }

        for (host, cpus) in free.iter_mut().enumerate() {
            let launches = driver.offer(&host_name(host), *cpus).await;
            for launch in launches {
                *cpus -= launch.cpus;
                tokio::spawn(run_executor(
                    driver.clone(),
                    launch,
                    host,
                    args.fail_rate,
                    task_ms,
                    rng.r#gen(),
                    released_tx.clone(),
                ));
            }
        }

        tokio::select! {
            Some(r) = released_rx.recv() => free[r.host] += r.cpus,
            _ = revive.notified() => {}
            _ = sleep(Duration::from_millis(50)) => {}
        }
        while let Ok(r) = released_rx.try_recv() {
            free[r.host] += r.cpus;
        }
    }
    ticker.shutdown_and_join().await;

    let report = scheduler
        .finished_report()
        .ok_or("job ended without a report")?;
    tracing::info!(
        job_id = %report.job_id,
        failed = report.failed,
        killed = scheduler.killed().len(),
        resource_requests = scheduler.resource_requests(),
        "simulation finished"
    );
    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}
