//! Domain model (ids, tasks, statuses, options, reports, errors).

pub mod errors;
pub mod ids;
pub mod options;
pub mod report;
pub mod state;
pub mod task;

pub use errors::{ConfigError, JobError, ResolveError};
pub use ids::{JobId, TaskId};
pub use options::JobOptions;
pub use report::{AbortReason, JobReport, JobSummary};
pub use state::{TaskEndReason, TaskStatus};
pub use task::{StatusUpdate, Task, TaskLaunch};
