//! Job options: locality, timeout and retry knobs.
//!
//! Every field has a default, so a config file only needs to name what it
//! overrides.

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use super::errors::ConfigError;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct JobOptions {
    /// How long to hold out for a locality match after the last preferred
    /// launch before accepting any pending task. 0 disables the wait.
    pub locality_wait_ms: u64,

    /// A task still Starting after this long is assumed never to have run.
    pub wait_for_running_ms: u64,

    /// Failures (or straggler relaunches) a single task may accumulate before
    /// the job is aborted.
    pub max_task_failures: u32,

    /// Capacity units consumed by one task.
    pub cpus_per_task: f64,

    /// Minimum spacing between two timeout scans.
    pub timeout_check_interval_ms: u64,

    /// A running task is never treated as a straggler before this much time.
    pub straggler_min_elapsed_ms: u64,

    /// Floor for the average task time used in straggler detection.
    pub min_average_task_ms: u64,

    /// Average task time assumed while no task has finished.
    pub default_average_task_ms: u64,
}

impl Default for JobOptions {
    fn default() -> Self {
        Self {
            locality_wait_ms: 0,
            wait_for_running_ms: 15_000,
            max_task_failures: 4,
            cpus_per_task: 1.0,
            timeout_check_interval_ms: 5_000,
            straggler_min_elapsed_ms: 30_000,
            min_average_task_ms: 5_000,
            default_average_task_ms: 10_000,
        }
    }
}

impl JobOptions {
    pub fn from_json_str(s: &str) -> Result<Self, ConfigError> {
        let options: JobOptions = serde_json::from_str(s)?;
        options.validate()?;
        Ok(options)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let s = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_json_str(&s)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if !self.cpus_per_task.is_finite() || self.cpus_per_task <= 0.0 {
            return Err(ConfigError::Invalid(format!(
                "cpus_per_task must be a positive number, got {}",
                self.cpus_per_task
            )));
        }
        if self.timeout_check_interval_ms == 0 {
            return Err(ConfigError::Invalid(
                "timeout_check_interval_ms must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }

    pub fn locality_wait(&self) -> Duration {
        Duration::from_millis(self.locality_wait_ms)
    }

    pub fn wait_for_running(&self) -> Duration {
        Duration::from_millis(self.wait_for_running_ms)
    }

    pub fn timeout_check_interval(&self) -> Duration {
        Duration::from_millis(self.timeout_check_interval_ms)
    }

    pub fn straggler_min_elapsed(&self) -> Duration {
        Duration::from_millis(self.straggler_min_elapsed_ms)
    }

    pub fn min_average_task_time(&self) -> Duration {
        Duration::from_millis(self.min_average_task_ms)
    }

    pub fn default_average_task_time(&self) -> Duration {
        Duration::from_millis(self.default_average_task_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_the_documented_constants() {
        let o = JobOptions::default();
        assert_eq!(o.locality_wait(), Duration::ZERO);
        assert_eq!(o.wait_for_running(), Duration::from_secs(15));
        assert_eq!(o.max_task_failures, 4);
        assert_eq!(o.cpus_per_task, 1.0);
        assert_eq!(o.timeout_check_interval(), Duration::from_secs(5));
        assert_eq!(o.straggler_min_elapsed(), Duration::from_secs(30));
    }

    #[test]
    fn partial_json_keeps_other_defaults() {
        let json = r#"{ "max_task_failures": 2, "locality_wait_ms": 3000 }"#;
        let o = JobOptions::from_json_str(json).expect("parse");
        assert_eq!(o.max_task_failures, 2);
        assert_eq!(o.locality_wait(), Duration::from_secs(3));
        assert_eq!(o.wait_for_running_ms, 15_000);
    }

    #[test]
    fn rejects_non_positive_cpus() {
        let err = JobOptions::from_json_str(r#"{ "cpus_per_task": 0 }"#).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));
    }

    #[test]
    fn rejects_malformed_json() {
        let err = JobOptions::from_json_str("{ not json").unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }

    #[test]
    fn load_reports_missing_file() {
        let err = JobOptions::load("/definitely/not/here.json").unwrap_err();
        assert!(matches!(err, ConfigError::Io { .. }));
    }
}
