//! Live task count readiness check.
//!
//! Compares the number of tasks alive on the Tokio runtime against a
//! threshold. The check only measures and reports; it never throttles.
//!
//! Reported as `readiness_NumTasks` with `TaskThreshold` / `NumTasks`
//! metadata, in place of the goroutine names `readiness_NumGoroutine`,
//! `GoroutineThreshold` and `NumGoroutine`.

use std::fmt;

use crate::health::check::{CheckError, CheckKind, CheckTemplate, HealthCheck};

pub const NUM_TASKS: CheckTemplate = CheckTemplate::new(
    "readiness_NumTasks",
    CheckKind::Readiness,
    "live task count exceeds threshold",
);

type Counter = Box<dyn Fn() -> u64 + Send + Sync>;

/// Readiness check on the number of live runtime tasks.
pub struct TaskCountCheck {
    threshold: u64,
    counter: Counter,
}

impl TaskCountCheck {
    /// Check against the current Tokio runtime.
    pub fn new(threshold: u64) -> Self {
        Self::with_counter(threshold, alive_tasks)
    }

    /// Check against a custom task counter.
    pub fn with_counter<F>(threshold: u64, counter: F) -> Self
    where
        F: Fn() -> u64 + Send + Sync + 'static,
    {
        Self {
            threshold,
            counter: Box::new(counter),
        }
    }

    pub fn threshold(&self) -> u64 {
        self.threshold
    }
}

impl HealthCheck for TaskCountCheck {
    fn name(&self) -> &str {
        NUM_TASKS.message
    }

    fn check(&self) -> Option<CheckError> {
        let count = (self.counter)();
        if count <= self.threshold {
            return None;
        }

        let threshold = self.threshold.to_string();
        let count = count.to_string();
        tracing::error!(
            TaskThreshold = %threshold,
            NumTasks = %count,
            "{}",
            NUM_TASKS.description
        );
        Some(NUM_TASKS.build([("TaskThreshold", threshold), ("NumTasks", count)]))
    }
}

impl fmt::Debug for TaskCountCheck {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TaskCountCheck")
            .field("threshold", &self.threshold)
            .finish_non_exhaustive()
    }
}

/// Tasks alive on the current runtime, or 0 outside one.
pub fn alive_tasks() -> u64 {
    tokio::runtime::Handle::try_current()
        .map(|handle| handle.metrics().num_alive_tasks() as u64)
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_under_threshold() {
        let check = TaskCountCheck::with_counter(10, || 10);
        assert!(check.check().is_none());
    }

    #[test]
    fn test_over_threshold() {
        let check = TaskCountCheck::with_counter(10, || 11);
        let err = check.check().expect("should fail");
        assert_eq!(err.message, "readiness_NumTasks");
        assert_eq!(err.kind, CheckKind::Readiness);
        assert_eq!(err.metadata["TaskThreshold"], "10");
        assert_eq!(err.metadata["NumTasks"], "11");
    }

    #[test]
    fn test_metadata_is_fresh_per_call() {
        let check = TaskCountCheck::with_counter(0, || 5);
        let mut first = check.check().unwrap();
        first.metadata.insert("NumTasks".into(), "tampered".into());
        let second = check.check().unwrap();
        assert_eq!(second.metadata["NumTasks"], "5");
    }

    #[test]
    fn test_outside_runtime_counts_zero() {
        assert_eq!(alive_tasks(), 0);
        assert!(TaskCountCheck::new(0).check().is_none());
    }

    #[tokio::test]
    async fn test_inside_runtime_uses_runtime_metrics() {
        let check = TaskCountCheck::new(100_000);
        assert!(check.check().is_none());
    }
}
