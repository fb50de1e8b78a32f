//! # Common Provider Utilities
//!
//! Span and metric bookkeeping shared by remote provider calls.

use crate::observability::metrics;
use std::time::{Duration, Instant};
use tracing::Span;

/// Records the outcome of one key-manager call on its span and in metrics
///
/// The span must declare `operation.success`, `operation.duration_ms` and
/// `error.message` (as `tracing::field::Empty`) for the records to stick.
#[derive(Debug)]
pub struct OperationTracker {
    operation: &'static str,
    start: Instant,
    span: Span,
}

impl OperationTracker {
    /// Start timing `operation` within `span`
    pub fn new(operation: &'static str, span: Span) -> Self {
        Self {
            operation,
            start: Instant::now(),
            span,
        }
    }

    /// Record success metrics
    pub fn record_success(&self) {
        let duration = self.start.elapsed();
        self.record_duration(duration);
        self.span.record("operation.success", true);
        metrics::record_key_manager_operation(self.operation, duration.as_secs_f64());
    }

    /// Record error metrics
    pub fn record_error(&self, error_message: &str) {
        self.record_duration(self.start.elapsed());
        self.span.record("operation.success", false);
        self.span.record("error.message", error_message);
        metrics::increment_key_manager_operation_errors(self.operation);
    }

    /// Pass `result` through, recording its error before adding `context`
    pub fn track<T, E>(&self, result: Result<T, E>, context: &'static str) -> anyhow::Result<T>
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        result.map_err(|e| {
            self.record_error(&e.to_string());
            anyhow::Error::new(e).context(context)
        })
    }

    fn record_duration(&self, duration: Duration) {
        #[allow(
            clippy::cast_possible_truncation,
            reason = "A call lasting u64::MAX milliseconds is not a concern"
        )]
        self.span
            .record("operation.duration_ms", duration.as_millis() as u64);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tracing::field::Empty;

    fn errors_recorded(operation: &str) -> bool {
        metrics::render()
            .expect("metrics should render")
            .lines()
            .any(|line| {
                line.starts_with("openstack_secret_key_manager_operation_errors_total")
                    && line.contains(&format!("operation=\"{operation}\""))
            })
    }

    #[test]
    fn test_track_records_failure() {
        metrics::register_metrics().expect("metrics should register");
        let span = tracing::info_span!(
            "test.decode",
            operation.success = Empty,
            operation.duration_ms = Empty,
            error.message = Empty
        );
        let tracker = OperationTracker::new("tracked_decode", span);

        let parsed: Result<u32, _> = "not a number".parse::<u32>();
        let err = tracker
            .track(parsed, "Failed to parse count")
            .unwrap_err();

        assert_eq!(format!("{err:#}"), "Failed to parse count: invalid digit found in string");
        assert!(errors_recorded("tracked_decode"));
    }

    #[test]
    fn test_track_passes_success_through() {
        metrics::register_metrics().expect("metrics should register");
        let tracker = OperationTracker::new("tracked_ok", tracing::Span::none());

        let value = tracker.track("42".parse::<u32>(), "Failed to parse count");
        assert_eq!(value.expect("parsed"), 42);
        assert!(!errors_recorded("tracked_ok"));
    }
}
