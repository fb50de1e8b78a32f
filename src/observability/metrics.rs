//! # Metrics
//!
//! Prometheus metrics for a reconciliation run.
//!
//! ## Metrics Exposed
//!
//! - `openstack_secret_reconciliations_total` - Reconciliations by outcome (changed, unchanged, or the error kind)
//! - `openstack_secret_reconciliation_duration_seconds` - Duration of a whole reconciliation
//! - `openstack_secret_key_manager_operations_total` - Key-manager calls by operation
//! - `openstack_secret_key_manager_operation_duration_seconds` - Duration of key-manager calls
//! - `openstack_secret_key_manager_operation_errors_total` - Failed key-manager calls by operation
//! - `openstack_secret_file_writes_total` - Destination files actually rewritten
//!
//! The tool is short-lived, so the registry is written to a file at exit
//! (`--metrics-file`) for a node-exporter textfile collector to pick up.

use anyhow::{Context, Result};
use prometheus::core::Collector;
use prometheus::{Encoder, Histogram, HistogramVec, IntCounter, IntCounterVec, Registry, TextEncoder};
use std::path::Path;
use std::sync::LazyLock;

pub(crate) static REGISTRY: LazyLock<Registry> = LazyLock::new(Registry::new);

static RECONCILIATIONS_TOTAL: LazyLock<IntCounterVec> = LazyLock::new(|| {
    IntCounterVec::new(
        prometheus::Opts::new(
            "openstack_secret_reconciliations_total",
            "Total number of reconciliations by outcome",
        ),
        &["outcome"],
    )
    .expect("Failed to create RECONCILIATIONS_TOTAL metric - this should never happen")
});

static RECONCILIATION_DURATION: LazyLock<Histogram> = LazyLock::new(|| {
    Histogram::with_opts(
        prometheus::HistogramOpts::new(
            "openstack_secret_reconciliation_duration_seconds",
            "Duration of reconciliation in seconds",
        )
        .buckets(vec![0.1, 0.5, 1.0, 2.0, 5.0, 10.0, 30.0]),
    )
    .expect("Failed to create RECONCILIATION_DURATION metric - this should never happen")
});

static KEY_MANAGER_OPERATIONS_TOTAL: LazyLock<IntCounterVec> = LazyLock::new(|| {
    IntCounterVec::new(
        prometheus::Opts::new(
            "openstack_secret_key_manager_operations_total",
            "Total number of key-manager operations by operation",
        ),
        &["operation"],
    )
    .expect("Failed to create KEY_MANAGER_OPERATIONS_TOTAL metric - this should never happen")
});

static KEY_MANAGER_OPERATION_DURATION: LazyLock<HistogramVec> = LazyLock::new(|| {
    HistogramVec::new(
        prometheus::HistogramOpts::new(
            "openstack_secret_key_manager_operation_duration_seconds",
            "Duration of key-manager operations in seconds by operation",
        )
        .buckets(vec![0.05, 0.1, 0.5, 1.0, 2.0, 5.0, 10.0]),
        &["operation"],
    )
    .expect("Failed to create KEY_MANAGER_OPERATION_DURATION metric - this should never happen")
});

static KEY_MANAGER_OPERATION_ERRORS_TOTAL: LazyLock<IntCounterVec> = LazyLock::new(|| {
    IntCounterVec::new(
        prometheus::Opts::new(
            "openstack_secret_key_manager_operation_errors_total",
            "Total number of failed key-manager operations by operation",
        ),
        &["operation"],
    )
    .expect("Failed to create KEY_MANAGER_OPERATION_ERRORS_TOTAL metric - this should never happen")
});

static FILE_WRITES_TOTAL: LazyLock<IntCounter> = LazyLock::new(|| {
    IntCounter::new(
        "openstack_secret_file_writes_total",
        "Total number of destination files rewritten with a secret value",
    )
    .expect("Failed to create FILE_WRITES_TOTAL metric - this should never happen")
});

#[allow(
    clippy::missing_errors_doc,
    reason = "Error documentation is provided in doc comments"
)]
pub fn register_metrics() -> Result<()> {
    let collectors: Vec<Box<dyn Collector>> = vec![
        Box::new(RECONCILIATIONS_TOTAL.clone()),
        Box::new(RECONCILIATION_DURATION.clone()),
        Box::new(KEY_MANAGER_OPERATIONS_TOTAL.clone()),
        Box::new(KEY_MANAGER_OPERATION_DURATION.clone()),
        Box::new(KEY_MANAGER_OPERATION_ERRORS_TOTAL.clone()),
        Box::new(FILE_WRITES_TOTAL.clone()),
    ];

    for collector in collectors {
        match REGISTRY.register(collector) {
            Ok(()) | Err(prometheus::Error::AlreadyReg) => {}
            Err(e) => return Err(e).context("Failed to register metric"),
        }
    }

    Ok(())
}

pub fn record_reconciliation(outcome: &str, duration: f64) {
    RECONCILIATIONS_TOTAL.with_label_values(&[outcome]).inc();
    RECONCILIATION_DURATION.observe(duration);
}

pub fn record_key_manager_operation(operation: &str, duration: f64) {
    KEY_MANAGER_OPERATIONS_TOTAL
        .with_label_values(&[operation])
        .inc();
    KEY_MANAGER_OPERATION_DURATION
        .with_label_values(&[operation])
        .observe(duration);
}

/// Increment key-manager operation errors counter
pub fn increment_key_manager_operation_errors(operation: &str) {
    KEY_MANAGER_OPERATION_ERRORS_TOTAL
        .with_label_values(&[operation])
        .inc();
}

pub fn increment_file_writes() {
    FILE_WRITES_TOTAL.inc();
}

/// Render the registry in Prometheus text exposition format
pub fn render() -> Result<String> {
    let encoder = TextEncoder::new();
    let mut buffer = Vec::new();
    encoder
        .encode(&REGISTRY.gather(), &mut buffer)
        .context("Failed to encode metrics")?;
    String::from_utf8(buffer).context("Metrics output is not valid UTF-8")
}

/// Write the registry to `path`
///
/// Written to a sibling temp file and renamed into place so a collector never
/// reads a half-written file.
pub fn write_textfile(path: &Path) -> Result<()> {
    let rendered = render()?;
    let dir = path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));

    let mut tmp = tempfile::NamedTempFile::new_in(dir)
        .with_context(|| format!("Failed to create temp file in {}", dir.display()))?;
    std::io::Write::write_all(&mut tmp, rendered.as_bytes())
        .context("Failed to write metrics")?;
    tmp.persist(path)
        .with_context(|| format!("Failed to move metrics into {}", path.display()))?;
    Ok(())
}
