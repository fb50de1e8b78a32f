//! # Logging
//!
//! tracing-subscriber setup for the CLI.
//!
//! Logs always go to stderr: stdout carries nothing but the result JSON, so
//! callers can pipe it straight into `jq` or an automation engine.

use crate::config::ToolConfig;
use anyhow::Result;
use tracing_subscriber::EnvFilter;

/// Build the filter: `RUST_LOG` wins, otherwise `LOG_LEVEL` applies to this crate
pub fn env_filter(config: &ToolConfig) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new(format!(
            "openstack_secret={}",
            config.log_level.to_lowercase()
        ))
    })
}

/// Install the global subscriber
///
/// `LOG_FORMAT=json` emits one JSON object per event; anything else emits
/// human-readable text.
#[allow(
    clippy::missing_errors_doc,
    reason = "Error documentation is provided in doc comments"
)]
pub fn init_logging(config: &ToolConfig) -> Result<()> {
    let builder = tracing_subscriber::fmt()
        .with_env_filter(env_filter(config))
        .with_writer(std::io::stderr);

    let result = if config.log_format.eq_ignore_ascii_case("json") {
        builder.json().with_current_span(true).try_init()
    } else {
        builder.with_ansi(config.log_enable_color).try_init()
    };

    result.map_err(|e| anyhow::anyhow!("Failed to initialize logging: {e}"))
}
