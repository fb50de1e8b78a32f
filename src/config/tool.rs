//! # Tool Configuration
//!
//! Process-level settings loaded from environment variables.

use std::path::PathBuf;
use std::time::Duration;

/// Process-level configuration
///
/// All settings have sensible defaults and can be overridden via environment variables.
#[derive(Debug, Clone)]
pub struct ToolConfig {
    /// Global log level (ERROR, WARN, INFO, DEBUG, TRACE)
    /// `RUST_LOG` takes precedence when set
    pub log_level: String,
    /// Log format (json, text)
    pub log_format: String,
    /// Enable color in text format logs
    pub log_enable_color: bool,
    /// Directory temp files are created in while persisting secret values
    pub tmp_dir: PathBuf,
    /// Timeout for a single HTTP request (seconds)
    pub http_timeout_secs: u64,
    /// Page size for Barbican list calls
    pub list_page_size: u32,
}

impl Default for ToolConfig {
    fn default() -> Self {
        use crate::constants::{DEFAULT_HTTP_TIMEOUT_SECS, DEFAULT_LIST_PAGE_SIZE};
        Self {
            log_level: "INFO".to_string(),
            log_format: "text".to_string(),
            log_enable_color: false,
            tmp_dir: std::env::temp_dir(),
            http_timeout_secs: DEFAULT_HTTP_TIMEOUT_SECS,
            list_page_size: DEFAULT_LIST_PAGE_SIZE,
        }
    }
}

impl ToolConfig {
    /// Load configuration from environment variables with defaults
    pub fn from_env() -> Self {
        use crate::constants::{DEFAULT_HTTP_TIMEOUT_SECS, DEFAULT_LIST_PAGE_SIZE, MAX_LIST_PAGE_SIZE};
        Self {
            log_level: env_var_or_default_str("LOG_LEVEL", "INFO"),
            log_format: env_var_or_default_str("LOG_FORMAT", "text"),
            log_enable_color: env_var_or_default_bool("LOG_ENABLE_COLOR", false),
            tmp_dir: std::env::var_os("OPENSTACK_SECRET_TMPDIR")
                .map_or_else(std::env::temp_dir, PathBuf::from),
            http_timeout_secs: env_var_or_default(
                "OPENSTACK_SECRET_HTTP_TIMEOUT_SECS",
                DEFAULT_HTTP_TIMEOUT_SECS,
            ),
            list_page_size: env_var_or_default("OPENSTACK_SECRET_PAGE_SIZE", DEFAULT_LIST_PAGE_SIZE)
                .clamp(1, MAX_LIST_PAGE_SIZE),
        }
    }

    /// Get HTTP request timeout duration
    pub fn http_timeout(&self) -> Duration {
        Duration::from_secs(self.http_timeout_secs)
    }
}

/// Read environment variable or return default value
fn env_var_or_default<T: std::str::FromStr>(key: &str, default: T) -> T
where
    <T as std::str::FromStr>::Err: std::fmt::Debug,
{
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

/// Read environment variable as boolean or return default
fn env_var_or_default_bool(key: &str, default: bool) -> bool {
    std::env::var(key)
        .ok()
        .map(|v| {
            let v_lower = v.to_lowercase();
            v_lower == "true" || v_lower == "1" || v_lower == "yes" || v_lower == "on"
        })
        .unwrap_or(default)
}

/// Read environment variable as string or return default
fn env_var_or_default_str(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}
