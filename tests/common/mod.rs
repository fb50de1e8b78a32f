//! Common test utilities for integration tests
//!
//! Provides rustls crypto provider setup and key-manager fixtures shared by
//! the Pact and reconciler tests.

#![allow(dead_code, reason = "Each test crate uses a different subset")]

use openstack_secret::config::ToolConfig;
use openstack_secret::provider::barbican::BarbicanREST;
use std::sync::Once;

static RUSTLS_INIT: Once = Once::new();

/// Token every Pact interaction expects in `X-Auth-Token`
pub const TEST_TOKEN: &str = "test-token";

/// Initialize rustls crypto provider for tests
///
/// Uses a `Once` to ensure it's only called once across all tests.
pub fn init_rustls() {
    RUSTLS_INIT.call_once(|| {
        // Ignore the error: another test binary thread may have installed it
        let _ = rustls::crypto::ring::default_provider().install_default();
    });
}

/// Mock server URL without a trailing slash
pub fn base_url(url: impl std::fmt::Display) -> String {
    url.to_string().trim_end_matches('/').to_string()
}

/// Barbican client pointed at `endpoint` with the test token
pub fn barbican_client(endpoint: &str, page_size: u32) -> BarbicanREST {
    let config = ToolConfig {
        list_page_size: page_size,
        ..ToolConfig::default()
    };
    BarbicanREST::with_endpoint(endpoint, Some(TEST_TOKEN.to_string()), &config)
        .expect("Failed to build Barbican client")
}
