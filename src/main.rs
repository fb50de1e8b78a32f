//! # openstack-secret
//!
//! Converges one named secret in an OpenStack key manager (Barbican) and
//! prints the result as JSON.

use clap::Parser;
use openstack_secret::cli::{failure_message, run, Cli};
use openstack_secret::config::ToolConfig;
use openstack_secret::observability::{init_logging, metrics};
use std::process::ExitCode;
use tracing::warn;

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    // Configure rustls crypto provider FIRST, before any HTTP client exists
    // Required for rustls 0.23+ when no default provider is set via features
    rustls::crypto::ring::default_provider()
        .install_default()
        .unwrap_or_else(|_| panic!("Failed to install rustls crypto provider"));

    let cli = Cli::parse();
    let config = ToolConfig::from_env();

    if let Err(e) = init_logging(&config) {
        eprintln!("{e:#}");
    }
    if let Err(e) = metrics::register_metrics() {
        warn!("Failed to register metrics: {:#}", e);
    }

    let result = run(&cli, &config).await;

    if let Some(path) = &cli.metrics_file {
        if let Err(e) = metrics::write_textfile(path) {
            warn!("Failed to write metrics to {}: {:#}", path.display(), e);
        }
    }

    match result {
        Ok(outcome) => match serde_json::to_string(&outcome) {
            Ok(json) => {
                println!("{json}");
                ExitCode::SUCCESS
            }
            Err(e) => {
                print_failure(&format!("Failed to serialize result: {e}"));
                ExitCode::FAILURE
            }
        },
        Err(e) => {
            print_failure(&failure_message(&e));
            ExitCode::FAILURE
        }
    }
}

fn print_failure(msg: &str) {
    println!("{}", serde_json::json!({ "failed": true, "msg": msg }));
}
