//! # CLI
//!
//! Command-line surface of `openstack-secret`.
//!
//! ## Usage
//!
//! ```bash
//! # Create db-pass unless it exists, print its value either way
//! openstack-secret --name db-pass --value s3cr3t
//!
//! # Replace whatever is stored under db-pass with the contents of a file
//! openstack-secret --name db-pass --src ./db-pass.txt --overwrite-mode force
//!
//! # Fetch an existing secret into a file
//! openstack-secret --name tls-key --dest /etc/app/tls.key
//!
//! # Remove every secret called db-pass
//! openstack-secret --name db-pass --state absent
//!
//! # Declaration from a file, with a flag override, without changing anything
//! openstack-secret --params secret.yaml --overwrite-mode fail --check
//! ```
//!
//! The result is one JSON object on stdout: `{"changed": ..., "secret_value": ...}`.
//! Failures print `{"failed": true, "msg": ...}` and exit with status 1.

use crate::config::{load_cloud, ToolConfig};
use crate::declaration::{Declaration, OverwriteMode, SecretState};
use crate::provider::barbican::BarbicanREST;
use crate::reconciler::{ReconcileOutcome, Reconciler, ReconcilerError};
use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;

/// Version string with build metadata
pub const VERSION: &str = concat!(
    env!("CARGO_PKG_VERSION"),
    " (",
    env!("BUILD_GIT_HASH"),
    ", built ",
    env!("BUILD_DATETIME"),
    ")"
);

/// Create, read, overwrite or delete a named secret in an OpenStack key manager
#[derive(Debug, Parser)]
#[command(name = "openstack-secret", version = VERSION, long_about = None)]
#[command(after_help = "\
Overwrite modes (state=present, secret already exists):
  force   delete every secret with this name, then create it again
  fail    stop with an error
  ignore  keep the stored value and return it (default)

Environment:
  LOG_LEVEL, LOG_FORMAT (text|json), LOG_ENABLE_COLOR
  OPENSTACK_SECRET_TMPDIR, OPENSTACK_SECRET_HTTP_TIMEOUT_SECS, OPENSTACK_SECRET_PAGE_SIZE
  OS_CLIENT_CONFIG_FILE (clouds.yaml location), OS_* (with --cloud envvars)
")]
pub struct Cli {
    /// Secret name (required here or in --params)
    #[arg(long)]
    pub name: Option<String>,

    /// Desired state [default: present]
    #[arg(long, value_enum)]
    pub state: Option<SecretState>,

    /// Literal secret value
    #[arg(long)]
    pub value: Option<String>,

    /// Read the secret value from this file (wins over --value)
    #[arg(long, value_name = "PATH")]
    pub src: Option<PathBuf>,

    /// Write the resolved secret value to this file
    #[arg(long, value_name = "PATH")]
    pub dest: Option<PathBuf>,

    /// What to do when the secret already exists [default: ignore]
    #[arg(long, value_enum)]
    pub overwrite_mode: Option<OverwriteMode>,

    /// Cloud profile from clouds.yaml [default: openstack]
    #[arg(long)]
    pub cloud: Option<String>,

    /// JSON or YAML file with the declaration; flags override its fields
    #[arg(long, value_name = "FILE")]
    pub params: Option<PathBuf>,

    /// Report what would change without changing anything
    #[arg(long)]
    pub check: bool,

    /// Write Prometheus metrics to this file when the run ends
    #[arg(long, value_name = "PATH")]
    pub metrics_file: Option<PathBuf>,
}

impl Cli {
    /// Declaration from the params file (if any) overridden by flags
    pub fn declaration(&self) -> Result<Declaration> {
        let flags = Declaration {
            name: self.name.clone(),
            state: self.state,
            value: self.value.clone(),
            src: self.src.clone(),
            dest: self.dest.clone(),
            overwrite_mode: self.overwrite_mode,
            cloud: self.cloud.clone(),
        };

        match &self.params {
            Some(path) => Ok(Declaration::from_file(path)?.merge(flags)),
            None => Ok(flags),
        }
    }
}

/// Resolve the declaration, connect to the key manager and reconcile
///
/// # Errors
/// Any configuration, connection or reconciliation failure.
pub async fn run(cli: &Cli, config: &ToolConfig) -> Result<ReconcileOutcome> {
    let declaration = cli.declaration()?;
    let cloud_name = declaration.cloud().to_string();
    let desired = declaration.into_desired_state()?;

    let cloud = load_cloud(&cloud_name)
        .with_context(|| format!("Failed to load cloud profile '{cloud_name}'"))?;
    let provider = BarbicanREST::connect(&cloud, config)
        .await
        .with_context(|| format!("Failed to connect to the key manager of cloud '{cloud_name}'"))?;
    info!("Connected to key manager at {}", provider.endpoint());

    let reconciler = Reconciler::new(Arc::new(provider), config.tmp_dir.clone())
        .with_check_mode(cli.check);
    Ok(reconciler.reconcile(&desired).await?)
}

/// Message for the failure JSON
///
/// Reconciler errors already render their own cause, so only their display
/// text is used; anything else is printed with its full context chain.
pub fn failure_message(err: &anyhow::Error) -> String {
    match err.downcast_ref::<ReconcilerError>() {
        Some(reconciler_error) => reconciler_error.to_string(),
        None => format!("{err:#}"),
    }
}
