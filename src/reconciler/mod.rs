//! # Reconciler
//!
//! Converges one named secret in the key manager to a desired state.
//!
//! Every run starts from a fresh listing; nothing is cached between runs.
//! The key manager does not enforce unique names, so lookups treat the first
//! listed match as authoritative while deletion removes every match.
//!
//! ```text
//! absent              -> delete all matches        changed = any deleted
//! present, force      -> delete all, create        changed = true
//! present, fail       -> exists ? error : create   changed = true
//! present, ignore     -> exists ? read existing    changed = false
//!                               : create           changed = true
//! ```
//!
//! Force mode is delete-then-create with no atomicity: a failure between the
//! two leaves the secret absent.

mod persist;
mod types;

pub use persist::persist_to_file;
pub use types::{ReconcileOutcome, ReconcilerError};

use crate::declaration::{DesiredState, OverwriteMode, SecretState};
use crate::observability::metrics;
use crate::provider::{KeyManagerProvider, Payload, SecretEntry, SecretRef};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, field::Empty, info, info_span, warn, Instrument};

#[derive(Clone)]
pub struct Reconciler {
    provider: Arc<dyn KeyManagerProvider>,
    /// Directory temp files for `dest` writes are created in
    tmp_dir: PathBuf,
    /// Predict the outcome without mutating anything
    check_mode: bool,
}

impl std::fmt::Debug for Reconciler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Reconciler")
            .field("tmp_dir", &self.tmp_dir)
            .field("check_mode", &self.check_mode)
            .finish_non_exhaustive()
    }
}

fn all_matches<'a>(secrets: &'a [SecretEntry], name: &'a str) -> impl Iterator<Item = &'a SecretEntry> {
    secrets.iter().filter(move |s| s.has_name(name))
}

fn first_match<'a>(secrets: &'a [SecretEntry], name: &str) -> Option<&'a SecretRef> {
    secrets.iter().find(|s| s.has_name(name)).map(|s| &s.reference)
}

impl Reconciler {
    pub fn new(provider: Arc<dyn KeyManagerProvider>, tmp_dir: impl Into<PathBuf>) -> Self {
        Self {
            provider,
            tmp_dir: tmp_dir.into(),
            check_mode: false,
        }
    }

    #[must_use]
    pub fn with_check_mode(mut self, check_mode: bool) -> Self {
        self.check_mode = check_mode;
        self
    }

    /// Every secret the key manager lists, in listing order
    pub async fn list_secrets(&self) -> Result<Vec<SecretEntry>, ReconcilerError> {
        let secrets = self.provider.list_secrets().await?;
        debug!("Key manager lists {} secrets", secrets.len());
        Ok(secrets)
    }

    /// Delete every secret called `name`; `false` when there was none
    pub async fn ensure_absent(&self, name: &str) -> Result<bool, ReconcilerError> {
        let secrets = self.list_secrets().await?;
        self.ensure_absent_in(&secrets, name).await
    }

    /// Make sure a secret called `name` exists, following `mode`
    ///
    /// Returns whether anything changed and the value the secret now holds.
    pub async fn ensure_present(
        &self,
        name: &str,
        value: Option<&Payload>,
        mode: OverwriteMode,
    ) -> Result<ReconcileOutcome, ReconcilerError> {
        let secrets = self.list_secrets().await?;
        self.ensure_present_in(&secrets, name, value, mode).await
    }

    /// Payload of the first secret called `name`
    pub async fn read_payload(&self, name: &str) -> Result<Payload, ReconcilerError> {
        let secrets = self.list_secrets().await?;
        self.read_payload_in(&secrets, name).await
    }

    /// Write `payload` to `dest` if it differs; see [`persist_to_file`]
    pub fn persist_to_file(&self, dest: &Path, payload: &Payload) -> Result<bool, ReconcilerError> {
        persist_to_file(&self.tmp_dir, dest, payload)
    }

    /// Run one full reconciliation against a single listing
    pub async fn reconcile(&self, desired: &DesiredState) -> Result<ReconcileOutcome, ReconcilerError> {
        let span = info_span!(
            "reconcile",
            secret.name = %desired.name,
            secret.state = ?desired.state,
            overwrite.mode = desired.overwrite_mode.as_str(),
            check_mode = self.check_mode,
            changed = Empty
        );

        async {
            let start = Instant::now();
            let result = self.reconcile_inner(desired).await;
            let duration = start.elapsed().as_secs_f64();

            match &result {
                Ok(outcome) => {
                    tracing::Span::current().record("changed", outcome.changed);
                    let label = if outcome.changed { "changed" } else { "unchanged" };
                    metrics::record_reconciliation(label, duration);
                    info!("Reconciled secret {} (changed: {})", desired.name, outcome.changed);
                }
                Err(e) => {
                    metrics::record_reconciliation(e.kind(), duration);
                    warn!("Reconciliation of secret {} failed: {}", desired.name, e);
                }
            }
            result
        }
        .instrument(span)
        .await
    }

    async fn reconcile_inner(&self, desired: &DesiredState) -> Result<ReconcileOutcome, ReconcilerError> {
        let secrets = self.list_secrets().await?;

        if self.check_mode {
            return plan(&secrets, desired);
        }

        match desired.state {
            SecretState::Absent => {
                let changed = self.ensure_absent_in(&secrets, &desired.name).await?;
                Ok(ReconcileOutcome::new(changed, Payload::default()))
            }
            SecretState::Present => {
                let outcome = self
                    .ensure_present_in(
                        &secrets,
                        &desired.name,
                        desired.value.as_ref(),
                        desired.overwrite_mode,
                    )
                    .await?;
                if let Some(dest) = &desired.dest {
                    self.persist_to_file(dest, &outcome.secret_value)?;
                }
                Ok(outcome)
            }
        }
    }

    async fn ensure_absent_in(&self, secrets: &[SecretEntry], name: &str) -> Result<bool, ReconcilerError> {
        let mut deleted = false;
        for entry in all_matches(secrets, name) {
            info!("Deleting secret {} ({})", name, entry.reference);
            self.provider.delete_secret(&entry.reference).await?;
            deleted = true;
        }
        if !deleted {
            debug!("Secret {} already absent", name);
        }
        Ok(deleted)
    }

    async fn ensure_present_in(
        &self,
        secrets: &[SecretEntry],
        name: &str,
        value: Option<&Payload>,
        mode: OverwriteMode,
    ) -> Result<ReconcileOutcome, ReconcilerError> {
        let exists = first_match(secrets, name).is_some();

        match mode {
            OverwriteMode::Force => {
                let value = value.ok_or_else(|| missing_value(name, false))?;
                if exists {
                    self.ensure_absent_in(secrets, name).await?;
                }
                // Re-list so a secret created concurrently under the same
                // name is reported instead of duplicated
                let secrets = self.list_secrets().await?;
                self.create(&secrets, name, value).await?;
                Ok(ReconcileOutcome::new(true, value.clone()))
            }
            OverwriteMode::Fail => {
                let value = value.ok_or_else(|| missing_value(name, false))?;
                self.create(secrets, name, value).await?;
                Ok(ReconcileOutcome::new(true, value.clone()))
            }
            OverwriteMode::Ignore if exists => {
                debug!("Secret {} exists, keeping its current value", name);
                let current = self.read_payload_in(secrets, name).await?;
                Ok(ReconcileOutcome::new(false, current))
            }
            OverwriteMode::Ignore => {
                let value = value.ok_or_else(|| missing_value(name, true))?;
                self.create(secrets, name, value).await?;
                Ok(ReconcileOutcome::new(true, value.clone()))
            }
        }
    }

    async fn read_payload_in(&self, secrets: &[SecretEntry], name: &str) -> Result<Payload, ReconcilerError> {
        let reference =
            first_match(secrets, name).ok_or_else(|| ReconcilerError::NotFound(name.to_string()))?;
        Ok(self.provider.get_secret_payload(reference).await?)
    }

    /// Create `name`, refusing when the listing already has it
    async fn create(&self, secrets: &[SecretEntry], name: &str, value: &Payload) -> Result<SecretRef, ReconcilerError> {
        if first_match(secrets, name).is_some() {
            return Err(ReconcilerError::AlreadyExists(name.to_string()));
        }
        let reference = self.provider.create_secret(name, value).await?;
        info!("Created secret {} ({})", name, reference);
        Ok(reference)
    }
}

fn missing_value(name: &str, secret_absent: bool) -> ReconcilerError {
    ReconcilerError::MissingValue {
        name: name.to_string(),
        secret_absent,
    }
}

/// Predict the outcome of a run from the listing alone
fn plan(secrets: &[SecretEntry], desired: &DesiredState) -> Result<ReconcileOutcome, ReconcilerError> {
    let name = desired.name.as_str();
    let exists = first_match(secrets, name).is_some();

    let changed = match (desired.state, desired.overwrite_mode) {
        (SecretState::Absent, _) => exists,
        (SecretState::Present, OverwriteMode::Force) => {
            desired.value.as_ref().ok_or_else(|| missing_value(name, false))?;
            true
        }
        (SecretState::Present, OverwriteMode::Fail) => {
            desired.value.as_ref().ok_or_else(|| missing_value(name, false))?;
            if exists {
                return Err(ReconcilerError::AlreadyExists(name.to_string()));
            }
            true
        }
        (SecretState::Present, OverwriteMode::Ignore) => {
            if !exists {
                desired.value.as_ref().ok_or_else(|| missing_value(name, true))?;
            }
            !exists
        }
    };

    debug!("Check mode: secret {} would change: {}", name, changed);
    Ok(ReconcileOutcome::new(changed, Payload::default()))
}
