//! # Provider Modules
//!
//! Key-manager providers the reconciler talks to.
//!
//! Each provider implements `KeyManagerProvider`:
//! - `barbican`: OpenStack Barbican over its REST API
//! - `memory`: in-process store, for tests and dry wiring

use anyhow::Result;
use async_trait::async_trait;

pub mod common;
mod types;

pub use types::{Payload, SecretEntry, SecretRef};

/// Provider trait for key-manager services
///
/// Error classification beyond "the call failed" is left to the caller;
/// implementations attach context to the `anyhow::Error` they return.
#[async_trait]
pub trait KeyManagerProvider: Send + Sync {
    /// List every secret visible to the caller, in service order
    async fn list_secrets(&self) -> Result<Vec<SecretEntry>>;

    /// Store a new secret and return its reference
    async fn create_secret(&self, name: &str, payload: &Payload) -> Result<SecretRef>;

    /// Delete the secret behind `reference`
    async fn delete_secret(&self, reference: &SecretRef) -> Result<()>;

    /// Fetch the payload of the secret behind `reference`
    async fn get_secret_payload(&self, reference: &SecretRef) -> Result<Payload>;
}

// Provider implementations
pub mod barbican;
pub mod memory;
