//! openstack-secret library
//!
//! Declarative create/read/overwrite/delete of a named secret in an OpenStack
//! key manager (Barbican), with optional file source and destination.
//!
//! The binary in `main.rs` is a thin wrapper around [`cli::run`]; everything
//! it does is reachable from here so it can be tested without a live cloud.

pub mod cli;
pub mod config;
pub mod constants;
pub mod declaration;
pub mod observability;
pub mod provider;
pub mod reconciler;

pub use declaration::{Declaration, DesiredState, OverwriteMode, SecretState};
pub use provider::{KeyManagerProvider, Payload, SecretEntry, SecretRef};
pub use reconciler::{ReconcileOutcome, Reconciler, ReconcilerError};
