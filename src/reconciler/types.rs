//! # Types
//!
//! Core types for the reconciler.

use crate::provider::Payload;
use serde::ser::SerializeMap;
use serde::{Serialize, Serializer};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ReconcilerError {
    #[error("A secret with key '{0}' already exists.")]
    AlreadyExists(String),

    #[error("{}", missing_value_message(.name, *.secret_absent))]
    MissingValue { name: String, secret_absent: bool },

    #[error("A secret with key '{0}' does not exist.")]
    NotFound(String),

    /// Temp, destination or source file failure
    #[error("{message}")]
    Io {
        message: String,
        #[source]
        source: Option<std::io::Error>,
    },

    #[error("Key-manager call failed: {0:#}")]
    RemoteCall(#[from] anyhow::Error),
}

fn missing_value_message(name: &str, secret_absent: bool) -> String {
    if secret_absent {
        format!("Value for '{name}' has not been provided and secret does not exist.")
    } else {
        format!("Value for '{name}' has not been provided.")
    }
}

impl ReconcilerError {
    /// Stable label for logs and metrics
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            ReconcilerError::AlreadyExists(_) => "already_exists",
            ReconcilerError::MissingValue { .. } => "missing_value",
            ReconcilerError::NotFound(_) => "not_found",
            ReconcilerError::Io { .. } => "io",
            ReconcilerError::RemoteCall(_) => "remote_call",
        }
    }

    pub(crate) fn io(message: impl Into<String>, source: std::io::Error) -> Self {
        let message = message.into();
        ReconcilerError::Io {
            message: format!("{message}: {source}"),
            source: Some(source),
        }
    }

    pub(crate) fn io_message(message: impl Into<String>) -> Self {
        ReconcilerError::Io {
            message: message.into(),
            source: None,
        }
    }
}

/// Result of one reconciliation
///
/// Serializes as `{"changed": ..., "secret_value": ...}`. A payload that is
/// not UTF-8 is emitted base64-encoded with `"secret_value_encoding": "base64"`.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ReconcileOutcome {
    pub changed: bool,
    pub secret_value: Payload,
}

impl ReconcileOutcome {
    pub fn new(changed: bool, secret_value: Payload) -> Self {
        Self {
            changed,
            secret_value,
        }
    }
}

impl Serialize for ReconcileOutcome {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self.secret_value.as_text() {
            Some(text) => {
                let mut map = serializer.serialize_map(Some(2))?;
                map.serialize_entry("changed", &self.changed)?;
                map.serialize_entry("secret_value", text)?;
                map.end()
            }
            None => {
                let mut map = serializer.serialize_map(Some(3))?;
                map.serialize_entry("changed", &self.changed)?;
                map.serialize_entry("secret_value", &self.secret_value.to_base64())?;
                map.serialize_entry("secret_value_encoding", "base64")?;
                map.end()
            }
        }
    }
}
