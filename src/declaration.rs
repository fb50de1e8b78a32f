//! # Declaration
//!
//! The desired state of one secret, as given on the command line or in a
//! params file.
//!
//! A `Declaration` is the raw, user-facing form (literal value, `src` path,
//! cloud name). `into_desired_state` reads `src` and yields the
//! `DesiredState` the reconciler acts on.

use crate::constants::DEFAULT_CLOUD;
use crate::provider::Payload;
use crate::reconciler::ReconcilerError;
use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Whether the secret should exist
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum SecretState {
    #[default]
    Present,
    Absent,
}

/// What to do when a secret with the requested name already exists
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum OverwriteMode {
    /// Delete every existing match and create a fresh secret
    Force,
    /// Refuse to touch an existing secret
    Fail,
    /// Keep the existing secret and return its value
    #[default]
    Ignore,
}

impl OverwriteMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            OverwriteMode::Force => "force",
            OverwriteMode::Fail => "fail",
            OverwriteMode::Ignore => "ignore",
        }
    }
}

/// What the reconciler is asked to converge to
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DesiredState {
    pub name: String,
    pub state: SecretState,
    pub value: Option<Payload>,
    pub overwrite_mode: OverwriteMode,
    /// Where to write the resolved value; ignored for `absent`
    pub dest: Option<PathBuf>,
}

impl DesiredState {
    pub fn present(name: impl Into<String>, value: Option<Payload>, overwrite_mode: OverwriteMode) -> Self {
        Self {
            name: name.into(),
            state: SecretState::Present,
            value,
            overwrite_mode,
            dest: None,
        }
    }

    pub fn absent(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            state: SecretState::Absent,
            value: None,
            overwrite_mode: OverwriteMode::default(),
            dest: None,
        }
    }

    #[must_use]
    pub fn with_dest(mut self, dest: impl Into<PathBuf>) -> Self {
        self.dest = Some(dest.into());
        self
    }
}

/// Declaration as read from a params file
///
/// Every field is optional so that command-line flags can fill or override
/// any of them; `name` is checked once both sources are merged.
#[derive(Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Declaration {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub state: Option<SecretState>,
    #[serde(default)]
    pub value: Option<String>,
    #[serde(default)]
    pub src: Option<PathBuf>,
    #[serde(default)]
    pub dest: Option<PathBuf>,
    #[serde(default)]
    pub overwrite_mode: Option<OverwriteMode>,
    #[serde(default)]
    pub cloud: Option<String>,
}

impl std::fmt::Debug for Declaration {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Declaration")
            .field("name", &self.name)
            .field("state", &self.state)
            .field("value", &self.value.as_ref().map(|_| "***"))
            .field("src", &self.src)
            .field("dest", &self.dest)
            .field("overwrite_mode", &self.overwrite_mode)
            .field("cloud", &self.cloud)
            .finish()
    }
}

impl Declaration {
    /// Load a params file; `.json` is parsed as JSON, anything else as YAML
    pub fn from_file(path: &Path) -> Result<Self> {
        debug!("Reading params file {}", path.display());
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read params file {}", path.display()))?;

        let is_json = path
            .extension()
            .is_some_and(|ext| ext.eq_ignore_ascii_case("json"));
        if is_json {
            serde_json::from_str(&content)
                .with_context(|| format!("Failed to parse params file {}", path.display()))
        } else {
            serde_yaml::from_str(&content)
                .with_context(|| format!("Failed to parse params file {}", path.display()))
        }
    }

    /// Fields set in `overrides` win over fields set here
    #[must_use]
    pub fn merge(self, overrides: Declaration) -> Self {
        Self {
            name: overrides.name.or(self.name),
            state: overrides.state.or(self.state),
            value: overrides.value.or(self.value),
            src: overrides.src.or(self.src),
            dest: overrides.dest.or(self.dest),
            overwrite_mode: overrides.overwrite_mode.or(self.overwrite_mode),
            cloud: overrides.cloud.or(self.cloud),
        }
    }

    /// Cloud profile to connect with
    pub fn cloud(&self) -> &str {
        self.cloud.as_deref().unwrap_or(DEFAULT_CLOUD)
    }

    /// Resolve into a desired state, reading `src` if given
    ///
    /// The contents of `src` replace any literal `value`.
    ///
    /// # Errors
    /// Fails when `name` is missing or empty, or `src` cannot be read.
    pub fn into_desired_state(self) -> Result<DesiredState> {
        let name = self
            .name
            .filter(|n| !n.is_empty())
            .ok_or_else(|| anyhow::anyhow!("missing required argument: name"))?;

        let value = match &self.src {
            Some(src) => Some(read_source(src)?),
            None => self.value.map(Payload::from),
        };

        Ok(DesiredState {
            name,
            state: self.state.unwrap_or_default(),
            value,
            overwrite_mode: self.overwrite_mode.unwrap_or_default(),
            dest: self.dest,
        })
    }
}

/// Read a source file's bytes as a secret value
pub fn read_source(src: &Path) -> Result<Payload, ReconcilerError> {
    std::fs::read(src).map(Payload::new).map_err(|e| {
        ReconcilerError::io(format!("Unable to open source file '{}'", src.display()), e)
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_defaults() {
        let desired = Declaration {
            name: Some("db-pass".to_string()),
            ..Declaration::default()
        }
        .into_desired_state()
        .expect("valid");

        assert_eq!(desired.state, SecretState::Present);
        assert_eq!(desired.overwrite_mode, OverwriteMode::Ignore);
        assert!(desired.value.is_none());
        assert!(desired.dest.is_none());
    }

    #[test]
    fn test_name_is_required() {
        let err = Declaration::default().into_desired_state().unwrap_err();
        assert!(err.to_string().contains("name"));

        let err = Declaration {
            name: Some(String::new()),
            ..Declaration::default()
        }
        .into_desired_state()
        .unwrap_err();
        assert!(err.to_string().contains("name"));
    }

    #[test]
    fn test_src_wins_over_value() {
        let mut src = tempfile::NamedTempFile::new().expect("tempfile");
        src.write_all(b"from-file").expect("write");

        let desired = Declaration {
            name: Some("db-pass".to_string()),
            value: Some("literal".to_string()),
            src: Some(src.path().to_path_buf()),
            ..Declaration::default()
        }
        .into_desired_state()
        .expect("valid");

        assert_eq!(desired.value, Some(Payload::from("from-file")));
    }

    #[test]
    fn test_unreadable_src() {
        let err = Declaration {
            name: Some("db-pass".to_string()),
            src: Some(PathBuf::from("/definitely/not/here")),
            ..Declaration::default()
        }
        .into_desired_state()
        .unwrap_err();

        let err = err.downcast::<ReconcilerError>().expect("reconciler error");
        assert_eq!(err.kind(), "io");
        assert!(err
            .to_string()
            .starts_with("Unable to open source file '/definitely/not/here'"));
    }

    #[test]
    fn test_yaml_params_file_and_override() {
        let mut file = tempfile::Builder::new()
            .suffix(".yaml")
            .tempfile()
            .expect("tempfile");
        writeln!(
            file,
            "name: db-pass\nstate: absent\noverwrite_mode: force\ncloud: staging"
        )
        .expect("write");

        let declaration = Declaration::from_file(file.path()).expect("parse");
        assert_eq!(declaration.cloud(), "staging");

        let merged = declaration.merge(Declaration {
            state: Some(SecretState::Present),
            value: Some("s3cr3t".to_string()),
            ..Declaration::default()
        });
        let desired = merged.into_desired_state().expect("valid");
        assert_eq!(desired.state, SecretState::Present);
        assert_eq!(desired.overwrite_mode, OverwriteMode::Force);
        assert_eq!(desired.value, Some(Payload::from("s3cr3t")));
    }

    #[test]
    fn test_json_params_file_rejects_unknown_fields() {
        let mut file = tempfile::Builder::new()
            .suffix(".json")
            .tempfile()
            .expect("tempfile");
        write!(file, r#"{{"name": "db-pass", "overwrite": "force"}}"#).expect("write");

        assert!(Declaration::from_file(file.path()).is_err());
    }

    #[test]
    fn test_debug_hides_value() {
        let declaration = Declaration {
            value: Some("s3cr3t".to_string()),
            ..Declaration::default()
        };
        assert!(!format!("{declaration:?}").contains("s3cr3t"));
        assert_eq!(Declaration::default().cloud(), "openstack");
    }
}
