//! # Cloud Profiles
//!
//! Resolves a named cloud against `clouds.yaml`, the same file OpenStack client
//! tooling reads.
//!
//! Search order (first existing file wins):
//! 1. `$OS_CLIENT_CONFIG_FILE`
//! 2. `./clouds.yaml`
//! 3. `$XDG_CONFIG_HOME/openstack/clouds.yaml` (or `~/.config/openstack/clouds.yaml`)
//! 4. `/etc/openstack/clouds.yaml`
//!
//! The special cloud name `envvars` builds a profile from `OS_*` environment
//! variables instead of reading any file.

use anyhow::{Context, Result};
use serde::Deserialize;
use std::collections::HashMap;
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Cloud name that is resolved from `OS_*` environment variables
pub const ENVVARS_CLOUD: &str = "envvars";

/// Top-level layout of `clouds.yaml`
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CloudsFile {
    #[serde(default)]
    pub clouds: HashMap<String, CloudConfig>,
}

/// Authentication plugin selected by `auth_type`
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
pub enum AuthType {
    #[default]
    #[serde(rename = "password", alias = "v3password")]
    Password,
    #[serde(rename = "v3applicationcredential")]
    ApplicationCredential,
    #[serde(rename = "token", alias = "v3token")]
    Token,
    /// No Keystone round-trip; requires `key_manager_endpoint_override`
    #[serde(rename = "none", alias = "noauth")]
    None,
}

/// One entry under `clouds:`
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CloudConfig {
    #[serde(default)]
    pub auth: AuthConfig,
    #[serde(default)]
    pub auth_type: AuthType,
    #[serde(default)]
    pub region_name: Option<String>,
    /// Catalog interface (public, internal, admin)
    #[serde(default)]
    pub interface: Option<String>,
    /// Use this Barbican endpoint instead of looking it up in the catalog
    #[serde(default)]
    pub key_manager_endpoint_override: Option<String>,
    /// Verify TLS certificates (defaults to true)
    #[serde(default)]
    pub verify: Option<bool>,
    /// Extra CA bundle (PEM) to trust
    #[serde(default)]
    pub cacert: Option<PathBuf>,
}

/// The `auth:` block of a cloud entry
#[derive(Clone, Default, Deserialize)]
pub struct AuthConfig {
    #[serde(default)]
    pub auth_url: Option<String>,
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub user_id: Option<String>,
    #[serde(default)]
    pub password: Option<String>,
    #[serde(default)]
    pub user_domain_name: Option<String>,
    #[serde(default)]
    pub user_domain_id: Option<String>,
    #[serde(default)]
    pub project_name: Option<String>,
    #[serde(default)]
    pub project_id: Option<String>,
    #[serde(default)]
    pub project_domain_name: Option<String>,
    #[serde(default)]
    pub project_domain_id: Option<String>,
    #[serde(default)]
    pub application_credential_id: Option<String>,
    #[serde(default)]
    pub application_credential_name: Option<String>,
    #[serde(default)]
    pub application_credential_secret: Option<String>,
    #[serde(default)]
    pub token: Option<String>,
}

impl std::fmt::Debug for AuthConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthConfig")
            .field("auth_url", &self.auth_url)
            .field("username", &self.username)
            .field("user_id", &self.user_id)
            .field("project_name", &self.project_name)
            .field("project_id", &self.project_id)
            .field("application_credential_id", &self.application_credential_id)
            .field("password", &self.password.as_ref().map(|_| "***"))
            .field(
                "application_credential_secret",
                &self.application_credential_secret.as_ref().map(|_| "***"),
            )
            .field("token", &self.token.as_ref().map(|_| "***"))
            .finish_non_exhaustive()
    }
}

impl CloudConfig {
    /// Build a profile from `OS_*` variables resolved through `env`
    ///
    /// Empty and non-UTF-8 values count as unset.
    pub fn from_env(env: impl Fn(&str) -> Option<OsString>) -> Self {
        let var = |key: &str| {
            env(key)
                .and_then(|v| v.into_string().ok())
                .filter(|v| !v.is_empty())
        };

        let auth_type = match var("OS_AUTH_TYPE").as_deref() {
            Some("v3applicationcredential") => AuthType::ApplicationCredential,
            Some("token" | "v3token") => AuthType::Token,
            Some("none" | "noauth") => AuthType::None,
            _ => AuthType::Password,
        };

        Self {
            auth: AuthConfig {
                auth_url: var("OS_AUTH_URL"),
                username: var("OS_USERNAME"),
                user_id: var("OS_USER_ID"),
                password: var("OS_PASSWORD"),
                user_domain_name: var("OS_USER_DOMAIN_NAME"),
                user_domain_id: var("OS_USER_DOMAIN_ID"),
                project_name: var("OS_PROJECT_NAME"),
                project_id: var("OS_PROJECT_ID"),
                project_domain_name: var("OS_PROJECT_DOMAIN_NAME"),
                project_domain_id: var("OS_PROJECT_DOMAIN_ID"),
                application_credential_id: var("OS_APPLICATION_CREDENTIAL_ID"),
                application_credential_name: var("OS_APPLICATION_CREDENTIAL_NAME"),
                application_credential_secret: var("OS_APPLICATION_CREDENTIAL_SECRET"),
                token: var("OS_TOKEN"),
            },
            auth_type,
            region_name: var("OS_REGION_NAME"),
            interface: var("OS_INTERFACE"),
            key_manager_endpoint_override: var("OS_KEY_MANAGER_ENDPOINT_OVERRIDE"),
            verify: None,
            cacert: var("OS_CACERT").map(PathBuf::from),
        }
    }

    /// Check that the profile carries what its auth type needs
    pub fn validate(&self, cloud: &str) -> Result<()> {
        if self.auth_type == AuthType::None {
            if self.key_manager_endpoint_override.is_none() {
                anyhow::bail!(
                    "Cloud '{cloud}' uses auth_type 'none' but sets no key_manager_endpoint_override"
                );
            }
            return Ok(());
        }

        if self.auth.auth_url.is_none() {
            anyhow::bail!("Cloud '{cloud}' has no auth.auth_url");
        }

        match self.auth_type {
            AuthType::Password => {
                if self.auth.password.is_none() {
                    anyhow::bail!("Cloud '{cloud}' uses password auth but has no auth.password");
                }
                if self.auth.username.is_none() && self.auth.user_id.is_none() {
                    anyhow::bail!(
                        "Cloud '{cloud}' uses password auth but has neither auth.username nor auth.user_id"
                    );
                }
            }
            AuthType::ApplicationCredential => {
                if self.auth.application_credential_secret.is_none() {
                    anyhow::bail!(
                        "Cloud '{cloud}' uses v3applicationcredential but has no auth.application_credential_secret"
                    );
                }
                if self.auth.application_credential_id.is_none()
                    && self.auth.application_credential_name.is_none()
                {
                    anyhow::bail!(
                        "Cloud '{cloud}' uses v3applicationcredential but has neither an id nor a name"
                    );
                }
            }
            AuthType::Token => {
                if self.auth.token.is_none() {
                    anyhow::bail!("Cloud '{cloud}' uses token auth but has no auth.token");
                }
            }
            AuthType::None => {}
        }

        Ok(())
    }
}

/// Paths `clouds.yaml` is looked up at, in priority order, with environment
/// variables resolved through `env`
pub fn candidate_paths(env: impl Fn(&str) -> Option<OsString>) -> Vec<PathBuf> {
    let mut paths = Vec::new();

    if let Some(explicit) = env("OS_CLIENT_CONFIG_FILE") {
        paths.push(PathBuf::from(explicit));
    }
    paths.push(PathBuf::from("clouds.yaml"));

    let config_home = env("XDG_CONFIG_HOME")
        .map(PathBuf::from)
        .or_else(|| env("HOME").map(|home| PathBuf::from(home).join(".config")));
    if let Some(config_home) = config_home {
        paths.push(config_home.join("openstack").join("clouds.yaml"));
    }
    paths.push(PathBuf::from("/etc/openstack/clouds.yaml"));

    paths
}

/// First entry of `paths` that is an existing regular file
pub fn find_clouds_file(paths: &[PathBuf]) -> Option<&Path> {
    paths.iter().map(PathBuf::as_path).find(|p| p.is_file())
}

/// Resolve `cloud` to a validated profile
pub fn load_cloud(cloud: &str) -> Result<CloudConfig> {
    load_cloud_with(cloud, |key| std::env::var_os(key))
}

/// [`load_cloud`] with environment variables resolved through `env`
pub fn load_cloud_with(cloud: &str, env: impl Fn(&str) -> Option<OsString>) -> Result<CloudConfig> {
    if cloud == ENVVARS_CLOUD {
        let config = CloudConfig::from_env(env);
        config.validate(cloud)?;
        return Ok(config);
    }

    let candidates = candidate_paths(env);
    let path = find_clouds_file(&candidates).ok_or_else(|| {
        anyhow::anyhow!(
            "No clouds.yaml found. Searched: {}",
            candidates
                .iter()
                .map(|p| p.display().to_string())
                .collect::<Vec<_>>()
                .join(", ")
        )
    })?;

    load_cloud_from(path, cloud)
}

/// Resolve `cloud` from a specific `clouds.yaml`
pub fn load_cloud_from(path: &Path, cloud: &str) -> Result<CloudConfig> {
    debug!("Reading cloud '{}' from {}", cloud, path.display());

    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;
    let file: CloudsFile = serde_yaml::from_str(&content)
        .with_context(|| format!("Failed to parse {}", path.display()))?;

    let config = file.clouds.get(cloud).cloned().ok_or_else(|| {
        let mut known: Vec<_> = file.clouds.keys().cloned().collect();
        known.sort();
        anyhow::anyhow!(
            "Cloud '{}' not found in {} (known clouds: {})",
            cloud,
            path.display(),
            known.join(", ")
        )
    })?;

    config.validate(cloud)?;
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    const CLOUDS_YAML: &str = r"
clouds:
  openstack:
    auth:
      auth_url: https://keystone.example.com:5000/v3
      username: deployer
      password: hunter2
      project_name: infra
      user_domain_name: Default
      project_domain_name: Default
    region_name: RegionOne
    interface: internal
  appcred:
    auth_type: v3applicationcredential
    auth:
      auth_url: https://keystone.example.com:5000/v3
      application_credential_id: abc123
      application_credential_secret: s3cr3t
  local:
    auth_type: none
    key_manager_endpoint_override: http://127.0.0.1:9311
  broken:
    auth:
      username: deployer
";

    fn write_clouds() -> tempfile::NamedTempFile {
        let mut file = tempfile::NamedTempFile::new().expect("temp file");
        file.write_all(CLOUDS_YAML.as_bytes()).expect("write clouds.yaml");
        file
    }

    #[test]
    fn test_load_password_cloud() {
        let file = write_clouds();
        let config = load_cloud_from(file.path(), "openstack").expect("cloud should load");
        assert_eq!(config.auth_type, AuthType::Password);
        assert_eq!(config.region_name.as_deref(), Some("RegionOne"));
        assert_eq!(config.interface.as_deref(), Some("internal"));
        assert_eq!(config.auth.project_name.as_deref(), Some("infra"));
    }

    #[test]
    fn test_load_application_credential_cloud() {
        let file = write_clouds();
        let config = load_cloud_from(file.path(), "appcred").expect("cloud should load");
        assert_eq!(config.auth_type, AuthType::ApplicationCredential);
        assert_eq!(config.auth.application_credential_id.as_deref(), Some("abc123"));
    }

    #[test]
    fn test_load_noauth_cloud() {
        let file = write_clouds();
        let config = load_cloud_from(file.path(), "local").expect("cloud should load");
        assert_eq!(config.auth_type, AuthType::None);
        assert_eq!(
            config.key_manager_endpoint_override.as_deref(),
            Some("http://127.0.0.1:9311")
        );
    }

    #[test]
    fn test_unknown_cloud_lists_known_names() {
        let file = write_clouds();
        let err = load_cloud_from(file.path(), "missing").unwrap_err();
        let msg = err.to_string();
        assert!(msg.contains("Cloud 'missing' not found"), "{msg}");
        assert!(msg.contains("appcred, broken, local, openstack"), "{msg}");
    }

    #[test]
    fn test_incomplete_cloud_is_rejected() {
        let file = write_clouds();
        let err = load_cloud_from(file.path(), "broken").unwrap_err();
        assert!(err.to_string().contains("has no auth.auth_url"));
    }

    #[test]
    fn test_noauth_requires_endpoint_override() {
        let config = CloudConfig {
            auth_type: AuthType::None,
            ..CloudConfig::default()
        };
        assert!(config.validate("bare").is_err());
    }

    fn fake_env(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<OsString> {
        let vars: HashMap<String, OsString> = vars
            .iter()
            .map(|(k, v)| ((*k).to_string(), OsString::from(*v)))
            .collect();
        move |key: &str| vars.get(key).cloned()
    }

    #[test]
    fn test_candidate_paths_order() {
        let paths = candidate_paths(fake_env(&[
            ("OS_CLIENT_CONFIG_FILE", "/srv/clouds.yaml"),
            ("XDG_CONFIG_HOME", "/xdg"),
            ("HOME", "/home/deployer"),
        ]));
        assert_eq!(
            paths,
            vec![
                PathBuf::from("/srv/clouds.yaml"),
                PathBuf::from("clouds.yaml"),
                PathBuf::from("/xdg/openstack/clouds.yaml"),
                PathBuf::from("/etc/openstack/clouds.yaml"),
            ]
        );
    }

    #[test]
    fn test_candidate_paths_fall_back_to_home_config() {
        let paths = candidate_paths(fake_env(&[("HOME", "/home/deployer")]));
        assert_eq!(
            paths,
            vec![
                PathBuf::from("clouds.yaml"),
                PathBuf::from("/home/deployer/.config/openstack/clouds.yaml"),
                PathBuf::from("/etc/openstack/clouds.yaml"),
            ]
        );

        let bare = candidate_paths(fake_env(&[]));
        assert_eq!(
            bare,
            vec![PathBuf::from("clouds.yaml"), PathBuf::from("/etc/openstack/clouds.yaml")]
        );
    }

    #[test]
    fn test_first_existing_clouds_file_wins() {
        let dir = tempfile::tempdir().expect("tempdir");
        let missing = dir.path().join("missing.yaml");
        let first = dir.path().join("first.yaml");
        let second = dir.path().join("second.yaml");
        std::fs::write(&first, CLOUDS_YAML).expect("write");
        std::fs::write(&second, CLOUDS_YAML).expect("write");

        let paths = vec![missing.clone(), dir.path().to_path_buf(), first.clone(), second];
        assert_eq!(find_clouds_file(&paths), Some(first.as_path()));
        assert_eq!(find_clouds_file(&[missing]), None);
    }

    #[test]
    fn test_explicit_config_file_beats_xdg() {
        let explicit = write_clouds();
        let xdg = tempfile::tempdir().expect("tempdir");
        std::fs::create_dir(xdg.path().join("openstack")).expect("mkdir");
        std::fs::write(
            xdg.path().join("openstack").join("clouds.yaml"),
            "clouds:\n  xdg-only:\n    auth_type: none\n    key_manager_endpoint_override: http://xdg:9311\n",
        )
        .expect("write");
        let explicit_path = explicit.path().to_str().expect("utf-8 path");
        let xdg_path = xdg.path().to_str().expect("utf-8 path");

        let env = fake_env(&[
            ("OS_CLIENT_CONFIG_FILE", explicit_path),
            ("XDG_CONFIG_HOME", xdg_path),
        ]);
        let config = load_cloud_with("local", &env).expect("cloud from explicit file");
        assert_eq!(
            config.key_manager_endpoint_override.as_deref(),
            Some("http://127.0.0.1:9311")
        );
        let err = load_cloud_with("xdg-only", &env).unwrap_err();
        assert!(err.to_string().contains("Cloud 'xdg-only' not found"), "{err}");
    }

    #[test]
    fn test_missing_clouds_file_lists_searched_paths() {
        let dir = tempfile::tempdir().expect("tempdir");
        let explicit = dir.path().join("nope.yaml");
        let env = fake_env(&[("OS_CLIENT_CONFIG_FILE", explicit.to_str().expect("utf-8 path"))]);

        if find_clouds_file(&candidate_paths(&env)).is_some() {
            // A clouds.yaml in the working directory or /etc shadows this case
            return;
        }
        let err = load_cloud_with("openstack", &env).unwrap_err();
        let msg = err.to_string();
        assert!(msg.starts_with("No clouds.yaml found. Searched: "), "{msg}");
        assert!(msg.contains(&explicit.display().to_string()), "{msg}");
        assert!(msg.contains("/etc/openstack/clouds.yaml"), "{msg}");
    }

    #[test]
    fn test_envvars_profile() {
        let env = fake_env(&[
            ("OS_AUTH_TYPE", "v3applicationcredential"),
            ("OS_AUTH_URL", "https://keystone.example.com:5000/v3"),
            ("OS_APPLICATION_CREDENTIAL_ID", "abc123"),
            ("OS_APPLICATION_CREDENTIAL_SECRET", "s3cr3t"),
            ("OS_REGION_NAME", "RegionTwo"),
            ("OS_INTERFACE", ""),
            ("OS_CACERT", "/etc/ssl/openstack.pem"),
        ]);

        let config = load_cloud_with(ENVVARS_CLOUD, &env).expect("envvars profile");
        assert_eq!(config.auth_type, AuthType::ApplicationCredential);
        assert_eq!(
            config.auth.auth_url.as_deref(),
            Some("https://keystone.example.com:5000/v3")
        );
        assert_eq!(config.auth.application_credential_id.as_deref(), Some("abc123"));
        assert_eq!(config.region_name.as_deref(), Some("RegionTwo"));
        assert_eq!(config.interface, None);
        assert_eq!(config.cacert, Some(PathBuf::from("/etc/ssl/openstack.pem")));
    }

    #[test]
    fn test_envvars_profile_is_validated() {
        let env = fake_env(&[
            ("OS_AUTH_URL", "https://keystone.example.com:5000/v3"),
            ("OS_USERNAME", "deployer"),
        ]);
        let err = load_cloud_with(ENVVARS_CLOUD, env).unwrap_err();
        assert!(err.to_string().contains("has no auth.password"), "{err}");
    }

    #[test]
    fn test_debug_redacts_credentials() {
        let auth = AuthConfig {
            password: Some("hunter2".to_string()),
            token: Some("gAAAA".to_string()),
            ..AuthConfig::default()
        };
        let rendered = format!("{auth:?}");
        assert!(!rendered.contains("hunter2"));
        assert!(!rendered.contains("gAAAA"));
    }
}
