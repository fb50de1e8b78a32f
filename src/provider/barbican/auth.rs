//! # Keystone Authentication
//!
//! Obtains a Keystone v3 token for a cloud profile and picks the key-manager
//! endpoint out of the returned service catalog.

use crate::config::{AuthConfig, AuthType, CloudConfig};
use crate::constants::{DEFAULT_ENDPOINT_INTERFACE, KEY_MANAGER_SERVICE_TYPE, SUBJECT_TOKEN_HEADER};
use crate::provider::common::OperationTracker;
use anyhow::{Context, Result};
use reqwest::Client;
use serde_json::{json, Value};
use tracing::{debug, field::Empty, info, info_span, Instrument};

use super::responses::{CatalogService, TokenResponse};

/// A scoped token and the catalog it came with
#[derive(Debug)]
pub struct Session {
    pub token: String,
    pub catalog: Vec<CatalogService>,
}

/// `{auth_url}/auth/tokens`, tolerating auth URLs with or without `/v3`
pub fn tokens_url(auth_url: &str) -> String {
    let base = auth_url.trim_end_matches('/');
    if base.ends_with("/v3") {
        format!("{base}/auth/tokens")
    } else {
        format!("{base}/v3/auth/tokens")
    }
}

fn domain(name: Option<&String>, id: Option<&String>) -> Value {
    match (id, name) {
        (Some(id), _) => json!({ "id": id }),
        (None, Some(name)) => json!({ "name": name }),
        // Keystone's built-in domain
        (None, None) => json!({ "id": "default" }),
    }
}

fn project_scope(auth: &AuthConfig) -> Option<Value> {
    if let Some(id) = &auth.project_id {
        return Some(json!({ "project": { "id": id } }));
    }
    auth.project_name.as_ref().map(|name| {
        json!({
            "project": {
                "name": name,
                "domain": domain(auth.project_domain_name.as_ref(), auth.project_domain_id.as_ref()),
            }
        })
    })
}

/// Build the `POST /auth/tokens` body for a profile
pub fn token_request_body(auth_type: AuthType, auth: &AuthConfig) -> Result<Value> {
    let mut body = match auth_type {
        AuthType::Password => {
            let user = match (&auth.user_id, &auth.username) {
                (Some(id), _) => json!({ "id": id, "password": auth.password }),
                (None, Some(name)) => json!({
                    "name": name,
                    "password": auth.password,
                    "domain": domain(auth.user_domain_name.as_ref(), auth.user_domain_id.as_ref()),
                }),
                (None, None) => anyhow::bail!("Password auth needs a username or user_id"),
            };
            json!({
                "auth": {
                    "identity": {
                        "methods": ["password"],
                        "password": { "user": user }
                    }
                }
            })
        }
        AuthType::ApplicationCredential => {
            let credential = match (&auth.application_credential_id, &auth.application_credential_name) {
                (Some(id), _) => json!({ "id": id, "secret": auth.application_credential_secret }),
                (None, Some(name)) => {
                    let user = match (&auth.user_id, &auth.username) {
                        (Some(id), _) => json!({ "id": id }),
                        (None, Some(username)) => json!({
                            "name": username,
                            "domain": domain(auth.user_domain_name.as_ref(), auth.user_domain_id.as_ref()),
                        }),
                        (None, None) => anyhow::bail!(
                            "Application credential '{name}' is looked up by name and needs a username or user_id"
                        ),
                    };
                    json!({ "name": name, "secret": auth.application_credential_secret, "user": user })
                }
                (None, None) => anyhow::bail!("Application credential auth needs an id or a name"),
            };
            // Application credentials carry their own scope
            return Ok(json!({
                "auth": {
                    "identity": {
                        "methods": ["application_credential"],
                        "application_credential": credential
                    }
                }
            }));
        }
        AuthType::Token => json!({
            "auth": {
                "identity": {
                    "methods": ["token"],
                    "token": { "id": auth.token }
                }
            }
        }),
        AuthType::None => anyhow::bail!("auth_type 'none' does not talk to Keystone"),
    };

    if let Some(scope) = project_scope(auth) {
        body["auth"]["scope"] = scope;
    }
    Ok(body)
}

/// Authenticate against Keystone
pub async fn authenticate(http_client: &Client, cloud: &CloudConfig) -> Result<Session> {
    let auth_url = cloud
        .auth
        .auth_url
        .as_deref()
        .ok_or_else(|| anyhow::anyhow!("Cloud profile has no auth_url"))?;
    let url = tokens_url(auth_url);
    let body = token_request_body(cloud.auth_type, &cloud.auth)?;

    let span = info_span!(
        "keystone.authenticate",
        auth.url = %url,
        operation.success = Empty,
        operation.duration_ms = Empty,
        error.message = Empty
    );

    async {
        let tracker = OperationTracker::new("authenticate", tracing::Span::current());

        debug!("Requesting Keystone token from {}", url);
        let response = match http_client.post(&url).json(&body).send().await {
            Ok(response) => response,
            Err(e) => {
                tracker.record_error(&e.to_string());
                return Err(e).with_context(|| format!("Failed to reach Keystone at {url}"));
            }
        };

        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            tracker.record_error(&error_text);
            anyhow::bail!(
                "Keystone authentication failed: HTTP {} (status: {}): {}",
                status.as_u16(),
                status,
                error_text
            );
        }

        let Some(token) = response
            .headers()
            .get(SUBJECT_TOKEN_HEADER)
            .and_then(|v| v.to_str().ok())
            .map(ToString::to_string)
        else {
            let message = format!("Keystone response carried no {SUBJECT_TOKEN_HEADER} header");
            tracker.record_error(&message);
            anyhow::bail!(message);
        };

        let token_response: TokenResponse = tracker.track(
            response.json().await,
            "Failed to parse Keystone token response",
        )?;

        tracker.record_success();
        info!("Authenticated against Keystone at {}", auth_url);
        Ok(Session {
            token,
            catalog: token_response.token.catalog,
        })
    }
    .instrument(span)
    .await
}

/// Pick the key-manager URL from a catalog
pub fn key_manager_endpoint(
    catalog: &[CatalogService],
    interface: Option<&str>,
    region: Option<&str>,
) -> Result<String> {
    let interface = interface.unwrap_or(DEFAULT_ENDPOINT_INTERFACE);
    // Accept both "public" and the older "publicURL" spelling
    let interface = interface.trim_end_matches("URL");

    let service = catalog
        .iter()
        .find(|s| s.service_type == KEY_MANAGER_SERVICE_TYPE)
        .ok_or_else(|| {
            anyhow::anyhow!("No '{KEY_MANAGER_SERVICE_TYPE}' service in the Keystone catalog")
        })?;

    service
        .endpoints
        .iter()
        .filter(|e| e.interface == interface)
        .find(|e| match region {
            Some(r) => e.in_region(r),
            None => true,
        })
        .map(|e| e.url.clone())
        .ok_or_else(|| {
            anyhow::anyhow!(
                "No {} '{}' endpoint{} in the Keystone catalog",
                KEY_MANAGER_SERVICE_TYPE,
                interface,
                region.map(|r| format!(" in region {r}")).unwrap_or_default()
            )
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provider::barbican::responses::CatalogEndpoint;

    fn catalog() -> Vec<CatalogService> {
        vec![
            CatalogService {
                service_type: "identity".to_string(),
                endpoints: vec![],
            },
            CatalogService {
                service_type: "key-manager".to_string(),
                endpoints: vec![
                    CatalogEndpoint {
                        interface: "public".to_string(),
                        region_id: Some("RegionOne".to_string()),
                        region: Some("RegionOne".to_string()),
                        url: "https://kms.one.example.com:9311".to_string(),
                    },
                    CatalogEndpoint {
                        interface: "internal".to_string(),
                        region_id: Some("RegionOne".to_string()),
                        region: None,
                        url: "http://10.0.0.5:9311".to_string(),
                    },
                    CatalogEndpoint {
                        interface: "public".to_string(),
                        region_id: Some("RegionTwo".to_string()),
                        region: None,
                        url: "https://kms.two.example.com:9311".to_string(),
                    },
                ],
            },
        ]
    }

    #[test]
    fn test_tokens_url() {
        assert_eq!(
            tokens_url("https://keystone:5000/v3/"),
            "https://keystone:5000/v3/auth/tokens"
        );
        assert_eq!(
            tokens_url("https://keystone:5000"),
            "https://keystone:5000/v3/auth/tokens"
        );
    }

    #[test]
    fn test_endpoint_by_interface_and_region() {
        let catalog = catalog();
        assert_eq!(
            key_manager_endpoint(&catalog, None, None).expect("endpoint"),
            "https://kms.one.example.com:9311"
        );
        assert_eq!(
            key_manager_endpoint(&catalog, Some("internal"), None).expect("endpoint"),
            "http://10.0.0.5:9311"
        );
        assert_eq!(
            key_manager_endpoint(&catalog, Some("publicURL"), Some("RegionTwo")).expect("endpoint"),
            "https://kms.two.example.com:9311"
        );
    }

    #[test]
    fn test_missing_endpoint() {
        let err = key_manager_endpoint(&catalog(), Some("admin"), None).unwrap_err();
        assert!(err.to_string().contains("No key-manager 'admin' endpoint"));

        let err = key_manager_endpoint(&[], None, None).unwrap_err();
        assert!(err.to_string().contains("No 'key-manager' service"));
    }

    #[test]
    fn test_password_body_with_project_scope() {
        let auth = AuthConfig {
            username: Some("deployer".to_string()),
            password: Some("hunter2".to_string()),
            user_domain_name: Some("Default".to_string()),
            project_name: Some("infra".to_string()),
            ..AuthConfig::default()
        };
        let body = token_request_body(AuthType::Password, &auth).expect("body");
        assert_eq!(body["auth"]["identity"]["methods"], json!(["password"]));
        assert_eq!(
            body["auth"]["identity"]["password"]["user"]["domain"],
            json!({ "name": "Default" })
        );
        assert_eq!(body["auth"]["scope"]["project"]["name"], "infra");
        assert_eq!(
            body["auth"]["scope"]["project"]["domain"],
            json!({ "id": "default" })
        );
    }

    #[test]
    fn test_application_credential_body_is_unscoped() {
        let auth = AuthConfig {
            application_credential_id: Some("abc123".to_string()),
            application_credential_secret: Some("s3cr3t".to_string()),
            project_name: Some("ignored".to_string()),
            ..AuthConfig::default()
        };
        let body = token_request_body(AuthType::ApplicationCredential, &auth).expect("body");
        assert_eq!(
            body["auth"]["identity"]["application_credential"],
            json!({ "id": "abc123", "secret": "s3cr3t" })
        );
        assert!(body["auth"].get("scope").is_none());
    }

    #[test]
    fn test_noauth_has_no_body() {
        assert!(token_request_body(AuthType::None, &AuthConfig::default()).is_err());
    }
}
