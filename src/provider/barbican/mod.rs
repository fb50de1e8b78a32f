//! # Barbican Client
//!
//! Client for the OpenStack key-manager (Barbican) v1 REST API.
//!
//! This module provides functionality to:
//! - Authenticate with Keystone and discover the key-manager endpoint
//! - List secrets page by page
//! - Create, delete and read secret payloads
//!
//! References:
//! - [Barbican Secrets API](https://docs.openstack.org/barbican/latest/api/reference/secrets.html)
//! - [Keystone v3 Authentication](https://docs.openstack.org/api-ref/identity/v3/#authentication-and-token-management)
//! - API endpoints: `/v1/secrets`, `/v1/secrets/{uuid}`, `/v1/secrets/{uuid}/payload`

mod auth;
mod operations;
mod requests;
mod responses;

use crate::config::{AuthType, CloudConfig, ToolConfig};
use crate::constants::AUTH_TOKEN_HEADER;
use anyhow::{Context, Result};
use reqwest::{Client, Method};
use tracing::info;

pub use auth::{key_manager_endpoint, token_request_body, tokens_url};
use responses::BarbicanErrorResponse;

/// Barbican REST client
pub struct BarbicanREST {
    http_client: Client,
    /// Key-manager root, without trailing `/` or `/v1`
    endpoint: String,
    /// Keystone token; `None` for `auth_type: none`
    token: Option<String>,
    page_size: u32,
}

impl std::fmt::Debug for BarbicanREST {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BarbicanREST")
            .field("endpoint", &self.endpoint)
            .field("authenticated", &self.token.is_some())
            .field("page_size", &self.page_size)
            .finish_non_exhaustive()
    }
}

impl BarbicanREST {
    /// Authenticate with the cloud profile and resolve the key-manager endpoint
    ///
    /// `key_manager_endpoint_override` wins over the catalog. With
    /// `auth_type: none` no Keystone call is made and the override is required.
    ///
    /// # Errors
    /// Returns an error if the HTTP client cannot be built, Keystone rejects
    /// the credentials, or no key-manager endpoint can be found.
    pub async fn connect(cloud: &CloudConfig, config: &ToolConfig) -> Result<Self> {
        let http_client = build_http_client(cloud, config)?;

        let (endpoint, token) = if cloud.auth_type == AuthType::None {
            let endpoint = cloud.key_manager_endpoint_override.clone().ok_or_else(|| {
                anyhow::anyhow!("auth_type 'none' requires key_manager_endpoint_override")
            })?;
            info!("Using unauthenticated key-manager endpoint {}", endpoint);
            (endpoint, None)
        } else {
            let session = auth::authenticate(&http_client, cloud).await?;
            let endpoint = match &cloud.key_manager_endpoint_override {
                Some(endpoint) => endpoint.clone(),
                None => key_manager_endpoint(
                    &session.catalog,
                    cloud.interface.as_deref(),
                    cloud.region_name.as_deref(),
                )?,
            };
            (endpoint, Some(session.token))
        };

        info!("Initializing Barbican REST client for endpoint: {}", endpoint);
        Ok(Self::from_parts(http_client, &endpoint, token, config.list_page_size))
    }

    /// Client for a known endpoint and token, skipping Keystone
    ///
    /// # Errors
    /// Returns an error if the HTTP client cannot be built.
    pub fn with_endpoint(
        endpoint: &str,
        token: Option<String>,
        config: &ToolConfig,
    ) -> Result<Self> {
        let http_client = Client::builder()
            .timeout(config.http_timeout())
            .build()
            .context("Failed to create HTTP client")?;
        Ok(Self::from_parts(http_client, endpoint, token, config.list_page_size))
    }

    fn from_parts(http_client: Client, endpoint: &str, token: Option<String>, page_size: u32) -> Self {
        Self {
            http_client,
            endpoint: normalize_endpoint(endpoint),
            token,
            page_size,
        }
    }

    /// Get endpoint (for testing)
    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    /// `{endpoint}/v1/{path}`
    fn url(&self, path: &str) -> String {
        format!("{}/v1/{}", self.endpoint, path.trim_start_matches('/'))
    }

    /// Start a request to an absolute URL, adding the auth token if any
    fn make_request(&self, method: Method, url: &str) -> reqwest::RequestBuilder {
        let request = self.http_client.request(method, url);
        match &self.token {
            Some(token) => request.header(AUTH_TOKEN_HEADER, token),
            None => request,
        }
    }

    /// Turn a non-success response into an error carrying the status code
    fn handle_error_response(&self, status: reqwest::StatusCode, error_text: &str) -> anyhow::Error {
        match serde_json::from_str::<BarbicanErrorResponse>(error_text) {
            Ok(body) => anyhow::anyhow!(
                "HTTP {} (status: {}): {}: {}",
                body.code,
                status,
                body.title,
                body.description
            ),
            Err(_) => anyhow::anyhow!(
                "HTTP {} (status: {}): {}",
                status.as_u16(),
                status,
                error_text
            ),
        }
    }
}

/// Strip a trailing `/` and a version suffix so paths can always add `/v1`
fn normalize_endpoint(endpoint: &str) -> String {
    let trimmed = endpoint.trim_end_matches('/');
    trimmed
        .strip_suffix("/v1")
        .unwrap_or(trimmed)
        .to_string()
}

fn build_http_client(cloud: &CloudConfig, config: &ToolConfig) -> Result<Client> {
    let mut builder = Client::builder().timeout(config.http_timeout());

    if cloud.verify == Some(false) {
        builder = builder.danger_accept_invalid_certs(true);
    }

    if let Some(cacert) = &cloud.cacert {
        let pem = std::fs::read(cacert)
            .with_context(|| format!("Failed to read CA bundle {}", cacert.display()))?;
        let certificates = reqwest::Certificate::from_pem_bundle(&pem)
            .with_context(|| format!("Failed to parse CA bundle {}", cacert.display()))?;
        for certificate in certificates {
            builder = builder.add_root_certificate(certificate);
        }
    }

    builder.build().context("Failed to create HTTP client")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_endpoint() {
        assert_eq!(normalize_endpoint("https://kms:9311"), "https://kms:9311");
        assert_eq!(normalize_endpoint("https://kms:9311/"), "https://kms:9311");
        assert_eq!(normalize_endpoint("https://kms:9311/v1/"), "https://kms:9311");
        assert_eq!(
            normalize_endpoint("https://cloud.example.com/key-manager/v1"),
            "https://cloud.example.com/key-manager"
        );
    }

    #[test]
    fn test_error_response_uses_barbican_body() {
        let client = BarbicanREST::with_endpoint("http://kms", None, &ToolConfig::default())
            .expect("client");
        let err = client.handle_error_response(
            reqwest::StatusCode::NOT_FOUND,
            r#"{"code": 404, "title": "Not Found", "description": "Secret not found."}"#,
        );
        assert_eq!(
            err.to_string(),
            "HTTP 404 (status: 404 Not Found): Not Found: Secret not found."
        );

        let err = client.handle_error_response(reqwest::StatusCode::BAD_GATEWAY, "upstream down");
        assert_eq!(
            err.to_string(),
            "HTTP 502 (status: 502 Bad Gateway): upstream down"
        );
    }

    #[test]
    fn test_debug_hides_token() {
        let client = BarbicanREST::with_endpoint(
            "http://kms",
            Some("gAAAAAB-token".to_string()),
            &ToolConfig::default(),
        )
        .expect("client");
        let debug = format!("{client:?}");
        assert!(!debug.contains("gAAAAAB"));
        assert!(debug.contains("authenticated: true"));
    }

    #[tokio::test]
    async fn test_noauth_requires_override() {
        let cloud = CloudConfig {
            auth_type: AuthType::None,
            ..CloudConfig::default()
        };
        let err = BarbicanREST::connect(&cloud, &ToolConfig::default())
            .await
            .unwrap_err();
        assert!(err.to_string().contains("key_manager_endpoint_override"));
    }
}
