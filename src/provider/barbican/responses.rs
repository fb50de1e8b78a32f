//! # Response Types
//!
//! Barbican and Keystone REST API response structures.

use serde::Deserialize;
use std::collections::HashMap;

/// One page of `GET /v1/secrets`
#[derive(Debug, Deserialize)]
pub struct SecretListResponse {
    #[serde(default)]
    pub secrets: Vec<SecretMetadata>,
    /// Total number of secrets across all pages
    #[serde(default)]
    #[allow(dead_code, reason = "Required for deserialization but not used")]
    pub total: Option<u64>,
    /// Link to the following page; absent on the last page
    #[serde(default)]
    pub next: Option<String>,
}

/// Secret metadata as returned by list and `GET /v1/secrets/{uuid}`
#[derive(Debug, Deserialize)]
pub struct SecretMetadata {
    #[serde(default)]
    pub name: Option<String>,
    pub secret_ref: String,
    /// Maps `default` to the content type the payload was stored with
    #[serde(default)]
    pub content_types: Option<HashMap<String, String>>,
    #[serde(default)]
    #[allow(dead_code, reason = "Required for deserialization but not used")]
    pub status: Option<String>,
}

impl SecretMetadata {
    /// Content type to request the payload with
    pub fn default_content_type(&self) -> Option<&str> {
        self.content_types
            .as_ref()
            .and_then(|types| types.get("default"))
            .map(String::as_str)
    }
}

/// Response of `POST /v1/secrets`
#[derive(Debug, Deserialize)]
pub struct CreateSecretResponse {
    pub secret_ref: String,
}

/// Barbican error body
///
/// Example: `{"code": 404, "title": "Not Found", "description": "Secret not found."}`
#[derive(Debug, Deserialize)]
pub struct BarbicanErrorResponse {
    pub code: u16,
    pub title: String,
    #[serde(default)]
    pub description: String,
}

/// Body of a Keystone v3 `POST /auth/tokens` response (only what we read)
#[derive(Debug, Deserialize)]
pub struct TokenResponse {
    pub token: TokenBody,
}

#[derive(Debug, Deserialize)]
pub struct TokenBody {
    #[serde(default)]
    pub catalog: Vec<CatalogService>,
}

/// One service in the Keystone catalog
#[derive(Debug, Deserialize)]
pub struct CatalogService {
    #[serde(rename = "type")]
    pub service_type: String,
    #[serde(default)]
    pub endpoints: Vec<CatalogEndpoint>,
}

#[derive(Debug, Deserialize)]
pub struct CatalogEndpoint {
    pub interface: String,
    #[serde(default)]
    pub region_id: Option<String>,
    #[serde(default)]
    pub region: Option<String>,
    pub url: String,
}

impl CatalogEndpoint {
    pub fn in_region(&self, region: &str) -> bool {
        self.region_id.as_deref() == Some(region) || self.region.as_deref() == Some(region)
    }
}
