//! # Request Types
//!
//! Barbican REST API request structures.
//!
//! API Reference: https://docs.openstack.org/barbican/latest/api/reference/secrets.html

use crate::constants::{
    CONTENT_ENCODING_BASE64, CONTENT_TYPE_BINARY, CONTENT_TYPE_TEXT, DEFAULT_SECRET_MODE,
};
use crate::provider::Payload;
use serde::Serialize;
use zeroize::Zeroize;

/// Request body for `POST /v1/secrets`
///
/// Text payloads travel as-is with `text/plain`. Anything that is not valid
/// UTF-8 is base64-encoded and stored as `application/octet-stream`, which is
/// the only way Barbican accepts binary data in a single-step create.
/// The serialized payload copy is wiped on drop.
#[derive(Serialize)]
pub struct CreateSecretRequest {
    pub name: String,
    pub payload: String,
    pub payload_content_type: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub payload_content_encoding: Option<&'static str>,
    pub mode: &'static str,
}

impl CreateSecretRequest {
    pub fn new(name: &str, payload: &Payload) -> Self {
        let (payload, payload_content_type, payload_content_encoding) = match payload.as_text() {
            Some(text) => (text.to_string(), CONTENT_TYPE_TEXT, None),
            None => (
                payload.to_base64(),
                CONTENT_TYPE_BINARY,
                Some(CONTENT_ENCODING_BASE64),
            ),
        };

        Self {
            name: name.to_string(),
            payload,
            payload_content_type,
            payload_content_encoding,
            mode: DEFAULT_SECRET_MODE,
        }
    }
}

impl Drop for CreateSecretRequest {
    fn drop(&mut self) {
        self.payload.zeroize();
    }
}

impl std::fmt::Debug for CreateSecretRequest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CreateSecretRequest")
            .field("name", &self.name)
            .field("payload_content_type", &self.payload_content_type)
            .field("payload_content_encoding", &self.payload_content_encoding)
            .field("mode", &self.mode)
            .finish_non_exhaustive()
    }
}
