//! # Secret Operations
//!
//! Implementation of `KeyManagerProvider` for the Barbican REST API.

use crate::constants::CONTENT_TYPE_TEXT;
use crate::provider::common::OperationTracker;
use crate::provider::{KeyManagerProvider, Payload, SecretEntry, SecretRef};
use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::header::ACCEPT;
use reqwest::Method;
use tracing::{debug, field::Empty, info, info_span, Instrument};

use super::requests::CreateSecretRequest;
use super::responses::{CreateSecretResponse, SecretListResponse, SecretMetadata};
use super::BarbicanREST;

impl BarbicanREST {
    /// Send a request and fail on any non-success status
    async fn send_checked(
        &self,
        request: reqwest::RequestBuilder,
        tracker: &OperationTracker,
        what: &str,
    ) -> Result<reqwest::Response> {
        let response = match request.send().await {
            Ok(response) => response,
            Err(e) => {
                tracker.record_error(&e.to_string());
                return Err(e).with_context(|| format!("Failed to {what}"));
            }
        };

        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let error_text = response.text().await.unwrap_or_default();
        tracker.record_error(&error_text);
        Err(self
            .handle_error_response(status, &error_text)
            .context(format!("Failed to {what}")))
    }

    async fn list_page(&self, offset: u64, tracker: &OperationTracker) -> Result<SecretListResponse> {
        let request = self
            .make_request(Method::GET, &self.url("secrets"))
            .query(&[("limit", u64::from(self.page_size)), ("offset", offset)]);

        let response = self
            .send_checked(request, tracker, "list Barbican secrets")
            .await?;
        tracker.track(response.json().await, "Failed to parse Barbican secret list")
    }
}

#[async_trait]
impl KeyManagerProvider for BarbicanREST {
    async fn list_secrets(&self) -> Result<Vec<SecretEntry>> {
        let span = info_span!(
            "barbican.secret.list",
            page.size = self.page_size,
            secrets.count = Empty,
            operation.success = Empty,
            operation.duration_ms = Empty,
            error.message = Empty
        );

        async {
            let tracker = OperationTracker::new("list", tracing::Span::current());
            let mut entries = Vec::new();
            let mut offset: u64 = 0;

            loop {
                let page = self.list_page(offset, &tracker).await?;
                let fetched = page.secrets.len();
                debug!("Fetched {} secrets at offset {}", fetched, offset);

                entries.extend(page.secrets.into_iter().map(|s| SecretEntry {
                    name: s.name,
                    reference: SecretRef::new(s.secret_ref),
                }));

                if fetched == 0 || page.next.is_none() {
                    break;
                }
                offset += fetched as u64;
            }

            tracing::Span::current().record("secrets.count", entries.len());
            tracker.record_success();
            Ok(entries)
        }
        .instrument(span)
        .await
    }

    async fn create_secret(&self, name: &str, payload: &Payload) -> Result<SecretRef> {
        let span = info_span!(
            "barbican.secret.create",
            secret.name = name,
            secret.reference = Empty,
            operation.success = Empty,
            operation.duration_ms = Empty,
            error.message = Empty
        );

        async {
            let tracker = OperationTracker::new("create", tracing::Span::current());
            info!("Creating Barbican secret: {}", name);

            let create_request = CreateSecretRequest::new(name, payload);
            let request = self
                .make_request(Method::POST, &self.url("secrets"))
                .json(&create_request);

            let response = self
                .send_checked(request, &tracker, &format!("create Barbican secret: {name}"))
                .await?;
            let created: CreateSecretResponse = tracker.track(
                response.json().await,
                "Failed to parse Barbican create response",
            )?;

            tracing::Span::current().record("secret.reference", created.secret_ref.as_str());
            tracker.record_success();
            Ok(SecretRef::new(created.secret_ref))
        }
        .instrument(span)
        .await
    }

    async fn delete_secret(&self, reference: &SecretRef) -> Result<()> {
        let span = info_span!(
            "barbican.secret.delete",
            secret.id = reference.id(),
            operation.success = Empty,
            operation.duration_ms = Empty,
            error.message = Empty
        );

        async {
            let tracker = OperationTracker::new("delete", tracing::Span::current());
            info!("Deleting Barbican secret: {}", reference);

            let request = self.make_request(
                Method::DELETE,
                &self.url(&format!("secrets/{}", reference.id())),
            );
            self.send_checked(request, &tracker, &format!("delete Barbican secret: {reference}"))
                .await?;

            tracker.record_success();
            Ok(())
        }
        .instrument(span)
        .await
    }

    async fn get_secret_payload(&self, reference: &SecretRef) -> Result<Payload> {
        let span = info_span!(
            "barbican.secret.get",
            secret.id = reference.id(),
            payload.content_type = Empty,
            operation.success = Empty,
            operation.duration_ms = Empty,
            error.message = Empty
        );

        async {
            let tracker = OperationTracker::new("get", tracing::Span::current());
            let secret_url = self.url(&format!("secrets/{}", reference.id()));

            // Metadata first: the payload has to be requested with the
            // content type it was stored under
            let request = self
                .make_request(Method::GET, &secret_url)
                .header(ACCEPT, "application/json");
            let response = self
                .send_checked(request, &tracker, &format!("read Barbican secret: {reference}"))
                .await?;
            let metadata: SecretMetadata = tracker.track(
                response.json().await,
                "Failed to parse Barbican secret metadata",
            )?;

            let content_type = metadata
                .default_content_type()
                .unwrap_or(CONTENT_TYPE_TEXT)
                .to_string();
            tracing::Span::current().record("payload.content_type", content_type.as_str());

            let request = self
                .make_request(Method::GET, &format!("{secret_url}/payload"))
                .header(ACCEPT, content_type);
            let response = self
                .send_checked(
                    request,
                    &tracker,
                    &format!("read Barbican secret payload: {reference}"),
                )
                .await?;
            let bytes = tracker.track(
                response.bytes().await,
                "Failed to read Barbican secret payload",
            )?;

            tracker.record_success();
            Ok(Payload::new(bytes.to_vec()))
        }
        .instrument(span)
        .await
    }
}
