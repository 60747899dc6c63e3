//! The provider contract and the HTTP plumbing shared by every backend.
//!
//! Each backend turns a [`CompletionRequest`] into one non-streaming HTTP
//! call and reports reachability through [`CompletionProvider::probe`].

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client as HttpClient;
use serde::de::DeserializeOwned;

use super::errors::ProviderError;
use super::types::{CompletionRequest, CompletionResponse, ProviderKind};

// ─── Constants ───────────────────────────────────────────────────────────────

/// TCP connection timeout.
pub(crate) const CONNECT_TIMEOUT: Duration = Duration::from_secs(5);

/// Total request timeout for completion calls.
///
/// Local models on modest hardware can take well over a minute to produce
/// a classification for a long email body.
pub(crate) const REQUEST_TIMEOUT: Duration = Duration::from_secs(120);

/// Timeout for availability probes.
pub(crate) const PROBE_TIMEOUT: Duration = Duration::from_secs(5);

// ─── Provider Contract ───────────────────────────────────────────────────────

/// A text-completion backend.
#[async_trait]
pub trait CompletionProvider: Send + Sync {
    /// Which backend this is.
    fn kind(&self) -> ProviderKind;

    /// Run one completion. Implementations validate the request first.
    async fn complete(&self, request: &CompletionRequest)
        -> Result<CompletionResponse, ProviderError>;

    /// Whether the backend is usable right now. Never errors.
    async fn probe(&self) -> bool;
}

// ─── HTTP Helpers ────────────────────────────────────────────────────────────

/// Build the HTTP client used by a backend.
pub(crate) fn build_http_client(
    provider: ProviderKind,
    endpoint: &str,
) -> Result<HttpClient, ProviderError> {
    HttpClient::builder()
        .connect_timeout(CONNECT_TIMEOUT)
        .timeout(REQUEST_TIMEOUT)
        .build()
        .map_err(|e| ProviderError::Unavailable {
            provider,
            endpoint: endpoint.to_string(),
            reason: format!("failed to build HTTP client: {e}"),
        })
}

/// Send a prepared request and decode a 2xx JSON body.
///
/// Transport failures become [`ProviderError::Unavailable`], non-2xx
/// statuses become [`ProviderError::RequestFailed`], and undecodable bodies
/// become [`ProviderError::MalformedResponse`].
pub(crate) async fn send_json<T: DeserializeOwned>(
    provider: ProviderKind,
    url: &str,
    request: reqwest::RequestBuilder,
) -> Result<T, ProviderError> {
    let response = request
        .send()
        .await
        .map_err(|e| ProviderError::from_transport(provider, url, &e))?;

    let status = response.status();
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        return Err(ProviderError::RequestFailed {
            provider,
            status: status.as_u16(),
            body,
        });
    }

    let body = response.text().await.map_err(|e| ProviderError::MalformedResponse {
        provider,
        reason: format!("failed to read response body: {e}"),
    })?;

    serde_json::from_str(&body).map_err(|e| ProviderError::MalformedResponse {
        provider,
        reason: format!("unexpected response shape: {e}"),
    })
}

/// Strip a trailing slash so `format!("{base}/path")` never doubles it.
pub(crate) fn trim_base_url(base_url: &str) -> String {
    base_url.trim_end_matches('/').to_string()
}

/// Log one outbound completion (metadata only, never the prompt body).
pub(crate) fn log_request(provider: ProviderKind, model: &str, request: &CompletionRequest) {
    tracing::info!(
        provider = %provider,
        model = %model,
        prompt_chars = request.prompt.len(),
        has_system = !request.system.is_empty(),
        temperature = request.temperature,
        max_output_tokens = request.max_output_tokens,
        "completion request"
    );
}
