//! Provider error types.
//!
//! All errors implement `std::error::Error` via `thiserror`. Structured logging
//! is the caller's responsibility: these types carry the context needed to build
//! meaningful log entries.

use thiserror::Error;

use super::types::ProviderKind;

/// Errors that can occur while talking to a completion backend.
#[derive(Debug, Error)]
pub enum ProviderError {
    /// TCP/HTTP connection to the backend failed or timed out.
    #[error("{provider} unavailable at {endpoint}: {reason}")]
    Unavailable {
        provider: ProviderKind,
        endpoint: String,
        reason: String,
    },

    /// Non-2xx HTTP response from the backend.
    #[error("{provider} request failed with HTTP {status}: {body}")]
    RequestFailed {
        provider: ProviderKind,
        status: u16,
        body: String,
    },

    /// The backend answered 2xx but the body was not in the expected shape.
    #[error("{provider} returned a malformed response: {reason}")]
    MalformedResponse {
        provider: ProviderKind,
        reason: String,
    },

    /// The provider has no credential configured.
    #[error("{provider} is not configured")]
    NotConfigured { provider: ProviderKind },

    /// The completion request violated a precondition.
    #[error("invalid completion request: {reason}")]
    InvalidRequest { reason: String },

    /// Configuration loading or validation error.
    #[error("config error: {reason}")]
    ConfigError { reason: String },
}

impl ProviderError {
    /// Whether the failure is transient and the same call may succeed later.
    ///
    /// Connection failures and timeouts are transient. So are 404 (Ollama
    /// returns it while a model is still being pulled), 408, 429 and the 5xx
    /// family. Bad credentials (401/403) and malformed requests are terminal.
    pub fn is_retryable(&self) -> bool {
        match self {
            ProviderError::Unavailable { .. } => true,
            ProviderError::RequestFailed { status, .. } => {
                matches!(status, 404 | 408 | 429 | 500..=599)
            }
            _ => false,
        }
    }

    /// Whether the failure is caused by rejected credentials.
    pub fn is_auth_failure(&self) -> bool {
        matches!(
            self,
            ProviderError::RequestFailed {
                status: 401 | 403,
                ..
            }
        )
    }

    /// Build the error for a failed `reqwest` send.
    pub(crate) fn from_transport(
        provider: ProviderKind,
        endpoint: &str,
        err: &reqwest::Error,
    ) -> Self {
        let reason = if err.is_timeout() {
            format!("timed out: {err}")
        } else {
            err.to_string()
        };
        ProviderError::Unavailable {
            provider,
            endpoint: endpoint.to_string(),
            reason,
        }
    }
}
