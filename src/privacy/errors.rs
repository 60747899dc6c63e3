//! Privacy router error types.

use thiserror::Error;

use crate::inference::{ProviderError, ProviderKind};

/// Errors that can occur while routing a completion.
#[derive(Debug, Error)]
pub enum RouterError {
    /// The local screening pass failed. Nothing was sent anywhere else.
    #[error("screening failed, content was not analyzed: {source}")]
    ScreeningFailed {
        #[source]
        source: ProviderError,
    },

    /// Screening succeeded but the analysis call on the routed provider failed.
    #[error("analysis on {provider} failed: {source}")]
    AnalysisFailed {
        provider: ProviderKind,
        #[source]
        source: ProviderError,
    },

    /// The caller asked for a provider that is not registered.
    #[error("provider '{requested}' is not available (registered: {})", join_kinds(.available))]
    ProviderNotAvailable {
        requested: ProviderKind,
        available: Vec<ProviderKind>,
    },

    /// A pass-through completion failed.
    #[error(transparent)]
    Provider(#[from] ProviderError),
}

impl RouterError {
    /// Whether retrying the same call later may succeed.
    pub fn is_retryable(&self) -> bool {
        match self {
            RouterError::ScreeningFailed { source } => source.is_retryable(),
            RouterError::AnalysisFailed { source, .. } => source.is_retryable(),
            RouterError::ProviderNotAvailable { .. } => false,
            RouterError::Provider(e) => e.is_retryable(),
        }
    }
}

fn join_kinds(kinds: &[ProviderKind]) -> String {
    kinds
        .iter()
        .map(ProviderKind::as_str)
        .collect::<Vec<_>>()
        .join(", ")
}
