//! Generic model commands: screened analysis, plain completion, health.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::{parse_provider, AppState, CommandError};
use crate::inference::{CompletionRequest, CompletionResponse, ProviderKind};
use crate::privacy::screening::{
    CONTENT_PLACEHOLDER, DEFAULT_ANALYSIS_TEMPLATE, DEFAULT_SCREENING_TEMPLATE,
};
use crate::privacy::RouteReason;

// ─── Request / Response Types ───────────────────────────────────────────────

/// Free-form content to screen and analyze.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AnalyzeRequest {
    pub content: String,
    #[serde(default)]
    pub screening_template: Option<String>,
    #[serde(default)]
    pub analysis_template: Option<String>,
    /// Preferred provider for clean content.
    #[serde(default)]
    pub provider: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct AnalyzeResponse {
    pub result: String,
    pub provider_used: ProviderKind,
    pub model_used: String,
    pub kept_local: bool,
    pub sensitive: bool,
    pub reason: RouteReason,
}

#[derive(Debug, Clone, Serialize)]
pub struct HealthReport {
    /// Probe result per registered provider.
    pub providers: BTreeMap<ProviderKind, bool>,
    pub default_provider: ProviderKind,
    pub high_quality_provider: ProviderKind,
}

// ─── Commands ───────────────────────────────────────────────────────────────

/// Screen `content` locally, then analyze it where the verdict allows.
pub async fn analyze(
    state: &AppState,
    request: &AnalyzeRequest,
) -> Result<AnalyzeResponse, CommandError> {
    if request.content.trim().is_empty() {
        return Err(CommandError::Validation("content must not be empty".into()));
    }
    let screening = template(
        request.screening_template.as_deref(),
        DEFAULT_SCREENING_TEMPLATE,
        "screening",
    )?;
    let analysis = template(
        request.analysis_template.as_deref(),
        DEFAULT_ANALYSIS_TEMPLATE,
        "analysis",
    )?;
    let preferred = parse_provider(request.provider.as_deref())?;

    let outcome = state
        .router
        .screen_then_analyze(&request.content, screening, analysis, preferred)
        .await?;

    Ok(AnalyzeResponse {
        result: outcome.analysis.text,
        provider_used: outcome.analysis.provider,
        model_used: outcome.analysis.model_used,
        kept_local: outcome.kept_local,
        sensitive: outcome.decision.sensitive,
        reason: outcome.decision.reason,
    })
}

/// Unscreened completion on `provider`, or the configured default.
pub async fn complete(
    state: &AppState,
    request: &CompletionRequest,
    provider: Option<&str>,
) -> Result<CompletionResponse, CommandError> {
    request
        .validate()
        .map_err(|e| CommandError::Validation(e.to_string()))?;
    let provider = parse_provider(provider)?;
    Ok(state.router.complete(request, provider).await?)
}

/// Probe every registered provider.
pub async fn health(state: &AppState) -> HealthReport {
    HealthReport {
        providers: state.router.health().await,
        default_provider: state.settings.routing.default_provider,
        high_quality_provider: state.settings.routing.high_quality_provider,
    }
}

fn template<'a>(
    custom: Option<&'a str>,
    default: &'a str,
    which: &str,
) -> Result<&'a str, CommandError> {
    match custom {
        Some(t) if !t.contains(CONTENT_PLACEHOLDER) => Err(CommandError::Validation(format!(
            "{which} template must contain {CONTENT_PLACEHOLDER}"
        ))),
        Some(t) => Ok(t),
        None => Ok(default),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::testing;
    use crate::privacy::RouterError;
    use crate::test_support::FakeProvider;

    fn request(content: &str) -> AnalyzeRequest {
        AnalyzeRequest {
            content: content.into(),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_analyze_sensitive_stays_local() {
        let local = FakeProvider::new(ProviderKind::Ollama)
            .reply("SENSITIVE")
            .reply("local summary")
            .arc();
        let gemini = FakeProvider::new(ProviderKind::Gemini).always("cloud").arc();
        let (state, _, _, _) = testing::state(local, vec![gemini.clone()]);

        let mut req = request("patient record 4411");
        req.provider = Some("gemini".into());
        let resp = analyze(&state, &req).await.unwrap();
        assert_eq!(resp.result, "local summary");
        assert_eq!(resp.provider_used, ProviderKind::Ollama);
        assert!(resp.kept_local);
        assert!(resp.sensitive);
        assert_eq!(resp.reason, RouteReason::Sensitive);
        assert_eq!(gemini.calls(), 0);
    }

    #[tokio::test]
    async fn test_analyze_clean_uses_requested_provider() {
        let local = FakeProvider::new(ProviderKind::Ollama).reply("CLEAN").arc();
        let gemini = FakeProvider::new(ProviderKind::Gemini).reply("cloud summary").arc();
        let (state, _, _, _) = testing::state(local, vec![gemini]);

        let mut req = request("release notes");
        req.provider = Some("gemini".into());
        req.analysis_template = Some("Summarize: {content}".into());
        let resp = analyze(&state, &req).await.unwrap();
        assert_eq!(resp.result, "cloud summary");
        assert_eq!(resp.provider_used, ProviderKind::Gemini);
        assert_eq!(resp.model_used, "gemini-test-model");
        assert!(!resp.kept_local);
        assert_eq!(resp.reason, RouteReason::Requested);
    }

    #[tokio::test]
    async fn test_analyze_validation() {
        let local = FakeProvider::new(ProviderKind::Ollama).arc();
        let (state, _, _, _) = testing::state(local.clone(), vec![]);

        assert!(matches!(
            analyze(&state, &request("  ")).await,
            Err(CommandError::Validation(_))
        ));
        let mut bad_template = request("x");
        bad_template.screening_template = Some("Is this sensitive?".into());
        assert!(matches!(
            analyze(&state, &bad_template).await,
            Err(CommandError::Validation(_))
        ));
        let mut bad_provider = request("x");
        bad_provider.provider = Some("llama-cloud".into());
        assert!(matches!(
            analyze(&state, &bad_provider).await,
            Err(CommandError::Validation(_))
        ));
        assert_eq!(local.calls(), 0);
    }

    #[tokio::test]
    async fn test_complete_validation_and_routing() {
        let local = FakeProvider::new(ProviderKind::Ollama).reply("hi").arc();
        let (state, _, _, _) = testing::state(local, vec![]);

        let err = complete(&state, &CompletionRequest::new(""), None)
            .await
            .unwrap_err();
        assert!(matches!(err, CommandError::Validation(_)));
        let err = complete(&state, &CompletionRequest::new("x").with_temperature(1.5), None)
            .await
            .unwrap_err();
        assert!(matches!(err, CommandError::Validation(_)));

        let resp = complete(&state, &CompletionRequest::new("hello"), None)
            .await
            .unwrap();
        assert_eq!(resp.text, "hi");

        let err = complete(&state, &CompletionRequest::new("hello"), Some("openai"))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            CommandError::Router(RouterError::ProviderNotAvailable { .. })
        ));
        assert!(err.is_client_error());
    }

    #[tokio::test]
    async fn test_health_reports_registered_providers() {
        let local = FakeProvider::new(ProviderKind::Ollama).unavailable().arc();
        let claude = FakeProvider::new(ProviderKind::Claude).arc();
        let (state, _, _, _) = testing::state(local, vec![claude]);

        let report = health(&state).await;
        assert_eq!(report.providers.len(), 2);
        assert!(!report.providers[&ProviderKind::Ollama]);
        assert!(report.providers[&ProviderKind::Claude]);
        assert_eq!(report.high_quality_provider, ProviderKind::Claude);

        let json = serde_json::to_value(&report).unwrap();
        assert_eq!(json["providers"]["ollama"], false);
    }
}
