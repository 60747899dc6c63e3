//! Two-pass screen-then-route policy over the registered providers.
//!
//! Every piece of content is first screened by the local model. Content
//! flagged sensitive is analyzed locally; clean content may go to a cloud
//! provider. If the local screening pass fails, nothing leaves the machine.

use std::collections::BTreeMap;
use std::sync::Arc;

use futures::future::join_all;
use serde::Serialize;

use super::errors::RouterError;
use super::screening::{is_sensitive, render, SCREENING_TEMPERATURE};
use crate::config::{RoutingSettings, Settings};
use crate::inference::{
    ClaudeProvider, CompletionProvider, CompletionRequest, CompletionResponse, GeminiProvider,
    OllamaProvider, OpenAiProvider, ProviderError, ProviderKind,
};

// ─── Routing Outcome ─────────────────────────────────────────────────────────

/// Why the analysis pass went where it went.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RouteReason {
    /// Screening flagged the content; analysis stayed local.
    Sensitive,
    /// Clean content sent to the caller's preferred provider.
    Requested,
    /// Clean content sent to the configured high-quality provider.
    HighQualityDefault,
    /// The chosen cloud provider is not registered; analysis stayed local.
    FallbackToLocal,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct RoutingDecision {
    pub target: ProviderKind,
    pub sensitive: bool,
    pub reason: RouteReason,
}

/// Both responses of a screened analysis.
#[derive(Debug, Clone, Serialize)]
pub struct ScreenedAnalysis {
    pub screening: CompletionResponse,
    pub analysis: CompletionResponse,
    /// True when the analysis pass ran on the local provider.
    pub kept_local: bool,
    pub decision: RoutingDecision,
}

// ─── Router ──────────────────────────────────────────────────────────────────

/// Routes completions between the local provider and the registered cloud ones.
///
/// Built once at startup and shared behind an `Arc`.
pub struct PrivacyRouter {
    local: Arc<dyn CompletionProvider>,
    cloud: BTreeMap<ProviderKind, Arc<dyn CompletionProvider>>,
    routing: RoutingSettings,
}

impl PrivacyRouter {
    /// Build a router from explicit providers.
    ///
    /// Cloud providers reporting [`ProviderKind::Ollama`] are ignored; the
    /// local slot is always `local`.
    pub fn new(
        local: Arc<dyn CompletionProvider>,
        cloud: Vec<Arc<dyn CompletionProvider>>,
        routing: RoutingSettings,
    ) -> Self {
        let cloud = cloud
            .into_iter()
            .filter(|p| !p.kind().is_local())
            .map(|p| (p.kind(), p))
            .collect();
        Self {
            local,
            cloud,
            routing,
        }
    }

    /// Build the router from settings.
    ///
    /// Ollama is always registered. A cloud provider is registered only when
    /// its API key is set; one that fails to build is logged and skipped.
    pub fn from_settings(settings: &Settings) -> Result<Self, ProviderError> {
        let local: Arc<dyn CompletionProvider> =
            Arc::new(OllamaProvider::from_settings(&settings.ollama)?);

        let mut cloud: Vec<Arc<dyn CompletionProvider>> = Vec::new();
        for kind in ProviderKind::ALL {
            let Some(cfg) = settings.cloud(kind) else {
                continue;
            };
            if !cfg.is_enabled() {
                continue;
            }
            let built = match kind {
                ProviderKind::Claude => ClaudeProvider::from_settings(cfg).map(shared),
                ProviderKind::Gemini => GeminiProvider::from_settings(cfg).map(shared),
                ProviderKind::OpenAi => OpenAiProvider::from_settings(cfg).map(shared),
                ProviderKind::Ollama => continue,
            };
            match built {
                Ok(provider) => cloud.push(provider),
                Err(e) => tracing::warn!(provider = %kind, error = %e, "skipping cloud provider"),
            }
        }

        let router = Self::new(local, cloud, settings.routing.clone());
        tracing::info!(
            providers = ?router.available_providers(),
            default = %router.routing.default_provider,
            high_quality = %router.routing.high_quality_provider,
            "privacy router ready"
        );
        Ok(router)
    }

    /// Every registered provider, local first.
    pub fn available_providers(&self) -> Vec<ProviderKind> {
        std::iter::once(ProviderKind::Ollama)
            .chain(self.cloud.keys().copied())
            .collect()
    }

    pub fn is_registered(&self, kind: ProviderKind) -> bool {
        kind.is_local() || self.cloud.contains_key(&kind)
    }

    fn provider(&self, kind: ProviderKind) -> Option<&Arc<dyn CompletionProvider>> {
        if kind.is_local() {
            Some(&self.local)
        } else {
            self.cloud.get(&kind)
        }
    }

    /// Plain completion on an explicit provider, or the configured default.
    pub async fn complete(
        &self,
        request: &CompletionRequest,
        provider: Option<ProviderKind>,
    ) -> Result<CompletionResponse, RouterError> {
        let requested = provider.unwrap_or(self.routing.default_provider);
        let target = self
            .provider(requested)
            .ok_or_else(|| RouterError::ProviderNotAvailable {
                requested,
                available: self.available_providers(),
            })?;
        Ok(target.complete(request).await?)
    }

    /// Screen `content` locally, then run the analysis where policy allows.
    ///
    /// Both templates have `{content}` substituted. A screening failure fails
    /// closed with [`RouterError::ScreeningFailed`].
    pub async fn screen_then_analyze(
        &self,
        content: &str,
        screening_template: &str,
        analysis_template: &str,
        preferred: Option<ProviderKind>,
    ) -> Result<ScreenedAnalysis, RouterError> {
        let screening_request = CompletionRequest::new(render(screening_template, content))
            .with_temperature(SCREENING_TEMPERATURE);
        let screening = self
            .local
            .complete(&screening_request)
            .await
            .map_err(|source| {
                tracing::warn!(error = %source, "screening pass failed, not analyzing");
                RouterError::ScreeningFailed { source }
            })?;

        let sensitive = is_sensitive(&screening.text);
        let decision = self.decide(sensitive, preferred);
        tracing::info!(
            sensitive,
            target = %decision.target,
            reason = ?decision.reason,
            content_len = content.len(),
            "routing analysis"
        );

        let analysis_request = CompletionRequest::new(render(analysis_template, content));
        let provider = self
            .provider(decision.target)
            .unwrap_or(&self.local);
        let analysis = provider
            .complete(&analysis_request)
            .await
            .map_err(|source| RouterError::AnalysisFailed {
                provider: decision.target,
                source,
            })?;

        Ok(ScreenedAnalysis {
            screening,
            analysis,
            kept_local: decision.target.is_local(),
            decision,
        })
    }

    /// Pick the analysis target for a screening verdict.
    pub fn decide(&self, sensitive: bool, preferred: Option<ProviderKind>) -> RoutingDecision {
        if sensitive {
            return RoutingDecision {
                target: ProviderKind::Ollama,
                sensitive,
                reason: RouteReason::Sensitive,
            };
        }

        let (wanted, reason) = match preferred {
            Some(kind) => (kind, RouteReason::Requested),
            None => (
                self.routing.high_quality_provider,
                RouteReason::HighQualityDefault,
            ),
        };

        if self.is_registered(wanted) {
            RoutingDecision {
                target: wanted,
                sensitive,
                reason,
            }
        } else {
            tracing::debug!(wanted = %wanted, "provider not registered, keeping analysis local");
            RoutingDecision {
                target: ProviderKind::Ollama,
                sensitive,
                reason: RouteReason::FallbackToLocal,
            }
        }
    }

    /// Probe every registered provider concurrently.
    pub async fn health(&self) -> BTreeMap<ProviderKind, bool> {
        let providers: Vec<&Arc<dyn CompletionProvider>> = std::iter::once(&self.local)
            .chain(self.cloud.values())
            .collect();
        let probes = providers.iter().map(|p| async move { (p.kind(), p.probe().await) });
        join_all(probes).await.into_iter().collect()
    }
}

fn shared<P: CompletionProvider + 'static>(provider: P) -> Arc<dyn CompletionProvider> {
    Arc::new(provider)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::privacy::screening::DEFAULT_SCREENING_TEMPLATE;
    use crate::test_support::{connection_refused, FakeProvider};

    const ANALYSIS: &str = "Analyze:\n{content}";

    fn router(
        local: Arc<FakeProvider>,
        cloud: Vec<Arc<FakeProvider>>,
        high_quality: ProviderKind,
    ) -> PrivacyRouter {
        PrivacyRouter::new(
            local,
            cloud
                .into_iter()
                .map(|p| p as Arc<dyn CompletionProvider>)
                .collect(),
            RoutingSettings {
                default_provider: ProviderKind::Ollama,
                high_quality_provider: high_quality,
            },
        )
    }

    #[tokio::test]
    async fn test_sensitive_content_stays_local() {
        let local = FakeProvider::new(ProviderKind::Ollama)
            .reply("SENSITIVE")
            .reply("local analysis")
            .arc();
        let claude = FakeProvider::new(ProviderKind::Claude).always("cloud").arc();
        let router = router(local.clone(), vec![claude.clone()], ProviderKind::Claude);

        let result = router
            .screen_then_analyze("SSN 123-45-6789", DEFAULT_SCREENING_TEMPLATE, ANALYSIS, None)
            .await
            .unwrap();

        assert!(result.kept_local);
        assert!(result.decision.sensitive);
        assert_eq!(result.decision.reason, RouteReason::Sensitive);
        assert_eq!(result.analysis.text, "local analysis");
        assert_eq!(local.calls(), 2);
        assert_eq!(claude.calls(), 0);
    }

    #[tokio::test]
    async fn test_sensitive_ignores_preferred_cloud() {
        let local = FakeProvider::new(ProviderKind::Ollama)
            .reply("sensitive")
            .reply("ok")
            .arc();
        let claude = FakeProvider::new(ProviderKind::Claude).always("cloud").arc();
        let router = router(local, vec![claude.clone()], ProviderKind::Claude);

        let result = router
            .screen_then_analyze("x", DEFAULT_SCREENING_TEMPLATE, ANALYSIS, Some(ProviderKind::Claude))
            .await
            .unwrap();
        assert!(result.kept_local);
        assert_eq!(claude.calls(), 0);
    }

    #[tokio::test]
    async fn test_clean_content_goes_to_high_quality_provider() {
        let local = FakeProvider::new(ProviderKind::Ollama).reply("CLEAN").arc();
        let claude = FakeProvider::new(ProviderKind::Claude).reply("cloud analysis").arc();
        let router = router(local.clone(), vec![claude.clone()], ProviderKind::Claude);

        let result = router
            .screen_then_analyze("newsletter", DEFAULT_SCREENING_TEMPLATE, ANALYSIS, None)
            .await
            .unwrap();

        assert!(!result.kept_local);
        assert_eq!(result.decision.target, ProviderKind::Claude);
        assert_eq!(result.decision.reason, RouteReason::HighQualityDefault);
        assert_eq!(result.analysis.provider, ProviderKind::Claude);
        assert_eq!(local.calls(), 1);
        assert_eq!(claude.prompts.lock().unwrap()[0], "Analyze:\nnewsletter");
    }

    #[tokio::test]
    async fn test_clean_content_honors_preferred_provider() {
        let local = FakeProvider::new(ProviderKind::Ollama).reply("CLEAN").arc();
        let claude = FakeProvider::new(ProviderKind::Claude).always("claude").arc();
        let openai = FakeProvider::new(ProviderKind::OpenAi).reply("openai").arc();
        let router = router(local, vec![claude.clone(), openai], ProviderKind::Claude);

        let result = router
            .screen_then_analyze("x", DEFAULT_SCREENING_TEMPLATE, ANALYSIS, Some(ProviderKind::OpenAi))
            .await
            .unwrap();

        assert_eq!(result.decision.reason, RouteReason::Requested);
        assert_eq!(result.analysis.text, "openai");
        assert_eq!(claude.calls(), 0);
    }

    #[tokio::test]
    async fn test_clean_content_falls_back_when_cloud_missing() {
        let local = FakeProvider::new(ProviderKind::Ollama)
            .reply("CLEAN")
            .reply("local analysis")
            .arc();
        let router = router(local.clone(), vec![], ProviderKind::Claude);

        let result = router
            .screen_then_analyze("x", DEFAULT_SCREENING_TEMPLATE, ANALYSIS, None)
            .await
            .unwrap();

        assert!(result.kept_local);
        assert!(!result.decision.sensitive);
        assert_eq!(result.decision.reason, RouteReason::FallbackToLocal);
        assert_eq!(local.calls(), 2);
    }

    #[tokio::test]
    async fn test_screening_failure_fails_closed() {
        let local = FakeProvider::new(ProviderKind::Ollama)
            .fail(connection_refused())
            .arc();
        let claude = FakeProvider::new(ProviderKind::Claude).always("cloud").arc();
        let router = router(local, vec![claude.clone()], ProviderKind::Claude);

        let err = router
            .screen_then_analyze("x", DEFAULT_SCREENING_TEMPLATE, ANALYSIS, None)
            .await
            .unwrap_err();

        assert!(matches!(err, RouterError::ScreeningFailed { .. }));
        assert_eq!(claude.calls(), 0);
    }

    #[tokio::test]
    async fn test_analysis_failure_names_provider() {
        let local = FakeProvider::new(ProviderKind::Ollama).reply("CLEAN").arc();
        let claude = FakeProvider::new(ProviderKind::Claude)
            .fail(ProviderError::RequestFailed {
                provider: ProviderKind::Claude,
                status: 401,
                body: "bad key".into(),
            })
            .arc();
        let router = router(local, vec![claude], ProviderKind::Claude);

        let err = router
            .screen_then_analyze("x", DEFAULT_SCREENING_TEMPLATE, ANALYSIS, None)
            .await
            .unwrap_err();
        match err {
            RouterError::AnalysisFailed { provider, .. } => assert_eq!(provider, ProviderKind::Claude),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn test_screening_runs_at_low_temperature_on_local() {
        let local = FakeProvider::new(ProviderKind::Ollama).always("CLEAN").arc();
        let router = router(local.clone(), vec![], ProviderKind::Ollama);

        let result = router
            .screen_then_analyze("hello", "Screen: {content}", ANALYSIS, None)
            .await
            .unwrap();
        assert_eq!(result.screening.provider, ProviderKind::Ollama);
        assert_eq!(local.prompts.lock().unwrap()[0], "Screen: hello");
        assert_eq!(result.decision.reason, RouteReason::HighQualityDefault);
        assert!(result.kept_local);
    }

    #[tokio::test]
    async fn test_complete_unknown_provider() {
        let local = FakeProvider::new(ProviderKind::Ollama).always("hi").arc();
        let router = router(local, vec![], ProviderKind::Claude);

        let err = router
            .complete(&CompletionRequest::new("hello"), Some(ProviderKind::Gemini))
            .await
            .unwrap_err();
        match err {
            RouterError::ProviderNotAvailable {
                requested,
                available,
            } => {
                assert_eq!(requested, ProviderKind::Gemini);
                assert_eq!(available, vec![ProviderKind::Ollama]);
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn test_complete_defaults_to_configured_provider() {
        let local = FakeProvider::new(ProviderKind::Ollama).always("local").arc();
        let router = router(local, vec![], ProviderKind::Claude);

        let response = router
            .complete(&CompletionRequest::new("hello"), None)
            .await
            .unwrap();
        assert_eq!(response.text, "local");
    }

    #[tokio::test]
    async fn test_complete_propagates_validation() {
        let local = FakeProvider::new(ProviderKind::Ollama).always("local").arc();
        let router = router(local, vec![], ProviderKind::Claude);

        let err = router
            .complete(&CompletionRequest::new("  "), None)
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            RouterError::Provider(ProviderError::InvalidRequest { .. })
        ));
    }

    #[tokio::test]
    async fn test_health_probes_every_provider() {
        let local = FakeProvider::new(ProviderKind::Ollama).unavailable().arc();
        let claude = FakeProvider::new(ProviderKind::Claude).arc();
        let router = router(local, vec![claude], ProviderKind::Claude);

        let health = router.health().await;
        assert_eq!(health.len(), 2);
        assert_eq!(health[&ProviderKind::Ollama], false);
        assert_eq!(health[&ProviderKind::Claude], true);
    }

    #[test]
    fn test_from_settings_registers_only_keyed_clouds() {
        let mut settings = Settings::default();
        settings.gemini.api_key = "g-key".into();
        let router = PrivacyRouter::from_settings(&settings).unwrap();
        assert_eq!(
            router.available_providers(),
            vec![ProviderKind::Ollama, ProviderKind::Gemini]
        );
        assert!(!router.is_registered(ProviderKind::Claude));
    }
}
