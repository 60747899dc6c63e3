//! Anthropic Claude backend: high quality analysis for screened-clean content.

use async_trait::async_trait;
use reqwest::Client as HttpClient;
use serde::{Deserialize, Serialize};

use super::client::{build_http_client, log_request, send_json, trim_base_url, CompletionProvider};
use super::errors::ProviderError;
use super::types::{ChatMessage, CompletionRequest, CompletionResponse, ProviderKind, TokenUsage};
use crate::config::CloudSettings;

pub const DEFAULT_BASE_URL: &str = "https://api.anthropic.com";
pub const DEFAULT_MODEL: &str = "claude-sonnet-4-5-20250929";
const ANTHROPIC_VERSION: &str = "2023-06-01";

/// Request body for `POST /v1/messages`.
#[derive(Debug, Serialize)]
struct MessagesRequest {
    model: String,
    max_tokens: u32,
    temperature: f32,
    messages: Vec<ChatMessage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    system: Option<String>,
}

#[derive(Debug, Deserialize)]
struct MessagesResponse {
    #[serde(default)]
    model: Option<String>,
    #[serde(default)]
    content: Vec<ContentBlock>,
    #[serde(default)]
    usage: Option<MessagesUsage>,
}

#[derive(Debug, Deserialize)]
struct ContentBlock {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    text: Option<String>,
}

#[derive(Debug, Deserialize)]
struct MessagesUsage {
    #[serde(default)]
    input_tokens: u32,
    #[serde(default)]
    output_tokens: u32,
}

pub struct ClaudeProvider {
    http: HttpClient,
    base_url: String,
    api_key: String,
    default_model: String,
}

impl ClaudeProvider {
    pub fn from_settings(settings: &CloudSettings) -> Result<Self, ProviderError> {
        if !settings.is_enabled() {
            return Err(ProviderError::NotConfigured {
                provider: ProviderKind::Claude,
            });
        }
        let base_url = trim_base_url(settings.base_url.as_deref().unwrap_or(DEFAULT_BASE_URL));
        let http = build_http_client(ProviderKind::Claude, &base_url)?;
        Ok(Self {
            http,
            base_url,
            api_key: settings.api_key.clone(),
            default_model: settings
                .model
                .clone()
                .unwrap_or_else(|| DEFAULT_MODEL.to_string()),
        })
    }
}

#[async_trait]
impl CompletionProvider for ClaudeProvider {
    fn kind(&self) -> ProviderKind {
        ProviderKind::Claude
    }

    async fn complete(
        &self,
        request: &CompletionRequest,
    ) -> Result<CompletionResponse, ProviderError> {
        request.validate()?;

        let model = request
            .model
            .clone()
            .unwrap_or_else(|| self.default_model.clone());
        let url = format!("{}/v1/messages", self.base_url);
        log_request(ProviderKind::Claude, &model, request);

        let body = MessagesRequest {
            model: model.clone(),
            max_tokens: request.max_output_tokens,
            temperature: request.temperature,
            messages: vec![ChatMessage::user(request.prompt.clone())],
            system: (!request.system.is_empty()).then(|| request.system.clone()),
        };

        let builder = self
            .http
            .post(&url)
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", ANTHROPIC_VERSION)
            .json(&body);
        let parsed: MessagesResponse = send_json(ProviderKind::Claude, &url, builder).await?;

        let text = parsed
            .content
            .iter()
            .find(|block| block.kind == "text")
            .and_then(|block| block.text.clone())
            .ok_or_else(|| ProviderError::MalformedResponse {
                provider: ProviderKind::Claude,
                reason: "no text content block".into(),
            })?;

        let usage = parsed
            .usage
            .map(|u| TokenUsage {
                prompt_tokens: u.input_tokens,
                completion_tokens: u.output_tokens,
            })
            .unwrap_or_default();

        Ok(CompletionResponse {
            text,
            model_used: parsed.model.unwrap_or(model),
            provider: ProviderKind::Claude,
            usage,
        })
    }

    /// Availability is "a credential is configured"; a live call would cost tokens.
    async fn probe(&self) -> bool {
        !self.api_key.is_empty()
    }
}
