//! Local Ollama backend: nothing sent here leaves the machine.
//!
//! Uses the native `/api/chat` endpoint (non-streaming) and probes
//! `/api/tags`, which answers instantly without loading a model.

use async_trait::async_trait;
use reqwest::Client as HttpClient;
use serde::{Deserialize, Serialize};

use super::client::{
    build_http_client, log_request, send_json, trim_base_url, CompletionProvider, PROBE_TIMEOUT,
};
use super::errors::ProviderError;
use super::types::{
    chat_messages, ChatMessage, CompletionRequest, CompletionResponse, ProviderKind, TokenUsage,
};
use crate::config::OllamaSettings;

/// Request body for `POST /api/chat`.
#[derive(Debug, Serialize)]
struct OllamaChatRequest {
    model: String,
    messages: Vec<ChatMessage>,
    stream: bool,
    options: OllamaOptions,
}

#[derive(Debug, Serialize)]
struct OllamaOptions {
    temperature: f32,
    num_predict: u32,
}

/// Response body of `POST /api/chat` (fields we consume).
#[derive(Debug, Deserialize)]
struct OllamaChatResponse {
    #[serde(default)]
    model: Option<String>,
    message: OllamaResponseMessage,
    #[serde(default)]
    prompt_eval_count: u32,
    #[serde(default)]
    eval_count: u32,
}

#[derive(Debug, Deserialize)]
struct OllamaResponseMessage {
    #[serde(default)]
    content: String,
}

/// Client for a local Ollama server.
pub struct OllamaProvider {
    http: HttpClient,
    base_url: String,
    default_model: String,
}

impl OllamaProvider {
    pub fn new(base_url: &str, default_model: &str) -> Result<Self, ProviderError> {
        let base_url = trim_base_url(base_url);
        let http = build_http_client(ProviderKind::Ollama, &base_url)?;
        Ok(Self {
            http,
            base_url,
            default_model: default_model.to_string(),
        })
    }

    pub fn from_settings(settings: &OllamaSettings) -> Result<Self, ProviderError> {
        Self::new(&settings.base_url, &settings.model)
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }
}

#[async_trait]
impl CompletionProvider for OllamaProvider {
    fn kind(&self) -> ProviderKind {
        ProviderKind::Ollama
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
        let url = format!("{}/api/chat", self.base_url);
        log_request(ProviderKind::Ollama, &model, request);

        let body = OllamaChatRequest {
            model: model.clone(),
            messages: chat_messages(request),
            stream: false,
            options: OllamaOptions {
                temperature: request.temperature,
                num_predict: request.max_output_tokens,
            },
        };

        let parsed: OllamaChatResponse =
            send_json(ProviderKind::Ollama, &url, self.http.post(&url).json(&body)).await?;

        Ok(CompletionResponse {
            text: parsed.message.content,
            model_used: parsed.model.unwrap_or(model),
            provider: ProviderKind::Ollama,
            usage: TokenUsage {
                prompt_tokens: parsed.prompt_eval_count,
                completion_tokens: parsed.eval_count,
            },
        })
    }

    async fn probe(&self) -> bool {
        let url = format!("{}/api/tags", self.base_url);
        match self.http.get(&url).timeout(PROBE_TIMEOUT).send().await {
            Ok(resp) => resp.status().is_success(),
            Err(e) => {
                tracing::debug!(url = %url, error = %e, "ollama probe failed");
                false
            }
        }
    }
}
