//! OpenAI Chat Completions backend.

use async_trait::async_trait;
use reqwest::Client as HttpClient;

use super::client::{build_http_client, log_request, send_json, trim_base_url, CompletionProvider};
use super::errors::ProviderError;
use super::types::{
    chat_messages, ChatCompletionRequest, ChatCompletionResponse, CompletionRequest,
    CompletionResponse, ProviderKind, TokenUsage,
};
use crate::config::CloudSettings;

pub const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";
pub const DEFAULT_MODEL: &str = "gpt-4o";

pub struct OpenAiProvider {
    http: HttpClient,
    base_url: String,
    api_key: String,
    default_model: String,
}

impl OpenAiProvider {
    pub fn from_settings(settings: &CloudSettings) -> Result<Self, ProviderError> {
        if !settings.is_enabled() {
            return Err(ProviderError::NotConfigured {
                provider: ProviderKind::OpenAi,
            });
        }
        let base_url = trim_base_url(settings.base_url.as_deref().unwrap_or(DEFAULT_BASE_URL));
        let http = build_http_client(ProviderKind::OpenAi, &base_url)?;
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
impl CompletionProvider for OpenAiProvider {
    fn kind(&self) -> ProviderKind {
        ProviderKind::OpenAi
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
        let url = format!("{}/chat/completions", self.base_url);
        log_request(ProviderKind::OpenAi, &model, request);

        let body = ChatCompletionRequest {
            model: model.clone(),
            messages: chat_messages(request),
            temperature: request.temperature,
            max_tokens: request.max_output_tokens,
            stream: false,
        };

        let builder = self.http.post(&url).bearer_auth(&self.api_key).json(&body);
        let parsed: ChatCompletionResponse = send_json(ProviderKind::OpenAi, &url, builder).await?;

        let text = parsed
            .choices
            .first()
            .and_then(|c| c.message.content.clone())
            .ok_or_else(|| ProviderError::MalformedResponse {
                provider: ProviderKind::OpenAi,
                reason: "no message content in choices".into(),
            })?;

        let usage = parsed
            .usage
            .map(|u| TokenUsage {
                prompt_tokens: u.prompt_tokens,
                completion_tokens: u.completion_tokens,
            })
            .unwrap_or_default();

        Ok(CompletionResponse {
            text,
            model_used: parsed.model.unwrap_or(model),
            provider: ProviderKind::OpenAi,
            usage,
        })
    }

    async fn probe(&self) -> bool {
        !self.api_key.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[tokio::test]
    async fn test_complete_uses_bearer_auth() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .and(header("authorization", "Bearer sk-openai"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "model": "gpt-4o-2024-08-06",
                "choices": [{"message": {"role": "assistant", "content": "summary"}}],
                "usage": {"prompt_tokens": 10, "completion_tokens": 2}
            })))
            .expect(1)
            .mount(&server)
            .await;

        let provider = OpenAiProvider::from_settings(&CloudSettings {
            api_key: "sk-openai".into(),
            model: None,
            base_url: Some(server.uri()),
        })
        .unwrap();

        let response = provider.complete(&CompletionRequest::new("summarize")).await.unwrap();
        assert_eq!(response.text, "summary");
        assert_eq!(response.model_used, "gpt-4o-2024-08-06");
        assert_eq!(response.usage.prompt_tokens, 10);
    }

    #[tokio::test]
    async fn test_rate_limit_is_retryable() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(429).set_body_string("slow down"))
            .mount(&server)
            .await;

        let provider = OpenAiProvider::from_settings(&CloudSettings {
            api_key: "sk-openai".into(),
            model: None,
            base_url: Some(server.uri()),
        })
        .unwrap();

        let err = provider.complete(&CompletionRequest::new("x")).await.unwrap_err();
        assert!(err.is_retryable());
    }
}
