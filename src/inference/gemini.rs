//! Google Gemini backend.

use async_trait::async_trait;
use reqwest::Client as HttpClient;
use serde::{Deserialize, Serialize};

use super::client::{build_http_client, log_request, send_json, trim_base_url, CompletionProvider};
use super::errors::ProviderError;
use super::types::{CompletionRequest, CompletionResponse, ProviderKind, TokenUsage};
use crate::config::CloudSettings;

pub const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com";
pub const DEFAULT_MODEL: &str = "gemini-2.0-flash";

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentRequest {
    contents: Vec<Content>,
    #[serde(skip_serializing_if = "Option::is_none")]
    system_instruction: Option<Content>,
    generation_config: GenerationConfig,
}

#[derive(Debug, Serialize, Deserialize)]
struct Content {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    role: Option<String>,
    #[serde(default)]
    parts: Vec<Part>,
}

#[derive(Debug, Serialize, Deserialize)]
struct Part {
    #[serde(default)]
    text: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerationConfig {
    temperature: f32,
    max_output_tokens: u32,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
    #[serde(default)]
    usage_metadata: Option<UsageMetadata>,
    #[serde(default)]
    model_version: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    content: Content,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct UsageMetadata {
    #[serde(default)]
    prompt_token_count: u32,
    #[serde(default)]
    candidates_token_count: u32,
}

pub struct GeminiProvider {
    http: HttpClient,
    base_url: String,
    api_key: String,
    default_model: String,
}

impl GeminiProvider {
    pub fn from_settings(settings: &CloudSettings) -> Result<Self, ProviderError> {
        if !settings.is_enabled() {
            return Err(ProviderError::NotConfigured {
                provider: ProviderKind::Gemini,
            });
        }
        let base_url = trim_base_url(settings.base_url.as_deref().unwrap_or(DEFAULT_BASE_URL));
        let http = build_http_client(ProviderKind::Gemini, &base_url)?;
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
impl CompletionProvider for GeminiProvider {
    fn kind(&self) -> ProviderKind {
        ProviderKind::Gemini
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
        let url = format!("{}/v1beta/models/{model}:generateContent", self.base_url);
        log_request(ProviderKind::Gemini, &model, request);

        let body = GenerateContentRequest {
            contents: vec![Content {
                role: Some("user".into()),
                parts: vec![Part {
                    text: request.prompt.clone(),
                }],
            }],
            system_instruction: (!request.system.is_empty()).then(|| Content {
                role: None,
                parts: vec![Part {
                    text: request.system.clone(),
                }],
            }),
            generation_config: GenerationConfig {
                temperature: request.temperature,
                max_output_tokens: request.max_output_tokens,
            },
        };

        let builder = self
            .http
            .post(&url)
            .header("x-goog-api-key", &self.api_key)
            .json(&body);
        let parsed: GenerateContentResponse = send_json(ProviderKind::Gemini, &url, builder).await?;

        let candidate = parsed
            .candidates
            .first()
            .ok_or_else(|| ProviderError::MalformedResponse {
                provider: ProviderKind::Gemini,
                reason: "no candidates in response".into(),
            })?;
        let text: String = candidate
            .content
            .parts
            .iter()
            .map(|p| p.text.as_str())
            .collect();

        let usage = parsed
            .usage_metadata
            .map(|u| TokenUsage {
                prompt_tokens: u.prompt_token_count,
                completion_tokens: u.candidates_token_count,
            })
            .unwrap_or_default();

        Ok(CompletionResponse {
            text,
            model_used: parsed.model_version.unwrap_or(model),
            provider: ProviderKind::Gemini,
            usage,
        })
    }

    async fn probe(&self) -> bool {
        !self.api_key.is_empty()
    }
}
