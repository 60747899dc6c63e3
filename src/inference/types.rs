//! Shared types for the completion providers.
//!
//! The provider-neutral request/response pair plus the OpenAI Chat
//! Completions wire types, which both the OpenAI backend and any
//! OpenAI-compatible local runtime speak.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use super::errors::ProviderError;

/// Default sampling temperature for analysis calls.
pub const DEFAULT_TEMPERATURE: f32 = 0.3;

/// Default cap on generated tokens.
pub const DEFAULT_MAX_OUTPUT_TOKENS: u32 = 4096;

// ─── Provider Identity ───────────────────────────────────────────────────────

/// The closed set of completion backends.
///
/// `Ollama` is the only local variant; everything else leaves the machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderKind {
    Ollama,
    Claude,
    Gemini,
    #[serde(rename = "openai")]
    OpenAi,
}

impl ProviderKind {
    /// All variants, local first.
    pub const ALL: [ProviderKind; 4] = [
        ProviderKind::Ollama,
        ProviderKind::Claude,
        ProviderKind::Gemini,
        ProviderKind::OpenAi,
    ];

    /// Stable lowercase name used in config, logs and persisted records.
    pub fn as_str(&self) -> &'static str {
        match self {
            ProviderKind::Ollama => "ollama",
            ProviderKind::Claude => "claude",
            ProviderKind::Gemini => "gemini",
            ProviderKind::OpenAi => "openai",
        }
    }

    /// Whether content sent to this backend stays on the local network.
    pub fn is_local(&self) -> bool {
        matches!(self, ProviderKind::Ollama)
    }
}

impl fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ProviderKind {
    type Err = ProviderError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "ollama" | "local" => Ok(ProviderKind::Ollama),
            "claude" | "anthropic" => Ok(ProviderKind::Claude),
            "gemini" | "google" => Ok(ProviderKind::Gemini),
            "openai" => Ok(ProviderKind::OpenAi),
            other => Err(ProviderError::ConfigError {
                reason: format!("unknown provider '{other}'"),
            }),
        }
    }
}

// ─── Provider-neutral Request/Response ───────────────────────────────────────

/// A single text completion request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompletionRequest {
    /// The user prompt. Must be non-empty.
    pub prompt: String,
    /// Optional system prompt; empty means none.
    #[serde(default)]
    pub system: String,
    /// Overrides the provider's configured model.
    #[serde(default)]
    pub model: Option<String>,
    /// Sampling temperature in `[0, 1]`.
    #[serde(default = "default_temperature")]
    pub temperature: f32,
    /// Maximum tokens to generate. Must be positive.
    #[serde(default = "default_max_output_tokens")]
    pub max_output_tokens: u32,
}

fn default_temperature() -> f32 {
    DEFAULT_TEMPERATURE
}

fn default_max_output_tokens() -> u32 {
    DEFAULT_MAX_OUTPUT_TOKENS
}

impl CompletionRequest {
    /// Build a request with default sampling parameters.
    pub fn new(prompt: impl Into<String>) -> Self {
        Self {
            prompt: prompt.into(),
            system: String::new(),
            model: None,
            temperature: DEFAULT_TEMPERATURE,
            max_output_tokens: DEFAULT_MAX_OUTPUT_TOKENS,
        }
    }

    pub fn with_system(mut self, system: impl Into<String>) -> Self {
        self.system = system.into();
        self
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }

    pub fn with_max_output_tokens(mut self, max_output_tokens: u32) -> Self {
        self.max_output_tokens = max_output_tokens;
        self
    }

    /// Check the request preconditions shared by every backend.
    pub fn validate(&self) -> Result<(), ProviderError> {
        if self.prompt.trim().is_empty() {
            return Err(ProviderError::InvalidRequest {
                reason: "prompt must not be empty".into(),
            });
        }
        if !(0.0..=1.0).contains(&self.temperature) || self.temperature.is_nan() {
            return Err(ProviderError::InvalidRequest {
                reason: format!("temperature {} outside [0, 1]", self.temperature),
            });
        }
        if self.max_output_tokens == 0 {
            return Err(ProviderError::InvalidRequest {
                reason: "max_output_tokens must be positive".into(),
            });
        }
        Ok(())
    }
}

/// Token accounting reported by the backend (zero when not reported).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenUsage {
    pub prompt_tokens: u32,
    pub completion_tokens: u32,
}

/// The result of a completion call.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompletionResponse {
    /// Generated text.
    pub text: String,
    /// The model that actually served the request.
    pub model_used: String,
    /// Which backend produced the text.
    pub provider: ProviderKind,
    pub usage: TokenUsage,
}

// ─── OpenAI Chat Completions Wire Types ──────────────────────────────────────

/// A single chat message.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: Role::System,
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }
}

/// Message role.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

/// Build the message list for a request: optional system, then user.
pub fn chat_messages(request: &CompletionRequest) -> Vec<ChatMessage> {
    let mut messages = Vec::with_capacity(2);
    if !request.system.is_empty() {
        messages.push(ChatMessage::system(request.system.clone()));
    }
    messages.push(ChatMessage::user(request.prompt.clone()));
    messages
}

/// Request body for `POST /v1/chat/completions`.
#[derive(Debug, Clone, Serialize)]
pub struct ChatCompletionRequest {
    pub model: String,
    pub messages: Vec<ChatMessage>,
    pub temperature: f32,
    pub max_tokens: u32,
    pub stream: bool,
}

/// Response body of `POST /v1/chat/completions` (fields we consume).
#[derive(Debug, Clone, Deserialize)]
pub struct ChatCompletionResponse {
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default)]
    pub choices: Vec<ChatChoice>,
    #[serde(default)]
    pub usage: Option<ChatUsage>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ChatChoice {
    pub message: ChatChoiceMessage,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ChatChoiceMessage {
    #[serde(default)]
    pub content: Option<String>,
}

#[derive(Debug, Clone, Copy, Deserialize)]
pub struct ChatUsage {
    #[serde(default)]
    pub prompt_tokens: u32,
    #[serde(default)]
    pub completion_tokens: u32,
}

// ─── Tests ───────────────────────────────────────────────────────────────────
