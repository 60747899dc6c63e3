//! Completion providers: one interface over local and cloud LLM backends.
//!
//! This module handles all communication with model endpoints:
//! - The `CompletionProvider` contract (`complete` + `probe`)
//! - Local Ollama (always registered)
//! - Claude, Gemini and OpenAI (registered only when a key is configured)
//! - Transient vs. terminal error classification
//!
//! Which provider sees which content is decided one layer up, in
//! [`crate::privacy`].

pub mod claude;
pub mod client;
pub mod errors;
pub mod gemini;
pub mod ollama;
pub mod openai;
pub mod types;

// Re-exports for convenience
pub use claude::ClaudeProvider;
pub use client::CompletionProvider;
pub use errors::ProviderError;
pub use gemini::GeminiProvider;
pub use ollama::OllamaProvider;
pub use openai::OpenAiProvider;
pub use types::{CompletionRequest, CompletionResponse, ProviderKind, TokenUsage};
