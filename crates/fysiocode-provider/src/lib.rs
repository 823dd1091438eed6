pub mod anthropic;
pub mod openai_compat;
pub mod payload;

use std::sync::Arc;

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub use anthropic::AnthropicResolver;
pub use openai_compat::OpenAiCompatResolver;
pub use payload::{parse_payload, RawResolution, RawSuggestion};

/// Typed boundary error for the generative text-resolution service.
#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("resolution service timeout: {0}")]
    Timeout(String),
    #[error("resolution service unreachable: {0}")]
    Connect(String),
    #[error("resolution service error ({status}): {message}")]
    Status { status: u16, message: String },
    #[error("malformed resolution payload: {0}")]
    Payload(String),
}

impl ProviderError {
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Timeout(_) | Self::Connect(_) => true,
            Self::Status { status, .. } => *status == 429 || *status >= 500,
            Self::Payload(_) => false,
        }
    }
}

#[derive(Debug, Clone)]
pub struct ChatMessage {
    pub role: String,
    pub content: String,
}

impl ChatMessage {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: "user".into(),
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: "assistant".into(),
            content: content.into(),
        }
    }
}

/// One generative resolution call: fixed system instruction plus turn history.
#[derive(Debug, Clone)]
pub struct ResolutionRequest {
    pub system: String,
    pub messages: Vec<ChatMessage>,
    pub max_tokens: u32,
}

#[async_trait]
pub trait ResolutionProvider: Send + Sync {
    async fn resolve(&self, request: ResolutionRequest) -> Result<RawResolution, ProviderError>;

    async fn health(&self) -> Result<(), ProviderError> {
        Ok(())
    }
}

// ============================================================
// Provider Configuration
// ============================================================

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ProviderType {
    Anthropic,
    /// Any OpenAI-compatible chat-completions endpoint.
    Openai,
    /// Deterministic in-process provider for tests and offline use.
    Stub,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderConfig {
    #[serde(rename = "type")]
    pub provider_type: ProviderType,
    #[serde(default)]
    pub api_key: Option<String>,
    #[serde(default)]
    pub base_url: Option<String>,
    #[serde(default)]
    pub model: Option<String>,
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            provider_type: ProviderType::Stub,
            api_key: None,
            base_url: None,
            model: None,
        }
    }
}

/// Create a provider from configuration.
pub fn create_provider(config: &ProviderConfig) -> Result<Arc<dyn ResolutionProvider>> {
    let provider: Arc<dyn ResolutionProvider> = match config.provider_type {
        ProviderType::Anthropic => {
            let key = config
                .api_key
                .as_ref()
                .ok_or_else(|| anyhow!("anthropic provider requires api_key"))?;
            let base_url = config
                .base_url
                .as_deref()
                .unwrap_or("https://api.anthropic.com");
            let model = config
                .model
                .as_deref()
                .unwrap_or("claude-3-5-haiku-latest");
            Arc::new(AnthropicResolver::new(key.clone(), base_url, model))
        }
        ProviderType::Openai => {
            let key = config
                .api_key
                .as_ref()
                .ok_or_else(|| anyhow!("openai provider requires api_key"))?;
            let base_url = config
                .base_url
                .as_deref()
                .unwrap_or("https://api.openai.com/v1");
            let model = config.model.as_deref().unwrap_or("gpt-4o-mini");
            Arc::new(OpenAiCompatResolver::new(key.clone(), base_url, model))
        }
        ProviderType::Stub => Arc::new(StubResolver::default()),
    };
    Ok(provider)
}

// ============================================================
// Stub provider
// ============================================================

/// Deterministic stand-in for the generative service.
///
/// Recognizes a handful of fixed complaint phrasings and asks for
/// clarification otherwise, so the full pipeline can run offline.
#[derive(Debug, Default)]
pub struct StubResolver;

#[async_trait]
impl ResolutionProvider for StubResolver {
    async fn resolve(&self, request: ResolutionRequest) -> Result<RawResolution, ProviderError> {
        let text = request
            .messages
            .iter()
            .rev()
            .find(|m| m.role == "user")
            .map(|m| m.content.to_lowercase())
            .unwrap_or_default();

        if text.contains("knie") {
            return Ok(RawResolution::Suggestions(vec![RawSuggestion {
                code: "7920".into(),
                name: "Knie - tendinopathie".into(),
                rationale: "Belastingsafhankelijke kniepijn, passend bij een tendinopathie van het strekapparaat.".into(),
                confidence: 0.8,
            }]));
        }
        if text.contains("schouder") {
            return Ok(RawResolution::Suggestions(vec![RawSuggestion {
                code: "2120".into(),
                name: "Schoudergewricht - tendinopathie".into(),
                rationale: "Pijn bij heffen van de arm, passend bij een tendinopathie van de rotator cuff.".into(),
                confidence: 0.75,
            }]));
        }

        Ok(RawResolution::Clarification {
            question: "Kunt u aangeven waar de klacht precies zit en wanneer deze optreedt?"
                .into(),
        })
    }
}
