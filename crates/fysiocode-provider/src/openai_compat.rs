//! OpenAI-compatible chat-completions provider.
//!
//! Works against api.openai.com and any endpoint speaking the same format
//! (Ollama, vLLM, gateways); only the base URL differs.

use async_trait::async_trait;
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};

use crate::anthropic::{map_transport_error, summarize_error_body};
use crate::payload::{parse_payload, RawResolution};
use crate::{ProviderError, ResolutionProvider, ResolutionRequest};

#[derive(Debug, Clone)]
pub struct OpenAiCompatResolver {
    client: reqwest::Client,
    api_key: String,
    api_base: String,
    model: String,
}

impl OpenAiCompatResolver {
    pub fn new(
        api_key: impl Into<String>,
        api_base: impl Into<String>,
        model: impl Into<String>,
    ) -> Self {
        Self {
            client: reqwest::Client::builder()
                .timeout(std::time::Duration::from_secs(60))
                .build()
                .unwrap_or_default(),
            api_key: api_key.into(),
            api_base: api_base.into().trim_end_matches('/').to_string(),
            model: model.into(),
        }
    }

    fn to_api_request(&self, request: &ResolutionRequest) -> ApiRequest {
        let mut messages = vec![ApiMessage {
            role: "system".into(),
            content: request.system.clone(),
        }];
        messages.extend(request.messages.iter().map(|m| ApiMessage {
            role: m.role.clone(),
            content: m.content.clone(),
        }));
        ApiRequest {
            model: self.model.clone(),
            messages,
            max_tokens: request.max_tokens,
        }
    }
}

#[async_trait]
impl ResolutionProvider for OpenAiCompatResolver {
    async fn resolve(&self, request: ResolutionRequest) -> Result<RawResolution, ProviderError> {
        let url = format!("{}/chat/completions", self.api_base);
        let payload = self.to_api_request(&request);
        tracing::debug!(model = %self.model, turns = payload.messages.len(), "chat-completions resolution call");

        let resp = self
            .client
            .post(url)
            .header("authorization", format!("Bearer {}", self.api_key))
            .header("content-type", "application/json")
            .json(&payload)
            .send()
            .await
            .map_err(map_transport_error)?;

        let status = resp.status();
        if status != StatusCode::OK {
            let message = resp.text().await.unwrap_or_default();
            return Err(ProviderError::Status {
                status: status.as_u16(),
                message: summarize_error_body(&message),
            });
        }

        let body: ApiResponse = resp
            .json()
            .await
            .map_err(|e| ProviderError::Payload(format!("invalid response body: {e}")))?;
        let text = body
            .choices
            .first()
            .and_then(|c| c.message.content.as_deref())
            .unwrap_or_default();

        parse_payload(text)
    }
}

#[derive(Debug, Serialize)]
struct ApiRequest {
    model: String,
    messages: Vec<ApiMessage>,
    max_tokens: u32,
}

#[derive(Debug, Serialize)]
struct ApiMessage {
    role: String,
    content: String,
}

#[derive(Debug, Deserialize)]
struct ApiResponse {
    choices: Vec<ApiChoice>,
}

#[derive(Debug, Deserialize)]
struct ApiChoice {
    message: ApiChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ApiChoiceMessage {
    #[serde(default)]
    content: Option<String>,
}
