use async_trait::async_trait;
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};

use crate::payload::{parse_payload, RawResolution};
use crate::{ProviderError, ResolutionProvider, ResolutionRequest};

const REQUEST_TIMEOUT_SECS: u64 = 60;

/// Resolution provider over the Anthropic messages API.
#[derive(Debug, Clone)]
pub struct AnthropicResolver {
    client: reqwest::Client,
    api_key: String,
    api_base: String,
    model: String,
}

impl AnthropicResolver {
    pub fn new(
        api_key: impl Into<String>,
        api_base: impl Into<String>,
        model: impl Into<String>,
    ) -> Self {
        Self {
            client: reqwest::Client::builder()
                .timeout(std::time::Duration::from_secs(REQUEST_TIMEOUT_SECS))
                .build()
                .unwrap_or_default(),
            api_key: api_key.into(),
            api_base: api_base.into().trim_end_matches('/').to_string(),
            model: model.into(),
        }
    }

    fn to_api_request(&self, request: &ResolutionRequest) -> ApiRequest {
        ApiRequest {
            model: self.model.clone(),
            system: Some(request.system.clone()),
            max_tokens: request.max_tokens,
            messages: request
                .messages
                .iter()
                .map(|m| ApiMessage {
                    role: m.role.clone(),
                    content: m.content.clone(),
                })
                .collect(),
        }
    }
}

#[async_trait]
impl ResolutionProvider for AnthropicResolver {
    async fn resolve(&self, request: ResolutionRequest) -> Result<RawResolution, ProviderError> {
        let url = format!("{}/v1/messages", self.api_base);
        let payload = self.to_api_request(&request);
        tracing::debug!(model = %self.model, turns = payload.messages.len(), "anthropic resolution call");

        let resp = self
            .client
            .post(url)
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", "2023-06-01")
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
            .content
            .iter()
            .filter_map(|block| block.text.as_deref())
            .collect::<Vec<_>>()
            .join("\n");

        parse_payload(&text)
    }
}

pub(crate) fn map_transport_error(e: reqwest::Error) -> ProviderError {
    if e.is_timeout() {
        ProviderError::Timeout(format!("request timed out after {REQUEST_TIMEOUT_SECS}s"))
    } else if e.is_connect() {
        ProviderError::Connect(e.to_string())
    } else {
        ProviderError::Connect(e.to_string())
    }
}

/// Pull the human-readable message out of an API error body when possible.
pub(crate) fn summarize_error_body(body: &str) -> String {
    serde_json::from_str::<ApiError>(body)
        .map(|e| e.error.message)
        .unwrap_or_else(|_| {
            let mut text = body.trim().to_string();
            if text.is_empty() {
                text = "no error body".into();
            }
            text
        })
}

#[derive(Debug, Serialize)]
struct ApiRequest {
    model: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    system: Option<String>,
    max_tokens: u32,
    messages: Vec<ApiMessage>,
}

#[derive(Debug, Serialize)]
struct ApiMessage {
    role: String,
    content: String,
}

#[derive(Debug, Deserialize)]
struct ApiResponse {
    content: Vec<ApiContentBlock>,
}

#[derive(Debug, Deserialize)]
struct ApiContentBlock {
    #[serde(default)]
    text: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ApiError {
    error: ApiErrorDetail,
}

#[derive(Debug, Deserialize)]
struct ApiErrorDetail {
    message: String,
}
