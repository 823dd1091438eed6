//! Strict parsing of the generative service's resolution payload.
//!
//! The model is instructed to reply with a single JSON object of the shape
//! `{suggestions[], needsClarification, clarifyingQuestion}`. The reply is
//! validated the moment it is received and turned into a tagged union; the
//! rest of the pipeline never sees the loose wire shape.

use serde::Deserialize;

use crate::ProviderError;

/// Validated outcome of one generative resolution call.
#[derive(Debug, Clone, PartialEq)]
pub enum RawResolution {
    Suggestions(Vec<RawSuggestion>),
    Clarification { question: String },
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct RawSuggestion {
    pub code: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub rationale: String,
    #[serde(default = "default_confidence")]
    pub confidence: f64,
}

fn default_confidence() -> f64 {
    0.5
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct WirePayload {
    #[serde(default)]
    suggestions: Vec<RawSuggestion>,
    #[serde(default)]
    needs_clarification: bool,
    #[serde(default)]
    clarifying_question: Option<String>,
}

/// Parse model output text into a validated [`RawResolution`].
pub fn parse_payload(text: &str) -> Result<RawResolution, ProviderError> {
    let json = extract_json(text).ok_or_else(|| {
        ProviderError::Payload(format!(
            "no JSON object in model output ({} chars)",
            text.chars().count()
        ))
    })?;

    let wire: WirePayload = serde_json::from_str(json)
        .map_err(|e| ProviderError::Payload(format!("invalid resolution payload: {e}")))?;

    if wire.needs_clarification {
        let question = wire
            .clarifying_question
            .as_deref()
            .map(str::trim)
            .filter(|q| !q.is_empty())
            .ok_or_else(|| {
                ProviderError::Payload(
                    "needsClarification set without a clarifying question".into(),
                )
            })?;
        return Ok(RawResolution::Clarification {
            question: question.to_string(),
        });
    }

    if wire.suggestions.is_empty() {
        return Err(ProviderError::Payload(
            "payload carries neither suggestions nor a clarification request".into(),
        ));
    }

    let suggestions = wire
        .suggestions
        .into_iter()
        .map(|mut s| {
            if s.code.trim().is_empty() {
                return Err(ProviderError::Payload("suggestion with empty code".into()));
            }
            s.code = s.code.trim().to_string();
            s.confidence = s.confidence.clamp(0.0, 1.0);
            Ok(s)
        })
        .collect::<Result<Vec<_>, _>>()?;

    Ok(RawResolution::Suggestions(suggestions))
}

/// Locate the JSON object in model text, tolerating code fences and prose.
fn extract_json(text: &str) -> Option<&str> {
    let trimmed = text.trim();
    let body = trimmed
        .strip_prefix("```json")
        .or_else(|| trimmed.strip_prefix("```"))
        .map(|rest| rest.trim_start())
        .and_then(|rest| rest.strip_suffix("```").map(str::trim))
        .unwrap_or(trimmed);

    let start = body.find('{')?;
    let end = body.rfind('}')?;
    if end < start {
        return None;
    }
    Some(&body[start..=end])
}
