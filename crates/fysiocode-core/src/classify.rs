//! Maps raw failures into the wire-visible error taxonomy.
//!
//! Typed provider errors are downcast first; anything else goes through
//! string heuristics, with the context hint breaking ties for failures that
//! carry no recognizable signature.

use fysiocode_provider::ProviderError;
use fysiocode_schema::{ClassifiedError, ErrorKind};

use crate::conversation::ConversationError;

/// Where the failure surfaced, used when the error itself is not telling.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorContext {
    Input,
    Generative,
    KnowledgeBase,
    General,
}

pub fn classify(err: &anyhow::Error, context: ErrorContext) -> ClassifiedError {
    if let Some(provider_err) = err.downcast_ref::<ProviderError>() {
        return classify_provider(provider_err);
    }
    if let Some(conv_err) = err.downcast_ref::<ConversationError>() {
        return classify_conversation(conv_err);
    }
    classify_message(&err.to_string(), context)
}

fn classify_provider(err: &ProviderError) -> ClassifiedError {
    match err {
        ProviderError::Timeout(_) => {
            ClassifiedError::new(ErrorKind::GenerativeService, err.to_string(), true)
                .with_suggestion("retry after a short wait")
        }
        ProviderError::Connect(_) => {
            ClassifiedError::new(ErrorKind::Network, err.to_string(), true)
                .with_suggestion("check connectivity to the resolution service")
        }
        ProviderError::Status { status: 429, .. } => {
            ClassifiedError::new(ErrorKind::RateLimit, err.to_string(), true)
                .with_suggestion("wait before retrying")
        }
        ProviderError::Status { status, .. } if *status >= 500 => {
            ClassifiedError::new(ErrorKind::GenerativeService, err.to_string(), true)
                .with_suggestion("retry after a short wait")
        }
        ProviderError::Status { .. } => {
            ClassifiedError::new(ErrorKind::GenerativeService, err.to_string(), false)
        }
        ProviderError::Payload(_) => {
            ClassifiedError::new(ErrorKind::GenerativeService, err.to_string(), true)
                .with_suggestion("retry; the service returned an unusable payload")
        }
    }
}

fn classify_conversation(err: &ConversationError) -> ClassifiedError {
    match err {
        ConversationError::NotFound(id) => {
            ClassifiedError::new(ErrorKind::Validation, err.to_string(), true)
                .with_code(id.clone())
                .with_suggestion("start a new conversation by resolving without a conversation id")
        }
        ConversationError::InvalidTransition { .. } | ConversationError::NoTurns(_) => {
            ClassifiedError::new(ErrorKind::Validation, err.to_string(), true)
                .with_suggestion("start a new conversation for a new complaint")
        }
    }
}

fn classify_message(message: &str, context: ErrorContext) -> ClassifiedError {
    let lower = message.to_lowercase();

    if lower.contains("429") || lower.contains("rate limit") || lower.contains("rate_limit") {
        return ClassifiedError::new(ErrorKind::RateLimit, message, true)
            .with_suggestion("wait before retrying");
    }
    if lower.contains("timeout")
        || lower.contains("timed out")
        || lower.contains("deadline")
        || lower.contains("500")
        || lower.contains("502")
        || lower.contains("503")
        || lower.contains("504")
        || lower.contains("internal server error")
        || lower.contains("service unavailable")
        || lower.contains("bad gateway")
    {
        return ClassifiedError::new(ErrorKind::GenerativeService, message, true)
            .with_suggestion("retry after a short wait");
    }
    if lower.contains("connect")
        || lower.contains("connection")
        || lower.contains("dns")
        || lower.contains("unreachable")
        || lower.contains("network")
    {
        return ClassifiedError::new(ErrorKind::Network, message, true)
            .with_suggestion("check connectivity to the resolution service");
    }

    match context {
        ErrorContext::Input => ClassifiedError::new(ErrorKind::Validation, message, true)
            .with_suggestion("codes are exactly 4 digits: two for location, two for pathology"),
        ErrorContext::KnowledgeBase => {
            ClassifiedError::new(ErrorKind::KnowledgeBase, message, false)
        }
        ErrorContext::Generative | ErrorContext::General => {
            ClassifiedError::new(ErrorKind::Unknown, message, false)
        }
    }
}

/// Retry is only worthwhile for transient service-side failures.
pub fn should_retry(err: &ClassifiedError) -> bool {
    err.recoverable
        && matches!(
            err.kind,
            ErrorKind::Network | ErrorKind::GenerativeService | ErrorKind::RateLimit
        )
}
