use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A single free-text resolution request.
///
/// `context` carries prior turns when a caller migrates an existing dialogue
/// into a fresh conversation; it is ignored for known conversation ids.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Query {
    pub text: String,
    #[serde(default)]
    pub conversation_id: Option<String>,
    #[serde(default)]
    pub context: Vec<Turn>,
}

impl Query {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            conversation_id: None,
            context: Vec::new(),
        }
    }

    pub fn with_conversation(mut self, id: impl Into<String>) -> Self {
        self.conversation_id = Some(id.into());
        self
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum TurnRole {
    Patient,
    System,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
pub enum TurnKind {
    Query,
    ClarificationQuestion,
    ClarificationAnswer,
    Resolution,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Turn {
    pub role: TurnRole,
    pub kind: TurnKind,
    pub content: String,
    pub at: DateTime<Utc>,
}

impl Turn {
    fn new(role: TurnRole, kind: TurnKind, content: impl Into<String>) -> Self {
        Self {
            role,
            kind,
            content: content.into(),
            at: Utc::now(),
        }
    }

    pub fn patient_query(text: impl Into<String>) -> Self {
        Self::new(TurnRole::Patient, TurnKind::Query, text)
    }

    pub fn clarification_question(text: impl Into<String>) -> Self {
        Self::new(TurnRole::System, TurnKind::ClarificationQuestion, text)
    }

    pub fn clarification_answer(text: impl Into<String>) -> Self {
        Self::new(TurnRole::Patient, TurnKind::ClarificationAnswer, text)
    }

    pub fn resolution(text: impl Into<String>) -> Self {
        Self::new(TurnRole::System, TurnKind::Resolution, text)
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
pub enum ConversationStatus {
    New,
    Active,
    AwaitingClarification,
    Resolved,
    Abandoned,
}

impl ConversationStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Resolved | Self::Abandoned)
    }
}

/// Generate an opaque conversation id.
pub fn new_conversation_id() -> String {
    Uuid::new_v4().to_string()
}

/// A candidate diagnosis code as returned to callers.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Suggestion {
    /// 4-digit code: location segment + pathology segment.
    pub code: String,
    pub name: String,
    pub rationale: String,
    /// Estimated correctness in [0, 1].
    pub confidence: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub detail: Option<DetailedRationale>,
}

impl Suggestion {
    pub fn new(
        code: impl Into<String>,
        name: impl Into<String>,
        rationale: impl Into<String>,
        confidence: f64,
    ) -> Self {
        Self {
            code: code.into(),
            name: name.into(),
            rationale: rationale.into(),
            confidence: confidence.clamp(0.0, 1.0),
            detail: None,
        }
    }
}

/// Structured clinical explanation attached to a suggestion.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DetailedRationale {
    /// At most 150 characters, ending on a sentence boundary.
    pub summary: String,
    /// Labeled multi-section narrative.
    pub extended: String,
    pub reasoning_steps: Vec<String>,
    pub confidence_factors: Vec<String>,
    /// Neighbouring codes worth considering.
    #[serde(default)]
    pub alternatives: Vec<String>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
pub enum ErrorKind {
    Validation,
    Network,
    GenerativeService,
    KnowledgeBase,
    RateLimit,
    Unknown,
}

/// A raw failure mapped into the wire-visible taxonomy.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClassifiedError {
    pub kind: ErrorKind,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,
    pub recoverable: bool,
    #[serde(default)]
    pub suggestions: Vec<String>,
    pub at: DateTime<Utc>,
}

impl ClassifiedError {
    pub fn new(kind: ErrorKind, message: impl Into<String>, recoverable: bool) -> Self {
        Self {
            kind,
            message: message.into(),
            code: None,
            recoverable,
            suggestions: Vec::new(),
            at: Utc::now(),
        }
    }

    pub fn with_code(mut self, code: impl Into<String>) -> Self {
        self.code = Some(code.into());
        self
    }

    pub fn with_suggestion(mut self, suggestion: impl Into<String>) -> Self {
        self.suggestions.push(suggestion.into());
        self
    }
}

/// The only shape callers ever receive; `success == error.is_none()`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResolutionResult {
    pub success: bool,
    pub suggestions: Vec<Suggestion>,
    pub needs_clarification: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub clarifying_question: Option<String>,
    pub conversation_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<ClassifiedError>,
}

impl ResolutionResult {
    pub fn resolved(conversation_id: impl Into<String>, suggestions: Vec<Suggestion>) -> Self {
        Self {
            success: true,
            suggestions,
            needs_clarification: false,
            clarifying_question: None,
            conversation_id: conversation_id.into(),
            error: None,
        }
    }

    pub fn clarification(conversation_id: impl Into<String>, question: impl Into<String>) -> Self {
        Self {
            success: true,
            suggestions: Vec::new(),
            needs_clarification: true,
            clarifying_question: Some(question.into()),
            conversation_id: conversation_id.into(),
            error: None,
        }
    }

    /// Terminal fallback: ask for more detail while surfacing a structured error.
    pub fn degraded(
        conversation_id: impl Into<String>,
        question: impl Into<String>,
        error: ClassifiedError,
    ) -> Self {
        Self {
            success: false,
            suggestions: Vec::new(),
            needs_clarification: true,
            clarifying_question: Some(question.into()),
            conversation_id: conversation_id.into(),
            error: Some(error),
        }
    }

    /// Input rejected before any processing.
    pub fn rejected(conversation_id: impl Into<String>, error: ClassifiedError) -> Self {
        Self {
            success: false,
            suggestions: Vec::new(),
            needs_clarification: false,
            clarifying_question: None,
            conversation_id: conversation_id.into(),
            error: Some(error),
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    Healthy,
    Degraded,
    Unhealthy,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthReport {
    pub status: HealthStatus,
    pub detail: String,
    pub checked_at: DateTime<Utc>,
}
