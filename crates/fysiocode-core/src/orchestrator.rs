//! Drives a complaint from free text to a ranked candidate set.
//!
//! The generative path is tried first, up to `max_attempts` times with linear
//! backoff. A rejected or failed generative pass falls back to deterministic
//! pattern matching at reduced confidence. Callers always receive a
//! [`ResolutionResult`]; raw errors never cross this boundary.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use fysiocode_provider::{
    create_provider, ProviderError, RawResolution, ResolutionProvider, ResolutionRequest,
};
use fysiocode_schema::{
    new_conversation_id, ClassifiedError, ConversationStatus, ErrorKind, HealthReport,
    HealthStatus, Query, ResolutionResult, Suggestion, Turn, TurnKind,
};
use fysiocode_taxonomy::CodeTable;

use crate::classify::{classify, should_retry, ErrorContext};
use crate::config::{AppConfig, ResolverConfig};
use crate::conversation::ConversationStore;
use crate::pattern::PatternEngine;
use crate::prompt::{build_messages, build_system_prompt};
use crate::rationale::{validate_rationale, RationaleContext, RationaleGenerator};
use crate::validator::ResponseValidator;

/// Markup fragments that are never legitimate in a complaint description.
const DISALLOWED_PATTERNS: &[&str] = &[
    "<script",
    "javascript:",
    "onerror=",
    "onload=",
    "<iframe",
    "data:text/html",
];

const GENERIC_REPROMPT: &str = "Er ging iets mis bij het verwerken van uw klacht. \
Kunt u uw klacht opnieuw en iets uitgebreider beschrijven?";

/// Fixed complaint used to probe the pipeline end to end.
const HEALTH_PROBE: &str = "kniepijn bij traplopen";

/// Which path produced a result.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResolutionSource {
    Generative,
    Fallback,
    Terminal,
}

enum GenerativeOutcome {
    Suggestions(Vec<Suggestion>),
    Clarify(String),
    Failed(Option<ClassifiedError>),
}

pub struct Resolver {
    provider: Arc<dyn ResolutionProvider>,
    store: ConversationStore,
    validator: ResponseValidator,
    pattern: PatternEngine,
    rationale: RationaleGenerator,
    table: Arc<CodeTable>,
    system_prompt: String,
    config: ResolverConfig,
}

impl Resolver {
    pub fn new(provider: Arc<dyn ResolutionProvider>, config: ResolverConfig) -> Self {
        let table = Arc::new(CodeTable::new());
        let system_prompt = build_system_prompt(&table);
        Self {
            provider,
            store: ConversationStore::new(),
            validator: ResponseValidator::new(table.clone()),
            pattern: PatternEngine::new(table.clone()),
            rationale: RationaleGenerator::new(table.clone()),
            table,
            system_prompt,
            config,
        }
    }

    pub fn from_config(config: &AppConfig) -> anyhow::Result<Self> {
        let provider = create_provider(&config.provider)?;
        Ok(Self::new(provider, config.resolver.clone()))
    }

    pub fn store(&self) -> &ConversationStore {
        &self.store
    }

    pub fn table(&self) -> &CodeTable {
        &self.table
    }

    /// Resolve a free-text complaint, continuing an existing conversation
    /// when the query names one.
    pub async fn resolve(&self, query: &Query) -> ResolutionResult {
        self.resolve_in(&self.store, query).await.0
    }

    /// Record a clarification answer and re-run resolution over the full
    /// accumulated conversation.
    pub async fn resolve_clarification(
        &self,
        conversation_id: &str,
        answer: &str,
    ) -> ResolutionResult {
        let trimmed = match self.guard_input(answer) {
            Ok(t) => t,
            Err(err) => return ResolutionResult::rejected(conversation_id, err),
        };

        let _guard = self.store.acquire(conversation_id).await;
        if let Err(err) = self
            .store
            .append_turn(conversation_id, Turn::clarification_answer(&trimmed))
            .await
        {
            let classified = classify(&anyhow::Error::new(err), ErrorContext::Input);
            return ResolutionResult::rejected(conversation_id, classified);
        }
        self.run_pipeline(&self.store, conversation_id).await.0
    }

    /// Probe the full pipeline with a fixed, resolvable complaint.
    pub async fn health_check(&self) -> HealthReport {
        let scratch = ConversationStore::new();
        let (result, source) = self.resolve_in(&scratch, &Query::new(HEALTH_PROBE)).await;

        let (status, detail) = if let Some(err) = &result.error {
            (
                HealthStatus::Unhealthy,
                format!("probe failed: {}", err.message),
            )
        } else if source == ResolutionSource::Generative && !result.suggestions.is_empty() {
            (
                HealthStatus::Healthy,
                "generative path resolved the probe complaint".to_string(),
            )
        } else {
            (
                HealthStatus::Degraded,
                "probe answered via fallback or clarification".to_string(),
            )
        };

        HealthReport {
            status,
            detail,
            checked_at: Utc::now(),
        }
    }

    async fn resolve_in(
        &self,
        store: &ConversationStore,
        query: &Query,
    ) -> (ResolutionResult, ResolutionSource) {
        let trimmed = match self.guard_input(&query.text) {
            Ok(t) => t,
            Err(err) => {
                let id = query
                    .conversation_id
                    .clone()
                    .unwrap_or_else(new_conversation_id);
                return (ResolutionResult::rejected(id, err), ResolutionSource::Terminal);
            }
        };

        let id = store.get_or_create(query.conversation_id.as_deref()).await;
        let _guard = store.acquire(&id).await;

        if !query.context.is_empty() {
            if let Ok(ConversationStatus::New) = store.status(&id).await {
                if let Err(err) = store.seed_history(&id, query.context.clone()).await {
                    tracing::warn!(conversation = %id, %err, "ignoring imported context");
                }
            }
        }

        // A follow-up query on a conversation that is waiting for an answer
        // counts as that answer; closed conversations take no further turns.
        let turn = match store.status(&id).await {
            Ok(status) if status.is_terminal() => {
                let err = ClassifiedError::new(
                    ErrorKind::Validation,
                    format!("conversation {id} is closed and cannot accept new turns"),
                    true,
                )
                .with_suggestion("start a new conversation for a new complaint");
                return (
                    ResolutionResult::rejected(id, err),
                    ResolutionSource::Terminal,
                );
            }
            Ok(ConversationStatus::AwaitingClarification) => Turn::clarification_answer(&trimmed),
            _ => Turn::patient_query(&trimmed),
        };
        if let Err(err) = store.append_turn(&id, turn).await {
            let classified = classify(&anyhow::Error::new(err), ErrorContext::Input);
            return (
                ResolutionResult::rejected(id, classified),
                ResolutionSource::Terminal,
            );
        }

        self.run_pipeline(store, &id).await
    }

    async fn run_pipeline(
        &self,
        store: &ConversationStore,
        id: &str,
    ) -> (ResolutionResult, ResolutionSource) {
        let (complete_query, history) = match (
            store.build_complete_query(id).await,
            store.history(id).await,
        ) {
            (Ok(q), Ok(h)) => (q, h),
            (Err(err), _) | (_, Err(err)) => {
                let classified = classify(&anyhow::Error::new(err), ErrorContext::General);
                return (
                    ResolutionResult::degraded(id, GENERIC_REPROMPT, classified),
                    ResolutionSource::Terminal,
                );
            }
        };

        let context = RationaleContext {
            query_text: complete_query.clone(),
            patient_notes: history
                .iter()
                .filter(|t| t.kind == TurnKind::ClarificationAnswer)
                .map(|t| t.content.clone())
                .collect(),
        };
        let messages = build_messages(&history);

        match self.generative_attempts(messages).await {
            GenerativeOutcome::Suggestions(candidates) => {
                let suggestions = self.enrich(candidates, true, &context);
                (
                    self.finish_resolved(store, id, suggestions).await,
                    ResolutionSource::Generative,
                )
            }
            GenerativeOutcome::Clarify(question) => (
                self.finish_clarification(store, id, question).await,
                ResolutionSource::Generative,
            ),
            GenerativeOutcome::Failed(error) => {
                // The fallback absorbs the generative failure; it is logged
                // here and never reaches the caller.
                if let Some(err) = error {
                    tracing::info!(
                        conversation = %id,
                        kind = ?err.kind,
                        "generative path exhausted ({}), using pattern fallback",
                        err.message
                    );
                }
                let analysis = self.pattern.analyze(&complete_query);
                if analysis.needs_clarification {
                    let question = analysis
                        .clarifying_question
                        .unwrap_or_else(|| GENERIC_REPROMPT.to_string());
                    (
                        self.finish_clarification(store, id, question).await,
                        ResolutionSource::Fallback,
                    )
                } else {
                    let mut candidates = analysis.suggestions;
                    for s in &mut candidates {
                        s.confidence =
                            (s.confidence * self.config.fallback_penalty).clamp(0.0, 1.0);
                    }
                    let suggestions = self.enrich(candidates, false, &context);
                    (
                        self.finish_resolved(store, id, suggestions).await,
                        ResolutionSource::Fallback,
                    )
                }
            }
        }
    }

    async fn generative_attempts(
        &self,
        messages: Vec<fysiocode_provider::ChatMessage>,
    ) -> GenerativeOutcome {
        let mut last_error = None;

        for attempt in 1..=self.config.max_attempts {
            let request = ResolutionRequest {
                system: self.system_prompt.clone(),
                messages: messages.clone(),
                max_tokens: self.config.max_tokens,
            };
            let call = self.provider.resolve(request);
            let outcome = match self.config.attempt_deadline_ms {
                Some(ms) => match tokio::time::timeout(Duration::from_millis(ms), call).await {
                    Ok(res) => res,
                    Err(_) => {
                        let err = anyhow::Error::new(ProviderError::Timeout(format!(
                            "attempt deadline of {ms}ms elapsed"
                        )));
                        return GenerativeOutcome::Failed(Some(classify(
                            &err,
                            ErrorContext::Generative,
                        )));
                    }
                },
                None => call.await,
            };

            match outcome {
                Ok(RawResolution::Clarification { question }) => {
                    return GenerativeOutcome::Clarify(question);
                }
                Ok(RawResolution::Suggestions(raw)) => {
                    let candidates: Vec<Suggestion> = raw
                        .into_iter()
                        .map(|r| Suggestion::new(r.code, r.name, r.rationale, r.confidence))
                        .collect();
                    let validation = self.validator.validate(&candidates);
                    if validation.accepted {
                        return GenerativeOutcome::Suggestions(candidates);
                    }
                    tracing::warn!(
                        attempt,
                        invalid = ?validation.invalid_codes,
                        mean_score = validation.mean_score,
                        "generative candidate set rejected"
                    );
                    let err = anyhow::Error::new(ProviderError::Payload(format!(
                        "candidate set rejected: invalid codes {:?}, mean score {:.2}",
                        validation.invalid_codes, validation.mean_score
                    )));
                    last_error = Some(classify(&err, ErrorContext::Generative));
                }
                Err(provider_err) => {
                    let err = anyhow::Error::new(provider_err);
                    let classified = classify(&err, ErrorContext::Generative);
                    let retry = should_retry(&classified);
                    tracing::warn!(
                        attempt,
                        kind = ?classified.kind,
                        retry,
                        "generative attempt failed: {}",
                        classified.message
                    );
                    last_error = Some(classified);
                    if !retry {
                        return GenerativeOutcome::Failed(last_error);
                    }
                }
            }

            if attempt < self.config.max_attempts {
                tokio::time::sleep(Duration::from_millis(
                    self.config.backoff_base_ms * u64::from(attempt),
                ))
                .await;
            }
        }

        GenerativeOutcome::Failed(last_error)
    }

    /// Attach detailed rationales, apply the validation boost where earned,
    /// and rank by confidence.
    fn enrich(
        &self,
        mut suggestions: Vec<Suggestion>,
        validated: bool,
        context: &RationaleContext,
    ) -> Vec<Suggestion> {
        for s in &mut suggestions {
            let detail = self.rationale.generate(&s.code, context);
            let quality = validate_rationale(&detail);
            if !quality.complete {
                tracing::debug!(code = %s.code, issues = ?quality.issues, "incomplete rationale");
            }
            if s.name.trim().is_empty() {
                if let Some(name) = self.table.display_name(&s.code) {
                    s.name = name;
                }
            }
            if s.rationale.trim().is_empty() {
                s.rationale = detail.summary.clone();
            }
            if validated {
                s.confidence = (s.confidence * self.config.validation_boost).min(1.0);
            }
            s.detail = Some(detail);
        }
        suggestions.sort_by(|a, b| {
            b.confidence
                .partial_cmp(&a.confidence)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        suggestions
    }

    async fn finish_resolved(
        &self,
        store: &ConversationStore,
        id: &str,
        suggestions: Vec<Suggestion>,
    ) -> ResolutionResult {
        if let Err(err) = store.mark_resolved(id, &suggestions).await {
            tracing::warn!(conversation = %id, %err, "failed to record resolution turn");
        }
        ResolutionResult::resolved(id, suggestions)
    }

    async fn finish_clarification(
        &self,
        store: &ConversationStore,
        id: &str,
        question: String,
    ) -> ResolutionResult {
        if let Err(err) = store
            .append_turn(id, Turn::clarification_question(&question))
            .await
        {
            tracing::warn!(conversation = %id, %err, "failed to record clarification turn");
        }
        ResolutionResult::clarification(id, question)
    }

    fn guard_input(&self, text: &str) -> Result<String, ClassifiedError> {
        let trimmed = text.trim();
        let len = trimmed.chars().count();

        if len < self.config.min_query_chars {
            return Err(ClassifiedError::new(
                ErrorKind::Validation,
                format!(
                    "query too short: {len} characters, minimum is {}",
                    self.config.min_query_chars
                ),
                true,
            )
            .with_suggestion("beschrijf de klacht in een of meer volledige zinnen"));
        }
        if len > self.config.max_query_chars {
            return Err(ClassifiedError::new(
                ErrorKind::Validation,
                format!(
                    "query too long: {len} characters, maximum is {}",
                    self.config.max_query_chars
                ),
                true,
            )
            .with_suggestion("beperk de beschrijving tot de kern van de klacht"));
        }

        let lower = trimmed.to_lowercase();
        if let Some(pattern) = DISALLOWED_PATTERNS.iter().find(|p| lower.contains(*p)) {
            return Err(ClassifiedError::new(
                ErrorKind::Validation,
                format!("query contains disallowed content: {pattern}"),
                false,
            ));
        }

        Ok(trimmed.to_string())
    }
}
