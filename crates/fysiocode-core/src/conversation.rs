//! Conversation state: per-id turn history plus the clarification state machine.
//!
//! The store is an explicit component created once per process and shared via
//! `Arc`; there is no global registry. Each entry is updated atomically, and
//! [`ConversationStore::acquire`] additionally serializes a whole resolution
//! flow per conversation id so unrelated conversations proceed in parallel.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use thiserror::Error;
use tokio::sync::{Mutex, OwnedSemaphorePermit, Semaphore};

use fysiocode_schema::{
    new_conversation_id, ConversationStatus, Suggestion, Turn, TurnKind,
};

#[derive(Debug, Error)]
pub enum ConversationError {
    #[error("conversation not found: {0}")]
    NotFound(String),
    #[error("cannot record a {kind:?} turn while the conversation is {status:?}")]
    InvalidTransition {
        status: ConversationStatus,
        kind: TurnKind,
    },
    #[error("conversation {0} has no recorded turns to resolve")]
    NoTurns(String),
}

#[derive(Debug, Clone)]
pub struct Conversation {
    pub id: String,
    pub status: ConversationStatus,
    pub turns: Vec<Turn>,
    pub last_active: DateTime<Utc>,
}

impl Conversation {
    fn new(id: String) -> Self {
        Self {
            id,
            status: ConversationStatus::New,
            turns: Vec::new(),
            last_active: Utc::now(),
        }
    }
}

#[derive(Clone, Default)]
pub struct ConversationStore {
    entries: Arc<Mutex<HashMap<String, Arc<Mutex<Conversation>>>>>,
    locks: Arc<Mutex<HashMap<String, Arc<Semaphore>>>>,
}

/// Held for the duration of one resolution flow; released on drop.
pub struct ConversationGuard {
    _permit: OwnedSemaphorePermit,
}

impl ConversationStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Serialize a full resolution flow for one conversation id.
    pub async fn acquire(&self, id: &str) -> ConversationGuard {
        let semaphore = {
            let mut locks = self.locks.lock().await;
            locks
                .entry(id.to_string())
                .or_insert_with(|| Arc::new(Semaphore::new(1)))
                .clone()
        };
        let permit = semaphore.acquire_owned().await.expect("semaphore closed");
        ConversationGuard { _permit: permit }
    }

    /// Return an existing conversation's id or create one, minting a fresh
    /// id when none was supplied.
    pub async fn get_or_create(&self, id: Option<&str>) -> String {
        let id = id
            .map(str::to_string)
            .unwrap_or_else(new_conversation_id);
        let mut entries = self.entries.lock().await;
        entries
            .entry(id.clone())
            .or_insert_with(|| Arc::new(Mutex::new(Conversation::new(id.clone()))));
        id
    }

    /// Create a conversation seeded with its first patient query turn.
    pub async fn start(&self, initial_query: &str) -> Result<String, ConversationError> {
        let id = self.get_or_create(None).await;
        self.append_turn(&id, Turn::patient_query(initial_query))
            .await?;
        Ok(id)
    }

    async fn entry(&self, id: &str) -> Result<Arc<Mutex<Conversation>>, ConversationError> {
        let entries = self.entries.lock().await;
        entries
            .get(id)
            .cloned()
            .ok_or_else(|| ConversationError::NotFound(id.to_string()))
    }

    /// Append a turn, enforcing the conversation state machine.
    pub async fn append_turn(&self, id: &str, turn: Turn) -> Result<(), ConversationError> {
        let entry = self.entry(id).await?;
        let mut conv = entry.lock().await;

        use ConversationStatus::*;
        let next = match (conv.status, turn.kind) {
            (New, TurnKind::Query) => Active,
            (Active, TurnKind::Query) => Active,
            (Active, TurnKind::ClarificationQuestion) => AwaitingClarification,
            (AwaitingClarification, TurnKind::ClarificationAnswer) => Active,
            (Active, TurnKind::ClarificationAnswer) => Active,
            (Active, TurnKind::Resolution) => {
                if conv.turns.is_empty() {
                    return Err(ConversationError::NoTurns(id.to_string()));
                }
                Resolved
            }
            (status, kind) => {
                return Err(ConversationError::InvalidTransition { status, kind });
            }
        };

        conv.turns.push(turn);
        conv.status = next;
        conv.last_active = Utc::now();
        Ok(())
    }

    /// Seed imported history into a conversation that has not started yet.
    /// Used when a caller migrates prior turns; the state machine applies to
    /// everything appended afterwards.
    pub async fn seed_history(&self, id: &str, turns: Vec<Turn>) -> Result<(), ConversationError> {
        if turns.is_empty() {
            return Ok(());
        }
        let entry = self.entry(id).await?;
        let mut conv = entry.lock().await;
        if conv.status != ConversationStatus::New || !conv.turns.is_empty() {
            return Err(ConversationError::InvalidTransition {
                status: conv.status,
                kind: turns[0].kind,
            });
        }
        conv.turns = turns;
        conv.status = ConversationStatus::Active;
        conv.last_active = Utc::now();
        Ok(())
    }

    /// Record the final candidate set and close the conversation.
    pub async fn mark_resolved(
        &self,
        id: &str,
        suggestions: &[Suggestion],
    ) -> Result<(), ConversationError> {
        let codes = suggestions
            .iter()
            .map(|s| s.code.as_str())
            .collect::<Vec<_>>()
            .join(", ");
        self.append_turn(id, Turn::resolution(format!("codes: {codes}")))
            .await
    }

    pub async fn history(&self, id: &str) -> Result<Vec<Turn>, ConversationError> {
        let entry = self.entry(id).await?;
        let conv = entry.lock().await;
        Ok(conv.turns.clone())
    }

    pub async fn status(&self, id: &str) -> Result<ConversationStatus, ConversationError> {
        let entry = self.entry(id).await?;
        let conv = entry.lock().await;
        Ok(conv.status)
    }

    pub async fn snapshot(&self, id: &str) -> Result<Conversation, ConversationError> {
        let entry = self.entry(id).await?;
        let conv = entry.lock().await;
        Ok(conv.clone())
    }

    /// Concatenate all patient query and clarification-answer turns into one
    /// resolvable text blob.
    pub async fn build_complete_query(&self, id: &str) -> Result<String, ConversationError> {
        let entry = self.entry(id).await?;
        let conv = entry.lock().await;
        Ok(conv
            .turns
            .iter()
            .filter(|t| {
                matches!(t.kind, TurnKind::Query | TurnKind::ClarificationAnswer)
            })
            .map(|t| t.content.trim())
            .collect::<Vec<_>>()
            .join(" "))
    }

    /// Explicit abandon from any state; returns the previous status.
    pub async fn abandon(&self, id: &str) -> Result<ConversationStatus, ConversationError> {
        let entry = self.entry(id).await?;
        let mut conv = entry.lock().await;
        let previous = conv.status;
        conv.status = ConversationStatus::Abandoned;
        conv.last_active = Utc::now();
        Ok(previous)
    }

    /// Mark conversations idle for longer than `max_idle` as abandoned and
    /// evict them. Returns the number of evicted conversations.
    pub async fn sweep_idle(&self, max_idle: Duration) -> usize {
        let cutoff = Utc::now() - max_idle;
        let mut entries = self.entries.lock().await;
        let mut evicted = Vec::new();
        for (id, entry) in entries.iter() {
            let mut conv = entry.lock().await;
            if conv.last_active < cutoff {
                conv.status = ConversationStatus::Abandoned;
                evicted.push(id.clone());
            }
        }
        for id in &evicted {
            entries.remove(id);
        }
        if !evicted.is_empty() {
            let mut locks = self.locks.lock().await;
            for id in &evicted {
                locks.remove(id);
            }
        }
        evicted.len()
    }

    pub async fn len(&self) -> usize {
        self.entries.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.entries.lock().await.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[tokio::test]
    async fn first_query_moves_new_to_active() {
        let store = ConversationStore::new();
        let id = store.start("kniepijn bij traplopen").await.unwrap();
        assert_eq!(store.status(&id).await.unwrap(), ConversationStatus::Active);
        assert_eq!(store.history(&id).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn clarification_loop_transitions() {
        let store = ConversationStore::new();
        let id = store.start("pijn").await.unwrap();

        store
            .append_turn(&id, Turn::clarification_question("Waar zit de pijn?"))
            .await
            .unwrap();
        assert_eq!(
            store.status(&id).await.unwrap(),
            ConversationStatus::AwaitingClarification
        );

        store
            .append_turn(&id, Turn::clarification_answer("in mijn knie"))
            .await
            .unwrap();
        assert_eq!(store.status(&id).await.unwrap(), ConversationStatus::Active);

        store
            .mark_resolved(&id, &[Suggestion::new("7920", "Knie - tendinopathie", "x", 0.8)])
            .await
            .unwrap();
        assert_eq!(
            store.status(&id).await.unwrap(),
            ConversationStatus::Resolved
        );
        let turns = store.history(&id).await.unwrap();
        assert_eq!(turns.last().unwrap().kind, TurnKind::Resolution);
        assert!(turns.last().unwrap().content.contains("7920"));
    }

    #[tokio::test]
    async fn new_conversation_cannot_resolve_directly() {
        let store = ConversationStore::new();
        let id = store.get_or_create(None).await;
        let err = store.mark_resolved(&id, &[]).await.unwrap_err();
        assert!(matches!(err, ConversationError::InvalidTransition { .. }));
        // State unchanged after the rejected transition.
        assert_eq!(store.status(&id).await.unwrap(), ConversationStatus::New);
    }

    #[tokio::test]
    async fn resolved_conversation_rejects_further_turns() {
        let store = ConversationStore::new();
        let id = store.start("kniepijn bij traplopen").await.unwrap();
        store
            .mark_resolved(&id, &[Suggestion::new("7920", "n", "r", 0.8)])
            .await
            .unwrap();

        let err = store
            .append_turn(&id, Turn::patient_query("nog een vraag"))
            .await
            .unwrap_err();
        assert!(matches!(err, ConversationError::InvalidTransition { .. }));
    }

    #[tokio::test]
    async fn answer_without_pending_question_is_rejected_from_new() {
        let store = ConversationStore::new();
        let id = store.get_or_create(None).await;
        let err = store
            .append_turn(&id, Turn::clarification_answer("knie"))
            .await
            .unwrap_err();
        assert!(matches!(err, ConversationError::InvalidTransition { .. }));
    }

    #[tokio::test]
    async fn complete_query_concatenates_patient_text_only() {
        let store = ConversationStore::new();
        let id = store.start("pijn in de knie").await.unwrap();
        store
            .append_turn(&id, Turn::clarification_question("Sinds wanneer?"))
            .await
            .unwrap();
        store
            .append_turn(&id, Turn::clarification_answer("sinds drie weken"))
            .await
            .unwrap();

        assert_eq!(
            store.build_complete_query(&id).await.unwrap(),
            "pijn in de knie sinds drie weken"
        );
    }

    #[tokio::test]
    async fn get_or_create_is_idempotent_for_known_ids() {
        let store = ConversationStore::new();
        let id = store.start("kniepijn bij traplopen").await.unwrap();
        let same = store.get_or_create(Some(&id)).await;
        assert_eq!(id, same);
        assert_eq!(store.history(&id).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn unknown_conversation_reports_not_found() {
        let store = ConversationStore::new();
        let err = store.history("missing").await.unwrap_err();
        assert!(matches!(err, ConversationError::NotFound(_)));
    }

    #[tokio::test]
    async fn abandon_works_from_any_state() {
        let store = ConversationStore::new();
        let id = store.start("kniepijn").await.unwrap();
        let previous = store.abandon(&id).await.unwrap();
        assert_eq!(previous, ConversationStatus::Active);
        assert_eq!(
            store.status(&id).await.unwrap(),
            ConversationStatus::Abandoned
        );
    }

    #[tokio::test]
    async fn sweep_idle_evicts_stale_conversations() {
        let store = ConversationStore::new();
        let id = store.start("kniepijn bij traplopen").await.unwrap();
        assert_eq!(store.sweep_idle(Duration::hours(1)).await, 0);
        assert_eq!(store.sweep_idle(Duration::zero()).await, 1);
        assert!(matches!(
            store.status(&id).await.unwrap_err(),
            ConversationError::NotFound(_)
        ));
        assert!(store.is_empty().await);
    }

    #[tokio::test]
    async fn seed_history_only_into_fresh_conversations() {
        let store = ConversationStore::new();
        let id = store.get_or_create(None).await;
        store
            .seed_history(
                &id,
                vec![
                    Turn::patient_query("pijn"),
                    Turn::clarification_question("Waar?"),
                    Turn::clarification_answer("knie"),
                ],
            )
            .await
            .unwrap();
        assert_eq!(store.status(&id).await.unwrap(), ConversationStatus::Active);
        assert_eq!(store.history(&id).await.unwrap().len(), 3);

        let err = store
            .seed_history(&id, vec![Turn::patient_query("nogmaals")])
            .await
            .unwrap_err();
        assert!(matches!(err, ConversationError::InvalidTransition { .. }));
    }

    #[tokio::test]
    async fn same_conversation_serializes_different_ones_run_in_parallel() {
        let store = ConversationStore::new();
        let counter = Arc::new(AtomicUsize::new(0));

        let store1 = store.clone();
        let counter1 = counter.clone();
        let t1 = tokio::spawn(async move {
            let _guard = store1.acquire("a").await;
            counter1.fetch_add(1, Ordering::SeqCst);
            tokio::time::sleep(std::time::Duration::from_millis(50)).await;
            counter1.fetch_add(1, Ordering::SeqCst);
        });

        tokio::time::sleep(std::time::Duration::from_millis(10)).await;

        let store2 = store.clone();
        let counter2 = counter.clone();
        let t2 = tokio::spawn(async move {
            let _guard = store2.acquire("a").await;
            assert!(counter2.load(Ordering::SeqCst) >= 2);
        });

        let store3 = store.clone();
        let counter3 = counter.clone();
        let t3 = tokio::spawn(async move {
            let _guard = store3.acquire("b").await;
            // Unrelated id, must not wait for "a".
            assert!(counter3.load(Ordering::SeqCst) < 2);
        });

        t3.await.unwrap();
        t1.await.unwrap();
        t2.await.unwrap();
    }
}
