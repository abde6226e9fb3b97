// SPDX-License-Identifier: MIT

//! Session store boundary
//!
//! `SessionStore` is everything a run reads before it starts and writes
//! after it ends. `InMemorySessionStore` backs the CLI, the HTTP server and
//! the tests.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::adk::error::ColloquyError;
use crate::colloquy::state::{
    ChatMessage, ExtractedFact, FactCategory, ProfileSnapshot, Role, RunRecord,
};

/// Reads and writes of session data around a workflow run
#[async_trait]
pub trait SessionStore: Send + Sync {
    /// Profile snapshot for a user; defaults when the user is unknown
    async fn fetch_profile(&self, user_id: &str) -> Result<ProfileSnapshot, ColloquyError>;

    /// The `limit` most recent user/writer messages, oldest first
    async fn fetch_history(
        &self,
        session_id: &str,
        limit: usize,
    ) -> Result<Vec<ChatMessage>, ColloquyError>;

    /// Content of the latest system message in the session
    async fn fetch_phase_prompt(&self, session_id: &str) -> Result<Option<String>, ColloquyError>;

    async fn fetch_message(
        &self,
        session_id: &str,
        message_id: &str,
    ) -> Result<Option<ChatMessage>, ColloquyError>;

    /// Store the outcome of a completed run
    async fn persist_run(&self, record: &RunRecord) -> Result<(), ColloquyError>;
}

#[derive(Debug, Default)]
struct SessionData {
    messages: Vec<ChatMessage>,
    finished: bool,
}

#[derive(Debug, Default)]
struct StoreData {
    sessions: HashMap<String, SessionData>,
    profiles: HashMap<String, ProfileSnapshot>,
    facts: HashMap<String, Vec<ExtractedFact>>,
}

/// Session store held in process memory
#[derive(Clone, Default)]
pub struct InMemorySessionStore {
    data: Arc<RwLock<StoreData>>,
}

impl InMemorySessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a message to a session, creating the session if needed
    pub async fn append_message(
        &self,
        session_id: &str,
        role: Role,
        content: impl Into<String>,
    ) -> ChatMessage {
        let message = ChatMessage::new(role, content);
        let mut data = self.data.write().await;
        data.sessions
            .entry(session_id.to_string())
            .or_default()
            .messages
            .push(message.clone());
        message
    }

    /// Set the self-described parts of a user's profile
    pub async fn upsert_profile(
        &self,
        user_id: &str,
        user_description: impl Into<String>,
        organization_description: impl Into<String>,
    ) {
        let mut data = self.data.write().await;
        let profile = data.profiles.entry(user_id.to_string()).or_default();
        profile.user_description = user_description.into();
        profile.organization_description = organization_description.into();
    }

    pub async fn is_finished(&self, session_id: &str) -> bool {
        let data = self.data.read().await;
        data.sessions
            .get(session_id)
            .is_some_and(|s| s.finished)
    }

    pub async fn facts_for(&self, user_id: &str) -> Vec<ExtractedFact> {
        let data = self.data.read().await;
        data.facts.get(user_id).cloned().unwrap_or_default()
    }

    pub async fn messages(&self, session_id: &str) -> Vec<ChatMessage> {
        let data = self.data.read().await;
        data.sessions
            .get(session_id)
            .map(|s| s.messages.clone())
            .unwrap_or_default()
    }
}

fn append_summary(summary: &mut String, text: &str) {
    if summary.is_empty() || summary == "none" {
        *summary = text.to_string();
    } else {
        summary.push('\n');
        summary.push_str(text);
    }
}

#[async_trait]
impl SessionStore for InMemorySessionStore {
    async fn fetch_profile(&self, user_id: &str) -> Result<ProfileSnapshot, ColloquyError> {
        let data = self.data.read().await;
        Ok(data.profiles.get(user_id).cloned().unwrap_or_default())
    }

    async fn fetch_history(
        &self,
        session_id: &str,
        limit: usize,
    ) -> Result<Vec<ChatMessage>, ColloquyError> {
        let data = self.data.read().await;
        let Some(session) = data.sessions.get(session_id) else {
            return Ok(Vec::new());
        };
        let mut recent: Vec<ChatMessage> = session
            .messages
            .iter()
            .rev()
            .filter(|m| m.role.is_conversational())
            .take(limit)
            .cloned()
            .collect();
        recent.reverse();
        Ok(recent)
    }

    async fn fetch_phase_prompt(&self, session_id: &str) -> Result<Option<String>, ColloquyError> {
        let data = self.data.read().await;
        Ok(data.sessions.get(session_id).and_then(|s| {
            s.messages
                .iter()
                .rev()
                .find(|m| m.role == Role::System)
                .map(|m| m.content.clone())
        }))
    }

    async fn fetch_message(
        &self,
        session_id: &str,
        message_id: &str,
    ) -> Result<Option<ChatMessage>, ColloquyError> {
        let data = self.data.read().await;
        Ok(data.sessions.get(session_id).and_then(|s| {
            s.messages.iter().find(|m| m.id == message_id).cloned()
        }))
    }

    async fn persist_run(&self, record: &RunRecord) -> Result<(), ColloquyError> {
        let mut data = self.data.write().await;

        let session = data.sessions.get_mut(&record.session_id).ok_or_else(|| {
            ColloquyError::store(format!("unknown session '{}'", record.session_id))
        })?;
        session.messages.extend(record.turns.iter().map(|t| ChatMessage {
            id: t.id.to_string(),
            role: t.role,
            content: t.text.clone(),
            created_at: t.created_at,
        }));
        if record.finished {
            session.finished = true;
        }

        let profile = data.profiles.entry(record.user_id.clone()).or_default();
        for fact in &record.facts {
            match fact.category {
                FactCategory::Subject => {
                    append_summary(&mut profile.distilled_subject_facts, &fact.raw_text)
                }
                FactCategory::Organization => {
                    append_summary(&mut profile.distilled_organization_facts, &fact.raw_text)
                }
            }
        }
        data.facts
            .entry(record.user_id.clone())
            .or_default()
            .extend(record.facts.iter().cloned());

        log::info!(
            "Persisted run for session {} ({} turns, {} facts, finished: {})",
            record.session_id,
            record.turns.len(),
            record.facts.len(),
            record.finished
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::colloquy::state::{FactAttributes, RunState, StepId, StepOutput};

    #[tokio::test]
    async fn test_unknown_user_gets_default_profile() {
        let store = InMemorySessionStore::new();
        let profile = store.fetch_profile("nobody").await.unwrap();
        assert_eq!(profile, ProfileSnapshot::default());
    }

    #[tokio::test]
    async fn test_history_is_limited_and_chronological() {
        let store = InMemorySessionStore::new();
        store.append_message("s", Role::System, "phase 1").await;
        for i in 0..5 {
            store.append_message("s", Role::User, format!("u{}", i)).await;
            store.append_message("s", Role::Writer, format!("w{}", i)).await;
        }
        store.append_message("s", Role::System, "phase 2").await;

        let history = store.fetch_history("s", 3).await.unwrap();
        let contents: Vec<&str> = history.iter().map(|m| m.content.as_str()).collect();
        assert_eq!(contents, vec!["w3", "u4", "w4"]);

        let phase = store.fetch_phase_prompt("s").await.unwrap();
        assert_eq!(phase.as_deref(), Some("phase 2"));
        assert!(store.fetch_history("missing", 3).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_fetch_message_is_scoped_to_session() {
        let store = InMemorySessionStore::new();
        let msg = store.append_message("a", Role::User, "hi").await;
        assert!(store.fetch_message("a", &msg.id).await.unwrap().is_some());
        assert!(store.fetch_message("b", &msg.id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_persist_run_updates_session_and_profile() {
        let store = InMemorySessionStore::new();
        store.upsert_profile("u", "Engineer", "Bakery").await;
        let inbound = store.append_message("s", Role::User, "We have 12 staff.").await;

        let mut state = RunState::new("s", "u", inbound);
        state.apply_extraction(crate::colloquy::state::ExtractionDelta {
            facts: vec![
                ExtractedFact::new(
                    FactCategory::Organization,
                    "12 staff",
                    FactAttributes::default(),
                ),
                ExtractedFact::new(
                    FactCategory::Organization,
                    "no data team",
                    FactAttributes::default(),
                ),
            ],
        });
        state.commit(StepOutput::new(StepId::Writer, Role::Writer, "Thanks, bye!"));
        state.mark_finished();

        store.persist_run(&state.to_record()).await.unwrap();

        assert!(store.is_finished("s").await);
        assert_eq!(store.facts_for("u").await.len(), 2);
        let profile = store.fetch_profile("u").await.unwrap();
        assert_eq!(profile.user_description, "Engineer");
        assert_eq!(profile.distilled_organization_facts, "12 staff\nno data team");
        assert_eq!(profile.distilled_subject_facts, "none");

        let history = store.fetch_history("s", 30).await.unwrap();
        assert_eq!(history.last().unwrap().content, "Thanks, bye!");
    }

    #[tokio::test]
    async fn test_persist_unknown_session_fails() {
        let store = InMemorySessionStore::new();
        let state = RunState::new("ghost", "u", ChatMessage::new(Role::User, "hi"));
        assert!(matches!(
            store.persist_run(&state.to_record()).await,
            Err(ColloquyError::Store(_))
        ));
    }
}
