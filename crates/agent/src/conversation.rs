use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::RwLock;
use tracing::warn;
use uuid::Uuid;

use mabar_core::{AccumulatedInfo, ConversationMessage, UserPreferences};
use mabar_db::{PersistedConversation, SessionStateRepository};

pub const DEFAULT_MAX_HISTORY: usize = 20;

/// One session's working state: a bounded transcript plus the accumulated
/// slot dictionary. Oldest messages are dropped past the cap; slot merges
/// are shallow with last-write-wins.
#[derive(Clone, Debug, PartialEq)]
pub struct ConversationState {
    history: Vec<ConversationMessage>,
    accumulated: AccumulatedInfo,
    preferences: Option<UserPreferences>,
    max_history: usize,
}

impl Default for ConversationState {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_HISTORY)
    }
}

impl ConversationState {
    pub fn new(max_history: usize) -> Self {
        Self {
            history: Vec::new(),
            accumulated: AccumulatedInfo::default(),
            preferences: None,
            max_history: max_history.max(1),
        }
    }

    pub fn history(&self) -> &[ConversationMessage] {
        &self.history
    }

    pub fn accumulated(&self) -> &AccumulatedInfo {
        &self.accumulated
    }

    pub fn preferences(&self) -> Option<&UserPreferences> {
        self.preferences.as_ref()
    }

    pub fn set_preferences(&mut self, preferences: UserPreferences) {
        self.preferences = Some(preferences);
    }

    pub fn push_user(&mut self, text: impl Into<String>) {
        self.push(ConversationMessage::user(text));
    }

    pub fn push_model(&mut self, text: impl Into<String>) {
        self.push(ConversationMessage::model(text));
    }

    pub fn push(&mut self, message: ConversationMessage) {
        self.history.push(message);
        if self.history.len() > self.max_history {
            let excess = self.history.len() - self.max_history;
            self.history.drain(..excess);
        }
    }

    pub fn merge_info(&mut self, newer: AccumulatedInfo) {
        self.accumulated.merge(newer);
    }

    pub fn last_user_message(&self) -> Option<&str> {
        self.history
            .iter()
            .rev()
            .find(|message| message.role == mabar_core::Role::User)
            .map(|message| message.text.as_str())
    }

    /// Clears transcript and slots; profile preferences survive a reset.
    pub fn reset(&mut self) {
        self.history.clear();
        self.accumulated = AccumulatedInfo::default();
    }

    pub fn to_persisted(&self) -> PersistedConversation {
        PersistedConversation {
            history: self.history.clone(),
            accumulated: self.accumulated.clone(),
            updated_at: None,
        }
    }

    pub fn from_persisted(persisted: PersistedConversation, max_history: usize) -> Self {
        let mut state = Self::new(max_history);
        state.accumulated = persisted.accumulated;
        for message in persisted.history {
            state.push(message);
        }
        state
    }
}

pub fn generate_session_id() -> String {
    Uuid::new_v4().to_string()
}

/// Per-session state keyed by session id.
///
/// Each caller gets an isolated `ConversationState`; state is mirrored into
/// the repository after every turn and restored from it on first access, so
/// a session survives process restarts the way the original survived page
/// reloads. Repository failures degrade to in-memory-only operation.
pub struct SessionManager {
    sessions: RwLock<HashMap<String, ConversationState>>,
    repository: Option<Arc<dyn SessionStateRepository>>,
    max_history: usize,
}

impl SessionManager {
    pub fn new(repository: Option<Arc<dyn SessionStateRepository>>, max_history: usize) -> Self {
        Self {
            sessions: RwLock::new(HashMap::new()),
            repository,
            max_history: max_history.max(1),
        }
    }

    pub async fn state(&self, session_id: &str) -> ConversationState {
        if let Some(state) = self.sessions.read().await.get(session_id) {
            return state.clone();
        }

        if let Some(repository) = &self.repository {
            match repository.load(session_id).await {
                Ok(Some(persisted)) => {
                    let state = ConversationState::from_persisted(persisted, self.max_history);
                    self.sessions
                        .write()
                        .await
                        .insert(session_id.to_string(), state.clone());
                    return state;
                }
                Ok(None) => {}
                Err(error) => {
                    warn!(
                        event_name = "session.restore.failed",
                        session_id,
                        error = %error,
                        "could not restore persisted session state"
                    );
                }
            }
        }

        ConversationState::new(self.max_history)
    }

    pub async fn update(&self, session_id: &str, state: ConversationState) {
        if let Some(repository) = &self.repository {
            if let Err(error) = repository.save(session_id, &state.to_persisted()).await {
                warn!(
                    event_name = "session.persist.failed",
                    session_id,
                    error = %error,
                    "could not persist session state"
                );
            }
        }
        self.sessions.write().await.insert(session_id.to_string(), state);
    }

    /// Drops the in-memory state and deletes the persisted entry.
    pub async fn reset(&self, session_id: &str) {
        self.sessions.write().await.remove(session_id);
        if let Some(repository) = &self.repository {
            if let Err(error) = repository.clear(session_id).await {
                warn!(
                    event_name = "session.reset.failed",
                    session_id,
                    error = %error,
                    "could not clear persisted session state"
                );
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use mabar_core::AccumulatedInfo;
    use mabar_db::{InMemorySessionStateRepository, SessionStateRepository};

    use super::{ConversationState, SessionManager};

    #[test]
    fn history_is_bounded_and_drops_oldest_entries() {
        let mut state = ConversationState::new(20);
        for index in 0..25 {
            state.push_user(format!("message {index}"));
        }

        assert_eq!(state.history().len(), 20);
        assert_eq!(state.history()[0].text, "message 5");
        assert_eq!(state.history()[19].text, "message 24");
    }

    #[test]
    fn reset_clears_history_and_slots_but_keeps_preferences() {
        let mut state = ConversationState::default();
        state.push_user("find courts in kemang");
        state.merge_info(AccumulatedInfo {
            location: Some("Kemang".to_string()),
            ..AccumulatedInfo::default()
        });
        state.set_preferences(mabar_core::UserPreferences {
            skill_level: Some("advanced".to_string()),
            ..mabar_core::UserPreferences::default()
        });

        state.reset();

        assert!(state.history().is_empty());
        assert!(state.accumulated().is_empty());
        assert!(state.preferences().is_some());
    }

    #[test]
    fn last_user_message_skips_model_turns() {
        let mut state = ConversationState::default();
        state.push_user("first");
        state.push_model("a question back");

        assert_eq!(state.last_user_message(), Some("first"));
    }

    #[tokio::test]
    async fn sessions_are_isolated_by_id() {
        let manager = SessionManager::new(None, 20);

        let mut first = manager.state("session-a").await;
        first.push_user("hello from a");
        manager.update("session-a", first).await;

        let second = manager.state("session-b").await;
        assert!(second.history().is_empty(), "other sessions must not leak in");

        let restored = manager.state("session-a").await;
        assert_eq!(restored.history().len(), 1);
    }

    #[tokio::test]
    async fn state_round_trips_through_the_repository() {
        let repository = Arc::new(InMemorySessionStateRepository::default());
        let manager = SessionManager::new(Some(repository.clone()), 20);

        let mut state = manager.state("session-1").await;
        state.push_user("tomorrow evening in senayan");
        state.merge_info(AccumulatedInfo {
            location: Some("Senayan".to_string()),
            ..AccumulatedInfo::default()
        });
        manager.update("session-1", state).await;

        // A fresh manager over the same repository sees the persisted state.
        let rebooted = SessionManager::new(Some(repository.clone()), 20);
        let restored = rebooted.state("session-1").await;
        assert_eq!(restored.history().len(), 1);
        assert_eq!(restored.accumulated().location.as_deref(), Some("Senayan"));
    }

    #[tokio::test]
    async fn reset_clears_memory_and_persisted_entry() {
        let repository = Arc::new(InMemorySessionStateRepository::default());
        let manager = SessionManager::new(Some(repository.clone()), 20);

        let mut state = manager.state("session-1").await;
        state.push_user("hello");
        manager.update("session-1", state).await;

        manager.reset("session-1").await;

        let after = manager.state("session-1").await;
        assert!(after.history().is_empty());
        assert!(after.accumulated().is_empty());
        assert!(
            repository.load("session-1").await.expect("load").is_none(),
            "persisted entry must be cleared too"
        );
    }
}
