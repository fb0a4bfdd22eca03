use std::collections::HashMap;

use tokio::sync::RwLock;

use super::{PersistedConversation, RepositoryError, SessionStateRepository};

/// In-memory stand-in for the SQLite repository, used by tests and by the
/// CLI chat REPL when no database is configured.
#[derive(Default)]
pub struct InMemorySessionStateRepository {
    sessions: RwLock<HashMap<String, PersistedConversation>>,
}

#[async_trait::async_trait]
impl SessionStateRepository for InMemorySessionStateRepository {
    async fn load(
        &self,
        session_id: &str,
    ) -> Result<Option<PersistedConversation>, RepositoryError> {
        let sessions = self.sessions.read().await;
        Ok(sessions.get(session_id).cloned())
    }

    async fn save(
        &self,
        session_id: &str,
        state: &PersistedConversation,
    ) -> Result<(), RepositoryError> {
        let mut sessions = self.sessions.write().await;
        sessions.insert(session_id.to_string(), state.clone());
        Ok(())
    }

    async fn clear(&self, session_id: &str) -> Result<(), RepositoryError> {
        let mut sessions = self.sessions.write().await;
        sessions.remove(session_id);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use mabar_core::{AccumulatedInfo, ConversationMessage};

    use crate::repositories::{
        InMemorySessionStateRepository, PersistedConversation, SessionStateRepository,
    };

    #[tokio::test]
    async fn in_memory_repo_round_trip_and_clear() {
        let repo = InMemorySessionStateRepository::default();
        let state = PersistedConversation {
            history: vec![ConversationMessage::user("hello")],
            accumulated: AccumulatedInfo {
                skill_level: Some("beginner".to_string()),
                ..AccumulatedInfo::default()
            },
            updated_at: None,
        };

        repo.save("s-1", &state).await.expect("save");
        assert_eq!(repo.load("s-1").await.expect("load"), Some(state));

        repo.clear("s-1").await.expect("clear");
        assert_eq!(repo.load("s-1").await.expect("load"), None);
    }
}
