use chrono::Utc;
use sqlx::Row;

use super::{PersistedConversation, RepositoryError, SessionStateRepository};
use crate::DbPool;

pub struct SqlSessionStateRepository {
    pool: DbPool,
}

impl SqlSessionStateRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

#[async_trait::async_trait]
impl SessionStateRepository for SqlSessionStateRepository {
    async fn load(
        &self,
        session_id: &str,
    ) -> Result<Option<PersistedConversation>, RepositoryError> {
        let row = sqlx::query(
            "SELECT history, accumulated, updated_at FROM conversation_sessions \
             WHERE session_id = ?1",
        )
        .bind(session_id)
        .fetch_optional(&self.pool)
        .await?;

        let Some(row) = row else {
            return Ok(None);
        };

        let history = serde_json::from_str(&row.get::<String, _>("history"))
            .map_err(|error| RepositoryError::Decode(format!("history column: {error}")))?;
        let accumulated = serde_json::from_str(&row.get::<String, _>("accumulated"))
            .map_err(|error| RepositoryError::Decode(format!("accumulated column: {error}")))?;
        let updated_at = row
            .get::<String, _>("updated_at")
            .parse()
            .map_err(|error| RepositoryError::Decode(format!("updated_at column: {error}")))?;

        Ok(Some(PersistedConversation { history, accumulated, updated_at: Some(updated_at) }))
    }

    async fn save(
        &self,
        session_id: &str,
        state: &PersistedConversation,
    ) -> Result<(), RepositoryError> {
        let history = serde_json::to_string(&state.history)
            .map_err(|error| RepositoryError::Decode(format!("history encode: {error}")))?;
        let accumulated = serde_json::to_string(&state.accumulated)
            .map_err(|error| RepositoryError::Decode(format!("accumulated encode: {error}")))?;
        let updated_at = state.updated_at.unwrap_or_else(Utc::now).to_rfc3339();

        sqlx::query(
            "INSERT INTO conversation_sessions (session_id, history, accumulated, updated_at) \
             VALUES (?1, ?2, ?3, ?4) \
             ON CONFLICT(session_id) DO UPDATE SET \
               history = excluded.history, \
               accumulated = excluded.accumulated, \
               updated_at = excluded.updated_at",
        )
        .bind(session_id)
        .bind(history)
        .bind(accumulated)
        .bind(updated_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn clear(&self, session_id: &str) -> Result<(), RepositoryError> {
        sqlx::query("DELETE FROM conversation_sessions WHERE session_id = ?1")
            .bind(session_id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use mabar_core::{AccumulatedInfo, ConversationMessage};

    use crate::repositories::{
        PersistedConversation, SessionStateRepository, SqlSessionStateRepository,
    };
    use crate::{connect_with_settings, migrations};

    async fn prepared_repo() -> SqlSessionStateRepository {
        let pool = connect_with_settings("sqlite::memory:", 1, 30).await.expect("connect");
        migrations::run_pending(&pool).await.expect("migrations");
        SqlSessionStateRepository::new(pool)
    }

    fn sample_state() -> PersistedConversation {
        PersistedConversation {
            history: vec![
                ConversationMessage::user("find me a court in kemang"),
                ConversationMessage::model("What time would you like to play?"),
            ],
            accumulated: AccumulatedInfo {
                location: Some("Kemang".to_string()),
                ..AccumulatedInfo::default()
            },
            updated_at: None,
        }
    }

    #[tokio::test]
    async fn save_then_load_round_trips_history_and_slots() {
        let repo = prepared_repo().await;
        let state = sample_state();

        repo.save("session-1", &state).await.expect("save state");
        let loaded = repo.load("session-1").await.expect("load state").expect("row present");

        assert_eq!(loaded.history, state.history);
        assert_eq!(loaded.accumulated, state.accumulated);
        assert!(loaded.updated_at.is_some());
    }

    #[tokio::test]
    async fn save_overwrites_the_previous_row() {
        let repo = prepared_repo().await;
        repo.save("session-1", &sample_state()).await.expect("first save");

        let mut newer = sample_state();
        newer.accumulated.time_slot = Some("evening_prime".to_string());
        repo.save("session-1", &newer).await.expect("second save");

        let loaded = repo.load("session-1").await.expect("load").expect("row present");
        assert_eq!(loaded.accumulated.time_slot.as_deref(), Some("evening_prime"));
    }

    #[tokio::test]
    async fn clear_removes_the_persisted_entry() {
        let repo = prepared_repo().await;
        repo.save("session-1", &sample_state()).await.expect("save");

        repo.clear("session-1").await.expect("clear");

        assert!(repo.load("session-1").await.expect("load").is_none());
    }

    #[tokio::test]
    async fn missing_session_loads_as_none() {
        let repo = prepared_repo().await;
        assert!(repo.load("absent").await.expect("load").is_none());
    }
}
