use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use mabar_core::{AccumulatedInfo, ConversationMessage};

pub mod memory;
pub mod session_state;

pub use memory::InMemorySessionStateRepository;
pub use session_state::SqlSessionStateRepository;

#[derive(Debug, Error)]
pub enum RepositoryError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("decode error: {0}")]
    Decode(String),
}

/// One session's persisted state: the transcript plus the accumulated slot
/// dictionary, rewritten wholesale after every turn.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct PersistedConversation {
    pub history: Vec<ConversationMessage>,
    pub accumulated: AccumulatedInfo,
    pub updated_at: Option<DateTime<Utc>>,
}

#[async_trait]
pub trait SessionStateRepository: Send + Sync {
    async fn load(
        &self,
        session_id: &str,
    ) -> Result<Option<PersistedConversation>, RepositoryError>;

    async fn save(
        &self,
        session_id: &str,
        state: &PersistedConversation,
    ) -> Result<(), RepositoryError>;

    async fn clear(&self, session_id: &str) -> Result<(), RepositoryError>;
}
