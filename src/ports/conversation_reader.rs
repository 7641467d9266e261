//! Conversation reader port - Fallback read path for finished answers.
//!
//! Once a conversation is evicted from the relay registry its answer only
//! exists in the persistent conversation store. Platforms that re-deliver a
//! message after eviction are answered from here.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::domain::relay::ConversationId;

/// A persisted question/answer pair.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredAnswer {
    pub conversation_id: ConversationId,
    #[serde(default)]
    pub question: String,
    pub answer: String,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConversationReadError {
    #[error("Conversation store unavailable: {0}")]
    Unavailable(String),

    #[error("Malformed conversation record: {0}")]
    Malformed(String),
}

/// Reader port for persisted conversations.
#[async_trait]
pub trait ConversationReader: Send + Sync {
    /// Fetches the stored answer of a conversation.
    ///
    /// Returns `None` if the store has no record of it.
    async fn find_answer(
        &self,
        kb_id: &str,
        conversation_id: ConversationId,
    ) -> Result<Option<StoredAnswer>, ConversationReadError>;
}
