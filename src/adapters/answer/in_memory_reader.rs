//! In-memory conversation reader for tests and upstream-less runs.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::domain::relay::ConversationId;
use crate::ports::{ConversationReadError, ConversationReader, StoredAnswer};

#[derive(Debug, Clone, Default)]
pub struct InMemoryConversationReader {
    answers: Arc<RwLock<HashMap<(String, ConversationId), StoredAnswer>>>,
}

impl InMemoryConversationReader {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn insert(&self, kb_id: impl Into<String>, answer: StoredAnswer) {
        self.answers
            .write()
            .await
            .insert((kb_id.into(), answer.conversation_id), answer);
    }
}

#[async_trait]
impl ConversationReader for InMemoryConversationReader {
    async fn find_answer(
        &self,
        kb_id: &str,
        conversation_id: ConversationId,
    ) -> Result<Option<StoredAnswer>, ConversationReadError> {
        Ok(self
            .answers
            .read()
            .await
            .get(&(kb_id.to_string(), conversation_id))
            .cloned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn answers_are_scoped_by_knowledge_base() {
        let reader = InMemoryConversationReader::new();
        let id = ConversationId::new();
        let answer = StoredAnswer {
            conversation_id: id,
            question: "q".to_string(),
            answer: "a".to_string(),
        };
        reader.insert("kb-1", answer.clone()).await;

        assert_eq!(reader.find_answer("kb-1", id).await.unwrap(), Some(answer));
        assert_eq!(reader.find_answer("kb-2", id).await.unwrap(), None);
    }
}
