//! Answer Generator Port - Interface to the upstream RAG/LLM chat service.
//!
//! The generator is an opaque producer of `{type, content}` events ending in
//! `done` or `error`. The relay only drains it into a conversation buffer.
//!
//! # Example
//!
//! ```ignore
//! let mut events = generator.generate(request).await?;
//! while let Some(event) = events.recv().await {
//!     match event.kind {
//!         AnswerEventKind::Data => state.append_chunk(&event.content),
//!         AnswerEventKind::Done | AnswerEventKind::Error => break,
//!         AnswerEventKind::Other => {}
//!     }
//! }
//! ```

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;

use crate::domain::bot::Platform;
use crate::domain::relay::ConversationId;

/// Port for the upstream answer generator.
#[async_trait]
pub trait AnswerGenerator: Send + Sync {
    /// Starts generating an answer and returns the event stream.
    ///
    /// The channel closes after a `done` or `error` event, or when the
    /// upstream connection drops.
    async fn generate(
        &self,
        request: AnswerRequest,
    ) -> Result<mpsc::Receiver<AnswerEvent>, GenerationError>;
}

/// A question to be answered from a knowledge base.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AnswerRequest {
    pub kb_id: String,
    pub conversation_id: ConversationId,
    pub question: String,
    /// Platform-side user id, when the platform supplies one.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
    pub platform: Platform,
}

/// One event of the upstream stream.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnswerEvent {
    #[serde(rename = "type")]
    pub kind: AnswerEventKind,
    #[serde(default)]
    pub content: String,
}

impl AnswerEvent {
    pub fn data(content: impl Into<String>) -> Self {
        Self {
            kind: AnswerEventKind::Data,
            content: content.into(),
        }
    }

    pub fn done() -> Self {
        Self {
            kind: AnswerEventKind::Done,
            content: String::new(),
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            kind: AnswerEventKind::Error,
            content: message.into(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AnswerEventKind {
    /// A chunk of answer text.
    Data,
    /// Generation completed.
    Done,
    /// Generation failed; `content` carries the reason.
    Error,
    /// Metadata events (conversation ids, references, ...) the relay ignores.
    #[serde(other)]
    Other,
}

/// Errors starting or running answer generation.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum GenerationError {
    /// Upstream could not be reached.
    #[error("Answer generator unavailable: {0}")]
    Unavailable(String),

    /// Upstream refused the request.
    #[error("Answer generator rejected request ({status}): {message}")]
    Rejected { status: u16, message: String },

    /// Upstream reported an error event mid-stream.
    #[error("Answer generation failed: {0}")]
    Failed(String),

    /// Generation exceeded the producer's time budget.
    #[error("Answer generation timed out after {0} seconds")]
    Timeout(u64),
}
