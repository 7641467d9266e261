//! Background answer producer.
//!
//! One producer task runs per conversation. It is detached from the request
//! that started it, so a platform timing out a webhook never cancels the
//! answer. Whatever happens, the conversation is finished exactly once when
//! the task ends.

use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;

use crate::domain::relay::ConversationState;
use crate::ports::{AnswerEventKind, AnswerGenerator, AnswerRequest, GenerationError};

use super::AdapterError;

#[derive(Clone)]
pub struct AnswerProducer {
    generator: Arc<dyn AnswerGenerator>,
    timeout: Duration,
    failure_text: String,
}

impl AnswerProducer {
    pub fn new(
        generator: Arc<dyn AnswerGenerator>,
        timeout: Duration,
        failure_text: impl Into<String>,
    ) -> Self {
        Self {
            generator,
            timeout,
            failure_text: failure_text.into(),
        }
    }

    /// Starts filling `state` from the generator.
    pub fn spawn(&self, state: Arc<ConversationState>, request: AnswerRequest) -> JoinHandle<()> {
        let generator = Arc::clone(&self.generator);
        let timeout = self.timeout;
        let failure_text = self.failure_text.clone();

        tokio::spawn(async move {
            let conversation_id = state.id();
            let platform = request.platform;
            tracing::info!(%conversation_id, %platform, "Answer generation started");

            let result = match tokio::time::timeout(timeout, drain(generator.as_ref(), &state, request)).await {
                Ok(result) => result,
                Err(_) => Err(GenerationError::Timeout(timeout.as_secs())),
            };

            match result {
                Ok(()) => tracing::info!(%conversation_id, %platform, "Answer generation finished"),
                Err(e) => {
                    let error = AdapterError::from(e);
                    tracing::warn!(%conversation_id, %platform, error = %error, "Answer generation failed");
                    let separator = if state.snapshot().content.is_empty() { "" } else { "\n\n" };
                    state.append_chunk(&format!("{}{}", separator, failure_text));
                }
            }
            state.finish();
        })
    }
}

impl std::fmt::Debug for AnswerProducer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AnswerProducer")
            .field("timeout", &self.timeout)
            .finish_non_exhaustive()
    }
}

async fn drain(
    generator: &dyn AnswerGenerator,
    state: &ConversationState,
    request: AnswerRequest,
) -> Result<(), GenerationError> {
    let mut events = generator.generate(request).await?;
    while let Some(event) = events.recv().await {
        match event.kind {
            AnswerEventKind::Data => state.append_chunk(&event.content),
            AnswerEventKind::Done => return Ok(()),
            AnswerEventKind::Error => return Err(GenerationError::Failed(event.content)),
            AnswerEventKind::Other => {}
        }
    }
    // Stream closed without a done marker; keep what arrived.
    Ok(())
}
