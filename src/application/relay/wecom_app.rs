//! Enterprise-app adapter: XML callbacks answered by passive reply.
//!
//! The platform gives each delivery a few seconds and re-delivers the same
//! `MsgId` when it gets an empty body. Every delivery long-polls the buffer
//! for up to `long_poll_wait`; the last one the platform will make gets
//! whatever is ready plus a pointer to the rest.

use std::sync::Arc;
use tokio::time::Instant;

use crate::domain::bot::{AppMessage, AppTextReply, Platform};
use crate::domain::cipher::CipherContext;
use crate::domain::envelope::{EnvelopeFormat, SignatureParams};
use crate::domain::relay::{ConversationId, RelayError, RelayRegistry};
use crate::ports::{
    AnswerRequest, BindOutcome, BotCredentials, ConversationReader, ExternalIdBridge, ExternalKey,
};

use super::callback::{open_callback, seal_reply};
use super::{AdapterError, AnswerProducer, RelaySettings};

pub struct WecomAppAdapter {
    registry: Arc<RelayRegistry>,
    bridge: Arc<dyn ExternalIdBridge>,
    reader: Arc<dyn ConversationReader>,
    producer: AnswerProducer,
    settings: RelaySettings,
}

impl WecomAppAdapter {
    pub fn new(
        registry: Arc<RelayRegistry>,
        bridge: Arc<dyn ExternalIdBridge>,
        reader: Arc<dyn ConversationReader>,
        producer: AnswerProducer,
        settings: RelaySettings,
    ) -> Self {
        Self {
            registry,
            bridge,
            reader,
            producer,
            settings,
        }
    }

    /// Handles one delivery. `None` asks the platform to deliver again.
    pub async fn handle(
        &self,
        credentials: &BotCredentials,
        params: &SignatureParams,
        body: &str,
    ) -> Result<Option<String>, AdapterError> {
        let (cipher, plaintext) = open_callback(credentials, params, body)?;
        let message = AppMessage::parse(&plaintext)?;
        let Some((msg_id, question)) = message.question() else {
            tracing::debug!(kb_id = %credentials.kb_id, msg_type = %message.msg_type, "Ignoring non-text app message");
            return Ok(None);
        };

        let kb_id = credentials.kb_id.as_str();
        let conversation_id = self.start_or_join(kb_id, &message, msg_id, question).await?;

        let Some(state) = self.registry.get(&conversation_id) else {
            let content = self.stored_answer(kb_id, conversation_id).await;
            return self.reply(&cipher, &message, &content, &params.nonce).map(Some);
        };

        let attempt = state.record_poll();
        let deadline = Instant::now() + self.settings.long_poll_wait;
        let snapshot = match state.wait_until_done(deadline).await {
            Ok(snapshot) => snapshot,
            Err(RelayError::PollerAlreadyAttached(_)) => {
                // An earlier delivery of the same message is still parked.
                tracing::debug!(%conversation_id, attempt, "Overlapping delivery, deferring");
                return Ok(None);
            }
        };
        tracing::debug!(%conversation_id, attempt, done = snapshot.is_done, "App long-poll ended");

        if snapshot.is_done {
            let content = match self.registry.evict(&conversation_id) {
                Some(_) => {
                    tracing::info!(%kb_id, %conversation_id, attempt, "App answer delivered");
                    self.settings.with_trailer(&snapshot.content)
                }
                None => self.settings.not_found_text.clone(),
            };
            return self.reply(&cipher, &message, &content, &params.nonce).map(Some);
        }

        if attempt < self.settings.passive_reply_attempts {
            return Ok(None);
        }

        tracing::info!(%kb_id, %conversation_id, attempt, "Platform retries exhausted, sending partial answer");
        let content = self
            .settings
            .pending_reply(&snapshot.content, kb_id, conversation_id);
        self.reply(&cipher, &message, &content, &params.nonce).map(Some)
    }

    async fn start_or_join(
        &self,
        kb_id: &str,
        message: &AppMessage,
        msg_id: &str,
        question: &str,
    ) -> Result<ConversationId, AdapterError> {
        let candidate = ConversationId::new();
        let key = ExternalKey::message(Platform::WecomApp, msg_id);

        match self
            .bridge
            .bind(&key, candidate, self.settings.binding_ttl)
            .await?
        {
            BindOutcome::Existing(conversation_id) => Ok(conversation_id),
            BindOutcome::Bound => {
                let outcome = self.registry.create(candidate, question);
                if outcome.created {
                    self.producer.spawn(
                        outcome.state,
                        AnswerRequest {
                            kb_id: kb_id.to_string(),
                            conversation_id: candidate,
                            question: question.to_string(),
                            user_id: Some(message.from_user_name.clone()),
                            platform: Platform::WecomApp,
                        },
                    );
                }
                tracing::info!(%kb_id, conversation_id = %candidate, %msg_id, "App conversation started");
                Ok(candidate)
            }
        }
    }

    /// Content for a delivery whose conversation already left the registry.
    async fn stored_answer(&self, kb_id: &str, conversation_id: ConversationId) -> String {
        match self.reader.find_answer(kb_id, conversation_id).await {
            Ok(Some(stored)) => self.settings.with_trailer(&stored.answer),
            Ok(None) => self.settings.not_found_text.clone(),
            Err(e) => {
                tracing::warn!(%conversation_id, error = %e, "Stored answer lookup failed");
                self.settings.not_found_text.clone()
            }
        }
    }

    fn reply(
        &self,
        cipher: &CipherContext,
        message: &AppMessage,
        content: &str,
        nonce: &str,
    ) -> Result<String, AdapterError> {
        let now = chrono::Utc::now().timestamp();
        let xml = AppTextReply::answering(message, content, now).to_xml();
        seal_reply(cipher, EnvelopeFormat::Xml, &xml, nonce)
    }
}
