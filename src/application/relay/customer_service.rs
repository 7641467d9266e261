//! Customer-service adapter: push delivery through the kf API.
//!
//! Callbacks only say "new messages are waiting". They are acknowledged at
//! once; a background task pulls the messages, answers each question, and
//! sends the finished answer back through the API.

use dashmap::DashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;

use crate::domain::bot::{KfCallbackEvent, KfMessage, Platform};
use crate::domain::envelope::SignatureParams;
use crate::domain::relay::{ConversationId, RelayRegistry};
use crate::ports::{
    AnswerRequest, BindOutcome, BotCredentials, CustomerServiceClient, ExternalIdBridge,
    ExternalKey,
};

use super::callback::open_callback;
use super::{AdapterError, AnswerProducer, RelaySettings};

/// Extra wait past the generation timeout; the producer always finishes by then.
const COMPLETION_GRACE: Duration = Duration::from_secs(5);

pub struct CustomerServiceAdapter {
    registry: Arc<RelayRegistry>,
    bridge: Arc<dyn ExternalIdBridge>,
    client: Arc<dyn CustomerServiceClient>,
    producer: AnswerProducer,
    settings: RelaySettings,
    /// Sync cursor per `{kb_id}:{open_kfid}`.
    cursors: DashMap<String, String>,
}

impl CustomerServiceAdapter {
    pub fn new(
        registry: Arc<RelayRegistry>,
        bridge: Arc<dyn ExternalIdBridge>,
        client: Arc<dyn CustomerServiceClient>,
        producer: AnswerProducer,
        settings: RelaySettings,
    ) -> Self {
        Self {
            registry,
            bridge,
            client,
            producer,
            settings,
            cursors: DashMap::new(),
        }
    }

    /// Verifies the callback and schedules message processing.
    ///
    /// Returns as soon as the envelope checks out; answering happens in the
    /// background.
    pub async fn handle(
        self: &Arc<Self>,
        credentials: BotCredentials,
        params: &SignatureParams,
        body: &str,
    ) -> Result<(), AdapterError> {
        let (_, plaintext) = open_callback(&credentials, params, body)?;
        let event = KfCallbackEvent::parse(&plaintext)?;
        let Some(token) = event.sync_token().map(str::to_string) else {
            tracing::debug!(kb_id = %credentials.kb_id, msg_type = %event.msg_type, "Ignoring customer service event");
            return Ok(());
        };
        let open_kfid = event.open_kf_id.clone().unwrap_or_default();

        let adapter = Arc::clone(self);
        tokio::spawn(async move {
            let kb_id = credentials.kb_id.clone();
            if let Err(e) = adapter.process_callback(credentials, token, open_kfid).await {
                tracing::warn!(%kb_id, error = %e, "Customer service sync failed");
            }
        });
        Ok(())
    }

    /// Pulls every pending message for one callback and answers the
    /// questions among them. Completes when all answers were sent.
    pub async fn process_callback(
        self: Arc<Self>,
        credentials: BotCredentials,
        token: String,
        open_kfid: String,
    ) -> Result<(), AdapterError> {
        let cursor_key = format!("{}:{}", credentials.kb_id, open_kfid);
        let mut answers = Vec::new();

        loop {
            let cursor = self.cursors.get(&cursor_key).map(|c| c.value().clone());
            let batch = self
                .client
                .sync_messages(&credentials, &token, &open_kfid, cursor.as_deref())
                .await?;
            if let Some(next) = batch.next_cursor {
                self.cursors.insert(cursor_key.clone(), next);
            }

            for message in batch.messages {
                if message.question().is_none() || self.is_stale(&message) {
                    continue;
                }
                let adapter = Arc::clone(&self);
                let credentials = credentials.clone();
                answers.push(tokio::spawn(async move {
                    let msgid = message.msgid.clone();
                    if let Err(e) = adapter.answer(&credentials, message).await {
                        tracing::warn!(kb_id = %credentials.kb_id, %msgid, error = %e, "Customer service answer failed");
                    }
                }));
            }

            if !batch.has_more {
                break;
            }
        }

        futures::future::join_all(answers).await;
        Ok(())
    }

    async fn answer(&self, credentials: &BotCredentials, message: KfMessage) -> Result<(), AdapterError> {
        let Some(question) = message.question() else {
            return Ok(());
        };
        let conversation_id = ConversationId::new();
        let key = ExternalKey::message(Platform::CustomerService, &message.msgid);

        if let BindOutcome::Existing(existing) = self
            .bridge
            .bind(&key, conversation_id, self.settings.binding_ttl)
            .await?
        {
            tracing::debug!(msgid = %message.msgid, conversation_id = %existing, "Message already answered");
            return Ok(());
        }

        let outcome = self.registry.create(conversation_id, question);
        if outcome.created {
            self.producer.spawn(
                Arc::clone(&outcome.state),
                AnswerRequest {
                    kb_id: credentials.kb_id.clone(),
                    conversation_id,
                    question: question.to_string(),
                    user_id: Some(message.external_userid.clone()),
                    platform: Platform::CustomerService,
                },
            );
        }
        tracing::info!(kb_id = %credentials.kb_id, %conversation_id, msgid = %message.msgid, "Customer service conversation started");

        let deadline = Instant::now() + self.settings.generation_timeout + COMPLETION_GRACE;
        let snapshot = outcome.state.wait_until_done(deadline).await?;

        if self.registry.evict(&conversation_id).is_none() {
            return Ok(());
        }
        let content = if snapshot.is_done {
            self.settings.with_trailer(&snapshot.content)
        } else {
            self.settings
                .pending_reply(&snapshot.content, &credentials.kb_id, conversation_id)
        };

        self.client
            .send_text(credentials, &message.open_kfid, &message.external_userid, &content)
            .await?;
        tracing::info!(kb_id = %credentials.kb_id, %conversation_id, "Customer service answer sent");
        Ok(())
    }

    /// Messages older than the dedupe window may have been answered before
    /// their binding expired.
    fn is_stale(&self, message: &KfMessage) -> bool {
        let now = chrono::Utc::now().timestamp();
        let window = self.settings.binding_ttl.as_secs() as i64;
        message.send_time > 0 && now - message.send_time > window
    }
}
