//! AI-bot adapter: JSON callbacks, pure-pull streaming.
//!
//! The first text message starts a conversation and is answered with a
//! stream id. The platform then re-polls that id with `stream` messages and
//! each poll is answered from a snapshot of the buffer, without waiting.

use std::sync::Arc;

use crate::domain::bot::{AiBotMessage, AiBotRequest, AiBotStreamReply, Platform};
use crate::domain::envelope::{EnvelopeFormat, SignatureParams};
use crate::domain::relay::{ConversationId, RelayRegistry};
use crate::ports::{AnswerRequest, BindOutcome, BotCredentials, ExternalIdBridge, ExternalKey};

use super::callback::{open_callback, seal_reply};
use super::{AdapterError, AnswerProducer, RelaySettings};

pub struct AiBotAdapter {
    registry: Arc<RelayRegistry>,
    bridge: Arc<dyn ExternalIdBridge>,
    producer: AnswerProducer,
    settings: RelaySettings,
}

impl AiBotAdapter {
    pub fn new(
        registry: Arc<RelayRegistry>,
        bridge: Arc<dyn ExternalIdBridge>,
        producer: AnswerProducer,
        settings: RelaySettings,
    ) -> Self {
        Self {
            registry,
            bridge,
            producer,
            settings,
        }
    }

    /// Handles one callback and returns the encrypted JSON reply, or `None`
    /// when the platform expects an empty body.
    pub async fn handle(
        &self,
        credentials: &BotCredentials,
        params: &SignatureParams,
        body: &str,
    ) -> Result<Option<String>, AdapterError> {
        let (cipher, plaintext) = open_callback(credentials, params, body)?;
        let message = AiBotMessage::parse(&plaintext)?;

        let reply = match message.into_request() {
            AiBotRequest::Ask {
                msgid,
                question,
                user_id,
            } => self.ask(&credentials.kb_id, &msgid, question, user_id).await?,
            AiBotRequest::Refresh { stream_id } => Some(self.refresh(&stream_id).await?),
            AiBotRequest::Unsupported(msgtype) => {
                tracing::debug!(kb_id = %credentials.kb_id, %msgtype, "Ignoring unsupported AI-bot message");
                None
            }
        };

        match reply {
            Some(reply) => {
                let body = seal_reply(&cipher, EnvelopeFormat::Json, &reply.to_json()?, &params.nonce)?;
                Ok(Some(body))
            }
            None => Ok(None),
        }
    }

    /// Starts a conversation for a first-contact message.
    ///
    /// The stream binding is written before the `msgid` dedupe binding, so a
    /// failed call leaves nothing that blocks the platform's retry. A
    /// redelivery of a known `msgid` is answered with the stream id of the
    /// conversation that won the binding.
    async fn ask(
        &self,
        kb_id: &str,
        msgid: &str,
        question: String,
        user_id: Option<String>,
    ) -> Result<Option<AiBotStreamReply>, AdapterError> {
        let conversation_id = ConversationId::new();
        let ttl = self.settings.binding_ttl;

        self.bridge
            .bind(
                &ExternalKey::stream(Platform::AiBot, stream_id_for(conversation_id)),
                conversation_id,
                ttl,
            )
            .await?;

        let message_key = ExternalKey::message(Platform::AiBot, msgid);
        if let BindOutcome::Existing(existing) =
            self.bridge.bind(&message_key, conversation_id, ttl).await?
        {
            tracing::debug!(%kb_id, %msgid, conversation_id = %existing, "Duplicate AI-bot delivery");
            return Ok(Some(self.in_progress(existing)));
        }

        let outcome = self.registry.create(conversation_id, question.clone());
        if outcome.created {
            self.producer.spawn(
                outcome.state,
                AnswerRequest {
                    kb_id: kb_id.to_string(),
                    conversation_id,
                    question,
                    user_id,
                    platform: Platform::AiBot,
                },
            );
        }
        tracing::info!(%kb_id, %conversation_id, "AI-bot conversation started");

        Ok(Some(AiBotStreamReply::new(
            stream_id_for(conversation_id),
            self.settings.thinking_text.as_str(),
            false,
        )))
    }

    /// Unfinished reply for a conversation, without claiming it.
    fn in_progress(&self, conversation_id: ConversationId) -> AiBotStreamReply {
        let content = self
            .registry
            .get(&conversation_id)
            .map(|state| state.snapshot().content)
            .filter(|content| !content.is_empty())
            .unwrap_or_else(|| self.settings.thinking_text.clone());
        AiBotStreamReply::new(stream_id_for(conversation_id), content, false)
    }

    async fn refresh(&self, stream_id: &str) -> Result<AiBotStreamReply, AdapterError> {
        let conversation_id = match self.resolve_stream(stream_id).await {
            Ok(id) => id,
            Err(AdapterError::BindingExpiredOrMissing(key)) => {
                tracing::warn!(%key, "Stream binding expired or missing");
                return Ok(AiBotStreamReply::new(
                    stream_id,
                    self.settings.retry_text.as_str(),
                    true,
                ));
            }
            Err(e) => return Err(e),
        };

        let Some(state) = self.registry.get(&conversation_id) else {
            tracing::debug!(%conversation_id, "Poll for evicted conversation");
            return Ok(self.not_found(stream_id));
        };

        let polls = state.record_poll();
        let snapshot = state.snapshot();
        tracing::debug!(%conversation_id, polls, done = snapshot.is_done, "AI-bot poll");

        if !snapshot.is_done {
            return Ok(self.in_progress(conversation_id));
        }

        // Only the poll that wins the eviction delivers the trailer.
        match self.registry.evict(&conversation_id) {
            Some(_) => {
                tracing::info!(%conversation_id, polls, "AI-bot answer delivered");
                Ok(AiBotStreamReply::new(
                    stream_id,
                    self.settings.with_trailer(&snapshot.content),
                    true,
                ))
            }
            None => Ok(self.not_found(stream_id)),
        }
    }

    async fn resolve_stream(&self, stream_id: &str) -> Result<ConversationId, AdapterError> {
        let key = ExternalKey::stream(Platform::AiBot, stream_id);
        self.bridge
            .resolve(&key)
            .await?
            .ok_or(AdapterError::BindingExpiredOrMissing(key))
    }

    fn not_found(&self, stream_id: &str) -> AiBotStreamReply {
        AiBotStreamReply::new(stream_id, self.settings.not_found_text.as_str(), true)
    }
}

/// Stream ids are the conversation id in simple form.
fn stream_id_for(conversation_id: ConversationId) -> String {
    conversation_id.as_uuid().simple().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::answer::MockAnswerGenerator;
    use crate::adapters::external_id::InMemoryExternalIdBridge;
    use crate::domain::cipher::CipherContext;
    use crate::domain::cipher::CipherError;
    use crate::ports::BridgeError;
    use async_trait::async_trait;
    use serde_json::Value;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    const KEY: &str = "jWmYm7qr5nMoAUwZRjGtBxmz3KA1tkAj3ykkR6q2B2C";

    struct Harness {
        adapter: AiBotAdapter,
        registry: Arc<RelayRegistry>,
        credentials: BotCredentials,
        cipher: CipherContext,
    }

    /// Bridge whose n-th `bind` call (1-based) fails as if the cache were down.
    struct FlakyBridge {
        inner: InMemoryExternalIdBridge,
        binds: AtomicUsize,
        fail_on: usize,
    }

    impl FlakyBridge {
        fn failing_bind(fail_on: usize) -> Self {
            Self {
                inner: InMemoryExternalIdBridge::new(),
                binds: AtomicUsize::new(0),
                fail_on,
            }
        }
    }

    #[async_trait]
    impl ExternalIdBridge for FlakyBridge {
        async fn bind(
            &self,
            key: &ExternalKey,
            conversation_id: ConversationId,
            ttl: Duration,
        ) -> Result<BindOutcome, BridgeError> {
            if self.binds.fetch_add(1, Ordering::SeqCst) + 1 == self.fail_on {
                return Err(BridgeError::Unavailable("connection reset".to_string()));
            }
            self.inner.bind(key, conversation_id, ttl).await
        }

        async fn resolve(&self, key: &ExternalKey) -> Result<Option<ConversationId>, BridgeError> {
            self.inner.resolve(key).await
        }
    }

    fn harness(generator: MockAnswerGenerator, settings: RelaySettings) -> Harness {
        harness_with_bridge(generator, settings, Arc::new(InMemoryExternalIdBridge::new()))
    }

    fn harness_with_bridge(
        generator: MockAnswerGenerator,
        settings: RelaySettings,
        bridge: Arc<dyn ExternalIdBridge>,
    ) -> Harness {
        let registry = Arc::new(RelayRegistry::new());
        let producer = AnswerProducer::new(Arc::new(generator), Duration::from_secs(5), "FAILED");
        let adapter = AiBotAdapter::new(Arc::clone(&registry), bridge, producer, settings);
        let credentials = BotCredentials::new("kb-1", Platform::AiBot, "token", KEY, "");
        let cipher = credentials.cipher().unwrap();
        Harness {
            adapter,
            registry,
            credentials,
            cipher,
        }
    }

    fn settings() -> RelaySettings {
        RelaySettings {
            trailer: " [end]".to_string(),
            thinking_text: "...".to_string(),
            retry_text: "RETRY".to_string(),
            not_found_text: "NOT FOUND".to_string(),
            ..Default::default()
        }
    }

    fn ask_payload(msgid: &str, question: &str) -> String {
        serde_json::json!({
            "msgid": msgid, "aibotid": "bot", "chattype": "single",
            "from": {"userid": "zhangsan"}, "msgtype": "text",
            "text": {"content": question}
        })
        .to_string()
    }

    impl Harness {
        async fn deliver(&self, plaintext: &str) -> Result<Option<String>, AdapterError> {
            let envelope = self.cipher.seal(plaintext, "1700000000", "nonce");
            let body = serde_json::json!({ "encrypt": envelope.ciphertext }).to_string();
            let params = SignatureParams::new(envelope.signature, envelope.timestamp, envelope.nonce);
            self.adapter.handle(&self.credentials, &params, &body).await
        }

        async fn send(&self, plaintext: &str) -> Option<Value> {
            let reply = self.deliver(plaintext).await.unwrap()?;
            let envelope = EnvelopeFormat::Json
                .decode(&reply, &SignatureParams::default())
                .unwrap();
            Some(serde_json::from_str(&self.cipher.open(&envelope).unwrap()).unwrap())
        }

        async fn ask(&self, msgid: &str, question: &str) -> Option<Value> {
            self.send(&ask_payload(msgid, question)).await
        }

        async fn poll(&self, stream_id: &str) -> Value {
            self.send(
                &serde_json::json!({
                    "msgid": uuid::Uuid::new_v4().to_string(), "aibotid": "bot",
                    "msgtype": "stream", "stream": {"id": stream_id}
                })
                .to_string(),
            )
            .await
            .unwrap()
        }
    }

    #[tokio::test]
    async fn first_message_returns_thinking_stream() {
        let h = harness(MockAnswerGenerator::new().with_stall(&[]), settings());

        let reply = h.ask("m1", "What is relay?").await.unwrap();

        assert_eq!(reply["msgtype"], "stream");
        assert_eq!(reply["stream"]["finish"], false);
        assert_eq!(reply["stream"]["content"], "...");
        assert!(!reply["stream"]["id"].as_str().unwrap().is_empty());
        assert_eq!(h.registry.len(), 1);
    }

    #[tokio::test]
    async fn duplicate_delivery_gets_same_stream_id() {
        let generator = MockAnswerGenerator::new().with_stall(&["Half"]);
        let h = harness(generator.clone(), settings());

        let first = h.ask("m1", "q").await.unwrap();
        let stream_id = first["stream"]["id"].as_str().unwrap().to_string();
        let duplicate = h.ask("m1", "q").await.unwrap();

        assert_eq!(duplicate["stream"]["id"], stream_id.as_str());
        assert_eq!(duplicate["stream"]["finish"], false);
        assert_eq!(h.registry.len(), 1);
        assert_eq!(generator.call_count(), 1);

        // The stream id handed to the duplicate is pollable.
        let reply = h.poll(&stream_id).await;
        assert_eq!(reply["stream"]["finish"], false);
    }

    #[tokio::test]
    async fn retry_after_bridge_failure_starts_the_answer() {
        for fail_on in [1, 2] {
            let generator = MockAnswerGenerator::new().with_stall(&[]);
            let h = harness_with_bridge(
                generator.clone(),
                settings(),
                Arc::new(FlakyBridge::failing_bind(fail_on)),
            );

            let err = h.deliver(&ask_payload("m1", "q")).await.unwrap_err();
            assert!(matches!(err, AdapterError::Bridge(BridgeError::Unavailable(_))));
            assert!(h.registry.is_empty());

            let retry = h.ask("m1", "q").await.unwrap();
            assert_eq!(retry["stream"]["finish"], false, "fail_on = {}", fail_on);
            assert_eq!(h.registry.len(), 1, "fail_on = {}", fail_on);
            assert_eq!(generator.call_count(), 1, "fail_on = {}", fail_on);

            let stream_id = retry["stream"]["id"].as_str().unwrap().to_string();
            let poll = h.poll(&stream_id).await;
            assert_eq!(poll["stream"]["finish"], false);
        }
    }

    #[tokio::test]
    async fn completed_answer_is_delivered_once_with_trailer() {
        let h = harness(MockAnswerGenerator::new().with_answer(&["Hi", " there"]), settings());
        let first = h.ask("m1", "greet me").await.unwrap();
        let stream_id = first["stream"]["id"].as_str().unwrap().to_string();

        let mut reply = h.poll(&stream_id).await;
        for _ in 0..100 {
            if reply["stream"]["finish"] == true {
                break;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
            reply = h.poll(&stream_id).await;
        }

        assert_eq!(reply["stream"]["content"], "Hi there [end]");
        assert_eq!(reply["stream"]["id"], stream_id.as_str());
        assert!(h.registry.is_empty());

        let after = h.poll(&stream_id).await;
        assert_eq!(after["stream"]["content"], "NOT FOUND");
        assert_eq!(after["stream"]["finish"], true);
    }

    #[tokio::test]
    async fn in_progress_poll_returns_partial_content() {
        let h = harness(MockAnswerGenerator::new().with_stall(&["Partial"]), settings());
        let first = h.ask("m1", "q").await.unwrap();
        let stream_id = first["stream"]["id"].as_str().unwrap().to_string();

        let mut reply = h.poll(&stream_id).await;
        for _ in 0..100 {
            if reply["stream"]["content"] == "Partial" {
                break;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
            reply = h.poll(&stream_id).await;
        }

        assert_eq!(reply["stream"]["content"], "Partial");
        assert_eq!(reply["stream"]["finish"], false);
        assert_eq!(h.registry.len(), 1);
    }

    #[tokio::test]
    async fn unknown_stream_gets_retry_text() {
        let h = harness(MockAnswerGenerator::new(), settings());

        let reply = h.poll("never-issued").await;

        assert_eq!(reply["stream"]["content"], "RETRY");
        assert_eq!(reply["stream"]["finish"], true);
    }

    #[tokio::test]
    async fn expired_stream_binding_gets_retry_text() {
        let h = harness(
            MockAnswerGenerator::new().with_stall(&[]),
            RelaySettings {
                binding_ttl: Duration::from_millis(20),
                ..settings()
            },
        );
        let first = h.ask("m1", "q").await.unwrap();
        let stream_id = first["stream"]["id"].as_str().unwrap().to_string();

        tokio::time::sleep(Duration::from_millis(40)).await;
        let reply = h.poll(&stream_id).await;

        assert_eq!(reply["stream"]["content"], "RETRY");
    }

    #[tokio::test]
    async fn unsupported_message_gets_empty_reply() {
        let h = harness(MockAnswerGenerator::new(), settings());

        let reply = h
            .send(r#"{"msgid":"m9","aibotid":"bot","msgtype":"image","image":{"url":"x"}}"#)
            .await;

        assert!(reply.is_none());
        assert!(h.registry.is_empty());
    }

    #[tokio::test]
    async fn forged_signature_is_rejected() {
        let h = harness(MockAnswerGenerator::new(), settings());
        let envelope = h.cipher.seal(r#"{"msgid":"m1","msgtype":"text"}"#, "1", "n");
        let body = serde_json::json!({ "encrypt": envelope.ciphertext }).to_string();
        let params = SignatureParams::new("0".repeat(40), "1", "n");

        let err = h.adapter.handle(&h.credentials, &params, &body).await.unwrap_err();

        assert_eq!(err, AdapterError::Cipher(CipherError::SignatureMismatch));
    }
}
