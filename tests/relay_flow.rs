//! End-to-end relay scenarios driven through the AI-bot adapter.
//!
//! The generator here is steered by the test, so every chunk boundary and
//! the finish point are deterministic.

use async_trait::async_trait;
use serde_json::Value;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::mpsc;

use bot_relay::adapters::external_id::InMemoryExternalIdBridge;
use bot_relay::application::relay::{AiBotAdapter, AnswerProducer, RelaySettings};
use bot_relay::domain::bot::Platform;
use bot_relay::domain::cipher::CipherContext;
use bot_relay::domain::envelope::{EnvelopeFormat, SignatureParams};
use bot_relay::domain::relay::{ConversationId, RelayError, RelayRegistry, WaitOutcome};
use bot_relay::ports::{
    AnswerEvent, AnswerGenerator, AnswerRequest, BotCredentials, GenerationError,
};

// =============================================================================
// Test Infrastructure
// =============================================================================

const KEY: &str = "jWmYm7qr5nMoAUwZRjGtBxmz3KA1tkAj3ykkR6q2B2C";
const TRAILER: &str = "\n\n-- answered by kb";

/// Generator whose stream the test feeds by hand.
#[derive(Default)]
struct ManualGenerator {
    sender: Mutex<Option<mpsc::Sender<AnswerEvent>>>,
}

impl ManualGenerator {
    fn take_sender(&self) -> mpsc::Sender<AnswerEvent> {
        self.sender.lock().unwrap().take().expect("generate was not called")
    }
}

#[async_trait]
impl AnswerGenerator for ManualGenerator {
    async fn generate(
        &self,
        _request: AnswerRequest,
    ) -> Result<mpsc::Receiver<AnswerEvent>, GenerationError> {
        let (tx, rx) = mpsc::channel(16);
        *self.sender.lock().unwrap() = Some(tx);
        Ok(rx)
    }
}

struct Bot {
    adapter: AiBotAdapter,
    registry: Arc<RelayRegistry>,
    generator: Arc<ManualGenerator>,
    credentials: BotCredentials,
    cipher: CipherContext,
}

fn bot(binding_ttl: Duration) -> Bot {
    let registry = Arc::new(RelayRegistry::new());
    let generator = Arc::new(ManualGenerator::default());
    let producer = AnswerProducer::new(generator.clone(), Duration::from_secs(30), "FAILED");
    let settings = RelaySettings {
        binding_ttl,
        trailer: TRAILER.to_string(),
        thinking_text: "thinking".to_string(),
        retry_text: "please ask again".to_string(),
        not_found_text: "not found".to_string(),
        ..Default::default()
    };
    let adapter = AiBotAdapter::new(
        Arc::clone(&registry),
        Arc::new(InMemoryExternalIdBridge::new()),
        producer,
        settings,
    );
    let credentials = BotCredentials::new("kb-1", Platform::AiBot, "token", KEY, "");
    let cipher = credentials.cipher().unwrap();
    Bot {
        adapter,
        registry,
        generator,
        credentials,
        cipher,
    }
}

impl Bot {
    async fn send(&self, plaintext: Value) -> Value {
        let envelope = self.cipher.seal(&plaintext.to_string(), "1700000000", "nonce");
        let body = serde_json::json!({ "encrypt": envelope.ciphertext }).to_string();
        let params = SignatureParams::new(envelope.signature, envelope.timestamp, envelope.nonce);

        let reply = self
            .adapter
            .handle(&self.credentials, &params, &body)
            .await
            .unwrap()
            .expect("expected a reply body");
        let envelope = EnvelopeFormat::Json
            .decode(&reply, &SignatureParams::default())
            .unwrap();
        serde_json::from_str(&self.cipher.open(&envelope).unwrap()).unwrap()
    }

    async fn ask(&self, question: &str) -> String {
        let reply = self
            .send(serde_json::json!({
                "msgid": "msg-1", "aibotid": "bot", "msgtype": "text",
                "from": {"userid": "u1"}, "text": {"content": question}
            }))
            .await;
        reply["stream"]["id"].as_str().unwrap().to_string()
    }

    async fn poll(&self, stream_id: &str) -> (String, bool) {
        let reply = self
            .send(serde_json::json!({
                "msgid": uuid::Uuid::new_v4().to_string(), "aibotid": "bot",
                "msgtype": "stream", "stream": {"id": stream_id}
            }))
            .await;
        (
            reply["stream"]["content"].as_str().unwrap().to_string(),
            reply["stream"]["finish"].as_bool().unwrap(),
        )
    }

    /// Polls until the reply content satisfies `accept`.
    async fn poll_until(&self, stream_id: &str, accept: impl Fn(&str, bool) -> bool) -> (String, bool) {
        for _ in 0..200 {
            let (content, finish) = self.poll(stream_id).await;
            if accept(&content, finish) {
                return (content, finish);
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        panic!("poll never reached the expected state");
    }
}

async fn generator_started(generator: &ManualGenerator) -> mpsc::Sender<AnswerEvent> {
    for _ in 0..200 {
        if generator.sender.lock().unwrap().is_some() {
            return generator.take_sender();
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    panic!("producer never called the generator");
}

// =============================================================================
// Scenarios
// =============================================================================

#[tokio::test]
async fn streamed_answer_is_delivered_once_with_trailer() {
    let bot = bot(Duration::from_secs(900));
    let stream_id = bot.ask("Say hi").await;
    let upstream = generator_started(&bot.generator).await;

    assert_eq!(bot.poll(&stream_id).await, ("thinking".to_string(), false));

    upstream.send(AnswerEvent::data("Hi")).await.unwrap();
    let (content, finish) = bot.poll_until(&stream_id, |c, _| c == "Hi").await;
    assert_eq!((content.as_str(), finish), ("Hi", false));

    upstream.send(AnswerEvent::data(" there")).await.unwrap();
    upstream.send(AnswerEvent::done()).await.unwrap();

    let (content, finish) = bot.poll_until(&stream_id, |_, f| f).await;
    assert_eq!(content, format!("Hi there{}", TRAILER));
    assert!(finish);
    assert_eq!(content.matches(TRAILER).count(), 1);
    assert!(bot.registry.is_empty());

    assert_eq!(bot.poll(&stream_id).await, ("not found".to_string(), true));
}

#[tokio::test]
async fn expired_binding_asks_user_to_retry() {
    let bot = bot(Duration::from_millis(30));
    let stream_id = bot.ask("Slow question").await;
    let _upstream = generator_started(&bot.generator).await;

    tokio::time::sleep(Duration::from_millis(60)).await;

    assert_eq!(
        bot.poll(&stream_id).await,
        ("please ask again".to_string(), true)
    );
}

#[tokio::test]
async fn upstream_error_is_shown_as_final_content() {
    let bot = bot(Duration::from_secs(900));
    let stream_id = bot.ask("Break please").await;
    let upstream = generator_started(&bot.generator).await;

    upstream.send(AnswerEvent::data("Partial")).await.unwrap();
    upstream.send(AnswerEvent::error("model overloaded")).await.unwrap();

    let (content, _) = bot.poll_until(&stream_id, |_, f| f).await;
    assert_eq!(content, format!("Partial\n\nFAILED{}", TRAILER));
}

#[tokio::test]
async fn registry_serves_one_attached_poller_at_a_time() {
    let registry = RelayRegistry::new();
    let id = ConversationId::new();
    let state = registry.create(id, "question").state;

    let waiting = {
        let state = Arc::clone(&state);
        tokio::spawn(async move { state.attach_and_wait(Duration::from_secs(5)).await })
    };
    for _ in 0..200 {
        if state.snapshot().is_visited {
            break;
        }
        tokio::time::sleep(Duration::from_millis(2)).await;
    }

    assert_eq!(
        state.attach_and_wait(Duration::from_millis(10)).await,
        Err(RelayError::PollerAlreadyAttached(id))
    );

    state.append_chunk("Hi");
    assert_eq!(
        waiting.await.unwrap(),
        Ok(WaitOutcome::Chunk("Hi".to_string()))
    );
    assert!(!state.snapshot().is_visited);
}

#[tokio::test]
async fn only_first_eviction_of_a_finished_conversation_wins() {
    let registry = RelayRegistry::new();
    let id = ConversationId::new();
    let state = registry.create(id, "question").state;

    state.append_chunk("Hi");
    state.append_chunk(" there");
    state.finish();

    let snapshot = state.snapshot();
    assert_eq!(snapshot.content, "Hi there");
    assert!(snapshot.is_done);
    assert!(registry.evict(&id).is_some());
    assert!(registry.evict(&id).is_none());
    assert!(registry.get(&id).is_none());
}
