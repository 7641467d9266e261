//! Upstream chat client - streams answers from the knowledge-base service.
//!
//! # Endpoints
//!
//! - `POST {base_url}/chat/stream` with an [`AnswerRequest`] body. The
//!   response is Server-Sent Events; each `data:` line carries one JSON
//!   [`AnswerEvent`], and a literal `[DONE]` also ends the stream.
//! - `GET {base_url}/conversations/{id}?kb_id=...` returns the persisted
//!   answer of a finished conversation, `404` when unknown.
//!
//! # Configuration
//!
//! ```ignore
//! let config = UpstreamConfig::new("http://kb-service:8000/api/v1")
//!     .with_api_token("secret")
//!     .with_connect_timeout(Duration::from_secs(5));
//!
//! let client = UpstreamChatClient::new(config)?;
//! ```

use async_trait::async_trait;
use futures::StreamExt;
use reqwest::{Client, Response, StatusCode};
use secrecy::{ExposeSecret, Secret};
use std::time::Duration;
use tokio::sync::mpsc;

use crate::domain::relay::ConversationId;
use crate::ports::{
    AnswerEvent, AnswerEventKind, AnswerGenerator, AnswerRequest, ConversationReadError,
    ConversationReader, GenerationError, StoredAnswer,
};

/// Buffered events between the HTTP reader task and the producer.
const EVENT_CHANNEL_CAPACITY: usize = 64;

/// Configuration for the upstream client.
#[derive(Debug, Clone)]
pub struct UpstreamConfig {
    /// Base URL, without trailing slash.
    pub base_url: String,
    /// Bearer token sent on every request, if the service requires one.
    api_token: Option<Secret<String>>,
    /// Connect timeout. Streams themselves are bounded by the relay's
    /// generation timeout, not here.
    pub connect_timeout: Duration,
    /// Timeout for the non-streaming conversation lookup.
    pub request_timeout: Duration,
}

impl UpstreamConfig {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_token: None,
            connect_timeout: Duration::from_secs(5),
            request_timeout: Duration::from_secs(10),
        }
    }

    pub fn with_api_token(mut self, token: impl Into<String>) -> Self {
        self.api_token = Some(Secret::new(token.into()));
        self
    }

    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }
}

/// HTTP client for the knowledge-base chat service.
#[derive(Debug, Clone)]
pub struct UpstreamChatClient {
    config: UpstreamConfig,
    client: Client,
}

impl UpstreamChatClient {
    pub fn new(config: UpstreamConfig) -> Result<Self, GenerationError> {
        let client = Client::builder()
            .connect_timeout(config.connect_timeout)
            .build()
            .map_err(|e| GenerationError::Unavailable(format!("HTTP client setup: {}", e)))?;

        Ok(Self { config, client })
    }

    fn stream_url(&self) -> String {
        format!("{}/chat/stream", self.config.base_url)
    }

    fn conversation_url(&self, conversation_id: ConversationId) -> String {
        format!("{}/conversations/{}", self.config.base_url, conversation_id)
    }

    fn authorize(&self, builder: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match &self.config.api_token {
            Some(token) => builder.bearer_auth(token.expose_secret()),
            None => builder,
        }
    }

    async fn check_status(response: Response) -> Result<Response, GenerationError> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let message = response.text().await.unwrap_or_default();
        Err(GenerationError::Rejected {
            status: status.as_u16(),
            message,
        })
    }
}

#[async_trait]
impl AnswerGenerator for UpstreamChatClient {
    async fn generate(
        &self,
        request: AnswerRequest,
    ) -> Result<mpsc::Receiver<AnswerEvent>, GenerationError> {
        let conversation_id = request.conversation_id;
        let response = self
            .authorize(self.client.post(self.stream_url()))
            .header("Accept", "text/event-stream")
            .json(&request)
            .send()
            .await
            .map_err(|e| GenerationError::Unavailable(e.to_string()))?;
        let response = Self::check_status(response).await?;

        let (tx, rx) = mpsc::channel(EVENT_CHANNEL_CAPACITY);
        tokio::spawn(async move {
            let mut body = response.bytes_stream();
            let mut lines = SseLineBuffer::default();

            while let Some(chunk) = body.next().await {
                let bytes = match chunk {
                    Ok(bytes) => bytes,
                    Err(e) => {
                        tracing::warn!(%conversation_id, error = %e, "Upstream stream broke");
                        let _ = tx.send(AnswerEvent::error(e.to_string())).await;
                        return;
                    }
                };
                for event in lines.push(&bytes) {
                    let terminal = event.kind != AnswerEventKind::Data;
                    if tx.send(event).await.is_err() {
                        // Producer gave up (timeout); stop reading.
                        return;
                    }
                    if terminal {
                        return;
                    }
                }
            }
            tracing::debug!(%conversation_id, "Upstream stream ended");
        });

        Ok(rx)
    }
}

#[async_trait]
impl ConversationReader for UpstreamChatClient {
    async fn find_answer(
        &self,
        kb_id: &str,
        conversation_id: ConversationId,
    ) -> Result<Option<StoredAnswer>, ConversationReadError> {
        let response = self
            .authorize(self.client.get(self.conversation_url(conversation_id)))
            .query(&[("kb_id", kb_id)])
            .timeout(self.config.request_timeout)
            .send()
            .await
            .map_err(|e| ConversationReadError::Unavailable(e.to_string()))?;

        if response.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        if !response.status().is_success() {
            return Err(ConversationReadError::Unavailable(format!(
                "status {}",
                response.status()
            )));
        }

        response
            .json::<StoredAnswer>()
            .await
            .map(Some)
            .map_err(|e| ConversationReadError::Malformed(e.to_string()))
    }
}

/// Splits an SSE byte stream into events.
///
/// Network chunks may end mid-line or mid-character, so bytes are held until
/// a newline arrives.
#[derive(Debug, Default)]
struct SseLineBuffer {
    pending: Vec<u8>,
}

impl SseLineBuffer {
    fn push(&mut self, bytes: &[u8]) -> Vec<AnswerEvent> {
        self.pending.extend_from_slice(bytes);
        let mut events = Vec::new();

        while let Some(pos) = self.pending.iter().position(|b| *b == b'\n') {
            let line: Vec<u8> = self.pending.drain(..=pos).collect();
            let line = String::from_utf8_lossy(&line);
            if let Some(event) = parse_sse_line(line.trim_end_matches(['\r', '\n'])) {
                events.push(event);
            }
        }
        events
    }
}

fn parse_sse_line(line: &str) -> Option<AnswerEvent> {
    let data = line.strip_prefix("data:")?.trim_start();
    if data == "[DONE]" {
        return Some(AnswerEvent::done());
    }
    match serde_json::from_str::<AnswerEvent>(data) {
        Ok(event) if event.kind == AnswerEventKind::Other => None,
        Ok(event) => Some(event),
        Err(e) => {
            tracing::debug!(error = %e, line = data, "Skipping unparseable SSE line");
            None
        }
    }
}

// ════════════════════════════════════════════════════════════════════════════════
// Tests
// ════════════════════════════════════════════════════════════════════════════════

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::bot::Platform;

    #[test]
    fn config_builder_works() {
        let config = UpstreamConfig::new("http://kb:8000/api/v1/")
            .with_api_token("tok")
            .with_connect_timeout(Duration::from_secs(2));

        assert_eq!(config.base_url, "http://kb:8000/api/v1");
        assert_eq!(config.connect_timeout, Duration::from_secs(2));
        assert!(config.api_token.is_some());
    }

    #[test]
    fn urls_are_built_from_base() {
        let client = UpstreamChatClient::new(UpstreamConfig::new("http://kb/api")).unwrap();
        let id = ConversationId::new();

        assert_eq!(client.stream_url(), "http://kb/api/chat/stream");
        assert_eq!(
            client.conversation_url(id),
            format!("http://kb/api/conversations/{}", id)
        );
    }

    #[test]
    fn request_body_carries_routing_fields() {
        let id = ConversationId::new();
        let body = serde_json::to_value(AnswerRequest {
            kb_id: "kb-1".to_string(),
            conversation_id: id,
            question: "hello?".to_string(),
            user_id: None,
            platform: Platform::WecomApp,
        })
        .unwrap();

        assert_eq!(body["kb_id"], "kb-1");
        assert_eq!(body["conversation_id"], id.to_string());
        assert_eq!(body["platform"], "wecom_app");
        assert!(body.get("user_id").is_none());
    }

    #[test]
    fn parse_sse_data_event() {
        let event = parse_sse_line(r#"data: {"type":"data","content":"Hello"}"#);
        assert_eq!(event, Some(AnswerEvent::data("Hello")));
    }

    #[test]
    fn parse_sse_done_marker() {
        assert_eq!(parse_sse_line("data: [DONE]"), Some(AnswerEvent::done()));
    }

    #[test]
    fn parse_sse_ignores_comments_and_other_fields() {
        assert_eq!(parse_sse_line(": keep-alive"), None);
        assert_eq!(parse_sse_line("event: message"), None);
        assert_eq!(parse_sse_line(r#"data: {"type":"conversation_id","content":"x"}"#), None);
        assert_eq!(parse_sse_line("data: not json"), None);
    }

    #[test]
    fn line_buffer_joins_split_chunks() {
        let mut buffer = SseLineBuffer::default();

        assert!(buffer.push(b"data: {\"type\":\"data\",").is_empty());
        let events = buffer.push(b"\"content\":\"Hi\"}\n\ndata: {\"type\":\"done\"}\n");

        assert_eq!(events, vec![AnswerEvent::data("Hi"), AnswerEvent::done()]);
    }

    #[test]
    fn line_buffer_keeps_split_utf8_intact() {
        let mut buffer = SseLineBuffer::default();
        let line = "data: {\"type\":\"data\",\"content\":\"你好\"}\n".as_bytes();
        let split = line.len() - 6;

        assert!(buffer.push(&line[..split]).is_empty());
        let events = buffer.push(&line[split..]);

        assert_eq!(events, vec![AnswerEvent::data("你好")]);
    }

    #[test]
    fn line_buffer_handles_crlf() {
        let mut buffer = SseLineBuffer::default();
        let events = buffer.push(b"data: {\"type\":\"error\",\"content\":\"boom\"}\r\n");
        assert_eq!(events, vec![AnswerEvent::error("boom")]);
    }
}
