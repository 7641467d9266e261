//! Relay tunables and user-facing texts.

use std::time::Duration;

use crate::domain::relay::ConversationId;
use crate::ports::DEFAULT_BINDING_TTL;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RelaySettings {
    /// Lifetime of external-id bindings.
    pub binding_ttl: Duration,
    /// Upper bound on one answer generation.
    pub generation_timeout: Duration,
    /// How long a passive-reply attempt parks before answering.
    pub long_poll_wait: Duration,
    /// Deliveries of one message the enterprise-app platform makes.
    pub passive_reply_attempts: u32,
    /// Appended once to every fully delivered answer.
    pub trailer: String,
    pub thinking_text: String,
    pub retry_text: String,
    pub not_found_text: String,
    pub pending_text: String,
    pub failure_text: String,
    /// Template with `{kb_id}` and `{conversation_id}` placeholders.
    pub answer_page_url: Option<String>,
}

impl Default for RelaySettings {
    fn default() -> Self {
        Self {
            binding_ttl: DEFAULT_BINDING_TTL,
            generation_timeout: Duration::from_secs(300),
            long_poll_wait: Duration::from_millis(4500),
            passive_reply_attempts: 3,
            trailer: "\n\n---\nAnswered by the knowledge base assistant.".to_string(),
            thinking_text: "Thinking...".to_string(),
            retry_text: "This answer is no longer available. Please ask again.".to_string(),
            not_found_text: "No answer found for this conversation.".to_string(),
            pending_text: "The answer is taking longer than usual.".to_string(),
            failure_text: "Sorry, the answer could not be completed.".to_string(),
            answer_page_url: None,
        }
    }
}

impl RelaySettings {
    /// Final content of a delivered answer.
    pub fn with_trailer(&self, content: &str) -> String {
        format!("{}{}", content, self.trailer)
    }

    pub fn answer_page_link(&self, kb_id: &str, conversation_id: ConversationId) -> Option<String> {
        self.answer_page_url.as_ref().map(|template| {
            template
                .replace("{kb_id}", kb_id)
                .replace("{conversation_id}", &conversation_id.to_string())
        })
    }

    /// Content sent when the platform stops waiting before the answer is done.
    pub fn pending_reply(&self, partial: &str, kb_id: &str, conversation_id: ConversationId) -> String {
        let mut reply = String::new();
        if !partial.is_empty() {
            reply.push_str(partial);
            reply.push_str("\n\n");
        }
        reply.push_str(&self.pending_text);
        if let Some(link) = self.answer_page_link(kb_id, conversation_id) {
            reply.push('\n');
            reply.push_str(&link);
        }
        reply
    }
}
