//! External-ID Bridge port - Maps platform-issued ids to conversations.
//!
//! Platforms refer to a conversation with ids they (or we) hand out per
//! message or per stream, never with our internal conversation id. The
//! bridge translates them, with expiry, so a stale poll fails cleanly instead
//! of resurrecting a long-finished conversation.
//!
//! Implementations should:
//! - Make `bind` set-if-not-exists (duplicate webhooks keep the first binding)
//! - Expire bindings after their TTL
//! - Be shared across server instances in multi-server deployments

use async_trait::async_trait;
use std::fmt;
use std::time::Duration;

use crate::domain::bot::Platform;
use crate::domain::relay::ConversationId;

/// Default lifetime of a binding.
pub const DEFAULT_BINDING_TTL: Duration = Duration::from_secs(15 * 60);

/// A platform-issued identifier, namespaced by platform and id kind.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ExternalKey {
    platform: Platform,
    kind: &'static str,
    id: String,
}

impl ExternalKey {
    /// Key for an inbound message id.
    pub fn message(platform: Platform, msg_id: impl Into<String>) -> Self {
        Self {
            platform,
            kind: "msg",
            id: msg_id.into(),
        }
    }

    /// Key for a stream id used by follow-up polls.
    pub fn stream(platform: Platform, stream_id: impl Into<String>) -> Self {
        Self {
            platform,
            kind: "stream",
            id: stream_id.into(),
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    /// Redis key for this binding.
    pub fn to_redis_key(&self) -> String {
        format!("bot-relay:xid:{}:{}:{}", self.platform, self.kind, self.id)
    }
}

impl fmt::Display for ExternalKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}:{}", self.platform, self.kind, self.id)
    }
}

/// Result of [`ExternalIdBridge::bind`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BindOutcome {
    /// The key was free and now points at the requested conversation.
    Bound,
    /// The key was already bound; the existing binding wins.
    Existing(ConversationId),
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum BridgeError {
    /// Cache backend could not be reached.
    #[error("External-id cache unavailable: {0}")]
    Unavailable(String),

    /// Stored value is not a conversation id.
    #[error("Corrupt external-id binding for {key}: {value}")]
    Corrupt { key: String, value: String },
}

/// Port for the TTL-backed external-id cache.
#[async_trait]
pub trait ExternalIdBridge: Send + Sync {
    /// Binds `key` to `conversation_id` unless it is already bound.
    async fn bind(
        &self,
        key: &ExternalKey,
        conversation_id: ConversationId,
        ttl: Duration,
    ) -> Result<BindOutcome, BridgeError>;

    /// Looks up a binding. Returns `None` when missing or expired.
    async fn resolve(&self, key: &ExternalKey) -> Result<Option<ConversationId>, BridgeError>;
}
