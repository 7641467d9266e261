//! In-memory external-id bridge for testing and single-server deployments.
//!
//! Expired bindings are dropped lazily on access. Not shared between server
//! instances; use the Redis adapter when running more than one.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;
use tokio::time::Instant;

use crate::domain::relay::ConversationId;
use crate::ports::{BindOutcome, BridgeError, ExternalIdBridge, ExternalKey};

#[derive(Debug, Clone, Copy)]
struct Binding {
    conversation_id: ConversationId,
    expires_at: Instant,
}

impl Binding {
    fn is_live(&self, now: Instant) -> bool {
        now < self.expires_at
    }
}

/// TTL map held in process memory.
#[derive(Debug, Clone, Default)]
pub struct InMemoryExternalIdBridge {
    bindings: Arc<RwLock<HashMap<ExternalKey, Binding>>>,
}

impl InMemoryExternalIdBridge {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored bindings, including expired ones not yet purged.
    pub async fn len(&self) -> usize {
        self.bindings.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.bindings.read().await.is_empty()
    }
}

#[async_trait]
impl ExternalIdBridge for InMemoryExternalIdBridge {
    async fn bind(
        &self,
        key: &ExternalKey,
        conversation_id: ConversationId,
        ttl: Duration,
    ) -> Result<BindOutcome, BridgeError> {
        let now = Instant::now();
        let mut bindings = self.bindings.write().await;
        bindings.retain(|_, binding| binding.is_live(now));

        if let Some(existing) = bindings.get(key) {
            return Ok(BindOutcome::Existing(existing.conversation_id));
        }
        bindings.insert(
            key.clone(),
            Binding {
                conversation_id,
                expires_at: now + ttl,
            },
        );
        Ok(BindOutcome::Bound)
    }

    async fn resolve(&self, key: &ExternalKey) -> Result<Option<ConversationId>, BridgeError> {
        let now = Instant::now();
        let bindings = self.bindings.read().await;
        Ok(bindings
            .get(key)
            .filter(|binding| binding.is_live(now))
            .map(|binding| binding.conversation_id))
    }
}
