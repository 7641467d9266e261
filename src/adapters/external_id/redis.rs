//! Redis-backed external-id bridge for multi-server deployments.
//!
//! Bindings are plain string keys written with `SET key value NX EX ttl`, so
//! the first writer wins and Redis handles expiry.

use async_trait::async_trait;
use redis::aio::MultiplexedConnection;
use redis::AsyncCommands;
use std::time::Duration;

use crate::domain::relay::ConversationId;
use crate::ports::{BindOutcome, BridgeError, ExternalIdBridge, ExternalKey};

/// Attempts at `SET NX` when the competing binding expires in between.
const MAX_BIND_ATTEMPTS: usize = 2;

#[derive(Clone)]
pub struct RedisExternalIdBridge {
    conn: MultiplexedConnection,
}

impl RedisExternalIdBridge {
    pub fn new(conn: MultiplexedConnection) -> Self {
        Self { conn }
    }

    fn parse(key: &ExternalKey, value: String) -> Result<ConversationId, BridgeError> {
        value.parse().map_err(|_| BridgeError::Corrupt {
            key: key.to_redis_key(),
            value,
        })
    }
}

#[async_trait]
impl ExternalIdBridge for RedisExternalIdBridge {
    async fn bind(
        &self,
        key: &ExternalKey,
        conversation_id: ConversationId,
        ttl: Duration,
    ) -> Result<BindOutcome, BridgeError> {
        let redis_key = key.to_redis_key();
        let ttl_secs = ttl.as_secs().max(1);
        let mut conn = self.conn.clone();

        for _ in 0..MAX_BIND_ATTEMPTS {
            let set: Option<String> = redis::cmd("SET")
                .arg(&redis_key)
                .arg(conversation_id.to_string())
                .arg("NX")
                .arg("EX")
                .arg(ttl_secs)
                .query_async(&mut conn)
                .await
                .map_err(|e: redis::RedisError| BridgeError::Unavailable(e.to_string()))?;
            if set.is_some() {
                return Ok(BindOutcome::Bound);
            }

            // Lost the race; report whoever holds the key, unless it just expired.
            if let Some(existing) = self.resolve(key).await? {
                return Ok(BindOutcome::Existing(existing));
            }
        }

        Err(BridgeError::Unavailable(format!(
            "binding for {} kept changing",
            key
        )))
    }

    async fn resolve(&self, key: &ExternalKey) -> Result<Option<ConversationId>, BridgeError> {
        let mut conn = self.conn.clone();
        let value: Option<String> = conn
            .get(key.to_redis_key())
            .await
            .map_err(|e: redis::RedisError| BridgeError::Unavailable(e.to_string()))?;

        value.map(|value| Self::parse(key, value)).transpose()
    }
}

impl std::fmt::Debug for RedisExternalIdBridge {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RedisExternalIdBridge").finish_non_exhaustive()
    }
}
