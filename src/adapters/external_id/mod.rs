//! External-id bridge adapters.
//!
//! ## Available Adapters
//!
//! - `InMemoryExternalIdBridge` - In-memory for testing and single-server
//! - `RedisExternalIdBridge` - Redis-backed for production multi-server
//!
//! ## Usage
//!
//! ```ignore
//! use bot_relay::adapters::external_id::{InMemoryExternalIdBridge, RedisExternalIdBridge};
//!
//! // For testing
//! let bridge = InMemoryExternalIdBridge::new();
//!
//! // For production
//! let conn = redis::Client::open(url)?.get_multiplexed_tokio_connection().await?;
//! let bridge = RedisExternalIdBridge::new(conn);
//! ```

mod in_memory;
mod redis;

pub use in_memory::InMemoryExternalIdBridge;
pub use redis::RedisExternalIdBridge;
