//! Conversation relay registry.
//!
//! Buffers a streaming answer per conversation and serves it to repeated
//! polls while a single background producer keeps writing.
//!
//! ```text
//! New ──create──▶ Streaming ──finish──▶ Complete-Unconsumed ──evict──▶ Evicted
//! ```

mod errors;
mod ids;
mod registry;
mod state;

pub use errors::RelayError;
pub use ids::ConversationId;
pub use registry::{spawn_janitor, CreateOutcome, RelayRegistry};
pub use state::{ConversationState, Snapshot, WaitOutcome};
