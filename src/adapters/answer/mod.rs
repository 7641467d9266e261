//! Answer generation adapters.
//!
//! - `UpstreamChatClient` - streams answers from the knowledge-base service
//!   and looks up finished conversations
//! - `MockAnswerGenerator` - scripted answers for tests
//! - `InMemoryConversationReader` - stored answers held in memory

mod in_memory_reader;
mod mock_generator;
mod upstream_client;

pub use in_memory_reader::InMemoryConversationReader;
pub use mock_generator::{MockAnswerGenerator, MockScript};
pub use upstream_client::{UpstreamChatClient, UpstreamConfig};
