//! Ports - Interfaces for external dependencies.
//!
//! Following hexagonal architecture, ports define the contracts between
//! the relay and the outside world. Adapters implement these ports.
//!
//! ## Collaborator Ports
//!
//! - `AnswerGenerator` - Upstream streaming answer producer
//! - `ConversationReader` - Persisted conversations (fallback read path)
//! - `CustomerServiceClient` - Customer-service message sync and send API
//! - `BotCredentialsReader` - Per knowledge-base app credentials
//!
//! ## Cache Ports
//!
//! - `ExternalIdBridge` - TTL map from platform ids to conversation ids

mod answer_generator;
mod bot_credentials;
mod conversation_reader;
mod customer_service_client;
mod external_id_bridge;

pub use answer_generator::{
    AnswerEvent, AnswerEventKind, AnswerGenerator, AnswerRequest, GenerationError,
};
pub use bot_credentials::{BotCredentials, BotCredentialsReader, CredentialsError};
pub use conversation_reader::{ConversationReadError, ConversationReader, StoredAnswer};
pub use customer_service_client::{CustomerServiceClient, CustomerServiceError};
pub use external_id_bridge::{
    BindOutcome, BridgeError, ExternalIdBridge, ExternalKey, DEFAULT_BINDING_TTL,
};
