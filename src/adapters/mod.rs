//! Adapters - Implementations of port interfaces.
//!
//! Adapters connect the relay to external systems:
//! - `answer` - Knowledge-base chat service client and test doubles
//! - `credentials` - Bot app credential stores
//! - `customer_service` - Customer service ("kf") API client
//! - `external_id` - External-id bridge (in-memory, Redis)
//! - `http` - Webhook endpoints (axum)

pub mod answer;
pub mod credentials;
pub mod customer_service;
pub mod external_id;
pub mod http;
