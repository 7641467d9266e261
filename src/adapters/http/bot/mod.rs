//! HTTP adapter for bot webhook endpoints.
//!
//! - `GET|POST /bots/:kb_id/ai-bot`
//! - `GET|POST /bots/:kb_id/wecom-app`
//! - `GET|POST /bots/:kb_id/customer-service`
//! - `GET /health`

pub mod dto;
pub mod handlers;
pub mod routes;

pub use handlers::{BotApiError, BotRelayAppState, BotRelayPorts};
pub use routes::{bot_router, bot_routes};
