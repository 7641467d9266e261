//! HTTP adapters - webhook endpoints exposed to the chat platforms.

pub mod bot;

use axum::Router;
use std::time::Duration;
use tower_http::{timeout::TimeoutLayer, trace::TraceLayer};

pub use bot::{bot_router, BotRelayAppState, BotRelayPorts};

/// Builds the full application router with tracing and a request timeout.
pub fn app_router(state: BotRelayAppState, request_timeout: Duration) -> Router {
    bot_router()
        .with_state(state)
        .layer(TraceLayer::new_for_http())
        .layer(TimeoutLayer::new(request_timeout))
}
