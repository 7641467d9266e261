//! Axum router configuration for bot webhook endpoints.

use axum::{routing::get, Router};

use super::handlers::{
    health, receive_ai_bot, receive_customer_service, receive_wecom_app, verify_ai_bot,
    verify_customer_service, verify_wecom_app, BotRelayAppState,
};

/// Create the bot webhook routes.
///
/// # Routes
///
/// Each platform gets a `GET` for the URL handshake and a `POST` for
/// callbacks, keyed by knowledge base:
/// - `/:kb_id/ai-bot` - AI bot (JSON, stream polling)
/// - `/:kb_id/wecom-app` - Enterprise app (XML, passive reply)
/// - `/:kb_id/customer-service` - Customer service (XML, push)
pub fn bot_routes() -> Router<BotRelayAppState> {
    Router::new()
        .route("/:kb_id/ai-bot", get(verify_ai_bot).post(receive_ai_bot))
        .route("/:kb_id/wecom-app", get(verify_wecom_app).post(receive_wecom_app))
        .route(
            "/:kb_id/customer-service",
            get(verify_customer_service).post(receive_customer_service),
        )
}

/// Create the complete bot relay router, mounted at `/bots`, plus `/health`.
pub fn bot_router() -> Router<BotRelayAppState> {
    Router::new()
        .route("/health", get(health))
        .nest("/bots", bot_routes())
}
