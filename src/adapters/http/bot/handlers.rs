//! HTTP handlers for bot webhook endpoints.
//!
//! Platforms retry on any non-2xx status, so verification failures answer
//! with an empty 4xx body and let the platform's own policy decide.

use axum::{
    extract::{Path, Query, State},
    response::{IntoResponse, Response},
    Json,
};
use http::{header, StatusCode};
use std::sync::Arc;

use super::dto::{CallbackQuery, ErrorResponse, HealthResponse};
use crate::application::relay::{
    verify_callback_url, AdapterError, AiBotAdapter, AnswerProducer, CustomerServiceAdapter,
    RelaySettings, WecomAppAdapter,
};
use crate::domain::bot::Platform;
use crate::domain::cipher::CipherError;
use crate::domain::relay::RelayRegistry;
use crate::ports::{
    AnswerGenerator, BotCredentials, BotCredentialsReader, ConversationReader, CredentialsError,
    CustomerServiceClient, ExternalIdBridge,
};

// ════════════════════════════════════════════════════════════════════════════════
// Application State
// ════════════════════════════════════════════════════════════════════════════════

/// Shared state for the bot webhook handlers.
#[derive(Clone)]
pub struct BotRelayAppState {
    pub credentials: Arc<dyn BotCredentialsReader>,
    pub registry: Arc<RelayRegistry>,
    pub ai_bot: Arc<AiBotAdapter>,
    pub wecom_app: Arc<WecomAppAdapter>,
    pub customer_service: Arc<CustomerServiceAdapter>,
}

/// Ports the relay needs from the outside world.
pub struct BotRelayPorts {
    pub credentials: Arc<dyn BotCredentialsReader>,
    pub bridge: Arc<dyn ExternalIdBridge>,
    pub generator: Arc<dyn AnswerGenerator>,
    pub reader: Arc<dyn ConversationReader>,
    pub customer_service: Arc<dyn CustomerServiceClient>,
}

impl BotRelayAppState {
    /// Wires the three platform adapters around one shared registry.
    pub fn new(ports: BotRelayPorts, registry: Arc<RelayRegistry>, settings: RelaySettings) -> Self {
        let producer = AnswerProducer::new(
            ports.generator,
            settings.generation_timeout,
            settings.failure_text.clone(),
        );

        Self {
            credentials: ports.credentials,
            ai_bot: Arc::new(AiBotAdapter::new(
                Arc::clone(&registry),
                Arc::clone(&ports.bridge),
                producer.clone(),
                settings.clone(),
            )),
            wecom_app: Arc::new(WecomAppAdapter::new(
                Arc::clone(&registry),
                Arc::clone(&ports.bridge),
                ports.reader,
                producer.clone(),
                settings.clone(),
            )),
            customer_service: Arc::new(CustomerServiceAdapter::new(
                Arc::clone(&registry),
                ports.bridge,
                ports.customer_service,
                producer,
                settings,
            )),
            registry,
        }
    }

    async fn credentials_for(
        &self,
        kb_id: &str,
        platform: Platform,
    ) -> Result<BotCredentials, BotApiError> {
        self.credentials
            .find(kb_id, platform)
            .await?
            .ok_or_else(|| BotApiError::UnknownApp {
                kb_id: kb_id.to_string(),
                platform,
            })
    }
}

// ════════════════════════════════════════════════════════════════════════════════
// URL Verification (GET endpoints)
// ════════════════════════════════════════════════════════════════════════════════

/// GET /bots/:kb_id/ai-bot - Callback URL handshake
pub async fn verify_ai_bot(
    State(state): State<BotRelayAppState>,
    Path(kb_id): Path<String>,
    Query(query): Query<CallbackQuery>,
) -> Result<String, BotApiError> {
    verify(&state, &kb_id, Platform::AiBot, &query).await
}

/// GET /bots/:kb_id/wecom-app - Callback URL handshake
pub async fn verify_wecom_app(
    State(state): State<BotRelayAppState>,
    Path(kb_id): Path<String>,
    Query(query): Query<CallbackQuery>,
) -> Result<String, BotApiError> {
    verify(&state, &kb_id, Platform::WecomApp, &query).await
}

/// GET /bots/:kb_id/customer-service - Callback URL handshake
pub async fn verify_customer_service(
    State(state): State<BotRelayAppState>,
    Path(kb_id): Path<String>,
    Query(query): Query<CallbackQuery>,
) -> Result<String, BotApiError> {
    verify(&state, &kb_id, Platform::CustomerService, &query).await
}

async fn verify(
    state: &BotRelayAppState,
    kb_id: &str,
    platform: Platform,
    query: &CallbackQuery,
) -> Result<String, BotApiError> {
    let echostr = query.echostr.as_deref().ok_or(BotApiError::MissingChallenge)?;
    let credentials = state.credentials_for(kb_id, platform).await?;
    Ok(verify_callback_url(&credentials, &query.params(), echostr)?)
}

// ════════════════════════════════════════════════════════════════════════════════
// Callbacks (POST endpoints)
// ════════════════════════════════════════════════════════════════════════════════

/// POST /bots/:kb_id/ai-bot - Encrypted JSON callback
pub async fn receive_ai_bot(
    State(state): State<BotRelayAppState>,
    Path(kb_id): Path<String>,
    Query(query): Query<CallbackQuery>,
    body: String,
) -> Result<Response, BotApiError> {
    let credentials = state.credentials_for(&kb_id, Platform::AiBot).await?;
    let reply = state.ai_bot.handle(&credentials, &query.params(), &body).await?;
    Ok(encrypted_reply(Platform::AiBot, reply))
}

/// POST /bots/:kb_id/wecom-app - Encrypted XML callback, answered passively
pub async fn receive_wecom_app(
    State(state): State<BotRelayAppState>,
    Path(kb_id): Path<String>,
    Query(query): Query<CallbackQuery>,
    body: String,
) -> Result<Response, BotApiError> {
    let credentials = state.credentials_for(&kb_id, Platform::WecomApp).await?;
    let reply = state
        .wecom_app
        .handle(&credentials, &query.params(), &body)
        .await?;
    Ok(encrypted_reply(Platform::WecomApp, reply))
}

/// POST /bots/:kb_id/customer-service - Encrypted XML event, acknowledged at once
pub async fn receive_customer_service(
    State(state): State<BotRelayAppState>,
    Path(kb_id): Path<String>,
    Query(query): Query<CallbackQuery>,
    body: String,
) -> Result<StatusCode, BotApiError> {
    let credentials = state
        .credentials_for(&kb_id, Platform::CustomerService)
        .await?;
    state
        .customer_service
        .handle(credentials, &query.params(), &body)
        .await?;
    Ok(StatusCode::OK)
}

/// GET /health
pub async fn health(State(state): State<BotRelayAppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        active_conversations: state.registry.len(),
    })
}

fn encrypted_reply(platform: Platform, reply: Option<String>) -> Response {
    match reply {
        Some(body) => (
            [(header::CONTENT_TYPE, platform.envelope_format().content_type())],
            body,
        )
            .into_response(),
        None => StatusCode::OK.into_response(),
    }
}

// ════════════════════════════════════════════════════════════════════════════════
// Error Handling
// ════════════════════════════════════════════════════════════════════════════════

#[derive(Debug, thiserror::Error)]
pub enum BotApiError {
    #[error("No {platform} app configured for knowledge base {kb_id}")]
    UnknownApp { kb_id: String, platform: Platform },

    #[error("Verification request has no echostr")]
    MissingChallenge,

    #[error(transparent)]
    Credentials(#[from] CredentialsError),

    #[error(transparent)]
    Adapter(#[from] AdapterError),
}

impl IntoResponse for BotApiError {
    fn into_response(self) -> Response {
        match &self {
            BotApiError::Adapter(AdapterError::Cipher(CipherError::SignatureMismatch)) => {
                tracing::warn!(error = %self, "Rejected callback");
                StatusCode::UNAUTHORIZED.into_response()
            }
            BotApiError::Adapter(e) if e.is_client_error() => {
                tracing::warn!(error = %self, "Rejected callback");
                StatusCode::BAD_REQUEST.into_response()
            }
            BotApiError::MissingChallenge => StatusCode::BAD_REQUEST.into_response(),
            BotApiError::UnknownApp { .. } => {
                tracing::warn!(error = %self, "Callback for unknown app");
                let body = ErrorResponse::new("APP_NOT_FOUND", self.to_string());
                (StatusCode::NOT_FOUND, Json(body)).into_response()
            }
            BotApiError::Credentials(_) | BotApiError::Adapter(_) => {
                tracing::error!(error = %self, "Callback failed");
                let body = ErrorResponse::new("INTERNAL_ERROR", "Internal server error");
                (StatusCode::INTERNAL_SERVER_ERROR, Json(body)).into_response()
            }
        }
    }
}
