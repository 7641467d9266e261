use std::sync::Arc;

use bot_relay::adapters::answer::{UpstreamChatClient, UpstreamConfig};
use bot_relay::adapters::credentials::InMemoryBotCredentials;
use bot_relay::adapters::customer_service::WecomKfClient;
use bot_relay::adapters::external_id::{InMemoryExternalIdBridge, RedisExternalIdBridge};
use bot_relay::adapters::http::{app_router, BotRelayAppState, BotRelayPorts};
use bot_relay::config::{AppConfig, RedisConfig};
use bot_relay::domain::relay::{spawn_janitor, RelayRegistry};
use bot_relay::ports::ExternalIdBridge;
use secrecy::ExposeSecret;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let config = AppConfig::load()?;
    init_tracing(&config);
    config.validate()?;

    let bridge = connect_bridge(config.redis.as_ref()).await?;

    let mut upstream = UpstreamConfig::new(&config.upstream.base_url)
        .with_connect_timeout(config.upstream.connect_timeout())
        .with_request_timeout(config.upstream.request_timeout());
    if let Some(token) = &config.upstream.api_token {
        upstream = upstream.with_api_token(token.expose_secret().clone());
    }
    let upstream = Arc::new(UpstreamChatClient::new(upstream)?);

    let credentials = InMemoryBotCredentials::new();
    for app in config.bots.credentials() {
        tracing::info!(kb_id = %app.kb_id, platform = %app.platform, "Bot app configured");
        credentials.insert(app).await;
    }

    let registry = Arc::new(RelayRegistry::new());
    let janitor = spawn_janitor(
        Arc::clone(&registry),
        config.relay.janitor_interval(),
        config.relay.max_conversation_age(),
    );

    let state = BotRelayAppState::new(
        BotRelayPorts {
            credentials: Arc::new(credentials),
            bridge,
            generator: upstream.clone(),
            reader: upstream,
            customer_service: Arc::new(WecomKfClient::new(&config.bots.kf_api_base_url)),
        },
        registry,
        config.relay.to_settings(),
    );
    let app = app_router(state, config.server.request_timeout());

    let addr = config.server.socket_addr()?;
    tracing::info!(%addr, environment = ?config.server.environment, "Bot relay listening");
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    janitor.abort();
    Ok(())
}

fn init_tracing(config: &AppConfig) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.server.log_level));
    let registry = tracing_subscriber::registry().with(filter);

    if config.is_production() {
        registry
            .with(
                tracing_subscriber::fmt::layer()
                    .json()
                    .with_current_span(false)
                    .with_span_list(false),
            )
            .init();
    } else {
        registry.with(tracing_subscriber::fmt::layer()).init();
    }
}

async fn connect_bridge(
    redis: Option<&RedisConfig>,
) -> Result<Arc<dyn ExternalIdBridge>, Box<dyn std::error::Error>> {
    let Some(redis) = redis else {
        tracing::warn!("No Redis configured; external-id bindings stay in process memory");
        return Ok(Arc::new(InMemoryExternalIdBridge::new()));
    };

    let client = redis::Client::open(redis.url.as_str())?;
    let conn = tokio::time::timeout(
        redis.connect_timeout(),
        client.get_multiplexed_async_connection(),
    )
    .await??;
    tracing::info!("Connected to Redis for external-id bindings");
    Ok(Arc::new(RedisExternalIdBridge::new(conn)))
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutting down");
}
