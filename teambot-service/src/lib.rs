//! Teambot service - Teams and REST chat relay to Azure OpenAI.
//!
//! Users talk to the bot from Microsoft Teams (Bot Framework activities on
//! `/api/messages`) or over a small JSON API (`/api/chat`). Each conversation
//! keeps a bounded history that is sent to the model on every turn.
//!
//! ```text
//! Teams → /api/messages → TeamsBot ─┐
//!                                   ├→ ChatService → RateLimiter → Azure OpenAI
//! Client → /api/chat ───────────────┘        ↓
//!                                     ConversationStore
//! ```

#![warn(clippy::all)]
#![allow(clippy::pedantic)]

pub mod bot;
pub mod chat;
pub mod cli;
pub mod conversation;
pub mod message;
pub mod provider;
pub mod rate_limiter;
pub mod retry;
pub mod routes;
pub mod traits;

// Re-export commonly used types
pub use bot::{Activity, ActivityType, ConnectorClient, TeamsBot};
pub use chat::{ChatService, ChatTurn, CompletionSettings};
pub use conversation::ConversationStore;
pub use message::{ConversationSummary, Message, Role};
pub use provider::{AzureOpenAiProvider, Completion, CompletionRequest, Provider, ProviderError};
pub use rate_limiter::RateLimiter;
pub use retry::RetryPolicy;
pub use routes::{build_router, create_state, AppState};
pub use traits::{ActivitySender, ChannelError, ChannelResult};

use anyhow::Context;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use teambot_common::config::Config;
use tower_http::cors::{Any, CorsLayer};
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::trace::TraceLayer;

/// Largest request body accepted, in bytes.
const MAX_BODY_BYTES: usize = 1024 * 1024;

/// Wire the production collaborators: Azure OpenAI and the Bot Framework connector.
pub fn build_state(config: &Config) -> Arc<AppState> {
    let provider = AzureOpenAiProvider::new(
        &config.azure_openai,
        Duration::from_secs(config.conversation.request_timeout_secs),
    );
    let chat = Arc::new(ChatService::from_config(config, Arc::new(provider)));
    let sender = Arc::new(ConnectorClient::new(&config.bot));

    create_state(config, chat, sender)
}

/// Router with tracing, CORS and body size limits applied.
pub fn build_app(state: Arc<AppState>) -> axum::Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    build_router(state)
        .layer(RequestBodyLimitLayer::new(MAX_BODY_BYTES))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
}

/// Start the HTTP server and run until Ctrl-C.
pub async fn start_server(config: &Config) -> anyhow::Result<()> {
    let addr: SocketAddr = config
        .bind_address()
        .parse()
        .with_context(|| format!("invalid bind address {}", config.bind_address()))?;

    if config.bot.is_managed_identity() {
        tracing::warn!("Bot Framework credentials not set, replies are sent unauthenticated");
    }

    let app = build_app(build_state(config));

    tracing::info!(
        %addr,
        deployment = %config.azure_openai.deployment_name,
        max_history = config.conversation.max_history,
        rate_limit_per_minute = config.conversation.rate_limit_per_minute,
        "Starting teambot"
    );

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind {addr}"))?;
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await?;

    tracing::info!("Teambot stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown signal received");
}
