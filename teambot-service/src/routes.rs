//! HTTP routes for the teambot service.
//!
//! - `POST /api/chat` direct chat for web clients and integrations
//! - `POST /api/conversation/:id/clear` and `GET /api/conversation/:id/summary`
//! - `POST /api/messages` Bot Framework activity endpoint
//! - `GET /health`

use axum::{
    extract::{rejection::JsonRejection, ConnectInfo, Path, State},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::sync::Arc;

use crate::bot::{Activity, TeamsBot};
use crate::chat::{ChatService, ChatTurn};
use crate::message::ConversationSummary;
use crate::traits::ActivitySender;
use teambot_common::config::Config;
use teambot_common::logging::trace_id_from_headers;
use teambot_common::util::validate_conversation_id;

/// Longest chat message accepted over REST, in characters.
const MAX_MESSAGE_CHARS: usize = 4000;

const DEFAULT_API_USER: &str = "API User";

// ============================================================================
// State
// ============================================================================

/// Shared state for the HTTP server.
pub struct AppState {
    pub chat: Arc<ChatService>,
    pub bot: Arc<TeamsBot>,
    /// Delivers bot replies
    pub sender: Arc<dyn ActivitySender>,
    /// Whether Azure OpenAI endpoint and key are set
    pub model_configured: bool,
    /// Whether Bot Framework app id and password are set
    pub bot_configured: bool,
}

/// Create the shared state from configuration and injected collaborators.
pub fn create_state(
    config: &Config,
    chat: Arc<ChatService>,
    sender: Arc<dyn ActivitySender>,
) -> Arc<AppState> {
    Arc::new(AppState {
        bot: Arc::new(TeamsBot::new(Arc::clone(&chat))),
        chat,
        sender,
        model_configured: config.azure_openai.is_configured(),
        bot_configured: config.bot.has_credentials(),
    })
}

// ============================================================================
// Errors
// ============================================================================

/// Error returned by handlers as `{"error": ...}`.
#[derive(Debug)]
pub enum ApiError {
    BadRequest(String),
    Internal(String),
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        Self::BadRequest(rejection.body_text())
    }
}

impl From<teambot_common::Error> for ApiError {
    fn from(err: teambot_common::Error) -> Self {
        if err.is_invalid_input() {
            Self::BadRequest(err.to_string())
        } else {
            Self::Internal(err.to_string())
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct ErrorResponse {
    error: String,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            Self::BadRequest(message) => (StatusCode::BAD_REQUEST, message),
            Self::Internal(detail) => {
                tracing::error!(error = %detail, "Internal server error");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Internal server error".to_string(),
                )
            }
        };
        (status, Json(ErrorResponse { error: message })).into_response()
    }
}

// ============================================================================
// Request/Response Types
// ============================================================================

#[derive(Debug, Deserialize)]
pub struct ChatRequest {
    pub message: Option<String>,
    pub conversation_id: Option<String>,
    pub user_name: Option<String>,
    pub system_message: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ChatResponse {
    pub response: String,
    pub conversation_id: String,
}

#[derive(Debug, Serialize)]
struct ClearResponse {
    status: &'static str,
    conversation_id: String,
}

#[derive(Debug, Serialize)]
struct HealthComponents {
    http: &'static str,
    azure_openai: &'static str,
    bot_framework: &'static str,
}

#[derive(Debug, Serialize)]
struct RateLimitStatus {
    in_window: usize,
    per_minute: usize,
}

#[derive(Debug, Serialize)]
struct HealthResponse {
    status: &'static str,
    service: &'static str,
    version: &'static str,
    components: HealthComponents,
    active_conversations: usize,
    rate_limit: RateLimitStatus,
}

// ============================================================================
// Health Routes
// ============================================================================

async fn health(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let healthy = state.model_configured && state.bot_configured;
    let status_code = if healthy {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    let limiter = state.chat.limiter();
    let body = HealthResponse {
        status: if healthy { "healthy" } else { "degraded" },
        service: "teambot",
        version: env!("CARGO_PKG_VERSION"),
        components: HealthComponents {
            http: "ok",
            azure_openai: if state.model_configured { "ok" } else { "not_configured" },
            bot_framework: if state.bot_configured { "ok" } else { "not_configured" },
        },
        active_conversations: state.chat.store().conversation_count(),
        rate_limit: RateLimitStatus {
            in_window: limiter.in_window().await,
            per_minute: limiter.max_calls(),
        },
    };

    (status_code, Json(body))
}

// ============================================================================
// Chat API
// ============================================================================

/// Conversation id for REST callers that do not send one.
fn default_conversation_id(remote: Option<SocketAddr>) -> String {
    match remote {
        Some(addr) => format!("api-{}", addr.ip()).replace(['.', ':'], "-"),
        None => "api-unknown".to_string(),
    }
}

async fn chat(
    State(state): State<Arc<AppState>>,
    connect_info: Option<ConnectInfo<SocketAddr>>,
    headers: HeaderMap,
    payload: Result<Json<ChatRequest>, JsonRejection>,
) -> Result<Json<ChatResponse>, ApiError> {
    let Json(request) = payload?;

    let raw = request.message.unwrap_or_default();
    let message = raw.trim();
    if message.is_empty() {
        return Err(ApiError::BadRequest("Message is required".into()));
    }
    if message.chars().count() > MAX_MESSAGE_CHARS {
        return Err(ApiError::BadRequest(format!(
            "Message exceeds {MAX_MESSAGE_CHARS} characters"
        )));
    }

    let conversation_id = request
        .conversation_id
        .unwrap_or_else(|| default_conversation_id(connect_info.map(|ConnectInfo(addr)| addr)));
    if !validate_conversation_id(&conversation_id) {
        return Err(teambot_common::Error::InvalidInput(format!(
            "conversation_id must be 1-100 characters of letters, digits, '-' or '_': {conversation_id:?}"
        ))
        .into());
    }

    let user_name = request
        .user_name
        .filter(|name| !name.trim().is_empty())
        .unwrap_or_else(|| DEFAULT_API_USER.to_string());

    let mut turn = ChatTurn::new(conversation_id.clone(), message)
        .user_name(user_name)
        .trace_id(trace_id_from_headers(&headers));
    if let Some(system_message) = request.system_message.filter(|s| !s.trim().is_empty()) {
        turn = turn.system_message(system_message);
    }

    let response = state.chat.get_response(turn).await;

    Ok(Json(ChatResponse {
        response,
        conversation_id,
    }))
}

async fn clear_conversation(
    State(state): State<Arc<AppState>>,
    Path(conversation_id): Path<String>,
) -> impl IntoResponse {
    state.chat.clear_conversation(&conversation_id).await;
    Json(ClearResponse {
        status: "cleared",
        conversation_id,
    })
}

async fn conversation_summary(
    State(state): State<Arc<AppState>>,
    Path(conversation_id): Path<String>,
) -> Json<ConversationSummary> {
    Json(state.chat.conversation_summary(&conversation_id))
}

// ============================================================================
// Bot Framework
// ============================================================================

async fn bot_messages(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<Activity>, JsonRejection>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let Json(activity) = payload?;

    tracing::debug!(
        activity_type = ?activity.activity_type,
        conversation_id = activity.conversation_id().unwrap_or("-"),
        "Received Bot Framework activity"
    );

    state
        .bot
        .on_turn(&activity, state.sender.as_ref())
        .await
        .map_err(|e| ApiError::Internal(format!("Failed to process activity: {e}")))?;

    Ok(Json(serde_json::json!({ "status": "ok" })))
}

async fn not_found() -> impl IntoResponse {
    (
        StatusCode::NOT_FOUND,
        Json(ErrorResponse {
            error: "Not found".into(),
        }),
    )
}

// ============================================================================
// Router Builder
// ============================================================================

/// Build the HTTP router.
pub fn build_router(state: Arc<AppState>) -> Router {
    Router::new()
        // Health
        .route("/health", get(health))
        // Chat API
        .route("/api/chat", post(chat))
        .route("/api/conversation/:id/clear", post(clear_conversation))
        .route("/api/conversation/:id/summary", get(conversation_summary))
        // Bot Framework
        .route("/api/messages", post(bot_messages))
        .fallback(not_found)
        .with_state(state)
}
