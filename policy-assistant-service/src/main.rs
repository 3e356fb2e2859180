mod config;
mod gateway;
mod intent;
mod orchestrator;
mod replies;
mod steps;

use axum::{
    Router,
    extract::{Path, State},
    http::{HeaderValue, Request, StatusCode},
    middleware::{Next, from_fn},
    response::Json,
    routing::{get, post},
};
use dialog_flow::{InMemorySessionStorage, MessageRole, Session, SessionStorage};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{Instrument, error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use uuid::Uuid;

use crate::config::AppConfig;
use crate::gateway::model::GeminiGateway;
use crate::gateway::policy_api::HttpPolicyGateway;
use crate::orchestrator::Orchestrator;

#[derive(Clone)]
struct AppState {
    orchestrator: Arc<Orchestrator>,
    session_storage: Arc<dyn SessionStorage>,
}

#[derive(Debug, Deserialize)]
struct ChatRequest {
    session_id: Option<String>,
    message: String,
}

#[derive(Debug, Serialize)]
struct ChatResponse {
    session_id: String,
    /// Assistant messages produced by this turn, in order
    replies: Vec<String>,
    /// Whether the guided creation flow is awaiting the next step
    creating_policy: bool,
}

/// Initialize structured JSON tracing based on environment variables
fn init_tracing() {
    let log_format = std::env::var("LOG_FORMAT").unwrap_or_else(|_| "json".to_string());
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        "policy_assistant_service=debug,dialog_flow=debug,tower_http=debug".into()
    });

    match log_format.as_str() {
        "pretty" => {
            // Human-readable logging for development
            tracing_subscriber::registry()
                .with(env_filter)
                .with(tracing_subscriber::fmt::layer().pretty())
                .init();
        }
        _ => {
            // Structured JSON logging for production
            tracing_subscriber::registry()
                .with(env_filter)
                .with(
                    tracing_subscriber::fmt::layer()
                        .json()
                        .with_target(true)
                        .with_level(true),
                )
                .init();
        }
    }
}

/// Middleware to add correlation ID to all requests
async fn correlation_id_middleware(
    mut request: Request<axum::body::Body>,
    next: Next,
) -> axum::response::Response {
    let correlation_id = Uuid::new_v4().to_string();

    request.headers_mut().insert(
        "x-correlation-id",
        HeaderValue::from_str(&correlation_id).unwrap(),
    );

    let span = tracing::info_span!("http_request", correlation_id = %correlation_id);
    next.run(request).instrument(span).await
}

#[tokio::main]
async fn main() {
    init_tracing();

    let config = AppConfig::from_env();
    if config.gemini_api_key.is_none() {
        // not fatal: chat falls back to deterministic templated replies
        warn!("GEMINI_API_KEY not set; chat questions will get templated answers");
    }

    let policy_api = Arc::new(HttpPolicyGateway::new(
        config.policy_api_base.clone(),
        config.policy_api_token.clone(),
    ));
    let model = Arc::new(GeminiGateway::new(
        config.gemini_api_key.clone(),
        config.gemini_model.clone(),
    ));
    let orchestrator = Arc::new(Orchestrator::new(policy_api, model));
    let session_storage: Arc<dyn SessionStorage> = Arc::new(InMemorySessionStorage::new());

    let app_state = AppState {
        orchestrator,
        session_storage,
    };

    let app = Router::new()
        .route("/health", get(health_check))
        .route("/chat", post(chat))
        .route("/session/{id}", get(get_session))
        .layer(from_fn(correlation_id_middleware))
        .layer(TraceLayer::new_for_http())
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .with_state(app_state);

    let listener = tokio::net::TcpListener::bind(&config.bind_addr)
        .await
        .unwrap();

    info!("Server running on http://{}", config.bind_addr);

    axum::serve(listener, app).await.unwrap();
}

async fn health_check() -> &'static str {
    "OK"
}

/// One conversation turn. The send control stays disabled client-side while
/// this request is in flight, so turns arrive one at a time per session.
async fn chat(
    State(state): State<AppState>,
    Json(request): Json<ChatRequest>,
) -> Result<Json<ChatResponse>, StatusCode> {
    let session_id_provided = request.session_id.is_some();
    let session_id = request
        .session_id
        .unwrap_or_else(|| Uuid::new_v4().to_string());

    if session_id_provided && Uuid::parse_str(&session_id).is_err() {
        error!(session_id = %session_id, "Invalid session ID format");
        return Err(StatusCode::BAD_REQUEST);
    }

    let mut session = match state.session_storage.get(&session_id).await {
        Ok(Some(session)) => session,
        Ok(None) => {
            // a provided-but-unknown id is the caller's mistake, not ours
            if session_id_provided {
                error!(session_id = %session_id, "Session not found");
                return Err(StatusCode::NOT_FOUND);
            }
            info!(session_id = %session_id, "Creating new session");
            Session::new(session_id.clone())
        }
        Err(e) => {
            error!(session_id = %session_id, error = %e, "Failed to get session");
            return Err(StatusCode::INTERNAL_SERVER_ERROR);
        }
    };

    let turn_start = session.transcript.len();
    state
        .orchestrator
        .handle_turn(&mut session, &request.message)
        .await;

    let replies = session.transcript.messages()[turn_start..]
        .iter()
        .filter(|m| m.role == MessageRole::Assistant)
        .map(|m| m.text.clone())
        .collect();
    let creating_policy = session.state.is_creating();

    if let Err(e) = state.session_storage.save(session).await {
        error!(session_id = %session_id, error = %e, "Failed to save session");
        return Err(StatusCode::INTERNAL_SERVER_ERROR);
    }

    Ok(Json(ChatResponse {
        session_id,
        replies,
        creating_policy,
    }))
}

async fn get_session(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
) -> Result<Json<Session>, StatusCode> {
    match state.session_storage.get(&session_id).await {
        Ok(Some(session)) => Ok(Json(session)),
        Ok(None) => {
            info!(session_id = %session_id, "Session not found");
            Err(StatusCode::NOT_FOUND)
        }
        Err(e) => {
            error!(session_id = %session_id, error = %e, "Failed to get session");
            Err(StatusCode::INTERNAL_SERVER_ERROR)
        }
    }
}
