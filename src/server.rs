//! HTTP facade for the retrieval-augmented agent.
//!
//! Exposes the agent over a JSON API suitable for the bundled web UI and
//! other local clients. Conversation memory is keyed by a client-supplied
//! session id held in [`SessionStore`]; requests without one share the
//! `"default"` session.
//!
//! # Endpoints
//!
//! | Method   | Path       | Description |
//! |----------|------------|-------------|
//! | `GET`    | `/`        | Liveness banner |
//! | `GET`    | `/health`  | Readiness; 503 until the agent is initialized |
//! | `POST`   | `/chat`    | Ask a question within a session |
//! | `POST`   | `/search`  | Similarity search, no generation |
//! | `GET`    | `/stats`   | Vector index statistics |
//! | `GET`    | `/history` | Session conversation history |
//! | `DELETE` | `/history` | Clear a session's history |
//!
//! # Error Contract
//!
//! Handler failures serialize as:
//!
//! ```json
//! { "error": { "code": "bad_request", "message": "message must not be empty" } }
//! ```
//!
//! Error codes: `bad_request` (400), `agent_unavailable` (503),
//! `internal` (500). Upstream failures during `/chat` and `/search` are
//! NOT errors at this layer: `/chat` answers 200 with `error: true` and an
//! apology, `/search` answers 200 with an empty document list.
//!
//! # Startup
//!
//! The agent is constructed once at startup. If construction fails (missing
//! credentials, unreachable index) the server still binds and serves, with
//! `/health` reporting 503 and the delegating endpoints refusing requests,
//! so the failure is observable rather than a crash loop.

use axum::{
    extract::{Query, State},
    http::{header, HeaderValue, Method, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tracing::{error, warn};

use crate::agent::{apology, to_source_refs, RagAgent, SourceRef};
use crate::config::Config;
use crate::memory::{SessionStore, DEFAULT_SESSION};
use crate::models::ConversationTurn;
use crate::store::IndexStats;

/// Shared application state passed to all route handlers via Axum's
/// `State` extractor.
#[derive(Clone)]
struct AppState {
    /// The agent, absent when startup initialization failed.
    agent: Option<Arc<RagAgent>>,
    /// Per-session conversation memory.
    sessions: Arc<SessionStore>,
}

/// Starts the HTTP server with an agent built from `config`.
///
/// Binds to `[server].bind` and runs until the process is terminated.
/// Agent construction failure is logged and the server serves degraded
/// (see the module docs).
pub async fn run_server(config: &Config) -> anyhow::Result<()> {
    let agent = match RagAgent::from_config(config).await {
        Ok(agent) => Some(Arc::new(agent)),
        Err(e) => {
            error!("agent initialization failed, serving degraded: {e:#}");
            None
        }
    };
    run_server_with_agent(config, agent).await
}

/// Starts the HTTP server with a caller-supplied agent.
///
/// Like [`run_server`], but skips agent construction; tests inject agents
/// backed by trait doubles, or `None` to exercise the degraded paths.
pub async fn run_server_with_agent(
    config: &Config,
    agent: Option<Arc<RagAgent>>,
) -> anyhow::Result<()> {
    let bind_addr = config.server.bind.clone();

    let state = AppState {
        agent,
        sessions: Arc::new(SessionStore::new()),
    };

    let origins: Vec<HeaderValue> = config
        .server
        .allowed_origins
        .iter()
        .filter_map(|origin| origin.parse().ok())
        .collect();

    // Credentialed CORS rejects wildcards, so every list is explicit.
    let cors = CorsLayer::new()
        .allow_origin(origins)
        .allow_methods([Method::GET, Method::POST, Method::DELETE])
        .allow_headers([header::CONTENT_TYPE])
        .allow_credentials(true);

    let app = Router::new()
        .route("/", get(handle_root))
        .route("/health", get(handle_health))
        .route("/chat", post(handle_chat))
        .route("/search", post(handle_search))
        .route("/stats", get(handle_stats))
        .route("/history", get(handle_history).delete(handle_clear_history))
        .layer(cors)
        .with_state(state);

    println!("PM Copilot API listening on http://{}", bind_addr);

    let listener = tokio::net::TcpListener::bind(&bind_addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

// ============ Error response ============

/// JSON error response body.
#[derive(Serialize)]
struct ErrorBody {
    error: ErrorDetail,
}

/// Inner error detail with a machine-readable code and human-readable
/// message.
#[derive(Serialize)]
struct ErrorDetail {
    code: String,
    message: String,
}

/// Internal error type that converts into an Axum HTTP response.
struct AppError {
    status: StatusCode,
    code: String,
    message: String,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let body = ErrorBody {
            error: ErrorDetail {
                code: self.code,
                message: self.message,
            },
        };
        (self.status, Json(body)).into_response()
    }
}

/// Constructs a 400 Bad Request error.
fn bad_request(message: impl Into<String>) -> AppError {
    AppError {
        status: StatusCode::BAD_REQUEST,
        code: "bad_request".to_string(),
        message: message.into(),
    }
}

/// Constructs a 503 for requests that need the missing agent.
fn agent_unavailable() -> AppError {
    AppError {
        status: StatusCode::SERVICE_UNAVAILABLE,
        code: "agent_unavailable".to_string(),
        message: "agent is not initialized; check credentials and restart".to_string(),
    }
}

/// Constructs a 500 with the upstream message passed through.
fn internal(message: impl Into<String>) -> AppError {
    AppError {
        status: StatusCode::INTERNAL_SERVER_ERROR,
        code: "internal".to_string(),
        message: message.into(),
    }
}

/// The agent, or the 503 every delegating endpoint answers without one.
fn require_agent(state: &AppState) -> Result<Arc<RagAgent>, AppError> {
    state.agent.clone().ok_or_else(agent_unavailable)
}

/// Wall-clock time as float seconds, the timestamp format clients expect.
fn now_seconds() -> f64 {
    Utc::now().timestamp_millis() as f64 / 1000.0
}

// ============ GET / ============

/// JSON response body for `GET /`.
#[derive(Serialize)]
struct RootResponse {
    message: String,
    status: String,
}

/// Handler for `GET /`.
///
/// Liveness banner: answers as soon as the process is serving, regardless
/// of agent state.
async fn handle_root() -> Json<RootResponse> {
    Json(RootResponse {
        message: "PM Copilot API is running".to_string(),
        status: "healthy".to_string(),
    })
}

// ============ GET /health ============

/// JSON response body for `GET /health`.
#[derive(Serialize)]
struct HealthResponse {
    status: String,
    agent_initialized: bool,
}

/// Handler for `GET /health`.
///
/// Readiness: 200 once the agent is constructed, 503 while it is absent.
async fn handle_health(State(state): State<AppState>) -> (StatusCode, Json<HealthResponse>) {
    if state.agent.is_some() {
        (
            StatusCode::OK,
            Json(HealthResponse {
                status: "healthy".to_string(),
                agent_initialized: true,
            }),
        )
    } else {
        (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(HealthResponse {
                status: "unhealthy".to_string(),
                agent_initialized: false,
            }),
        )
    }
}

// ============ POST /chat ============

/// JSON request body for `POST /chat`.
#[derive(Deserialize)]
struct ChatRequest {
    message: String,
    #[serde(default = "default_include_sources")]
    include_sources: bool,
    session: Option<String>,
}

fn default_include_sources() -> bool {
    true
}

/// JSON response body for `POST /chat`.
#[derive(Serialize)]
struct ChatResponse {
    answer: String,
    question: String,
    timestamp: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    sources: Option<Vec<SourceRef>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<bool>,
}

/// Handler for `POST /chat`.
///
/// Runs the full ask flow under the request's session. Upstream failures
/// answer 200 with `error: true` and an apology so chat clients render a
/// message instead of breaking; the session's history is left untouched in
/// that case.
async fn handle_chat(
    State(state): State<AppState>,
    Json(req): Json<ChatRequest>,
) -> Result<Json<ChatResponse>, AppError> {
    let agent = require_agent(&state)?;
    if req.message.trim().is_empty() {
        return Err(bad_request("message must not be empty"));
    }

    let session_id = req.session.as_deref().unwrap_or(DEFAULT_SESSION);
    let session = state.sessions.session(session_id);
    let mut memory = session.lock().await;

    let response = match agent.ask(&mut memory, &req.message).await {
        Ok(reply) => ChatResponse {
            answer: reply.answer,
            question: req.message,
            timestamp: now_seconds(),
            sources: req.include_sources.then(|| to_source_refs(&reply.matches)),
            error: None,
        },
        Err(e) => {
            warn!(session = session_id, "chat request failed upstream: {e}");
            ChatResponse {
                answer: apology(&e),
                question: req.message,
                timestamp: now_seconds(),
                sources: req.include_sources.then(Vec::new),
                error: Some(true),
            }
        }
    };

    Ok(Json(response))
}

// ============ POST /search ============

/// JSON request body for `POST /search`.
#[derive(Deserialize)]
struct SearchRequest {
    query: String,
    #[serde(default = "default_search_k")]
    k: usize,
}

fn default_search_k() -> usize {
    5
}

/// JSON response body for `POST /search`.
#[derive(Serialize)]
struct SearchResponse {
    documents: Vec<SourceRef>,
    query: String,
}

/// Handler for `POST /search`.
///
/// Similarity search without generation or memory. Retrieval failure
/// yields an empty document list rather than an error status.
async fn handle_search(
    State(state): State<AppState>,
    Json(req): Json<SearchRequest>,
) -> Result<Json<SearchResponse>, AppError> {
    let agent = require_agent(&state)?;
    if req.query.trim().is_empty() {
        return Err(bad_request("query must not be empty"));
    }

    let documents = match agent.search_documents(&req.query, req.k).await {
        Ok(matches) => to_source_refs(&matches),
        Err(e) => {
            warn!("search request failed upstream: {e}");
            Vec::new()
        }
    };

    Ok(Json(SearchResponse {
        documents,
        query: req.query,
    }))
}

// ============ GET /stats ============

/// Handler for `GET /stats`.
///
/// Read-through index statistics; store failures surface as 500 with the
/// upstream message.
async fn handle_stats(State(state): State<AppState>) -> Result<Json<IndexStats>, AppError> {
    let agent = require_agent(&state)?;
    let stats = agent
        .get_index_stats()
        .await
        .map_err(|e| internal(e.to_string()))?;
    Ok(Json(stats))
}

// ============ GET & DELETE /history ============

/// Query string for the history endpoints.
#[derive(Deserialize)]
struct SessionQuery {
    session: Option<String>,
}

/// JSON response body for `GET /history`.
#[derive(Serialize)]
struct HistoryResponse {
    history: Vec<ConversationTurn>,
}

/// JSON response body for `DELETE /history`.
#[derive(Serialize)]
struct MessageResponse {
    message: String,
}

/// Handler for `GET /history`.
///
/// Sessions live in the facade, so history works even while the agent is
/// uninitialized.
async fn handle_history(
    State(state): State<AppState>,
    Query(q): Query<SessionQuery>,
) -> Json<HistoryResponse> {
    let session = state
        .sessions
        .session(q.session.as_deref().unwrap_or(DEFAULT_SESSION));
    let memory = session.lock().await;
    Json(HistoryResponse {
        history: memory.history().to_vec(),
    })
}

/// Handler for `DELETE /history`.
async fn handle_clear_history(
    State(state): State<AppState>,
    Query(q): Query<SessionQuery>,
) -> Json<MessageResponse> {
    let session = state
        .sessions
        .session(q.session.as_deref().unwrap_or(DEFAULT_SESSION));
    session.lock().await.clear();
    Json(MessageResponse {
        message: "Conversation history cleared successfully".to_string(),
    })
}
