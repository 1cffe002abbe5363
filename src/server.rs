//! HTTP server.
//!
//! # Endpoints
//!
//! | Method | Path | Description |
//! |--------|------|-------------|
//! | `GET`  | `/health` | Health check (returns version) |
//! | `GET`  | `/stats` | Message / session / project counts |
//! | `POST` | `/search` | `{"query": "..."}` → `{"result": "<answer>"}` |
//! | `POST` | `/ingest` | Ingest the archive → `{"files", "messages", "failed"}` |
//! | `GET`  | `/sessions/{id}` | All messages of a session, oldest first |
//!
//! # Error Contract
//!
//! ```json
//! { "error": { "code": "bad_request", "message": "query must not be empty" } }
//! ```
//!
//! Error codes: `bad_request` (400), `not_found` (404), `internal` (500).
//!
//! # CORS
//!
//! All origins, methods, and headers are permitted.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::Mutex;
use tower_http::cors::{Any, CorsLayer};

use transcript_recall_core::models::{CorpusStats, IngestTotals};
use transcript_recall_core::store::MessageStore;

use crate::services::Services;
use crate::session::SessionResponse;
use crate::{ingest, search, session};

/// Shared application state passed to all route handlers.
#[derive(Clone)]
pub struct AppState {
    services: Arc<Services>,
    /// Serializes ingestion passes; cursors are single-writer.
    ingest_lock: Arc<Mutex<()>>,
}

impl AppState {
    pub fn new(services: Arc<Services>) -> Self {
        Self {
            services,
            ingest_lock: Arc::new(Mutex::new(())),
        }
    }
}

/// Build the router with all routes and CORS.
pub fn router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/health", get(handle_health))
        .route("/stats", get(handle_stats))
        .route("/search", post(handle_search))
        .route("/ingest", post(handle_ingest))
        .route("/sessions/{id}", get(handle_session))
        .layer(cors)
        .with_state(state)
}

/// Run an initial ingestion pass, then serve until Ctrl-C.
///
/// The database has already been migrated by [`Services::open`]. The pool
/// is closed after the listener stops.
pub async fn run_server(services: Arc<Services>) -> anyhow::Result<()> {
    let bind_addr = services.config.server.bind.clone();
    let state = AppState::new(services.clone());

    {
        let _guard = state.ingest_lock.lock().await;
        tracing::info!("running initial ingest");
        if let Err(e) = ingest::ingest_archive(&services).await {
            tracing::warn!(error = %e, "initial ingest failed");
        }
    }

    let app = router(state);
    let listener = tokio::net::TcpListener::bind(&bind_addr).await?;
    tracing::info!(addr = %bind_addr, "listening");
    println!("Transcript Recall listening on http://{}", bind_addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            tracing::info!("shutting down");
        })
        .await?;

    services.close().await;
    Ok(())
}

// ============ Error response ============

#[derive(Serialize)]
struct ErrorBody {
    error: ErrorDetail,
}

#[derive(Serialize)]
struct ErrorDetail {
    code: String,
    message: String,
}

/// Internal error type that converts into an Axum HTTP response.
struct AppError {
    status: StatusCode,
    code: &'static str,
    message: String,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let body = ErrorBody {
            error: ErrorDetail {
                code: self.code.to_string(),
                message: self.message,
            },
        };
        (self.status, Json(body)).into_response()
    }
}

fn bad_request(message: impl Into<String>) -> AppError {
    AppError {
        status: StatusCode::BAD_REQUEST,
        code: "bad_request",
        message: message.into(),
    }
}

fn not_found(message: impl Into<String>) -> AppError {
    AppError {
        status: StatusCode::NOT_FOUND,
        code: "not_found",
        message: message.into(),
    }
}

fn internal(err: anyhow::Error) -> AppError {
    tracing::error!(error = %err, "request failed");
    AppError {
        status: StatusCode::INTERNAL_SERVER_ERROR,
        code: "internal",
        message: err.to_string(),
    }
}

// ============ Handlers ============

#[derive(Serialize)]
struct HealthResponse {
    status: String,
    version: String,
}

async fn handle_health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

async fn handle_stats(State(state): State<AppState>) -> Result<Json<CorpusStats>, AppError> {
    let stats = state.services.store.stats().await.map_err(internal)?;
    Ok(Json(stats))
}

#[derive(Deserialize)]
struct SearchRequest {
    query: String,
}

#[derive(Serialize)]
struct SearchResponse {
    result: String,
}

async fn handle_search(
    State(state): State<AppState>,
    Json(req): Json<SearchRequest>,
) -> Result<Json<SearchResponse>, AppError> {
    if req.query.trim().is_empty() {
        return Err(bad_request("query must not be empty"));
    }
    let result = search::answer(&state.services, &req.query)
        .await
        .map_err(internal)?;
    Ok(Json(SearchResponse { result }))
}

async fn handle_ingest(State(state): State<AppState>) -> Result<Json<IngestTotals>, AppError> {
    let _guard = state.ingest_lock.lock().await;
    let totals = ingest::ingest_archive(&state.services)
        .await
        .map_err(internal)?;
    Ok(Json(totals))
}

async fn handle_session(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<SessionResponse>, AppError> {
    match session::get_session(&state.services, &id).await {
        Ok(session) => Ok(Json(session)),
        Err(e) if e.to_string().contains("not found") => Err(not_found(e.to_string())),
        Err(e) => Err(internal(e)),
    }
}
