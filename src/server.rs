//! HTTP service over the ingestion pipeline.
//!
//! # Endpoints
//!
//! | Method | Path | Description |
//! |--------|------|-------------|
//! | `POST` | `/entities` | Submit a startup; enriched from the upstream, then merged |
//! | `GET`  | `/entities?skip=&limit=` | Page through stored startups by id |
//! | `GET`  | `/entities/{id}` | One stored startup |
//! | `GET`  | `/health` | Health check (returns version) |
//!
//! `POST /entities` answers with a single object when exactly one entity
//! resulted and with an array otherwise. A failed enrichment is not an
//! error: the submitted fields are stored on their own.
//!
//! # Error Contract
//!
//! ```json
//! { "error": { "code": "bad_request", "message": "name must not be empty" } }
//! ```
//!
//! Error codes: `bad_request` (400), `not_found` (404), `internal` (500).
//!
//! # CORS
//!
//! Only the origins in `[server].cors_origins` are allowed; the single
//! entry `"*"` allows any origin.

use anyhow::Context;
use axum::{
    extract::{
        rejection::{JsonRejection, PathRejection, QueryRejection},
        Path, Query, State,
    },
    http::{HeaderValue, Method, StatusCode},
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tracing::{error, info};

use crate::config::{Config, ServerConfig};
use crate::db;
use crate::fetch::{CompletionClient, Fetcher};
use crate::merge::MergeEngine;
use crate::migrate;
use crate::models::{NewStartup, Startup};
use crate::pipeline::{Enriched, Pipeline};
use crate::store::{SqliteStore, Store};

/// Shared application state passed to all route handlers via Axum's `State` extractor.
#[derive(Clone)]
pub struct AppState {
    pipeline: Arc<Pipeline>,
    store: Arc<dyn Store>,
    /// Default page size for `GET /entities`.
    page_limit: i64,
}

impl AppState {
    pub fn new(pipeline: Arc<Pipeline>, store: Arc<dyn Store>, page_limit: i64) -> Self {
        Self {
            pipeline,
            store,
            page_limit,
        }
    }
}

/// Starts the HTTP server.
///
/// Opens the database (creating the schema if needed), builds the fetch
/// client and binds to `[server].bind`. Runs until the process is
/// terminated.
///
/// # Errors
///
/// Fails before binding when the upstream credential is missing, the
/// database cannot be opened, or a CORS origin is not a valid header value.
pub async fn run_server(config: &Config) -> anyhow::Result<()> {
    let fetcher: Arc<dyn Fetcher> = Arc::new(CompletionClient::new(&config.upstream)?);

    let pool = db::connect(config).await?;
    migrate::migrate_pool(&pool).await?;
    let store: Arc<dyn Store> = Arc::new(SqliteStore::new(pool));
    let engine = Arc::new(MergeEngine::new(store.clone(), config.merge.identity));
    let pipeline = Arc::new(Pipeline::new(fetcher, engine));

    let state = AppState::new(pipeline, store, config.server.page_limit);
    let app = router(state, &config.server)?;

    let listener = tokio::net::TcpListener::bind(&config.server.bind)
        .await
        .with_context(|| format!("failed to bind {}", config.server.bind))?;
    info!(bind = %config.server.bind, "server listening");
    println!("radar listening on http://{}", config.server.bind);

    axum::serve(listener, app).await?;
    Ok(())
}

/// Builds the application router with CORS applied.
pub fn router(state: AppState, server: &ServerConfig) -> anyhow::Result<Router> {
    let cors = CorsLayer::new()
        .allow_origin(allowed_origins(&server.cors_origins)?)
        .allow_methods([Method::GET, Method::POST])
        .allow_headers(Any);

    Ok(Router::new()
        .route("/entities", get(handle_list).post(handle_create))
        .route("/entities/{id}", get(handle_get))
        .route("/health", get(handle_health))
        .layer(cors)
        .with_state(state))
}

fn allowed_origins(origins: &[String]) -> anyhow::Result<AllowOrigin> {
    if origins.iter().any(|o| o == "*") {
        return Ok(AllowOrigin::any());
    }
    let values = origins
        .iter()
        .map(|o| {
            HeaderValue::from_str(o).with_context(|| format!("invalid CORS origin: {}", o))
        })
        .collect::<anyhow::Result<Vec<_>>>()?;
    Ok(AllowOrigin::list(values))
}

// ============ Error response ============

#[derive(Serialize)]
struct ErrorBody {
    error: ErrorDetail,
}

#[derive(Serialize)]
struct ErrorDetail {
    /// Machine-readable error code (e.g., `"bad_request"`, `"not_found"`).
    code: String,
    message: String,
}

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

fn bad_request(message: impl Into<String>) -> AppError {
    AppError {
        status: StatusCode::BAD_REQUEST,
        code: "bad_request".to_string(),
        message: message.into(),
    }
}

fn not_found(message: impl Into<String>) -> AppError {
    AppError {
        status: StatusCode::NOT_FOUND,
        code: "not_found".to_string(),
        message: message.into(),
    }
}

/// Constructs a 500 error. The cause is logged; the client sees only
/// `message`.
fn internal(message: impl Into<String>, cause: &dyn std::fmt::Display) -> AppError {
    let message = message.into();
    error!(error = %cause, "{}", message);
    AppError {
        status: StatusCode::INTERNAL_SERVER_ERROR,
        code: "internal".to_string(),
        message,
    }
}

// ============ GET /health ============

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

// ============ POST /entities ============

async fn handle_create(
    State(state): State<AppState>,
    body: Result<Json<NewStartup>, JsonRejection>,
) -> Result<Json<Enriched>, AppError> {
    let Json(submission) = body.map_err(|e| bad_request(e.body_text()))?;
    let record = submission
        .into_record()
        .ok_or_else(|| bad_request("name must not be empty"))?;

    let enriched = state
        .pipeline
        .enrich(&record)
        .await
        .map_err(|e| internal(format!("failed to store startup '{}'", e.name), &e))?;
    Ok(Json(enriched))
}

// ============ GET /entities ============

#[derive(Debug, Deserialize)]
struct PageParams {
    skip: Option<i64>,
    limit: Option<i64>,
}

async fn handle_list(
    State(state): State<AppState>,
    params: Result<Query<PageParams>, QueryRejection>,
) -> Result<Json<Vec<Startup>>, AppError> {
    let Query(params) = params.map_err(|e| bad_request(e.body_text()))?;
    let skip = params.skip.unwrap_or(0);
    let limit = params.limit.unwrap_or(state.page_limit);
    if skip < 0 || limit < 0 {
        return Err(bad_request("skip and limit must not be negative"));
    }

    let page = state
        .store
        .list(skip, limit)
        .await
        .map_err(|e| internal("failed to list startups", &e))?;
    Ok(Json(page))
}

// ============ GET /entities/{id} ============

async fn handle_get(
    State(state): State<AppState>,
    id: Result<Path<i64>, PathRejection>,
) -> Result<Json<Startup>, AppError> {
    let Path(id) = id.map_err(|e| bad_request(e.body_text()))?;
    state
        .store
        .get(id)
        .await
        .map_err(|e| internal("failed to read startup", &e))?
        .map(Json)
        .ok_or_else(|| not_found(format!("startup {} not found", id)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_allowed_origins() {
        assert!(allowed_origins(&["http://localhost:3000".to_string()]).is_ok());
        assert!(allowed_origins(&["*".to_string()]).is_ok());
        assert!(allowed_origins(&["bad\norigin".to_string()]).is_err());
    }

    #[test]
    fn test_error_body_shape() {
        let body = ErrorBody {
            error: ErrorDetail {
                code: "not_found".to_string(),
                message: "startup 9 not found".to_string(),
            },
        };
        let json = serde_json::to_value(&body).unwrap();
        assert_eq!(json["error"]["code"], "not_found");
        assert_eq!(json["error"]["message"], "startup 9 not found");
    }
}
