//! HTTP surface for the portfolio question answering service.
//!
//! Handlers are thin adapters over the injected pipeline and store; all
//! domain behavior lives in the library crates.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use tower_http::cors::{Any, CorsLayer};

use folio_rag::{QueryAnswer, QueryPipeline, RagError};
use folio_store::{DocumentStore, StoreError};

/// Shared per-process state handed to every request handler.
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<DocumentStore>,
    pub pipeline: Arc<QueryPipeline>,
    /// When set, project-listing failures report degraded health and an
    /// empty mapping instead of a 500.
    pub lenient_listing: bool,
}

#[derive(Debug, Deserialize)]
pub struct QueryRequest {
    pub query: String,
    pub top_k: Option<usize>,
}

#[derive(Debug, Serialize)]
struct HealthResponse {
    status: &'static str,
    total_documents: usize,
    available_projects: BTreeMap<String, String>,
}

#[derive(Debug, Serialize)]
struct ProjectsResponse {
    projects: BTreeMap<String, String>,
}

/// Pipeline failure carried out of a handler. Caller mistakes keep their
/// message as a 400; everything else is logged and redacted to a generic
/// 500 so store and backend internals never leak to clients.
pub struct ApiError(RagError);

impl From<RagError> for ApiError {
    fn from(err: RagError) -> Self {
        Self(err)
    }
}

impl From<StoreError> for ApiError {
    fn from(err: StoreError) -> Self {
        Self(RagError::Retrieval(err))
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        match self.0 {
            RagError::InvalidInput(message) => (
                StatusCode::BAD_REQUEST,
                Json(serde_json::json!({ "error": message })),
            )
                .into_response(),
            err => {
                tracing::error!(error = %err, "request failed");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    Json(serde_json::json!({ "error": "internal error" })),
                )
                    .into_response()
            }
        }
    }
}

/// Build the application router with permissive CORS on every route.
pub fn build_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any)
        .max_age(Duration::from_secs(3600));

    Router::new()
        .route("/", get(root_info))
        .route("/api/query", post(query))
        .route("/api/health", get(health))
        .route("/api/projects", get(projects))
        .layer(cors)
        .with_state(state)
}

async fn root_info() -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "message": "Project Portfolio RAG API",
        "health": "/api/health",
        "query": "/api/query",
        "projects": "/api/projects",
    }))
}

async fn query(
    State(state): State<AppState>,
    Json(request): Json<QueryRequest>,
) -> Result<Json<QueryAnswer>, ApiError> {
    let answer = state.pipeline.answer(&request.query, request.top_k).await?;
    Ok(Json(answer))
}

async fn health(State(state): State<AppState>) -> Result<Json<HealthResponse>, ApiError> {
    match listing(&state.store).await {
        Ok((total_documents, available_projects)) => Ok(Json(HealthResponse {
            status: "healthy",
            total_documents,
            available_projects,
        })),
        Err(err) if state.lenient_listing => {
            tracing::warn!(error = %err, "project listing failed, reporting degraded health");
            Ok(Json(HealthResponse {
                status: "degraded",
                total_documents: 0,
                available_projects: BTreeMap::new(),
            }))
        }
        Err(err) => Err(err.into()),
    }
}

async fn projects(State(state): State<AppState>) -> Result<Json<ProjectsResponse>, ApiError> {
    match state.store.list_all_projects().await {
        Ok(projects) => Ok(Json(ProjectsResponse { projects })),
        Err(err) if state.lenient_listing => {
            tracing::warn!(error = %err, "project listing failed, returning empty mapping");
            Ok(Json(ProjectsResponse {
                projects: BTreeMap::new(),
            }))
        }
        Err(err) => Err(err.into()),
    }
}

async fn listing(store: &DocumentStore) -> Result<(usize, BTreeMap<String, String>), StoreError> {
    let total = store.count().await?;
    let projects = store.list_all_projects().await?;
    Ok((total, projects))
}
