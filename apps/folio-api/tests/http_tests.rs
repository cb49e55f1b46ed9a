use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;
use axum::body::Body;
use axum::http::{header, Method, Request, StatusCode};
use http_body_util::BodyExt;
use tempfile::TempDir;
use tower::ServiceExt;

use folio_api::{build_router, AppState};
use folio_core::types::{ChunkMetadata, ChunkRecord};
use folio_embed::FakeEmbedder;
use folio_rag::{AnswerGenerator, QueryPipeline, FALLBACK_ANSWER};
use folio_store::DocumentStore;

/// Answers by echoing the project names it was shown.
struct EchoGenerator;

#[async_trait]
impl AnswerGenerator for EchoGenerator {
    async fn generate(
        &self,
        _query: &str,
        _chunks: &[String],
        metadata: Option<&[ChunkMetadata]>,
    ) -> folio_rag::Result<String> {
        let names: Vec<String> = metadata
            .unwrap_or_default()
            .iter()
            .map(|m| m.project_name.clone())
            .collect();
        Ok(format!("Grounded in: {}", names.join(", ")))
    }
}

fn record(project_id: &str, project_name: &str, index: usize, text: &str) -> ChunkRecord {
    ChunkRecord {
        metadata: ChunkMetadata {
            doc_id: format!("{project_id}_{index}"),
            project_id: project_id.to_string(),
            project_name: project_name.to_string(),
            chunk_type: "Overview".to_string(),
        },
        text: text.to_string(),
    }
}

async fn state_over(dir: &TempDir, records: &[ChunkRecord]) -> Result<AppState> {
    let provider = Arc::new(FakeEmbedder::new(32));
    let store = Arc::new(DocumentStore::open(dir.path(), provider).await?);
    if !records.is_empty() {
        store.add_chunks(records).await?;
    }
    let pipeline = Arc::new(QueryPipeline::new(store.clone(), Arc::new(EchoGenerator), 2));
    Ok(AppState {
        store,
        pipeline,
        lenient_listing: false,
    })
}

fn post_query(body: &str) -> Request<Body> {
    Request::builder()
        .method(Method::POST)
        .uri("/api/query")
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

async fn json_body(response: axum::response::Response) -> Result<serde_json::Value> {
    let bytes = response.into_body().collect().await?.to_bytes();
    Ok(serde_json::from_slice(&bytes)?)
}

#[tokio::test]
async fn blank_query_is_a_400_with_the_validation_message() -> Result<()> {
    let dir = TempDir::new()?;
    let router = build_router(state_over(&dir, &[]).await?);

    let response = router.oneshot(post_query(r#"{"query": "   "}"#)).await?;

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = json_body(response).await?;
    assert!(body["error"].as_str().unwrap().contains("empty"));
    Ok(())
}

#[tokio::test]
async fn zero_top_k_is_a_400() -> Result<()> {
    let dir = TempDir::new()?;
    let router = build_router(state_over(&dir, &[]).await?);

    let response = router
        .oneshot(post_query(r#"{"query": "anything", "top_k": 0}"#))
        .await?;

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    Ok(())
}

#[tokio::test]
async fn query_on_an_empty_store_returns_the_fallback() -> Result<()> {
    let dir = TempDir::new()?;
    let router = build_router(state_over(&dir, &[]).await?);

    let response = router
        .oneshot(post_query(r#"{"query": "What is in the portfolio?"}"#))
        .await?;

    assert_eq!(response.status(), StatusCode::OK);
    let body = json_body(response).await?;
    assert_eq!(body["answer"], FALLBACK_ANSWER);
    assert_eq!(body["sources"].as_array().unwrap().len(), 0);
    assert_eq!(body["projects_searched"].as_array().unwrap().len(), 0);
    Ok(())
}

#[tokio::test]
async fn query_returns_answer_sources_and_project_attribution() -> Result<()> {
    let dir = TempDir::new()?;
    let records = [
        record("ml", "Forecaster", 0, "machine learning demand forecasting"),
        record("web", "Storefront", 0, "storefront checkout flow"),
    ];
    let router = build_router(state_over(&dir, &records).await?);

    let response = router
        .oneshot(post_query(
            r#"{"query": "Which projects use machine learning?", "top_k": 1}"#,
        ))
        .await?;

    assert_eq!(response.status(), StatusCode::OK);
    let body = json_body(response).await?;
    assert_eq!(body["answer"], "Grounded in: Forecaster");
    assert_eq!(body["projects_searched"], serde_json::json!(["Forecaster"]));
    let sources = body["sources"].as_array().unwrap();
    assert_eq!(sources.len(), 1);
    assert_eq!(sources[0]["project_id"], "ml");
    assert_eq!(sources[0]["chunk_type"], "Overview");
    assert!(sources[0]["relevance_score"].as_f64().unwrap() > 0.0);
    assert_eq!(sources[0]["content"], "machine learning demand forecasting");
    Ok(())
}

#[tokio::test]
async fn health_reports_count_and_available_projects() -> Result<()> {
    let dir = TempDir::new()?;
    let records = [
        record("p1", "Alpha", 0, "alpha overview"),
        record("p1", "Alpha", 1, "alpha details"),
        record("p2", "Beta", 0, "beta overview"),
    ];
    let router = build_router(state_over(&dir, &records).await?);

    let response = router
        .oneshot(Request::builder().uri("/api/health").body(Body::empty())?)
        .await?;

    assert_eq!(response.status(), StatusCode::OK);
    let body = json_body(response).await?;
    assert_eq!(body["status"], "healthy");
    assert_eq!(body["total_documents"], 3);
    assert_eq!(
        body["available_projects"],
        serde_json::json!({"p1": "Alpha", "p2": "Beta"})
    );
    Ok(())
}

#[tokio::test]
async fn projects_endpoint_lists_the_ingested_projects() -> Result<()> {
    let dir = TempDir::new()?;
    let records = [record("p1", "Alpha", 0, "alpha overview")];
    let router = build_router(state_over(&dir, &records).await?);

    let response = router
        .oneshot(Request::builder().uri("/api/projects").body(Body::empty())?)
        .await?;

    assert_eq!(response.status(), StatusCode::OK);
    let body = json_body(response).await?;
    assert_eq!(body["projects"], serde_json::json!({"p1": "Alpha"}));
    Ok(())
}

#[tokio::test]
async fn root_describes_the_service() -> Result<()> {
    let dir = TempDir::new()?;
    let router = build_router(state_over(&dir, &[]).await?);

    let response = router
        .oneshot(Request::builder().uri("/").body(Body::empty())?)
        .await?;

    assert_eq!(response.status(), StatusCode::OK);
    let body = json_body(response).await?;
    assert_eq!(body["message"], "Project Portfolio RAG API");
    assert_eq!(body["health"], "/api/health");
    Ok(())
}

#[tokio::test]
async fn broken_store_is_a_redacted_500_unless_listing_is_lenient() -> Result<()> {
    let dir = TempDir::new()?;
    let mut state = state_over(&dir, &[record("p1", "Alpha", 0, "alpha overview")]).await?;
    // pull the index out from under the open store
    std::fs::remove_dir_all(dir.path())?;

    let strict = build_router(state.clone());
    let response = strict
        .oneshot(Request::builder().uri("/api/health").body(Body::empty())?)
        .await?;
    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    let body = json_body(response).await?;
    assert_eq!(body["error"], "internal error");

    state.lenient_listing = true;
    let lenient = build_router(state);
    let response = lenient
        .oneshot(Request::builder().uri("/api/health").body(Body::empty())?)
        .await?;
    assert_eq!(response.status(), StatusCode::OK);
    let body = json_body(response).await?;
    assert_eq!(body["status"], "degraded");
    assert_eq!(body["available_projects"], serde_json::json!({}));
    Ok(())
}

#[tokio::test]
async fn preflight_allows_any_origin_and_caches_for_an_hour() -> Result<()> {
    let dir = TempDir::new()?;
    let router = build_router(state_over(&dir, &[]).await?);

    let response = router
        .oneshot(
            Request::builder()
                .method(Method::OPTIONS)
                .uri("/api/query")
                .header(header::ORIGIN, "https://example.com")
                .header(header::ACCESS_CONTROL_REQUEST_METHOD, "POST")
                .body(Body::empty())?,
        )
        .await?;

    assert_eq!(response.status(), StatusCode::OK);
    let headers = response.headers();
    assert_eq!(headers[header::ACCESS_CONTROL_ALLOW_ORIGIN], "*");
    assert_eq!(headers[header::ACCESS_CONTROL_MAX_AGE], "3600");
    Ok(())
}
