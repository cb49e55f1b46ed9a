use std::sync::Arc;

use tracing_subscriber::EnvFilter;

use folio_api::{build_router, AppState};
use folio_core::config::{self, Config};
use folio_embed::{provider_from_settings, EmbedSettings};
use folio_rag::{
    generator::{DEFAULT_CHAT_MODEL, DEFAULT_MAX_TOKENS, DEFAULT_TEMPERATURE},
    OpenAiGenerator, QueryPipeline,
};
use folio_store::DocumentStore;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let config = Config::load().map_err(|e| {
        eprintln!("Error loading config: {}", e);
        e
    })?;

    let settings = EmbedSettings::from_config(&config);
    let provider = provider_from_settings(&settings)?;

    let index_dir: String = config
        .get("store.index_dir")
        .unwrap_or_else(|_| "data/index".to_string());
    let index_dir = config::expand_path(&index_dir);
    let store = Arc::new(DocumentStore::open(&index_dir, provider).await?);

    let api_key = settings
        .api_key
        .clone()
        .ok_or_else(|| anyhow::anyhow!("OPENAI_API_KEY is not set (config key openai.api_key)"))?;
    let chat_model: String = config
        .get("openai.chat_model")
        .unwrap_or_else(|_| DEFAULT_CHAT_MODEL.to_string());
    let max_tokens: u32 = config.get("openai.max_tokens").unwrap_or(DEFAULT_MAX_TOKENS);
    let temperature: f32 = config.get("openai.temperature").unwrap_or(DEFAULT_TEMPERATURE);
    let generator = Arc::new(
        OpenAiGenerator::new(&settings.base_url, &api_key, &chat_model, settings.timeout)?
            .with_limits(max_tokens, temperature),
    );

    let max_generations: usize = config.get("api.max_concurrent_generations").unwrap_or(4);
    let pipeline = Arc::new(QueryPipeline::new(store.clone(), generator, max_generations));

    let lenient_listing: bool = config.get("api.lenient_listing").unwrap_or(false);
    let state = AppState {
        store,
        pipeline,
        lenient_listing,
    };

    let bind: String = config
        .get("api.bind")
        .unwrap_or_else(|_| "0.0.0.0:8000".to_string());
    let listener = tokio::net::TcpListener::bind(&bind).await?;
    tracing::info!(addr = %bind, index = %index_dir.display(), "serving portfolio API");
    axum::serve(listener, build_router(state)).await?;
    Ok(())
}
