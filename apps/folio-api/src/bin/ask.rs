use std::env;
use std::sync::Arc;

use tracing_subscriber::EnvFilter;

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
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .init();

    let args: Vec<String> = env::args().collect();
    if args.len() < 2 {
        eprintln!("Usage: {} <query> [--top-k N]", args[0]);
        eprintln!("Example: {} 'Which projects use machine learning?' --top-k 5", args[0]);
        std::process::exit(1);
    }
    let query_text = &args[1];
    let mut top_k = None;
    let mut i = 2;
    while i < args.len() {
        match args[i].as_str() {
            "--top-k" => {
                if let Some(n) = args.get(i + 1).and_then(|v| v.parse::<usize>().ok()) {
                    top_k = Some(n);
                    i += 1;
                } else {
                    eprintln!("Error: --top-k requires a number");
                    std::process::exit(1);
                }
            }
            _ => {}
        }
        i += 1;
    }

    let config = Config::load().map_err(|e| {
        eprintln!("Error loading config: {}", e);
        e
    })?;
    let settings = EmbedSettings::from_config(&config);
    let provider = provider_from_settings(&settings)?;

    let index_dir: String = config
        .get("store.index_dir")
        .unwrap_or_else(|_| "data/index".to_string());
    let store = Arc::new(DocumentStore::open(&config::expand_path(&index_dir), provider).await?);

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
    let pipeline = QueryPipeline::new(store.clone(), generator, 1);

    println!("🔍 folio-ask\n============");
    println!("Query: {}", query_text);

    println!("\n📂 Available projects:");
    for (id, name) in store.list_all_projects().await? {
        println!("  - {} ({})", name, id);
    }

    let result = pipeline.answer(query_text, top_k).await?;

    if !result.projects_searched.is_empty() {
        println!("\n📚 Found information in: {}", result.projects_searched.join(", "));
    }
    for (i, source) in result.sources.iter().enumerate() {
        let preview: String = source.content.chars().take(100).collect();
        println!(
            "\n  [{}] {} - {} (relevance {:.2})",
            i + 1,
            source.project_name,
            source.chunk_type,
            source.relevance_score
        );
        println!("      📝 {}...", preview);
    }

    println!("\n🤖 Answer: {}\n", result.answer);
    Ok(())
}
