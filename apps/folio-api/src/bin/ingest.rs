use std::{env, fs, path::PathBuf};

use indicatif::{ProgressBar, ProgressStyle};
use tracing_subscriber::EnvFilter;

use folio_core::catalog;
use folio_core::config::{self, Config};
use folio_embed::{provider_from_settings, EmbedSettings, EmbeddingProvider};
use folio_store::DocumentStore;

const EMBED_BATCH: usize = 32;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .init();

    let config = Config::load().map_err(|e| {
        eprintln!("Error loading config: {}", e);
        e
    })?;

    let args: Vec<String> = env::args().skip(1).collect();
    let mut fresh = false;
    let mut catalog_path = None;
    for arg in &args {
        match arg.as_str() {
            "--fresh" | "-f" => fresh = true,
            "--help" | "-h" => {
                println!("Usage: folio-ingest [catalog.json] [--fresh]");
                println!("  --fresh  wipe the index directory before ingesting");
                return Ok(());
            }
            _ if !arg.starts_with('-') => catalog_path = Some(PathBuf::from(arg)),
            other => {
                eprintln!("Error: unknown flag {}", other);
                std::process::exit(1);
            }
        }
    }
    let catalog_path = catalog_path.unwrap_or_else(|| {
        let path: String = config
            .get("store.catalog_path")
            .unwrap_or_else(|_| "data/projects.json".to_string());
        config::expand_path(path)
    });

    println!("Portfolio Catalog Ingest\n========================");
    println!("Catalog: {}", catalog_path.display());

    // Parse and validate the whole catalog before touching the store.
    let projects = catalog::load_catalog(&catalog_path)?;
    let records = catalog::to_chunk_records(&projects);
    println!(
        "Loaded {} projects ({} chunks) from {}",
        projects.len(),
        records.len(),
        catalog_path.display()
    );

    let index_dir: String = config
        .get("store.index_dir")
        .unwrap_or_else(|_| "data/index".to_string());
    let index_dir = config::expand_path(&index_dir);
    if fresh && index_dir.exists() {
        println!("⚠️  Removing existing index at {} (--fresh)", index_dir.display());
        fs::remove_dir_all(&index_dir)?;
    }
    fs::create_dir_all(&index_dir)?;

    let settings = EmbedSettings::from_config(&config);
    let provider = provider_from_settings(&settings)?;
    println!("Embedding with: {}", provider.model_name());
    let store = DocumentStore::open(&index_dir, provider).await?;

    let pb = ProgressBar::new(records.len() as u64);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} chunks ({percent}%) {msg}")
            .unwrap()
            .progress_chars("#>-"),
    );
    let mut written = 0usize;
    for batch in records.chunks(EMBED_BATCH) {
        match store.add_chunks(batch).await {
            Ok(count) => written += count,
            Err(e) => {
                pb.abandon_with_message("❌ ingestion halted");
                eprintln!(
                    "Error: ingestion halted after {} of {} chunks: {}",
                    written,
                    records.len(),
                    e
                );
                std::process::exit(1);
            }
        }
        pb.inc(batch.len() as u64);
    }
    pb.finish_with_message("✅ Ingestion completed!");

    for project in &projects {
        println!(
            "  ➡️ {} ({}): {} chunks",
            project.name,
            project.id,
            project.chunks.len()
        );
    }
    println!(
        "\n📊 Upserted {} chunks; store now holds {}",
        written,
        store.count().await?
    );
    println!("💡 To ask a question, use: cargo run --bin folio-ask '<query>'");
    Ok(())
}
