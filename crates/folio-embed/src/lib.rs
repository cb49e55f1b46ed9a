//! Embedding providers for the portfolio index.
//!
//! `OpenAiEmbedder` calls an OpenAI-compatible `/embeddings` endpoint with a
//! bearer credential. `FakeEmbedder` produces deterministic token-hash
//! vectors so ingestion and search run offline, selected through the
//! `APP_USE_FAKE_EMBEDDINGS` toggle.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use folio_core::config::Config;

pub const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";
pub const DEFAULT_EMBED_MODEL: &str = "text-embedding-3-large";
pub const DEFAULT_EMBED_DIM: usize = 3072;
pub const DEFAULT_TIMEOUT_SECS: u64 = 30;

#[derive(Debug, Error)]
pub enum EmbedError {
    #[error("missing API key: set OPENAI_API_KEY (or openai.api_key) before starting")]
    MissingApiKey,

    #[error("embedding request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("embedding API error {status}: {message}")]
    Api { status: u16, message: String },

    #[error("embedding response malformed: {0}")]
    Malformed(String),
}

pub type Result<T> = std::result::Result<T, EmbedError>;

/// Maps text to fixed-length vectors.
///
/// Implementations are shared behind an `Arc` across concurrent requests and
/// must not hold per-call state.
#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    async fn embed(&self, text: &str) -> Result<Vec<f32>>;
    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>>;
    fn dimensions(&self) -> usize;
    fn model_name(&self) -> &str;
}

/// Connection settings for the remote provider, read from the `[openai]`
/// config table with the usual defaults.
#[derive(Debug, Clone)]
pub struct EmbedSettings {
    pub base_url: String,
    pub api_key: Option<String>,
    pub model: String,
    pub dimensions: usize,
    pub timeout: Duration,
}

impl EmbedSettings {
    pub fn from_config(config: &Config) -> Self {
        let api_key = std::env::var("OPENAI_API_KEY")
            .ok()
            .or_else(|| config.get::<String>("openai.api_key").ok())
            .filter(|k| !k.trim().is_empty());
        Self {
            base_url: config
                .get("openai.base_url")
                .unwrap_or_else(|_| DEFAULT_BASE_URL.to_string()),
            api_key,
            model: config
                .get("openai.embed_model")
                .unwrap_or_else(|_| DEFAULT_EMBED_MODEL.to_string()),
            dimensions: config.get("openai.embed_dim").unwrap_or(DEFAULT_EMBED_DIM),
            timeout: Duration::from_secs(
                config.get("openai.timeout_secs").unwrap_or(DEFAULT_TIMEOUT_SECS),
            ),
        }
    }
}

#[derive(Serialize)]
struct EmbeddingRequest<'a> {
    model: &'a str,
    input: &'a [String],
}

#[derive(Deserialize)]
struct EmbeddingResponse {
    data: Vec<EmbeddingData>,
}

#[derive(Deserialize)]
struct EmbeddingData {
    embedding: Vec<f32>,
}

/// Remote embedder speaking the OpenAI embeddings wire shape
/// (`POST {base_url}/embeddings`, bearer auth).
pub struct OpenAiEmbedder {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
    model: String,
    dims: usize,
}

impl OpenAiEmbedder {
    pub fn new(
        base_url: &str,
        api_key: &str,
        model: &str,
        dims: usize,
        timeout: Duration,
    ) -> Result<Self> {
        if api_key.trim().is_empty() {
            return Err(EmbedError::MissingApiKey);
        }
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: api_key.to_string(),
            model: model.to_string(),
            dims,
        })
    }
}

#[async_trait]
impl EmbeddingProvider for OpenAiEmbedder {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let mut vectors = self.embed_batch(&[text.to_string()]).await?;
        vectors
            .pop()
            .ok_or_else(|| EmbedError::Malformed("empty embedding response".to_string()))
    }

    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }
        let url = format!("{}/embeddings", self.base_url);
        let request = EmbeddingRequest { model: &self.model, input: texts };
        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .await?;
        if !response.status().is_success() {
            let status = response.status().as_u16();
            let message = response.text().await.unwrap_or_default();
            return Err(EmbedError::Api { status, message });
        }
        let parsed: EmbeddingResponse = response.json().await?;
        if parsed.data.len() != texts.len() {
            return Err(EmbedError::Malformed(format!(
                "expected {} embeddings, got {}",
                texts.len(),
                parsed.data.len()
            )));
        }
        for data in &parsed.data {
            if data.embedding.len() != self.dims {
                return Err(EmbedError::Malformed(format!(
                    "expected {}-dim vectors, got {}",
                    self.dims,
                    data.embedding.len()
                )));
            }
        }
        Ok(parsed.data.into_iter().map(|d| d.embedding).collect())
    }

    fn dimensions(&self) -> usize {
        self.dims
    }

    fn model_name(&self) -> &str {
        &self.model
    }
}

/// Deterministic embedder for offline runs and tests.
///
/// Each token (lowercased, stripped of surrounding punctuation) is hashed
/// into a bucket and the vector is L2-normalized. Texts sharing tokens get
/// correlated vectors, which is enough for ranking assertions without a
/// network or credential.
pub struct FakeEmbedder {
    dims: usize,
}

impl FakeEmbedder {
    pub fn new(dims: usize) -> Self {
        Self { dims }
    }

    fn embed_sync(&self, text: &str) -> Vec<f32> {
        use std::hash::{Hash, Hasher};
        use twox_hash::XxHash64;
        let mut v = vec![0f32; self.dims];
        for token in text.split_whitespace() {
            let token: String = token
                .trim_matches(|c: char| !c.is_alphanumeric())
                .to_lowercase();
            if token.is_empty() {
                continue;
            }
            let mut hasher = XxHash64::with_seed(0);
            token.hash(&mut hasher);
            let h = hasher.finish();
            let idx = (h as usize) % self.dims;
            v[idx] += (((h >> 32) as u32) as f32) / (u32::MAX as f32) + 0.1;
        }
        let norm = (v.iter().map(|x| x * x).sum::<f32>()).sqrt().max(1e-6);
        for x in &mut v {
            *x /= norm;
        }
        v
    }
}

#[async_trait]
impl EmbeddingProvider for FakeEmbedder {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        Ok(self.embed_sync(text))
    }

    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        Ok(texts.iter().map(|t| self.embed_sync(t)).collect())
    }

    fn dimensions(&self) -> usize {
        self.dims
    }

    fn model_name(&self) -> &str {
        "fake-hash"
    }
}

pub fn use_fake_embeddings() -> bool {
    std::env::var("APP_USE_FAKE_EMBEDDINGS")
        .ok()
        .map(|v| v == "1" || v.eq_ignore_ascii_case("true"))
        .unwrap_or(false)
}

/// Build the provider the rest of the service runs on. The fake embedder
/// wins when `APP_USE_FAKE_EMBEDDINGS` is set; otherwise the remote
/// provider is built and a missing credential is a hard error.
pub fn provider_from_settings(settings: &EmbedSettings) -> Result<Arc<dyn EmbeddingProvider>> {
    if use_fake_embeddings() {
        tracing::info!(dims = settings.dimensions, "using fake embeddings");
        return Ok(Arc::new(FakeEmbedder::new(settings.dimensions)));
    }
    let api_key = settings.api_key.as_deref().ok_or(EmbedError::MissingApiKey)?;
    let embedder = OpenAiEmbedder::new(
        &settings.base_url,
        api_key,
        &settings.model,
        settings.dimensions,
        settings.timeout,
    )?;
    Ok(Arc::new(embedder))
}
