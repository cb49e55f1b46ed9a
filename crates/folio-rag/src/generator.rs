//! Answer generation over retrieved context.
//!
//! The prompt pins the model to the retrieved chunks and pushes it to cite
//! project names, so answers stay attributable to the portfolio rather than
//! the model's own training data.

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use folio_core::types::ChunkMetadata;

use crate::error::{RagError, Result};

/// Returned whenever retrieval produced nothing to ground an answer on.
pub const FALLBACK_ANSWER: &str =
    "I don't have information about that in my project database.";

pub const DEFAULT_CHAT_MODEL: &str = "gpt-4o-mini";
pub const DEFAULT_MAX_TOKENS: u32 = 800;
pub const DEFAULT_TEMPERATURE: f32 = 0.2;

/// Produces a grounded answer from a query and its retrieved chunks.
///
/// A trait seam so the HTTP layer and tests can run against doubles
/// instead of a live chat backend.
#[async_trait]
pub trait AnswerGenerator: Send + Sync {
    /// Generate an answer to `query` grounded in `chunks`.
    ///
    /// `metadata` must line up with `chunks` index by index to be used;
    /// when it is absent or mismatched the context falls back to a plain
    /// numbered listing. Empty `chunks` short-circuits to
    /// [`FALLBACK_ANSWER`] without any backend call.
    async fn generate(
        &self,
        query: &str,
        chunks: &[String],
        metadata: Option<&[ChunkMetadata]>,
    ) -> Result<String>;
}

/// Render retrieved chunks into the context block of the prompt.
///
/// With aligned metadata each chunk carries its project name and chunk
/// type, which is what lets the model answer "which projects ..."
/// questions by name.
pub fn build_context(chunks: &[String], metadata: Option<&[ChunkMetadata]>) -> String {
    match metadata {
        Some(meta) if meta.len() == chunks.len() => chunks
            .iter()
            .zip(meta.iter())
            .enumerate()
            .map(|(i, (chunk, m))| {
                format!(
                    "[Document {}]\nProject: {}\nType: {}\nContent: {}",
                    i + 1,
                    m.project_name,
                    m.chunk_type,
                    chunk
                )
            })
            .collect::<Vec<_>>()
            .join("\n\n---\n\n"),
        _ => chunks
            .iter()
            .enumerate()
            .map(|(i, chunk)| format!("Document {}:\n{}", i + 1, chunk))
            .collect::<Vec<_>>()
            .join("\n---\n"),
    }
}

/// Assemble the full prompt sent as a single user message.
pub fn build_prompt(query: &str, context: &str) -> String {
    format!(
        "You are a knowledgeable assistant helping answer questions about a software engineer's project portfolio.\n\
         \n\
         CRITICAL INSTRUCTIONS:\n\
         - Answer using ONLY the information in the context below\n\
         - ALWAYS mention specific project names when answering (e.g., \"MealMakeApp\", \"StyleCast\")\n\
         - For \"which projects\" questions, list ALL relevant project names clearly\n\
         - Be specific and structured in your responses\n\
         - If the context doesn't fully answer the question, say what you know and what's missing\n\
         - DO NOT invent or infer information not in the context\n\
         \n\
         CONTEXT:\n\
         {context}\n\
         \n\
         QUESTION: {query}\n\
         \n\
         ANSWER (remember to use specific project names):"
    )
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    max_tokens: u32,
    temperature: f32,
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatChoiceMessage,
}

#[derive(Deserialize)]
struct ChatChoiceMessage {
    content: Option<String>,
}

/// Chat-completions client for OpenAI-compatible endpoints.
pub struct OpenAiGenerator {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
    model: String,
    max_tokens: u32,
    temperature: f32,
}

impl OpenAiGenerator {
    pub fn new(base_url: &str, api_key: &str, model: &str, timeout: Duration) -> Result<Self> {
        if api_key.trim().is_empty() {
            return Err(RagError::Config(
                "chat completions require an API key".to_string(),
            ));
        }
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| RagError::Config(format!("failed to build HTTP client: {e}")))?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: api_key.to_string(),
            model: model.to_string(),
            max_tokens: DEFAULT_MAX_TOKENS,
            temperature: DEFAULT_TEMPERATURE,
        })
    }

    /// Override the sampling limits, e.g. from `openai.max_tokens` and
    /// `openai.temperature` config keys.
    pub fn with_limits(mut self, max_tokens: u32, temperature: f32) -> Self {
        self.max_tokens = max_tokens;
        self.temperature = temperature;
        self
    }

    pub fn model_name(&self) -> &str {
        &self.model
    }
}

#[async_trait]
impl AnswerGenerator for OpenAiGenerator {
    async fn generate(
        &self,
        query: &str,
        chunks: &[String],
        metadata: Option<&[ChunkMetadata]>,
    ) -> Result<String> {
        if chunks.is_empty() {
            return Ok(FALLBACK_ANSWER.to_string());
        }

        let context = build_context(chunks, metadata);
        let prompt = build_prompt(query, &context);
        let request = ChatRequest {
            model: &self.model,
            messages: vec![ChatMessage {
                role: "user",
                content: &prompt,
            }],
            max_tokens: self.max_tokens,
            temperature: self.temperature,
        };

        tracing::debug!(model = %self.model, chunks = chunks.len(), "requesting completion");
        let response = self
            .client
            .post(format!("{}/chat/completions", self.base_url))
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .await
            .map_err(|e| RagError::Generation(format!("chat request failed: {e}")))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(RagError::Generation(format!(
                "chat API returned {status}: {body}"
            )));
        }

        let parsed: ChatResponse = response
            .json()
            .await
            .map_err(|e| RagError::Generation(format!("malformed chat response: {e}")))?;
        completion_text(parsed)
    }
}

/// Pull the answer out of a chat response. A missing, empty, or
/// whitespace-only completion is a generation failure, never an answer.
fn completion_text(response: ChatResponse) -> Result<String> {
    let answer = response
        .choices
        .into_iter()
        .next()
        .and_then(|choice| choice.message.content)
        .unwrap_or_default();
    let answer = answer.trim();
    if answer.is_empty() {
        return Err(RagError::Generation(
            "chat API returned an empty completion".to_string(),
        ));
    }
    Ok(answer.to_string())
}
