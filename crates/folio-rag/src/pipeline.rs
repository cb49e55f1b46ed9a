//! Query orchestration: validate, retrieve once, generate, assemble.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tokio::sync::Semaphore;

use folio_core::types::ScoredChunk;
use folio_store::DocumentStore;

use crate::error::{RagError, Result};
use crate::generator::{AnswerGenerator, FALLBACK_ANSWER};

/// How many chunks to retrieve when the caller does not say.
pub const DEFAULT_TOP_K: usize = 3;

/// One retrieved chunk cited as support for the answer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceInfo {
    pub project_id: String,
    pub project_name: String,
    pub chunk_type: String,
    pub relevance_score: f64,
    pub content: String,
}

/// The caller-facing result of one answered query.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueryAnswer {
    pub answer: String,
    pub sources: Vec<SourceInfo>,
    pub projects_searched: Vec<String>,
}

/// Inverse-distance relevance, rounded to two decimals. A zero distance
/// maps to the sentinel 100. Not a probability, and only comparable
/// between sources of the same query.
pub fn relevance_score(distance: f32) -> f64 {
    if distance > 0.0 {
        (100.0 / f64::from(distance)).round() / 100.0
    } else {
        100.0
    }
}

/// Answers queries end to end over an ingested document store.
///
/// Every collaborator is injected, so tests can swap the generator for a
/// double while running against a real store. One instance is shared
/// across requests; `max_concurrent_generations` bounds in-flight chat
/// calls without limiting retrieval.
pub struct QueryPipeline {
    store: Arc<DocumentStore>,
    generator: Arc<dyn AnswerGenerator>,
    generation_permits: Semaphore,
}

impl QueryPipeline {
    pub fn new(
        store: Arc<DocumentStore>,
        generator: Arc<dyn AnswerGenerator>,
        max_concurrent_generations: usize,
    ) -> Self {
        Self {
            store,
            generator,
            generation_permits: Semaphore::new(max_concurrent_generations.max(1)),
        }
    }

    /// Answer one query, retrieving `top_k` chunks (default 3).
    ///
    /// Blank queries and a zero `top_k` are rejected before any work
    /// happens. When nothing is retrieved the canned fallback goes out
    /// with empty sources and no chat call is made.
    pub async fn answer(&self, raw_query: &str, top_k: Option<usize>) -> Result<QueryAnswer> {
        let query = raw_query.trim();
        if query.is_empty() {
            return Err(RagError::InvalidInput("query must not be empty".to_string()));
        }
        let top_k = top_k.unwrap_or(DEFAULT_TOP_K);
        if top_k == 0 {
            return Err(RagError::InvalidInput("top_k must be at least 1".to_string()));
        }

        // One retrieval pass feeds the prompt, the cited sources, and the
        // project attribution alike.
        let hits = self.store.query(query, top_k).await?;
        tracing::debug!(query, hits = hits.len(), "retrieval complete");
        if hits.is_empty() {
            return Ok(QueryAnswer {
                answer: FALLBACK_ANSWER.to_string(),
                sources: Vec::new(),
                projects_searched: Vec::new(),
            });
        }

        let chunks: Vec<String> = hits.iter().map(|hit| hit.text.clone()).collect();
        let metadata: Vec<_> = hits.iter().map(|hit| hit.metadata.clone()).collect();

        let answer = {
            let _permit = self
                .generation_permits
                .acquire()
                .await
                .map_err(|_| RagError::Generation("generation pool closed".to_string()))?;
            self.generator.generate(query, &chunks, Some(&metadata)).await?
        };

        Ok(assemble(answer, &hits))
    }
}

/// Shape the retrieval hits plus the generated answer into the response.
/// Projects keep first-occurrence order, deduplicated by name.
fn assemble(answer: String, hits: &[ScoredChunk]) -> QueryAnswer {
    let mut projects_searched: Vec<String> = Vec::new();
    for hit in hits {
        if !projects_searched.contains(&hit.metadata.project_name) {
            projects_searched.push(hit.metadata.project_name.clone());
        }
    }
    let sources = hits
        .iter()
        .map(|hit| SourceInfo {
            project_id: hit.metadata.project_id.clone(),
            project_name: hit.metadata.project_name.clone(),
            chunk_type: hit.metadata.chunk_type.clone(),
            relevance_score: relevance_score(hit.distance),
            content: hit.text.clone(),
        })
        .collect();
    QueryAnswer {
        answer,
        sources,
        projects_searched,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn relevance_uses_inverse_distance_rounded_to_two_decimals() {
        assert_eq!(relevance_score(0.5), 2.0);
        assert_eq!(relevance_score(2.0), 0.5);
        assert_eq!(relevance_score(3.0), 0.33);
    }

    #[test]
    fn relevance_of_exact_match_is_the_sentinel() {
        assert_eq!(relevance_score(0.0), 100.0);
    }
}
