//! Project catalog parsing and validation.
//!
//! The catalog is a JSON array of projects, each carrying an ordered list of
//! typed text chunks:
//! `[{"id": "p1", "name": "Foo", "chunks": [{"text": "...", "type": "Overview"}]}]`
//! The `type` field is optional and defaults to "General".

use std::collections::HashSet;
use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::types::{ChunkMetadata, ChunkRecord, DEFAULT_CHUNK_TYPE};

/// One text chunk of a catalog project.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CatalogChunk {
    pub text: String,
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub chunk_type: Option<String>,
}

/// One project entry: stable id, display name, ordered chunks.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CatalogProject {
    pub id: String,
    pub name: String,
    pub chunks: Vec<CatalogChunk>,
}

/// Read and validate a catalog file.
///
/// A missing, malformed, or rule-violating catalog fails here, before any
/// embedding or store write happens.
pub fn load_catalog(path: &Path) -> Result<Vec<CatalogProject>> {
    let raw = fs::read_to_string(path)?;
    let projects: Vec<CatalogProject> = serde_json::from_str(&raw)?;
    validate(&projects)?;
    Ok(projects)
}

/// Catalog rules: non-empty project ids and names, unique ids (one canonical
/// display name per project), non-empty chunk texts.
pub fn validate(projects: &[CatalogProject]) -> Result<()> {
    let mut seen = HashSet::new();
    for project in projects {
        if project.id.trim().is_empty() {
            return Err(Error::InvalidCatalog("project id must not be empty".to_string()));
        }
        if project.name.trim().is_empty() {
            return Err(Error::InvalidCatalog(format!(
                "project '{}' has an empty name",
                project.id
            )));
        }
        if !seen.insert(project.id.clone()) {
            return Err(Error::InvalidCatalog(format!(
                "duplicate project id '{}'",
                project.id
            )));
        }
        for (idx, chunk) in project.chunks.iter().enumerate() {
            if chunk.text.trim().is_empty() {
                return Err(Error::InvalidCatalog(format!(
                    "project '{}' chunk {} has empty text",
                    project.id, idx
                )));
            }
        }
    }
    Ok(())
}

/// Flatten catalog projects into chunk records, in catalog order.
/// Chunk ids are `{project_id}_{index}` with the index counted per project.
pub fn to_chunk_records(projects: &[CatalogProject]) -> Vec<ChunkRecord> {
    let mut records = Vec::new();
    for project in projects {
        for (idx, chunk) in project.chunks.iter().enumerate() {
            let chunk_type = chunk
                .chunk_type
                .clone()
                .unwrap_or_else(|| DEFAULT_CHUNK_TYPE.to_string());
            records.push(ChunkRecord {
                metadata: ChunkMetadata {
                    doc_id: format!("{}_{}", project.id, idx),
                    project_id: project.id.clone(),
                    project_name: project.name.clone(),
                    chunk_type,
                },
                text: chunk.text.clone(),
            });
        }
    }
    records
}
