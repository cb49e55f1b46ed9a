//! Domain types shared by the store, pipeline, and binaries.

use serde::{Deserialize, Serialize};

pub type DocId = String;

/// Chunk type assigned when the catalog does not specify one.
pub const DEFAULT_CHUNK_TYPE: &str = "General";

/// Provenance metadata carried by every stored chunk.
///
/// - `doc_id`: globally unique chunk identifier, `{project_id}_{index}`
/// - `project_id`: stable identifier of the owning project
/// - `project_name`: human-readable display name of the project
/// - `chunk_type`: free-form category ("Overview", "Tech Stack", ...)
///
/// Every field is required; a stored row missing one of them is treated
/// as corrupt when read back.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChunkMetadata {
    pub doc_id: DocId,
    pub project_id: String,
    pub project_name: String,
    pub chunk_type: String,
}

/// A unit of project text headed for (or stored in) the index.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChunkRecord {
    pub metadata: ChunkMetadata,
    pub text: String,
}

/// A chunk returned by a nearest-neighbor query.
///
/// `distance` is the store's raw distance (lower is more similar).
/// Results are always ordered ascending by it.
#[derive(Debug, Clone)]
pub struct ScoredChunk {
    pub metadata: ChunkMetadata,
    pub text: String,
    pub distance: f32,
}
