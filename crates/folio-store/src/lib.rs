//! LanceDB-backed document store for portfolio chunks.
//!
//! One table, one row per chunk: text, typed provenance metadata, an
//! ingestion timestamp, and a fixed-size vector column whose dimension is
//! taken from the embedding provider.

pub mod error;
pub mod schema;
pub mod store;

pub use error::{Result, StoreError};
pub use schema::CHUNK_TABLE;
pub use store::DocumentStore;
