use thiserror::Error;

/// Failures of the query pipeline, split by which stage refused.
///
/// `Config` only surfaces while wiring the pipeline up, before any request
/// is served. `InvalidInput` is the caller's fault; the rest are ours.
#[derive(Error, Debug)]
pub enum RagError {
    #[error("configuration error: {0}")]
    Config(String),

    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("retrieval failed: {0}")]
    Retrieval(#[from] folio_store::StoreError),

    #[error("generation failed: {0}")]
    Generation(String),
}

pub type Result<T> = std::result::Result<T, RagError>;
