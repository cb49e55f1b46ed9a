use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("LanceDB error: {0}")]
    Lance(String),

    #[error("Arrow error: {0}")]
    Arrow(#[from] arrow_schema::ArrowError),

    #[error("embedding failed: {0}")]
    Embed(#[from] folio_embed::EmbedError),

    #[error("stored row missing required column '{0}'")]
    MissingColumn(&'static str),
}

impl From<lancedb::Error> for StoreError {
    fn from(e: lancedb::Error) -> Self {
        StoreError::Lance(e.to_string())
    }
}

pub type Result<T> = std::result::Result<T, StoreError>;
