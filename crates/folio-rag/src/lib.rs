//! Retrieve-then-generate pipeline for portfolio questions.
//!
//! Ties the document store and an answer generator together behind one
//! entry point, [`QueryPipeline::answer`].

pub mod error;
pub mod generator;
pub mod pipeline;

pub use error::{RagError, Result};
pub use generator::{AnswerGenerator, OpenAiGenerator, FALLBACK_ANSWER};
pub use pipeline::{QueryAnswer, QueryPipeline, SourceInfo, DEFAULT_TOP_K};
