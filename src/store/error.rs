//! Page store errors

use thiserror::Error;

use crate::pdf::RenderError;

/// Errors raised by the page store
#[derive(Debug, Error)]
pub enum StoreError {
    /// An uploaded file could not be ingested as a PDF. The whole batch is
    /// rejected so a cache id always describes a fully consistent set.
    #[error("Invalid document '{name}': {reason}")]
    InvalidDocument { name: String, reason: String },

    /// Upload batch contained no files
    #[error("Upload batch is empty")]
    EmptyBatch,

    /// Unknown or expired cache id, or unknown document id
    #[error("Not found: {0}")]
    NotFound(String),

    /// Page index outside the document
    #[error("Page index {index} out of range (document has {count} pages)")]
    OutOfRange { index: usize, count: usize },

    /// Document-level rendering failure during ingestion
    #[error("Render error: {0}")]
    Render(#[from] RenderError),
}
