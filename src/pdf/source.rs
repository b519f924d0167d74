//! Validated PDF source handle
//!
//! MuPDF document handles are not safely shareable across threads, so this
//! wrapper keeps only the raw bytes and opens a fresh `mupdf::Document` for
//! each operation. Opening is cheap relative to rendering, and independent
//! operations (one page each) can then run in parallel without locking.

use std::sync::Arc;

use super::renderer::RenderError;

const PDF_MIME: &str = "application/pdf";

/// Shareable, validated handle over raw PDF bytes
///
/// Construction fails unless the bytes carry a PDF magic header, MuPDF can
/// open them, and the document has at least one page. The page count is
/// cached at construction and never changes.
#[derive(Clone, Debug)]
pub struct PdfSource {
    data: Arc<Vec<u8>>,
    page_count: usize,
}

impl PdfSource {
    /// Validate raw bytes as an openable, non-empty PDF.
    pub fn from_bytes(data: Vec<u8>) -> Result<Self, RenderError> {
        if !data.starts_with(b"%PDF") {
            return Err(RenderError::NotAPdf);
        }

        let doc = mupdf::Document::from_bytes(&data, PDF_MIME)
            .map_err(|e| RenderError::Open(e.to_string()))?;
        let page_count = doc
            .page_count()
            .map_err(|e| RenderError::Open(e.to_string()))? as usize;

        if page_count == 0 {
            return Err(RenderError::EmptyDocument);
        }

        Ok(Self {
            data: Arc::new(data),
            page_count,
        })
    }

    /// Number of pages, cached at validation time.
    pub fn page_count(&self) -> usize {
        self.page_count
    }

    /// The raw bytes backing this source.
    pub fn bytes(&self) -> Arc<Vec<u8>> {
        Arc::clone(&self.data)
    }

    /// Open a fresh document instance for a single operation.
    ///
    /// Each caller gets its own `Document`; nothing is shared, so callers
    /// on different threads never contend.
    pub fn open(&self) -> Result<mupdf::Document, RenderError> {
        mupdf::Document::from_bytes(&self.data, PDF_MIME)
            .map_err(|e| RenderError::Open(e.to_string()))
    }
}
