//! PDF handling
//!
//! - `source`: validated, shareable handle over raw PDF bytes (MuPDF-backed)
//! - `renderer`: page rasterization and text extraction at ingestion time

pub mod renderer;
pub mod source;

pub use renderer::{PageRenderer, RenderError};
pub use source::PdfSource;
