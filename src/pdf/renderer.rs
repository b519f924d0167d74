//! Page rendering
//!
//! Converts each page of an uploaded PDF into a display image plus extracted
//! text, once, at ingestion time. Rendering is pure over (bytes, page index):
//! the same input always yields the same text and an equivalent image.
//!
//! A page whose raster or text extraction fails degrades to a placeholder
//! page instead of aborting the document; only a document MuPDF cannot open
//! at all fails ingestion. Pages with no extractable text keep their image
//! but get a warning marker in place of text so the downstream prompt states
//! the page is unreadable.

use std::io::Cursor;
use std::sync::Arc;

use image::DynamicImage;
use mupdf::{Colorspace, Matrix};
use thiserror::Error;
use tokio::sync::Semaphore;

use crate::store::types::{PageImage, RenderedPage};

use super::source::PdfSource;

/// Zoom applied when rasterizing pages (2x of the 72dpi page box).
const RENDER_SCALE: f32 = 2.0;

/// Rendering errors
#[derive(Debug, Error)]
pub enum RenderError {
    #[error("Not a PDF: missing %PDF header")]
    NotAPdf,

    #[error("Document has zero pages")]
    EmptyDocument,

    #[error("Failed to open document: {0}")]
    Open(String),

    #[error("Render worker failed: {0}")]
    Worker(String),

    #[error("Image encoding failed: {0}")]
    Encode(String),
}

/// Marker substituted for the text of a page with nothing extractable.
pub fn scanned_page_marker(page_number: usize) -> String {
    format!(
        "[WARNING: Page {page_number} contains no extractable text - it may be an image \
         or scanned document. The AI cannot read this page.]"
    )
}

/// Renders document pages on the blocking pool, bounded by a CPU-sized
/// semaphore so a large upload cannot monopolize the worker threads.
#[derive(Clone)]
pub struct PageRenderer {
    permits: Arc<Semaphore>,
}

impl PageRenderer {
    pub fn new() -> Self {
        let workers = std::thread::available_parallelism()
            .map(|n| n.get())
            .unwrap_or(2);
        Self {
            permits: Arc::new(Semaphore::new(workers)),
        }
    }

    /// Render every page of `source`, in page order.
    ///
    /// Page rendering is independent, so pages run in parallel up to the
    /// permit limit. Per-page failures degrade to placeholders; the only
    /// errors surfaced here are worker-level ones.
    pub async fn render_document(
        &self,
        source: &PdfSource,
        document_id: &str,
    ) -> Result<Vec<RenderedPage>, RenderError> {
        let mut tasks = Vec::with_capacity(source.page_count());

        for page_index in 0..source.page_count() {
            let permits = Arc::clone(&self.permits);
            let source = source.clone();
            let document_id = document_id.to_string();

            tasks.push(tokio::spawn(async move {
                let _permit = permits
                    .acquire_owned()
                    .await
                    .map_err(|e| RenderError::Worker(e.to_string()))?;
                tokio::task::spawn_blocking(move || {
                    Ok(render_page(&source, &document_id, page_index))
                })
                .await
                .map_err(|e| RenderError::Worker(e.to_string()))?
            }));
        }

        let rendered = futures::future::try_join_all(tasks)
            .await
            .map_err(|e| RenderError::Worker(e.to_string()))?;

        rendered.into_iter().collect()
    }
}

impl Default for PageRenderer {
    fn default() -> Self {
        Self::new()
    }
}

/// Render a single page, degrading to a placeholder on failure.
fn render_page(source: &PdfSource, document_id: &str, page_index: usize) -> RenderedPage {
    match try_render_page(source, page_index) {
        Ok((image, text)) => {
            let text = if text.trim().is_empty() {
                tracing::warn!(
                    document_id = %document_id,
                    page = page_index + 1,
                    "Page has no extractable text, marking as scanned"
                );
                scanned_page_marker(page_index + 1)
            } else {
                text
            };
            RenderedPage {
                document_id: document_id.to_string(),
                page_index,
                image,
                text,
            }
        }
        Err(e) => {
            tracing::warn!(
                document_id = %document_id,
                page = page_index + 1,
                error = %e,
                "Page failed to render, substituting placeholder"
            );
            RenderedPage {
                document_id: document_id.to_string(),
                page_index,
                image: placeholder_image(),
                text: scanned_page_marker(page_index + 1),
            }
        }
    }
}

fn try_render_page(source: &PdfSource, page_index: usize) -> Result<(PageImage, String), RenderError> {
    let doc = source.open()?;
    let page = doc
        .load_page(page_index as i32)
        .map_err(|e| RenderError::Open(e.to_string()))?;

    let text = page.to_text().unwrap_or_default();

    let matrix = Matrix::new_scale(RENDER_SCALE, RENDER_SCALE);
    let colorspace = Colorspace::device_rgb();
    let pixmap = page
        .to_pixmap(&matrix, &colorspace, true, true)
        .map_err(|e| RenderError::Open(e.to_string()))?;

    let image = encode_pixmap_png(&pixmap)?;
    Ok((image, text))
}

/// Encode a MuPDF pixmap as PNG.
fn encode_pixmap_png(pixmap: &mupdf::Pixmap) -> Result<PageImage, RenderError> {
    let width = pixmap.width() as u32;
    let height = pixmap.height() as u32;
    let samples = pixmap.samples();
    let n = pixmap.n() as usize;

    let mut rgba = Vec::with_capacity((width * height * 4) as usize);
    for y in 0..height as usize {
        for x in 0..width as usize {
            let offset = (y * width as usize + x) * n;
            let r = samples.get(offset).copied().unwrap_or(0);
            let g = samples.get(offset + 1).copied().unwrap_or(0);
            let b = samples.get(offset + 2).copied().unwrap_or(0);
            let a = if n >= 4 {
                samples.get(offset + 3).copied().unwrap_or(255)
            } else {
                255
            };
            rgba.extend_from_slice(&[r, g, b, a]);
        }
    }

    let img = image::RgbaImage::from_raw(width, height, rgba)
        .ok_or_else(|| RenderError::Encode("pixmap buffer size mismatch".to_string()))?;

    let mut data = Vec::new();
    DynamicImage::ImageRgba8(img)
        .write_to(&mut Cursor::new(&mut data), image::ImageFormat::Png)
        .map_err(|e| RenderError::Encode(e.to_string()))?;

    Ok(PageImage { data, width, height })
}

/// Tiny white PNG standing in for an unrenderable page.
fn placeholder_image() -> PageImage {
    let img = image::RgbaImage::from_pixel(1, 1, image::Rgba([255, 255, 255, 255]));
    let mut data = Vec::new();
    // Encoding a 1x1 RGBA image into a Vec cannot fail
    DynamicImage::ImageRgba8(img)
        .write_to(&mut Cursor::new(&mut data), image::ImageFormat::Png)
        .unwrap_or_default();
    PageImage {
        data,
        width: 1,
        height: 1,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn placeholder_is_a_png() {
        let image = placeholder_image();
        assert!(image.data.starts_with(&[0x89, b'P', b'N', b'G']));
        assert_eq!((image.width, image.height), (1, 1));
    }

    #[test]
    fn scanned_marker_names_the_page() {
        let marker = scanned_page_marker(4);
        assert!(marker.contains("Page 4"));
        assert!(marker.contains("no extractable text"));
    }
}
