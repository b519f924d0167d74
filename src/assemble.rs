//! Output document assembly
//!
//! Builds a fresh PDF from selected pages of cached source documents. Pages
//! are grafted object-by-object: each source's object graph is copied into
//! the destination with its IDs shifted past the destination's current
//! maximum, so references stay valid without rewriting content streams.
//!
//! Crops are applied by narrowing the grafted page's MediaBox and CropBox.
//! Fractional crops use a top-left origin while PDF boxes are bottom-left,
//! so the vertical axis flips exactly once, here.

use std::sync::Arc;

use lopdf::{Dictionary, Document, Object, ObjectId};
use thiserror::Error;

use crate::crop::{CropError, FractionalCrop};
use crate::store::{PageStore, StoreError};

/// How deep a Parent chain we are willing to walk looking for an inherited
/// MediaBox before declaring the file corrupt.
const MAX_PARENT_DEPTH: usize = 32;

#[derive(Debug, Error)]
pub enum AssembleError {
    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("No pages selected for assembly")]
    EmptySelection,

    #[error("Selection {position} cannot be resolved: {reason}")]
    SelectionResolution { position: usize, reason: String },

    #[error("Invalid crop rectangle: {0}")]
    Crop(#[from] CropError),

    #[error("Assembly failed: {0}")]
    Assembly(String),
}

/// One requested output page
#[derive(Debug, Clone)]
pub struct Selection {
    /// Document id or original filename within the cache entry
    pub source: String,
    /// 0-based page within the source document
    pub page_index: usize,
    /// Optional sub-rectangle to narrow the page to
    pub crop: Option<FractionalCrop>,
    /// Position in the output document; ties keep request order
    pub order: u32,
}

/// A selection pinned to concrete source bytes
struct ResolvedSelection {
    label: String,
    page_index: usize,
    crop: Option<FractionalCrop>,
    raw: Arc<Vec<u8>>,
}

pub struct PdfAssembler {
    store: PageStore,
}

impl PdfAssembler {
    pub fn new(store: PageStore) -> Self {
        Self { store }
    }

    /// Assemble the selected pages into a single new PDF.
    ///
    /// Every selection is resolved against the cache entry before any page
    /// is copied; the first unresolvable selection fails the whole request
    /// and no partial document is produced.
    pub async fn assemble(
        &self,
        cache_id: &str,
        selections: &[Selection],
    ) -> Result<Vec<u8>, AssembleError> {
        if selections.is_empty() {
            return Err(AssembleError::EmptySelection);
        }

        // Entry-level lookup failures surface as NotFound, not as a
        // selection problem.
        self.store.get(cache_id).await?;

        let mut ordered: Vec<(usize, &Selection)> = selections.iter().enumerate().collect();
        // sort_by_key is stable, so equal orders keep request order
        ordered.sort_by_key(|(_, s)| s.order);

        let mut resolved = Vec::with_capacity(ordered.len());
        for (position, selection) in ordered {
            if let Some(crop) = &selection.crop {
                crop.validate()?;
            }

            let (document, raw) = self
                .store
                .source_bytes(cache_id, &selection.source)
                .await
                .map_err(|e| match e {
                    StoreError::NotFound(what) => AssembleError::SelectionResolution {
                        position,
                        reason: format!("unknown {what}"),
                    },
                    other => AssembleError::Store(other),
                })?;

            if selection.page_index >= document.page_count {
                return Err(AssembleError::SelectionResolution {
                    position,
                    reason: format!(
                        "page index {} out of range for {} ({} pages)",
                        selection.page_index, document.original_name, document.page_count
                    ),
                });
            }

            resolved.push(ResolvedSelection {
                label: document.original_name,
                page_index: selection.page_index,
                crop: selection.crop,
                raw,
            });
        }

        let page_count = resolved.len();
        let output = tokio::task::spawn_blocking(move || build_output(resolved))
            .await
            .map_err(|e| AssembleError::Assembly(format!("Assembly worker failed: {e}")))??;

        tracing::info!(
            cache_id = %cache_id,
            pages = page_count,
            bytes = output.len(),
            "Assembled output document"
        );
        Ok(output)
    }
}

/// Graft each resolved page into a fresh destination document.
fn build_output(selections: Vec<ResolvedSelection>) -> Result<Vec<u8>, AssembleError> {
    let mut dest = Document::with_version("1.5");
    let pages_root_id = dest.new_object_id();
    let mut kids = Vec::with_capacity(selections.len());

    for selection in selections {
        let source = Document::load_mem(&selection.raw).map_err(|e| {
            AssembleError::Assembly(format!("Failed to reload {}: {e}", selection.label))
        })?;

        let page_ids: Vec<ObjectId> = source.get_pages().values().copied().collect();
        let &page_id = page_ids.get(selection.page_index).ok_or_else(|| {
            AssembleError::Assembly(format!(
                "{} exposes {} pages, selection wants index {}",
                selection.label,
                page_ids.len(),
                selection.page_index
            ))
        })?;

        // Resolve before the graft moves the object map; these attributes
        // may be inherited from an ancestor Pages node, and the page's new
        // Parent chain ends at a bare pages root.
        let media_box = resolve_media_box(&source, page_id)?;
        let resources = resolve_inherited(&source, page_id, b"Resources")?;
        let rotate = resolve_inherited(&source, page_id, b"Rotate")?;

        let id_offset = dest.max_id;
        let source_max_id = source.max_id;
        for (old_id, object) in source.objects.into_iter() {
            let new_id = (old_id.0 + id_offset, old_id.1);
            dest.objects.insert(new_id, remap_object_refs(object, id_offset));
        }
        dest.max_id = source_max_id + id_offset;

        let new_page_id = (page_id.0 + id_offset, page_id.1);
        let Some(Object::Dictionary(page_dict)) = dest.objects.get_mut(&new_page_id) else {
            return Err(AssembleError::Assembly(format!(
                "Page object in {} is not a dictionary",
                selection.label
            )));
        };

        page_dict.set("Parent", Object::Reference(pages_root_id));
        if let Some(resources) = resources {
            page_dict.set("Resources", remap_object_refs(resources, id_offset));
        }
        if let Some(rotate) = rotate {
            page_dict.set("Rotate", remap_object_refs(rotate, id_offset));
        }
        match selection.crop {
            Some(crop) => {
                let target = crop_page_box(media_box, &crop);
                page_dict.set("MediaBox", rect_object(target));
                page_dict.set("CropBox", rect_object(target));
            }
            // Inherited boxes do not survive reparenting; pin the resolved
            // one onto the page itself.
            None => page_dict.set("MediaBox", rect_object(media_box)),
        }

        kids.push(Object::Reference(new_page_id));
    }

    let count = kids.len();
    let mut pages_dict = Dictionary::new();
    pages_dict.set("Type", Object::Name(b"Pages".to_vec()));
    pages_dict.set("Kids", Object::Array(kids));
    pages_dict.set("Count", Object::Integer(count as i64));
    dest.objects
        .insert(pages_root_id, Object::Dictionary(pages_dict));

    let catalog_id = dest.new_object_id();
    let mut catalog = Dictionary::new();
    catalog.set("Type", Object::Name(b"Catalog".to_vec()));
    catalog.set("Pages", Object::Reference(pages_root_id));
    dest.objects.insert(catalog_id, Object::Dictionary(catalog));
    dest.trailer.set("Root", Object::Reference(catalog_id));

    dest.compress();

    let mut buffer = Vec::new();
    dest.save_to(&mut buffer)
        .map_err(|e| AssembleError::Assembly(format!("Failed to serialize output: {e}")))?;
    Ok(buffer)
}

/// Recursively shift every object reference by `offset`.
fn remap_object_refs(obj: Object, offset: u32) -> Object {
    match obj {
        Object::Reference(id) => Object::Reference((id.0 + offset, id.1)),
        Object::Array(arr) => Object::Array(
            arr.into_iter()
                .map(|o| remap_object_refs(o, offset))
                .collect(),
        ),
        Object::Dictionary(mut dict) => {
            for (_, value) in dict.iter_mut() {
                *value = remap_object_refs(value.clone(), offset);
            }
            Object::Dictionary(dict)
        }
        Object::Stream(mut stream) => {
            for (_, value) in stream.dict.iter_mut() {
                *value = remap_object_refs(value.clone(), offset);
            }
            Object::Stream(stream)
        }
        other => other,
    }
}

/// Look up an inheritable page attribute, walking the Parent chain. The
/// page's own value wins; references are returned as-is so callers can
/// remap them along with the rest of the graft.
fn resolve_inherited(
    doc: &Document,
    page_id: ObjectId,
    key: &[u8],
) -> Result<Option<Object>, AssembleError> {
    let mut current = page_id;
    for _ in 0..MAX_PARENT_DEPTH {
        let dict = doc
            .get_object(current)
            .and_then(Object::as_dict)
            .map_err(|e| AssembleError::Assembly(format!("Broken page tree node: {e}")))?;

        if let Ok(value) = dict.get(key) {
            return Ok(Some(value.clone()));
        }

        match dict.get(b"Parent") {
            Ok(Object::Reference(id)) => current = *id,
            _ => break,
        }
    }
    Ok(None)
}

/// Find a page's effective MediaBox, walking the Parent chain for inherited
/// values. Returns `[x0, y0, x1, y1]` with corners normalized.
fn resolve_media_box(doc: &Document, page_id: ObjectId) -> Result<[f64; 4], AssembleError> {
    let value = resolve_inherited(doc, page_id, b"MediaBox")?.ok_or_else(|| {
        AssembleError::Assembly("Page has no MediaBox anywhere in its tree".into())
    })?;

    let value = match value {
        Object::Reference(id) => doc
            .get_object(id)
            .map_err(|e| AssembleError::Assembly(format!("Dangling MediaBox reference: {e}")))?
            .clone(),
        other => other,
    };
    let array = value
        .as_array()
        .map_err(|_| AssembleError::Assembly("MediaBox is not an array".into()))?;
    if array.len() != 4 {
        return Err(AssembleError::Assembly(format!(
            "MediaBox has {} entries, expected 4",
            array.len()
        )));
    }
    let mut corners = [0.0f64; 4];
    for (slot, entry) in corners.iter_mut().zip(array) {
        *slot = number(entry)
            .ok_or_else(|| AssembleError::Assembly("MediaBox entry is not a number".into()))?;
    }
    Ok([
        corners[0].min(corners[2]),
        corners[1].min(corners[3]),
        corners[0].max(corners[2]),
        corners[1].max(corners[3]),
    ])
}

/// Project a fractional crop onto a page box.
///
/// Fractions measure from the top-left corner; PDF boxes measure from the
/// bottom-left, so the vertical coordinates flip.
fn crop_page_box(media: [f64; 4], crop: &FractionalCrop) -> [f64; 4] {
    let [x0, y0, x1, y1] = media;
    let rect = crop.to_page_rect(x1 - x0, y1 - y0);

    let left = x0 + rect.x;
    let right = left + rect.width;
    let top = y1 - rect.y;
    let bottom = top - rect.height;
    [left, bottom, right, top]
}

fn rect_object(rect: [f64; 4]) -> Object {
    Object::Array(rect.iter().map(|&v| Object::Real(v as f32)).collect())
}

fn number(obj: &Object) -> Option<f64> {
    match obj {
        Object::Integer(i) => Some(*i as f64),
        Object::Real(f) => Some(f64::from(*f)),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Minimal multi-page PDF with identifiable content per page.
    fn sample_pdf(num_pages: u32) -> Vec<u8> {
        let mut doc = Document::with_version("1.5");
        let pages_id = doc.new_object_id();
        let catalog_id = doc.new_object_id();
        let mut kids = Vec::new();

        for page_num in 0..num_pages {
            let content_id = doc.new_object_id();
            let content = format!("BT /F1 12 Tf 50 700 Td (Question page {}) Tj ET", page_num + 1);
            doc.objects.insert(
                content_id,
                Object::Stream(lopdf::Stream::new(Dictionary::new(), content.into_bytes())),
            );

            let page_id = doc.new_object_id();
            let mut page = Dictionary::new();
            page.set("Type", Object::Name(b"Page".to_vec()));
            page.set("Parent", Object::Reference(pages_id));
            page.set("Contents", Object::Reference(content_id));
            page.set(
                "MediaBox",
                Object::Array(vec![
                    Object::Integer(0),
                    Object::Integer(0),
                    Object::Integer(612),
                    Object::Integer(792),
                ]),
            );
            doc.objects.insert(page_id, Object::Dictionary(page));
            kids.push(Object::Reference(page_id));
        }

        let mut pages = Dictionary::new();
        pages.set("Type", Object::Name(b"Pages".to_vec()));
        pages.set("Count", Object::Integer(num_pages as i64));
        pages.set("Kids", Object::Array(kids));
        doc.objects.insert(pages_id, Object::Dictionary(pages));

        let mut catalog = Dictionary::new();
        catalog.set("Type", Object::Name(b"Catalog".to_vec()));
        catalog.set("Pages", Object::Reference(pages_id));
        doc.objects.insert(catalog_id, Object::Dictionary(catalog));
        doc.trailer.set("Root", Object::Reference(catalog_id));

        let mut buffer = Vec::new();
        doc.save_to(&mut buffer).unwrap();
        buffer
    }

    fn resolved(raw: &Arc<Vec<u8>>, page_index: usize, crop: Option<FractionalCrop>) -> ResolvedSelection {
        ResolvedSelection {
            label: "paper.pdf".into(),
            page_index,
            crop,
            raw: Arc::clone(raw),
        }
    }

    #[test]
    fn output_has_one_page_per_selection() {
        let raw = Arc::new(sample_pdf(3));
        let bytes = build_output(vec![
            resolved(&raw, 2, None),
            resolved(&raw, 0, None),
            resolved(&raw, 1, None),
        ])
        .unwrap();

        let doc = Document::load_mem(&bytes).unwrap();
        assert_eq!(doc.get_pages().len(), 3);
    }

    #[test]
    fn pages_can_repeat_across_selections() {
        let raw = Arc::new(sample_pdf(1));
        let bytes = build_output(vec![resolved(&raw, 0, None), resolved(&raw, 0, None)]).unwrap();

        let doc = Document::load_mem(&bytes).unwrap();
        assert_eq!(doc.get_pages().len(), 2);
    }

    #[test]
    fn crop_flips_the_vertical_axis() {
        let crop = FractionalCrop {
            x: 0.1,
            y: 0.1,
            width: 0.5,
            height: 0.3,
        };
        let [left, bottom, right, top] = crop_page_box([0.0, 0.0, 612.0, 792.0], &crop);
        assert!((left - 61.2).abs() < 1e-6);
        assert!((right - 367.2).abs() < 1e-6);
        assert!((top - 712.8).abs() < 1e-6);
        assert!((bottom - 475.2).abs() < 1e-6);
    }

    #[test]
    fn crop_respects_nonzero_media_box_origin() {
        let crop = FractionalCrop {
            x: 0.0,
            y: 0.0,
            width: 1.0,
            height: 0.5,
        };
        let [left, bottom, right, top] = crop_page_box([10.0, 20.0, 110.0, 220.0], &crop);
        assert!((left - 10.0).abs() < 1e-6);
        assert!((right - 110.0).abs() < 1e-6);
        assert!((top - 220.0).abs() < 1e-6);
        assert!((bottom - 120.0).abs() < 1e-6);
    }

    #[test]
    fn cropped_page_carries_narrowed_boxes() {
        let raw = Arc::new(sample_pdf(1));
        let crop = FractionalCrop {
            x: 0.25,
            y: 0.25,
            width: 0.5,
            height: 0.5,
        };
        let bytes = build_output(vec![resolved(&raw, 0, Some(crop))]).unwrap();

        let doc = Document::load_mem(&bytes).unwrap();
        let (_, page_id) = doc.get_pages().into_iter().next().unwrap();
        let page = doc.get_object(page_id).unwrap().as_dict().unwrap();

        let media = page.get(b"MediaBox").unwrap().as_array().unwrap();
        let values: Vec<f64> = media.iter().map(|o| number(o).unwrap()).collect();
        assert!((values[0] - 153.0).abs() < 0.5); // 0.25 * 612
        assert!((values[2] - 459.0).abs() < 0.5); // 0.75 * 612
        assert!((values[1] - 198.0).abs() < 0.5); // 792 - 0.75 * 792
        assert!((values[3] - 594.0).abs() < 0.5); // 792 - 0.25 * 792
        assert!(page.has(b"CropBox"));
    }

    #[test]
    fn inherited_resources_and_rotation_survive_the_graft() {
        // Resources and Rotate live on the Pages node, as scanner output
        // often does; the page dict itself carries neither.
        let mut doc = Document::with_version("1.5");
        let pages_id = doc.new_object_id();
        let catalog_id = doc.new_object_id();

        let content_id = doc.new_object_id();
        let content = "BT /F1 12 Tf 50 700 Td (Inherited) Tj ET";
        doc.objects.insert(
            content_id,
            Object::Stream(lopdf::Stream::new(
                Dictionary::new(),
                content.as_bytes().to_vec(),
            )),
        );

        let page_id = doc.new_object_id();
        let mut page = Dictionary::new();
        page.set("Type", Object::Name(b"Page".to_vec()));
        page.set("Parent", Object::Reference(pages_id));
        page.set("Contents", Object::Reference(content_id));
        doc.objects.insert(page_id, Object::Dictionary(page));

        let mut font = Dictionary::new();
        font.set("Type", Object::Name(b"Font".to_vec()));
        font.set("Subtype", Object::Name(b"Type1".to_vec()));
        font.set("BaseFont", Object::Name(b"Helvetica".to_vec()));
        let mut fonts = Dictionary::new();
        fonts.set("F1", Object::Dictionary(font));
        let mut resources = Dictionary::new();
        resources.set("Font", Object::Dictionary(fonts));

        let mut pages = Dictionary::new();
        pages.set("Type", Object::Name(b"Pages".to_vec()));
        pages.set("Count", Object::Integer(1));
        pages.set("Kids", Object::Array(vec![Object::Reference(page_id)]));
        pages.set("Resources", Object::Dictionary(resources));
        pages.set("Rotate", Object::Integer(90));
        pages.set(
            "MediaBox",
            Object::Array(vec![
                Object::Integer(0),
                Object::Integer(0),
                Object::Integer(612),
                Object::Integer(792),
            ]),
        );
        doc.objects.insert(pages_id, Object::Dictionary(pages));

        let mut catalog = Dictionary::new();
        catalog.set("Type", Object::Name(b"Catalog".to_vec()));
        catalog.set("Pages", Object::Reference(pages_id));
        doc.objects.insert(catalog_id, Object::Dictionary(catalog));
        doc.trailer.set("Root", Object::Reference(catalog_id));

        let mut raw = Vec::new();
        doc.save_to(&mut raw).unwrap();
        let raw = Arc::new(raw);

        let bytes = build_output(vec![resolved(&raw, 0, None)]).unwrap();

        let output = Document::load_mem(&bytes).unwrap();
        let (_, out_page_id) = output.get_pages().into_iter().next().unwrap();
        let out_page = output.get_object(out_page_id).unwrap().as_dict().unwrap();

        let out_resources = out_page.get(b"Resources").unwrap().as_dict().unwrap();
        let out_fonts = out_resources.get(b"Font").unwrap().as_dict().unwrap();
        assert!(out_fonts.has(b"F1"));
        assert_eq!(out_page.get(b"Rotate").unwrap().as_i64().unwrap(), 90);
    }

    #[test]
    fn media_box_is_inherited_from_the_page_tree() {
        let mut doc = Document::with_version("1.5");
        let pages_id = doc.new_object_id();
        let page_id = doc.new_object_id();

        let mut page = Dictionary::new();
        page.set("Type", Object::Name(b"Page".to_vec()));
        page.set("Parent", Object::Reference(pages_id));
        doc.objects.insert(page_id, Object::Dictionary(page));

        let mut pages = Dictionary::new();
        pages.set("Type", Object::Name(b"Pages".to_vec()));
        pages.set("Count", Object::Integer(1));
        pages.set("Kids", Object::Array(vec![Object::Reference(page_id)]));
        pages.set(
            "MediaBox",
            Object::Array(vec![
                Object::Integer(0),
                Object::Integer(0),
                Object::Integer(595),
                Object::Integer(842),
            ]),
        );
        doc.objects.insert(pages_id, Object::Dictionary(pages));

        let media = resolve_media_box(&doc, page_id).unwrap();
        assert_eq!(media, [0.0, 0.0, 595.0, 842.0]);
    }

    #[test]
    fn missing_media_box_is_an_assembly_error() {
        let mut doc = Document::with_version("1.5");
        let page_id = doc.new_object_id();
        let mut page = Dictionary::new();
        page.set("Type", Object::Name(b"Page".to_vec()));
        doc.objects.insert(page_id, Object::Dictionary(page));

        let err = resolve_media_box(&doc, page_id).unwrap_err();
        assert!(matches!(err, AssembleError::Assembly(_)));
    }
}
