//! Page store types

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One ingested PDF document, immutable after creation
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Document {
    /// Opaque document id (uuid v4)
    pub id: String,
    /// Filename the caller uploaded under
    pub original_name: String,
    /// Number of pages
    pub page_count: usize,
}

/// Raster image of a rendered page
#[derive(Debug, Clone)]
pub struct PageImage {
    /// PNG-encoded bytes
    pub data: Vec<u8>,
    pub width: u32,
    pub height: u32,
}

/// Per-page artifacts produced once at ingestion
#[derive(Debug, Clone)]
pub struct RenderedPage {
    pub document_id: String,
    pub page_index: usize,
    pub image: PageImage,
    /// Extracted plain text; carries a scanned-page warning marker when the
    /// page had no extractable text.
    pub text: String,
}

/// Public view of one upload batch
#[derive(Debug, Clone)]
pub struct CacheEntry {
    /// Opaque, unguessable handle returned to the caller
    pub cache_id: String,
    /// Documents in upload order
    pub documents: Vec<Document>,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

impl CacheEntry {
    pub fn is_expired(&self) -> bool {
        self.expires_at < Utc::now()
    }

    /// Resolve a document by id first, then by original filename.
    pub fn find_document(&self, selector: &str) -> Option<&Document> {
        self.documents
            .iter()
            .find(|d| d.id == selector)
            .or_else(|| self.documents.iter().find(|d| d.original_name == selector))
    }
}

/// One file of an upload batch, as received from the transport layer
#[derive(Debug, Clone)]
pub struct UploadFile {
    pub original_name: String,
    pub bytes: Vec<u8>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn entry() -> CacheEntry {
        CacheEntry {
            cache_id: "cache_test".into(),
            documents: vec![
                Document {
                    id: "id-a".into(),
                    original_name: "paper_1.pdf".into(),
                    page_count: 3,
                },
                Document {
                    id: "id-b".into(),
                    original_name: "paper_2.pdf".into(),
                    page_count: 1,
                },
            ],
            created_at: Utc::now(),
            expires_at: Utc::now() + Duration::minutes(5),
        }
    }

    #[test]
    fn find_document_prefers_id_over_name() {
        let entry = entry();
        assert_eq!(entry.find_document("id-b").unwrap().original_name, "paper_2.pdf");
        assert_eq!(entry.find_document("paper_1.pdf").unwrap().id, "id-a");
        assert!(entry.find_document("missing.pdf").is_none());
    }

    #[test]
    fn expiry_is_checked_against_now() {
        let mut entry = entry();
        assert!(!entry.is_expired());
        entry.expires_at = Utc::now() - Duration::seconds(1);
        assert!(entry.is_expired());
    }
}
