//! Page store
//!
//! Content-addressed, per-session cache of ingested PDF batches. Each upload
//! batch becomes one `CacheEntry` holding its documents, their raw bytes
//! (needed later for assembly) and per-page rendered artifacts.
//!
//! Entries are append-only: once created they are never mutated, so
//! concurrent reads need no coordination beyond the outer `RwLock` on the
//! entry map. Entries expire after a fixed TTL and are swept by a background
//! task; nothing survives a process restart.

pub mod error;
pub mod types;

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{Duration, Utc};
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::config::CacheConfig;
use crate::pdf::{PageRenderer, PdfSource};

pub use error::StoreError;
pub use types::{CacheEntry, Document, PageImage, RenderedPage, UploadFile};

/// Interval between expiry sweeps
const CLEANUP_INTERVAL_SECS: u64 = 300;

/// One ingested document with everything derived from it
struct StoredDocument {
    document: Document,
    /// Raw source bytes, kept for assembly
    raw: Arc<Vec<u8>>,
    /// Rendered artifacts, one per page
    pages: Vec<RenderedPage>,
}

struct EntryState {
    meta: CacheEntry,
    documents: Vec<StoredDocument>,
}

struct PageStoreInner {
    entries: RwLock<HashMap<String, EntryState>>,
    renderer: PageRenderer,
    config: CacheConfig,
}

/// Per-process page cache
#[derive(Clone)]
pub struct PageStore {
    inner: Arc<PageStoreInner>,
}

impl PageStore {
    pub fn new(config: CacheConfig) -> Self {
        Self {
            inner: Arc::new(PageStoreInner {
                entries: RwLock::new(HashMap::new()),
                renderer: PageRenderer::new(),
                config,
            }),
        }
    }

    /// Ingest one upload batch atomically.
    ///
    /// Every file must validate as a PDF and render; the first failure
    /// rejects the whole batch and no entry is created.
    pub async fn ingest(&self, files: Vec<UploadFile>) -> Result<CacheEntry, StoreError> {
        if files.is_empty() {
            return Err(StoreError::EmptyBatch);
        }

        let mut stored = Vec::with_capacity(files.len());
        for file in files {
            let source =
                PdfSource::from_bytes(file.bytes).map_err(|e| StoreError::InvalidDocument {
                    name: file.original_name.clone(),
                    reason: e.to_string(),
                })?;

            let document = Document {
                id: Uuid::new_v4().to_string(),
                original_name: file.original_name,
                page_count: source.page_count(),
            };

            let pages = self
                .inner
                .renderer
                .render_document(&source, &document.id)
                .await?;

            stored.push(StoredDocument {
                raw: source.bytes(),
                document,
                pages,
            });
        }

        let now = Utc::now();
        let meta = CacheEntry {
            cache_id: format!("cache_{}", Uuid::new_v4().simple()),
            documents: stored.iter().map(|d| d.document.clone()).collect(),
            created_at: now,
            expires_at: now + Duration::minutes(self.inner.config.ttl_minutes),
        };

        {
            let mut entries = self.inner.entries.write().await;
            if entries.len() >= self.inner.config.max_entries {
                evict_oldest(&mut entries);
            }
            entries.insert(
                meta.cache_id.clone(),
                EntryState {
                    meta: meta.clone(),
                    documents: stored,
                },
            );
        }

        tracing::info!(
            cache_id = %meta.cache_id,
            documents = meta.documents.len(),
            pages = meta.documents.iter().map(|d| d.page_count).sum::<usize>(),
            "Ingested upload batch"
        );

        Ok(meta)
    }

    /// Look up a cache entry. Expired entries behave as missing even before
    /// the sweeper removes them.
    pub async fn get(&self, cache_id: &str) -> Result<CacheEntry, StoreError> {
        let entries = self.inner.entries.read().await;
        let state = entries
            .get(cache_id)
            .filter(|s| !s.meta.is_expired())
            .ok_or_else(|| StoreError::NotFound(format!("cache id {cache_id}")))?;
        Ok(state.meta.clone())
    }

    /// Fetch one rendered page.
    pub async fn page(
        &self,
        cache_id: &str,
        document_id: &str,
        page_index: usize,
    ) -> Result<RenderedPage, StoreError> {
        let entries = self.inner.entries.read().await;
        let state = entries
            .get(cache_id)
            .filter(|s| !s.meta.is_expired())
            .ok_or_else(|| StoreError::NotFound(format!("cache id {cache_id}")))?;

        let doc = state
            .documents
            .iter()
            .find(|d| d.document.id == document_id)
            .ok_or_else(|| StoreError::NotFound(format!("document {document_id}")))?;

        doc.pages
            .get(page_index)
            .cloned()
            .ok_or(StoreError::OutOfRange {
                index: page_index,
                count: doc.document.page_count,
            })
    }

    /// Extracted text of every page under an entry, in (document, page)
    /// order, paired with its document. Used to build the ranking prompt.
    pub async fn page_texts(
        &self,
        cache_id: &str,
    ) -> Result<Vec<(Document, Vec<String>)>, StoreError> {
        let entries = self.inner.entries.read().await;
        let state = entries
            .get(cache_id)
            .filter(|s| !s.meta.is_expired())
            .ok_or_else(|| StoreError::NotFound(format!("cache id {cache_id}")))?;

        Ok(state
            .documents
            .iter()
            .map(|d| {
                (
                    d.document.clone(),
                    d.pages.iter().map(|p| p.text.clone()).collect(),
                )
            })
            .collect())
    }

    /// PNG images of every page under an entry, in (document, page) order.
    pub async fn page_images(&self, cache_id: &str) -> Result<Vec<Vec<u8>>, StoreError> {
        let entries = self.inner.entries.read().await;
        let state = entries
            .get(cache_id)
            .filter(|s| !s.meta.is_expired())
            .ok_or_else(|| StoreError::NotFound(format!("cache id {cache_id}")))?;

        Ok(state
            .documents
            .iter()
            .flat_map(|d| d.pages.iter().map(|p| p.image.data.clone()))
            .collect())
    }

    /// Raw PDF bytes for assembly. `selector` matches a document id first,
    /// then an original filename.
    pub async fn source_bytes(
        &self,
        cache_id: &str,
        selector: &str,
    ) -> Result<(Document, Arc<Vec<u8>>), StoreError> {
        let entries = self.inner.entries.read().await;
        let state = entries
            .get(cache_id)
            .filter(|s| !s.meta.is_expired())
            .ok_or_else(|| StoreError::NotFound(format!("cache id {cache_id}")))?;

        let doc = state
            .documents
            .iter()
            .find(|d| d.document.id == selector)
            .or_else(|| {
                state
                    .documents
                    .iter()
                    .find(|d| d.document.original_name == selector)
            })
            .ok_or_else(|| StoreError::NotFound(format!("document {selector}")))?;

        Ok((doc.document.clone(), Arc::clone(&doc.raw)))
    }

    /// Drop an entry explicitly.
    pub async fn evict(&self, cache_id: &str) -> bool {
        let mut entries = self.inner.entries.write().await;
        entries.remove(cache_id).is_some()
    }

    /// Number of live (possibly expired, not yet swept) entries.
    pub async fn len(&self) -> usize {
        self.inner.entries.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.inner.entries.read().await.is_empty()
    }

    /// Remove expired entries; returns how many were dropped.
    pub async fn sweep_expired(&self) -> usize {
        let mut entries = self.inner.entries.write().await;
        let before = entries.len();
        entries.retain(|_, state| !state.meta.is_expired());
        let dropped = before - entries.len();
        if dropped > 0 {
            tracing::info!(count = dropped, "Swept expired cache entries");
        }
        dropped
    }

    /// Start the periodic expiry sweep.
    pub fn start_cleanup_task(self) -> tokio::task::JoinHandle<()> {
        tokio::spawn(async move {
            let mut interval =
                tokio::time::interval(std::time::Duration::from_secs(CLEANUP_INTERVAL_SECS));
            loop {
                interval.tick().await;
                self.sweep_expired().await;
            }
        })
    }
}

fn evict_oldest(entries: &mut HashMap<String, EntryState>) {
    if let Some(oldest) = entries
        .values()
        .min_by_key(|s| s.meta.created_at)
        .map(|s| s.meta.cache_id.clone())
    {
        tracing::warn!(cache_id = %oldest, "Cache full, evicting oldest entry");
        entries.remove(&oldest);
    }
}
