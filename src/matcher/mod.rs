//! Query matcher
//!
//! Answers a natural-language query against one cache entry: gathers the
//! entry's page text (and optionally images), asks the external ranking
//! provider, and normalizes its answer into validated search results.
//!
//! The matcher never mutates the store, so a cancelled search leaves no
//! inconsistent state behind.

pub mod prompt;
pub mod provider;
pub mod types;

use std::sync::Arc;

use tokio::time::{timeout, Duration};

use crate::config::MatcherConfig;
use crate::store::types::CacheEntry;
use crate::store::PageStore;

pub use provider::{GeminiRanker, QuestionRanker, StaticRanker};
pub use types::{to_page_index, to_page_number, MatchError, RankedPage, SearchResult};

pub struct QueryMatcher {
    store: PageStore,
    ranker: Arc<dyn QuestionRanker>,
    config: MatcherConfig,
}

impl QueryMatcher {
    pub fn new(store: PageStore, ranker: Arc<dyn QuestionRanker>, config: MatcherConfig) -> Self {
        Self {
            store,
            ranker,
            config,
        }
    }

    /// Search the cache entry for pages matching `query`.
    ///
    /// `Ok(vec![])` means the provider found nothing relevant; every failure
    /// mode (transport, timeout, unusable response, oversized prompt) is an
    /// error, never a silently empty list.
    pub async fn search(
        &self,
        cache_id: &str,
        query: &str,
    ) -> Result<Vec<SearchResult>, MatchError> {
        let entry = self.store.get(cache_id).await?;
        ensure_searchable(&entry)?;

        let corpus = self.store.page_texts(cache_id).await?;
        let corpus_text = prompt::corpus_text(&corpus);
        let full_prompt = prompt::build_prompt(query, &corpus_text);

        let images = if self.config.send_page_images {
            self.store.page_images(cache_id).await?
        } else {
            Vec::new()
        };

        let estimated = prompt::estimate_text_tokens(&full_prompt)
            + images.len() * prompt::TOKENS_PER_IMAGE
            + prompt::PROMPT_OVERHEAD_TOKENS;
        if estimated > self.config.max_prompt_tokens {
            return Err(MatchError::PromptTooLarge {
                tokens: estimated,
                limit: self.config.max_prompt_tokens,
            });
        }

        tracing::info!(
            cache_id = %cache_id,
            query = %query,
            provider = self.ranker.name(),
            documents = entry.documents.len(),
            images = images.len(),
            estimated_tokens = estimated,
            "Dispatching ranking request"
        );

        let ranked = timeout(
            Duration::from_secs(self.config.timeout_secs),
            self.ranker.rank(&full_prompt, &images),
        )
        .await
        .map_err(|_| MatchError::Timeout(self.config.timeout_secs))??;

        let results = resolve_results(&entry, ranked);
        tracing::info!(
            cache_id = %cache_id,
            results = results.len(),
            "Search complete"
        );
        Ok(results)
    }
}

/// An entry with no documents has nothing to rank. Ingest rejects empty
/// batches, so this guards against future entry sources, not a live path.
fn ensure_searchable(entry: &CacheEntry) -> Result<(), MatchError> {
    if entry.documents.is_empty() {
        return Err(MatchError::EmptyCache);
    }
    Ok(())
}

/// Pin ranked pages to concrete cached pages, dropping anything that does
/// not resolve. Provider order is preserved; ties keep input order.
fn resolve_results(entry: &CacheEntry, ranked: Vec<RankedPage>) -> Vec<SearchResult> {
    let mut results = Vec::with_capacity(ranked.len());

    for page in ranked {
        let Some(page_index) = to_page_index(page.page_number) else {
            tracing::warn!(page_number = page.page_number, "Dropping result with invalid page number");
            continue;
        };

        let document = match page.source_filename.as_deref() {
            Some(name) => match entry.find_document(name) {
                Some(doc) => doc,
                None => {
                    // Single-file uploads routinely omit or garble the
                    // filename; fall back to the first document.
                    let Some(first) = entry.documents.first() else {
                        continue;
                    };
                    tracing::warn!(
                        source_filename = name,
                        fallback = %first.original_name,
                        "Ranked page names an unknown file, using first document"
                    );
                    first
                }
            },
            None => match entry.documents.first() {
                Some(first) => first,
                None => continue,
            },
        };

        if page_index >= document.page_count {
            tracing::warn!(
                document = %document.original_name,
                page_number = page.page_number,
                page_count = document.page_count,
                "Dropping result pointing past the end of the document"
            );
            continue;
        }

        results.push(SearchResult {
            document_id: document.id.clone(),
            source_filename: document.original_name.clone(),
            page_index,
            question_index: page.question_index,
            description: page.description,
            quote: page.quote,
            rank: results.len(),
        });
    }

    results
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::types::Document;
    use chrono::{Duration as ChronoDuration, Utc};

    fn entry() -> CacheEntry {
        CacheEntry {
            cache_id: "cache_x".into(),
            documents: vec![
                Document {
                    id: "doc-a".into(),
                    original_name: "mechanics.pdf".into(),
                    page_count: 3,
                },
                Document {
                    id: "doc-b".into(),
                    original_name: "statistics.pdf".into(),
                    page_count: 2,
                },
            ],
            created_at: Utc::now(),
            expires_at: Utc::now() + ChronoDuration::hours(1),
        }
    }

    fn ranked(page_number: u32, source: Option<&str>) -> RankedPage {
        RankedPage {
            page_number,
            source_filename: source.map(String::from),
            question_index: Some("Q1".into()),
            description: "desc".into(),
            quote: None,
        }
    }

    #[test]
    fn an_entry_with_no_documents_is_not_searchable() {
        let empty = CacheEntry {
            cache_id: "cache_empty".into(),
            documents: Vec::new(),
            created_at: Utc::now(),
            expires_at: Utc::now() + ChronoDuration::hours(1),
        };
        assert!(matches!(
            ensure_searchable(&empty),
            Err(MatchError::EmptyCache)
        ));
        assert!(ensure_searchable(&entry()).is_ok());
    }

    #[test]
    fn resolves_by_filename_and_converts_to_zero_based() {
        let results = resolve_results(&entry(), vec![ranked(2, Some("statistics.pdf"))]);
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].document_id, "doc-b");
        assert_eq!(results[0].page_index, 1);
    }

    #[test]
    fn unknown_filename_falls_back_to_first_document() {
        let results = resolve_results(&entry(), vec![ranked(1, Some("nope.pdf"))]);
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].document_id, "doc-a");
    }

    #[test]
    fn out_of_range_pages_are_dropped_defensively() {
        let results = resolve_results(
            &entry(),
            vec![
                ranked(4, Some("mechanics.pdf")), // past the end
                ranked(0, Some("mechanics.pdf")), // invalid 1-based number
                ranked(3, Some("mechanics.pdf")), // valid, last page
            ],
        );
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].page_index, 2);
    }

    #[test]
    fn provider_order_and_rank_are_preserved() {
        let results = resolve_results(
            &entry(),
            vec![
                ranked(3, Some("mechanics.pdf")),
                ranked(1, Some("statistics.pdf")),
                ranked(1, Some("mechanics.pdf")),
            ],
        );
        let order: Vec<(usize, usize)> = results.iter().map(|r| (r.rank, r.page_index)).collect();
        assert_eq!(order, vec![(0, 2), (1, 0), (2, 0)]);
    }
}
