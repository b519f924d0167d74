//! Query matcher types

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::store::StoreError;

/// One ranked page as returned by the external provider, before validation
/// against the cache entry. Field names follow the JSON contract the provider
/// is prompted to emit; `page` is accepted as an alias some models produce.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RankedPage {
    /// 1-based page number within the named source file
    #[serde(alias = "page")]
    pub page_number: u32,
    /// Which uploaded file the page belongs to
    #[serde(default)]
    pub source_filename: Option<String>,
    /// Question identifier exactly as printed in the paper (e.g. "Q4")
    #[serde(default)]
    pub question_index: Option<String>,
    /// Short summary of what the question asks
    pub description: String,
    /// Verbatim snippet proving the question exists on the page
    #[serde(default)]
    pub quote: Option<String>,
}

/// A validated search hit, pinned to a page that exists in the cache entry
#[derive(Debug, Clone)]
pub struct SearchResult {
    pub document_id: String,
    pub source_filename: String,
    /// 0-based; converted to 1-based only at the HTTP boundary
    pub page_index: usize,
    pub question_index: Option<String>,
    pub description: String,
    pub quote: Option<String>,
    /// Position in the provider's ranking, 0 = best
    pub rank: usize,
}

/// Search failures, surfaced to the caller so "nothing matched" stays
/// distinguishable from "the pipeline broke"
#[derive(Debug, Error)]
pub enum MatchError {
    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("Cache entry has no documents to search")]
    EmptyCache,

    #[error("Ranking provider call failed: {0}")]
    Provider(String),

    #[error("Ranking provider timed out after {0} seconds")]
    Timeout(u64),

    #[error("Ranking provider returned an unusable response: {0}")]
    MalformedResponse(String),

    #[error("Prompt too large: ~{tokens} tokens exceeds the {limit} token limit")]
    PromptTooLarge { tokens: usize, limit: usize },
}

/// Convert a provider-facing 1-based page number to an internal 0-based
/// index. This is the single place the boundary arithmetic lives.
pub fn to_page_index(page_number: u32) -> Option<usize> {
    (page_number >= 1).then(|| (page_number - 1) as usize)
}

/// Inverse of [`to_page_index`], used when leaving the core.
pub fn to_page_number(page_index: usize) -> u32 {
    page_index as u32 + 1
}
