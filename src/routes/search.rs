//! Search endpoint
//!
//! Runs the natural-language query against a cache entry. Internal 0-based
//! page indices become 1-based `pageNumber` fields exactly here.

use axum::extract::State;
use axum::Json;
use serde::{Deserialize, Serialize};

use crate::matcher::to_page_number;
use crate::state::AppState;

use super::ApiError;

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchRequest {
    pub cache_id: String,
    pub query: String,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchResponse {
    pub results: Vec<SearchHit>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchHit {
    pub document_id: String,
    pub source_filename: String,
    /// 1-based, as shown to the user
    pub page_number: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub question_index: Option<String>,
    pub description: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub quote: Option<String>,
    pub image_url: String,
}

/// POST /search
pub async fn search(
    State(state): State<AppState>,
    Json(request): Json<SearchRequest>,
) -> Result<Json<SearchResponse>, ApiError> {
    if request.query.trim().is_empty() {
        return Err(ApiError::BadRequest("Query must not be empty".into()));
    }

    let results = state
        .matcher()
        .search(&request.cache_id, &request.query)
        .await?;

    let results = results
        .into_iter()
        .map(|r| SearchHit {
            page_number: to_page_number(r.page_index),
            image_url: format!(
                "/pages/{}/{}/{}",
                request.cache_id, r.document_id, r.page_index
            ),
            document_id: r.document_id,
            source_filename: r.source_filename,
            question_index: r.question_index,
            description: r.description,
            quote: r.quote,
        })
        .collect();

    Ok(Json(SearchResponse { results }))
}
