//! Page image endpoint

use axum::extract::{Path, State};
use axum::http::header;
use axum::response::{IntoResponse, Response};

use crate::state::AppState;

use super::ApiError;

/// GET /pages/:cache_id/:document_id/:page_index
///
/// Serves the PNG rendered at ingest time; nothing is re-rendered here, so
/// repeated fetches are cheap and idempotent.
pub async fn page_image(
    State(state): State<AppState>,
    Path((cache_id, document_id, page_index)): Path<(String, String, usize)>,
) -> Result<Response, ApiError> {
    let page = state
        .store()
        .page(&cache_id, &document_id, page_index)
        .await?;

    let headers = [
        (header::CONTENT_TYPE, "image/png"),
        (header::CACHE_CONTROL, "private, max-age=3600"),
    ];
    Ok((headers, page.image.data).into_response())
}
