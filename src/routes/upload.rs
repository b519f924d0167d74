//! Upload endpoint
//!
//! Accepts a multipart batch of PDF files and ingests it as one cache
//! entry. The batch is atomic: one bad file rejects the whole request.

use std::collections::BTreeMap;

use axum::extract::{Multipart, State};
use axum::Json;
use serde::Serialize;

use crate::matcher::to_page_number;
use crate::state::AppState;
use crate::store::{CacheEntry, StoreError, UploadFile};

use super::ApiError;

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadResponse {
    pub status: &'static str,
    pub cache_id: String,
    pub files: Vec<UploadedFile>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadedFile {
    pub id: String,
    pub original_name: String,
    pub page_count: usize,
    /// 1-based page number to image URL, so clients can show thumbnails
    /// without another round trip
    pub pages: BTreeMap<String, String>,
}

/// POST /upload
pub async fn upload(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> Result<Json<UploadResponse>, ApiError> {
    let mut files = Vec::new();

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ApiError::BadRequest(format!("Malformed multipart body: {e}")))?
    {
        // Ordinary form fields carry no filename and are not part of the
        // batch; anything the user named is.
        let Some(original_name) = field.file_name().map(str::to_owned) else {
            continue;
        };

        let bytes = field.bytes().await.map_err(|e| {
            ApiError::BadRequest(format!("Failed to read part {original_name}: {e}"))
        })?;
        if bytes.is_empty() {
            return Err(StoreError::InvalidDocument {
                name: original_name,
                reason: "file is empty".to_string(),
            }
            .into());
        }

        files.push(UploadFile {
            original_name,
            bytes: bytes.to_vec(),
        });
    }

    let entry = state.store().ingest(files).await?;
    Ok(Json(upload_response(entry)))
}

fn upload_response(entry: CacheEntry) -> UploadResponse {
    let files = entry
        .documents
        .iter()
        .map(|doc| UploadedFile {
            id: doc.id.clone(),
            original_name: doc.original_name.clone(),
            page_count: doc.page_count,
            pages: (0..doc.page_count)
                .map(|idx| {
                    (
                        to_page_number(idx).to_string(),
                        format!("/pages/{}/{}/{}", entry.cache_id, doc.id, idx),
                    )
                })
                .collect(),
        })
        .collect();

    UploadResponse {
        status: "success",
        cache_id: entry.cache_id,
        files,
    }
}
