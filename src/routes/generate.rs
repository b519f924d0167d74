//! Generate endpoint
//!
//! Turns a list of page selections into a downloadable PDF. Selections use
//! 0-based page indices and fractional crop boxes straight from the UI.

use axum::extract::State;
use axum::http::header;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Deserialize;

use crate::assemble::Selection;
use crate::crop::{CropError, FractionalCrop};
use crate::state::AppState;

use super::ApiError;

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerateRequest {
    pub cache_id: String,
    pub selections: Vec<SelectionRequest>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SelectionRequest {
    /// Document id or original filename within the cache entry
    pub source_pdf: String,
    /// 0-based page index within the source
    pub page_number: usize,
    /// Optional `[x, y, w, h]` fractions, top-left origin
    #[serde(default)]
    pub crop_box: Option<[f64; 4]>,
    /// Output position; omitted selections keep their request sequence
    #[serde(default)]
    pub order: Option<u32>,
}

/// POST /generate
pub async fn generate(
    State(state): State<AppState>,
    Json(request): Json<GenerateRequest>,
) -> Result<Response, ApiError> {
    let selections = request
        .selections
        .iter()
        .enumerate()
        .map(|(position, s)| {
            let crop = s
                .crop_box
                .map(|wire| FractionalCrop::from_wire(&wire))
                .transpose()?;
            Ok(Selection {
                source: s.source_pdf.clone(),
                page_index: s.page_number,
                crop,
                order: s.order.unwrap_or(position as u32),
            })
        })
        .collect::<Result<Vec<_>, CropError>>()?;

    let bytes = state
        .assembler()
        .assemble(&request.cache_id, &selections)
        .await?;

    let headers = [
        (header::CONTENT_TYPE, "application/pdf"),
        (
            header::CONTENT_DISPOSITION,
            "attachment; filename=\"generated_questions.pdf\"",
        ),
    ];
    Ok((headers, bytes).into_response())
}
