//! HTTP interface
//!
//! One flat router over the pipeline: upload a batch of papers, search the
//! cached pages, fetch page images, and generate the assembled output PDF.
//! Errors leave as JSON `{ error, code }` with machine-readable codes so
//! clients can branch without parsing messages.

pub mod generate;
pub mod pages;
pub mod search;
pub mod upload;

use axum::extract::DefaultBodyLimit;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Serialize;
use thiserror::Error;

use crate::assemble::AssembleError;
use crate::crop::CropError;
use crate::matcher::MatchError;
use crate::state::AppState;
use crate::store::StoreError;

pub fn router(state: AppState) -> Router {
    let body_limit = state.config().upload.max_upload_bytes;

    Router::new()
        .route("/health", get(health))
        .route("/upload", post(upload::upload))
        .route("/search", post(search::search))
        .route("/generate", post(generate::generate))
        .route(
            "/pages/:cache_id/:document_id/:page_index",
            get(pages::page_image),
        )
        .layer(DefaultBodyLimit::max(body_limit))
        .with_state(state)
}

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    version: &'static str,
}

async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy",
        version: env!("CARGO_PKG_VERSION"),
    })
}

/// Wire error body
#[derive(Serialize)]
pub struct ErrorResponse {
    pub error: String,
    pub code: String,
}

/// Route-level error wrapper over the pipeline's domain errors
#[derive(Debug, Error)]
pub enum ApiError {
    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Match(#[from] MatchError),

    #[error(transparent)]
    Assemble(#[from] AssembleError),

    #[error(transparent)]
    Crop(#[from] CropError),

    #[error("{0}")]
    BadRequest(String),
}

impl ApiError {
    fn status_and_code(&self) -> (StatusCode, &'static str) {
        match self {
            ApiError::Store(e) => store_status(e),

            ApiError::Match(MatchError::Store(e)) => store_status(e),
            ApiError::Match(MatchError::EmptyCache) => {
                (StatusCode::UNPROCESSABLE_ENTITY, "MATCH_FAILED")
            }
            ApiError::Match(MatchError::Timeout(_)) => {
                (StatusCode::GATEWAY_TIMEOUT, "MATCH_FAILED")
            }
            ApiError::Match(MatchError::PromptTooLarge { .. }) => {
                (StatusCode::PAYLOAD_TOO_LARGE, "MATCH_FAILED")
            }
            ApiError::Match(_) => (StatusCode::BAD_GATEWAY, "MATCH_FAILED"),

            ApiError::Assemble(AssembleError::Store(e)) => store_status(e),
            ApiError::Assemble(AssembleError::EmptySelection) => {
                (StatusCode::BAD_REQUEST, "EMPTY_SELECTION")
            }
            ApiError::Assemble(AssembleError::SelectionResolution { .. }) => {
                (StatusCode::UNPROCESSABLE_ENTITY, "SELECTION_UNRESOLVED")
            }
            ApiError::Assemble(AssembleError::Crop(_)) => (StatusCode::BAD_REQUEST, "INVALID_RECT"),
            ApiError::Assemble(AssembleError::Assembly(_)) => {
                (StatusCode::INTERNAL_SERVER_ERROR, "ASSEMBLY_FAILED")
            }

            ApiError::Crop(_) => (StatusCode::BAD_REQUEST, "INVALID_RECT"),
            ApiError::BadRequest(_) => (StatusCode::BAD_REQUEST, "BAD_REQUEST"),
        }
    }
}

fn store_status(e: &StoreError) -> (StatusCode, &'static str) {
    match e {
        StoreError::InvalidDocument { .. } => (StatusCode::BAD_REQUEST, "INVALID_DOCUMENT"),
        StoreError::EmptyBatch => (StatusCode::BAD_REQUEST, "EMPTY_BATCH"),
        StoreError::NotFound(_) => (StatusCode::NOT_FOUND, "NOT_FOUND"),
        StoreError::OutOfRange { .. } => (StatusCode::NOT_FOUND, "OUT_OF_RANGE"),
        StoreError::Render(_) => (StatusCode::INTERNAL_SERVER_ERROR, "RENDER_FAILED"),
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, code) = self.status_and_code();
        if status.is_server_error() {
            tracing::error!(error = %self, code, "Request failed");
        } else {
            tracing::debug!(error = %self, code, "Request rejected");
        }

        let body = Json(ErrorResponse {
            error: self.to_string(),
            code: code.to_string(),
        });
        (status, body).into_response()
    }
}
