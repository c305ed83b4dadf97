//! Download gateway routes.

use askama::Template;
use askama_web::WebTemplate;
use axum::{
    body::Body,
    extract::{Path, State},
    http::{StatusCode, header},
    response::{IntoResponse, Redirect, Response},
};
use chrono::Utc;
use tracing::instrument;

use crate::error::AppError;
use crate::filters;
use crate::services::downloads::{DownloadError, EXPIRED_PATH, content_disposition, open_download};
use crate::state::AppState;

const MISSING_TOKEN: &str = "No download verification ID provided.";
const NOT_FOUND_OR_EXPIRED: &str = "Download verification not found or expired.";

/// Error page for a download that cannot be served.
#[derive(Template, WebTemplate)]
#[template(path = "downloads/error.html")]
pub struct DownloadErrorTemplate {
    pub message: &'static str,
    pub verification_id: Option<String>,
    pub current_time: String,
}

/// Generic "link expired" page.
#[derive(Template, WebTemplate)]
#[template(path = "downloads/expired.html")]
pub struct DownloadExpiredTemplate {
    pub products_url: &'static str,
}

fn error_page(status: StatusCode, message: &'static str, id: Option<String>) -> Response {
    let page = DownloadErrorTemplate {
        message,
        verification_id: id,
        current_time: Utc::now().to_rfc3339(),
    };
    (status, page).into_response()
}

/// `GET /products/download` with no token.
pub async fn missing_token() -> Response {
    error_page(StatusCode::BAD_REQUEST, MISSING_TOKEN, None)
}

/// `GET /products/download/expired`.
pub async fn expired() -> impl IntoResponse {
    DownloadExpiredTemplate {
        products_url: "/products",
    }
}

/// `GET /products/download/{id}`: stream the product file for a live token.
#[instrument(skip(state))]
pub async fn download(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Response, AppError> {
    let download = match open_download(
        state.catalog(),
        state.blobs(),
        state.storage_base_url(),
        &id,
        Utc::now(),
    )
    .await
    {
        Ok(download) => download,
        Err(DownloadError::NotFoundOrExpired) => {
            return Ok(error_page(StatusCode::NOT_FOUND, NOT_FOUND_OR_EXPIRED, Some(id)));
        }
        Err(DownloadError::BlobUnavailable(_)) => {
            return Ok(Redirect::to(EXPIRED_PATH).into_response());
        }
        Err(DownloadError::Repository(e)) => return Err(AppError::Database(e)),
    };

    Response::builder()
        .status(StatusCode::OK)
        .header(
            header::CONTENT_DISPOSITION,
            content_disposition(&download.filename),
        )
        .header(header::CONTENT_LENGTH, download.content_length)
        .header(header::CONTENT_TYPE, download.content_type)
        .body(Body::from_stream(download.body))
        .map_err(|e| AppError::Internal(format!("Failed to build download response: {e}")))
}
