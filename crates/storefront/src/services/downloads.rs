//! Download gateway: exchanges a live token for the product file stream.

use chrono::{DateTime, Utc};
use thiserror::Error;
use tracing::{info, instrument, warn};

use econ_core::{BlobKey, DownloadVerificationId};
use econ_storage::{BlobError, BlobStore, BlobStream};

use crate::db::{Catalog, RepositoryError};

/// Path prefix of download links.
pub const DOWNLOAD_PATH: &str = "/products/download";

/// Where failed blob fetches are sent.
pub const EXPIRED_PATH: &str = "/products/download/expired";

/// Fallback when the store reports no content type.
pub const DEFAULT_CONTENT_TYPE: &str = "application/octet-stream";

/// Reasons a download cannot be served.
#[derive(Debug, Error)]
pub enum DownloadError {
    /// The token is unknown, malformed, or past its expiry.
    #[error("Download verification not found or expired")]
    NotFoundOrExpired,

    /// The token is live but the file could not be fetched.
    #[error("Blob unavailable: {0}")]
    BlobUnavailable(#[from] BlobError),

    /// Catalog store failure.
    #[error(transparent)]
    Repository(#[from] RepositoryError),
}

/// An open product file, ready to stream to the buyer.
pub struct Download {
    /// `Content-Disposition` file name.
    pub filename: String,
    /// `Content-Length`; zero when the store did not report a size.
    pub content_length: u64,
    pub content_type: String,
    pub body: BlobStream,
}

impl std::fmt::Debug for Download {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Download")
            .field("filename", &self.filename)
            .field("content_length", &self.content_length)
            .field("content_type", &self.content_type)
            .field("body", &"<stream>")
            .finish()
    }
}

/// The buyer-facing link for a download token.
#[must_use]
pub fn download_url(storefront_base_url: &str, id: DownloadVerificationId) -> String {
    format!(
        "{}{DOWNLOAD_PATH}/{id}",
        storefront_base_url.trim_end_matches('/')
    )
}

/// `Content-Disposition` value for an attachment named `filename`.
#[must_use]
pub fn content_disposition(filename: &str) -> String {
    format!("attachment; filename=\"{filename}\"")
}

/// Resolve `raw_id` to a live token and open its product file.
///
/// Malformed ids are treated exactly like unknown ones.
///
/// # Errors
///
/// [`DownloadError::NotFoundOrExpired`] if no live token matches,
/// [`DownloadError::BlobUnavailable`] if the file cannot be fetched.
#[instrument(skip(catalog, blobs, storage_base_url))]
pub async fn open_download(
    catalog: &dyn Catalog,
    blobs: &dyn BlobStore,
    storage_base_url: &str,
    raw_id: &str,
    now: DateTime<Utc>,
) -> Result<Download, DownloadError> {
    let Ok(id) = raw_id.parse::<DownloadVerificationId>() else {
        return Err(DownloadError::NotFoundOrExpired);
    };

    let live = catalog
        .find_live_download(id, now)
        .await?
        .ok_or(DownloadError::NotFoundOrExpired)?;

    let key = BlobKey::from_stored_path(&live.file_path, storage_base_url);
    let object = blobs.get(&key).await.map_err(|e| {
        warn!(error = %e, key = %key, "Error fetching product file");
        e
    })?;

    info!(verification_id = %id, key = %key, size = ?object.size, "Serving download");

    Ok(Download {
        filename: key.attachment_filename(&live.product_name),
        content_length: object.size.unwrap_or(0),
        content_type: object
            .content_type
            .unwrap_or_else(|| DEFAULT_CONTENT_TYPE.to_string()),
        body: object.body,
    })
}
