//! Product file and cover image storage.
//!
//! Uploads go under a fresh `<prefix>/<uuid>-<name>` key so a replacement
//! never overwrites the blob an existing product row still points at. The
//! catalog stores the public URL of each key.

use bytes::Bytes;
use tracing::{info, instrument, warn};

use econ_core::{BlobKey, PRODUCT_FILE_PREFIX, PRODUCT_IMAGE_PREFIX};
use econ_storage::{BlobError, BlobStore, delete_if_exists};

/// Which of a product's two blobs an upload is.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AssetKind {
    /// The downloadable product file.
    File,
    /// The cover image shown on the storefront.
    Image,
}

impl AssetKind {
    const fn prefix(self) -> &'static str {
        match self {
            Self::File => PRODUCT_FILE_PREFIX,
            Self::Image => PRODUCT_IMAGE_PREFIX,
        }
    }
}

/// One file from a multipart form.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Upload {
    pub file_name: String,
    pub content_type: Option<String>,
    pub bytes: Bytes,
}

impl Upload {
    /// Browsers submit an empty part when no file was chosen.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    #[must_use]
    pub fn is_image(&self) -> bool {
        self.content_type
            .as_deref()
            .is_some_and(|ct| ct.starts_with("image/"))
    }
}

/// Store `upload` under a fresh key and return the path to save on the product.
///
/// # Errors
///
/// Returns [`BlobError`] if the store rejects the write.
#[instrument(skip(blobs, upload, storage_base_url), fields(file_name = %upload.file_name, size = upload.bytes.len()))]
pub async fn store_upload(
    blobs: &dyn BlobStore,
    kind: AssetKind,
    upload: &Upload,
    storage_base_url: &str,
) -> Result<String, BlobError> {
    let key = BlobKey::for_upload(kind.prefix(), &upload.file_name);
    let key = blobs
        .put(&key, upload.bytes.clone(), upload.content_type.as_deref())
        .await?;
    info!(key = %key, "Stored product asset");
    Ok(key.stored_path(storage_base_url))
}

/// Remove the blob behind a stored product path. A blob that is already gone
/// is not an error.
///
/// # Errors
///
/// Returns [`BlobError`] for any failure other than a missing blob.
pub async fn remove_stored(
    blobs: &dyn BlobStore,
    stored_path: &str,
    storage_base_url: &str,
) -> Result<(), BlobError> {
    let key = BlobKey::from_stored_path(stored_path, storage_base_url);
    delete_if_exists(blobs, &key).await.inspect_err(|e| {
        warn!(error = %e, key = %key, "Failed to remove product asset");
    })
}
