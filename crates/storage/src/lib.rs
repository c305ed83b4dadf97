//! Blob storage for econ product files and cover images.
//!
//! The storefront streams product files out of the store and the admin
//! backoffice uploads and removes them. Both talk to a [`BlobStore`] so the
//! backend can be swapped for [`MemoryBlobStore`] in tests.
//!
//! # Example
//!
//! ```no_run
//! use econ_storage::{BlobStore, S3BlobStore, S3Config};
//! use econ_core::BlobKey;
//!
//! # async fn example() -> Result<(), econ_storage::BlobError> {
//! let store = S3BlobStore::new(S3Config::new("econ-site-data", "us-east-2")).await;
//! let object = store.get(&BlobKey::new("products/guide.pdf")).await?;
//! println!("{:?} bytes", object.size);
//! # Ok(())
//! # }
//! ```

#![cfg_attr(not(test), forbid(unsafe_code))]

mod error;
#[cfg(any(test, feature = "test-util"))]
mod memory;
mod s3;

use std::pin::Pin;

use async_trait::async_trait;
use bytes::Bytes;
use futures::Stream;

use econ_core::BlobKey;

pub use error::BlobError;
#[cfg(any(test, feature = "test-util"))]
pub use memory::MemoryBlobStore;
pub use s3::{S3BlobStore, S3Config};

/// Chunked body of a stored object.
pub type BlobStream = Pin<Box<dyn Stream<Item = Result<Bytes, BlobError>> + Send>>;

/// A fetched object: its body plus whatever metadata the backend reported.
pub struct BlobObject {
    pub body: BlobStream,
    pub size: Option<u64>,
    pub content_type: Option<String>,
}

impl std::fmt::Debug for BlobObject {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BlobObject")
            .field("body", &"<stream>")
            .field("size", &self.size)
            .field("content_type", &self.content_type)
            .finish()
    }
}

/// Content-addressed-by-path object storage.
#[async_trait]
pub trait BlobStore: Send + Sync {
    /// Open `key` for streaming.
    ///
    /// # Errors
    ///
    /// [`BlobError::NotFound`] if no object exists under `key`,
    /// [`BlobError::Unavailable`] if the backend could not be reached.
    async fn get(&self, key: &BlobKey) -> Result<BlobObject, BlobError>;

    /// Store `body` under `key`, replacing any existing object, and return
    /// the key it was stored under.
    ///
    /// # Errors
    ///
    /// [`BlobError::Unavailable`] if the write failed.
    async fn put(
        &self,
        key: &BlobKey,
        body: Bytes,
        content_type: Option<&str>,
    ) -> Result<BlobKey, BlobError>;

    /// Remove `key`. Removing an absent key leaves the store unchanged;
    /// backends that can tell report it as [`BlobError::NotFound`].
    ///
    /// # Errors
    ///
    /// [`BlobError::NotFound`] as above, [`BlobError::Unavailable`] if the
    /// delete failed.
    async fn delete(&self, key: &BlobKey) -> Result<(), BlobError>;
}

/// Delete `key`, treating an already-missing object as success.
///
/// # Errors
///
/// Any [`BlobError`] other than [`BlobError::NotFound`].
pub async fn delete_if_exists(store: &dyn BlobStore, key: &BlobKey) -> Result<(), BlobError> {
    match store.delete(key).await {
        Ok(()) | Err(BlobError::NotFound(_)) => Ok(()),
        Err(e) => Err(e),
    }
}
