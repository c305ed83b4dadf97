//! In-memory blob store for tests.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use bytes::Bytes;
use futures::stream;

use econ_core::BlobKey;

use crate::{BlobError, BlobObject, BlobStore};

const DEFAULT_CHUNK_SIZE: usize = 8 * 1024;

#[derive(Debug, Clone)]
struct StoredBlob {
    body: Bytes,
    content_type: Option<String>,
}

/// A [`BlobStore`] holding objects in a map.
///
/// Bodies are served in fixed-size chunks so callers see a real multi-chunk
/// stream. `fail_with_unavailable` makes every call fail, for exercising
/// error paths.
#[derive(Debug, Default)]
pub struct MemoryBlobStore {
    objects: Mutex<HashMap<String, StoredBlob>>,
    unavailable: AtomicBool,
}

impl MemoryBlobStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed an object directly.
    pub fn insert(&self, key: impl Into<String>, body: impl Into<Bytes>, content_type: Option<&str>) {
        self.lock().insert(
            key.into(),
            StoredBlob {
                body: body.into(),
                content_type: content_type.map(str::to_owned),
            },
        );
    }

    /// Toggle simulated backend outage.
    pub fn fail_with_unavailable(&self, fail: bool) {
        self.unavailable.store(fail, Ordering::SeqCst);
    }

    #[must_use]
    pub fn contains(&self, key: &str) -> bool {
        self.lock().contains_key(key)
    }

    /// Stored keys, sorted.
    #[must_use]
    pub fn keys(&self) -> Vec<String> {
        let mut keys: Vec<String> = self.lock().keys().cloned().collect();
        keys.sort();
        keys
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<String, StoredBlob>> {
        self.objects.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn check_available(&self) -> Result<(), BlobError> {
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(BlobError::Unavailable("memory store marked unavailable".into()));
        }
        Ok(())
    }
}

#[async_trait]
impl BlobStore for MemoryBlobStore {
    async fn get(&self, key: &BlobKey) -> Result<BlobObject, BlobError> {
        self.check_available()?;

        let blob = self
            .lock()
            .get(key.as_str())
            .cloned()
            .ok_or_else(|| BlobError::NotFound(key.to_string()))?;

        let size = u64::try_from(blob.body.len()).ok();
        let chunks: Vec<Result<Bytes, BlobError>> = blob
            .body
            .chunks(DEFAULT_CHUNK_SIZE)
            .map(|chunk| Ok(Bytes::copy_from_slice(chunk)))
            .collect();

        Ok(BlobObject {
            body: Box::pin(stream::iter(chunks)),
            size,
            content_type: blob.content_type,
        })
    }

    async fn put(
        &self,
        key: &BlobKey,
        body: Bytes,
        content_type: Option<&str>,
    ) -> Result<BlobKey, BlobError> {
        self.check_available()?;
        if key.as_str().trim().is_empty() {
            return Err(BlobError::InvalidKey(key.to_string()));
        }
        self.insert(key.as_str(), body, content_type);
        Ok(key.clone())
    }

    async fn delete(&self, key: &BlobKey) -> Result<(), BlobError> {
        self.check_available()?;
        self.lock()
            .remove(key.as_str())
            .map(|_| ())
            .ok_or_else(|| BlobError::NotFound(key.to_string()))
    }
}
