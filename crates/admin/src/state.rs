//! Application state shared across handlers.

use std::sync::Arc;

use econ_storage::BlobStore;

use crate::db::ProductRepository;
use crate::middleware::BasicAuth;

/// Application state shared across all handlers.
///
/// This struct is cheaply cloneable via `Arc`.
#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppStateInner>,
}

struct AppStateInner {
    auth: BasicAuth,
    storage_base_url: String,
    products: Arc<dyn ProductRepository>,
    blobs: Arc<dyn BlobStore>,
}

impl AppState {
    /// Create a new application state.
    #[must_use]
    pub fn new(
        auth: BasicAuth,
        storage_base_url: impl Into<String>,
        products: Arc<dyn ProductRepository>,
        blobs: Arc<dyn BlobStore>,
    ) -> Self {
        Self {
            inner: Arc::new(AppStateInner {
                auth,
                storage_base_url: storage_base_url.into(),
                products,
                blobs,
            }),
        }
    }

    #[must_use]
    pub fn auth(&self) -> &BasicAuth {
        &self.inner.auth
    }

    /// Public URL prefix of stored product paths.
    #[must_use]
    pub fn storage_base_url(&self) -> &str {
        &self.inner.storage_base_url
    }

    #[must_use]
    pub fn products(&self) -> &dyn ProductRepository {
        self.inner.products.as_ref()
    }

    #[must_use]
    pub fn blobs(&self) -> &dyn BlobStore {
        self.inner.blobs.as_ref()
    }
}
