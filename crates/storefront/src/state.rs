//! Application state shared across handlers.

use std::sync::Arc;

use secrecy::SecretString;

use econ_storage::BlobStore;

use crate::config::StorefrontConfig;
use crate::db::Catalog;
use crate::services::email::ReceiptMailer;
use crate::services::payments::WebhookVerifier;

/// The collaborators a running storefront talks to.
///
/// Built once in `main` (or by a test harness) and handed to [`AppState`].
pub struct Services {
    pub catalog: Arc<dyn Catalog>,
    pub blobs: Arc<dyn BlobStore>,
    pub mailer: Arc<dyn ReceiptMailer>,
}

/// Application state shared across all handlers.
///
/// This struct is cheaply cloneable via `Arc` and provides access to
/// the catalog store, the blob store and the receipt mailer.
#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppStateInner>,
}

struct AppStateInner {
    base_url: String,
    storage_base_url: String,
    verifier: WebhookVerifier,
    catalog: Arc<dyn Catalog>,
    blobs: Arc<dyn BlobStore>,
    mailer: Arc<dyn ReceiptMailer>,
}

impl AppState {
    /// Create the state for a configured storefront.
    #[must_use]
    pub fn new(config: &StorefrontConfig, services: Services) -> Self {
        Self::with_settings(
            &config.base_url,
            &config.storage.base_url,
            config.stripe_webhook_secret.clone(),
            services,
        )
    }

    /// Create the state from individual settings, without a full config.
    #[must_use]
    pub fn with_settings(
        base_url: &str,
        storage_base_url: &str,
        webhook_secret: SecretString,
        services: Services,
    ) -> Self {
        Self {
            inner: Arc::new(AppStateInner {
                base_url: base_url.trim_end_matches('/').to_string(),
                storage_base_url: storage_base_url.to_string(),
                verifier: WebhookVerifier::new(webhook_secret),
                catalog: services.catalog,
                blobs: services.blobs,
                mailer: services.mailer,
            }),
        }
    }

    /// Public base URL of the storefront, without a trailing slash.
    #[must_use]
    pub fn base_url(&self) -> &str {
        &self.inner.base_url
    }

    /// Prefix stripped from stored product paths to get blob keys.
    #[must_use]
    pub fn storage_base_url(&self) -> &str {
        &self.inner.storage_base_url
    }

    #[must_use]
    pub fn verifier(&self) -> &WebhookVerifier {
        &self.inner.verifier
    }

    #[must_use]
    pub fn catalog(&self) -> &dyn Catalog {
        self.inner.catalog.as_ref()
    }

    #[must_use]
    pub fn blobs(&self) -> &dyn BlobStore {
        self.inner.blobs.as_ref()
    }

    #[must_use]
    pub fn mailer(&self) -> &dyn ReceiptMailer {
        self.inner.mailer.as_ref()
    }
}
