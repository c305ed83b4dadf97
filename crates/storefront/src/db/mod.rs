//! Database operations for the storefront.
//!
//! # Tables
//!
//! - `products` - Catalog, read-only from the storefront
//! - `users` - Buyers, upserted by email on each purchase
//! - `orders` - One row per successful charge
//! - `download_verifications` - 24 hour download tokens
//!
//! # Migrations
//!
//! Migrations live in `migrations/` at the workspace root and run via:
//! ```bash
//! cargo run -p econ-cli -- migrate
//! ```

#[cfg(any(test, feature = "test-util"))]
mod memory;
mod postgres;

use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use secrecy::ExposeSecret;
use sqlx::PgPool;
use sqlx::postgres::PgPoolOptions;
use thiserror::Error;

use econ_core::{DownloadVerification, DownloadVerificationId, Email, Order, Product, ProductId};

#[cfg(any(test, feature = "test-util"))]
pub use memory::MemoryCatalog;
pub use postgres::PgCatalog;

/// Errors from catalog operations.
#[derive(Debug, Error)]
pub enum RepositoryError {
    /// Database query failed.
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// A stored row violates a domain invariant.
    #[error("Data corruption: {0}")]
    DataCorruption(String),
}

/// A purchase to record: the buyer and what they paid.
#[derive(Debug, Clone)]
pub struct NewPurchase {
    pub email: Email,
    pub product_id: ProductId,
    pub price_paid_in_cents: i32,
    pub purchased_at: DateTime<Utc>,
}

/// A live download token joined with the product it grants.
#[derive(Debug, Clone, PartialEq, Eq, sqlx::FromRow)]
pub struct LiveDownload {
    pub id: DownloadVerificationId,
    pub product_id: ProductId,
    pub expires_at: DateTime<Utc>,
    pub product_name: String,
    pub file_path: String,
}

/// Storefront access to the catalog store.
#[async_trait]
pub trait Catalog: Send + Sync {
    /// Check that the store is reachable.
    async fn ping(&self) -> Result<(), RepositoryError>;

    /// Look up a product by id, regardless of availability.
    async fn find_product(&self, id: ProductId) -> Result<Option<Product>, RepositoryError>;

    /// Products currently offered for sale, ordered by name.
    async fn list_available_products(&self) -> Result<Vec<Product>, RepositoryError>;

    /// Upsert the buyer by email and insert one order, atomically. Returns the
    /// buyer's most recently created order.
    async fn record_purchase(&self, purchase: &NewPurchase) -> Result<Order, RepositoryError>;

    /// Persist a freshly minted download token.
    async fn create_download_verification(
        &self,
        verification: &DownloadVerification,
    ) -> Result<(), RepositoryError>;

    /// The token `id` with its product, if it exists and `now` is before its
    /// expiry. Unknown and expired tokens are indistinguishable.
    async fn find_live_download(
        &self,
        id: DownloadVerificationId,
        now: DateTime<Utc>,
    ) -> Result<Option<LiveDownload>, RepositoryError>;

    /// Whether `email` already owns an order for `product_id`.
    async fn order_exists(
        &self,
        email: &Email,
        product_id: ProductId,
    ) -> Result<bool, RepositoryError>;
}

/// Create a `PostgreSQL` connection pool with sensible defaults.
///
/// # Errors
///
/// Returns `sqlx::Error` if the connection cannot be established.
pub async fn create_pool(database_url: &secrecy::SecretString) -> Result<PgPool, sqlx::Error> {
    PgPoolOptions::new()
        .max_connections(10)
        .min_connections(2)
        .acquire_timeout(Duration::from_secs(10))
        .connect(database_url.expose_secret())
        .await
}
