//! Database operations for the admin backoffice.
//!
//! The admin owns writes to `products`. It reads `orders` only to count them
//! and to refuse deleting a product that has been sold.
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

use econ_core::{PriceInCents, Product, ProductId};

#[cfg(any(test, feature = "test-util"))]
pub use memory::MemoryProductRepository;
pub use postgres::PgProductRepository;

/// Errors that can occur during repository operations.
#[derive(Debug, Error)]
pub enum RepositoryError {
    /// Database error from sqlx.
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Data in the database is corrupted or invalid.
    #[error("data corruption: {0}")]
    DataCorruption(String),

    /// Requested entity was not found.
    #[error("not found")]
    NotFound,

    /// Constraint violation (e.g., deleting a product that has orders).
    #[error("constraint violation: {0}")]
    Conflict(String),
}

/// A product with how many times it has sold.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProductSummary {
    pub product: Product,
    pub order_count: i64,
}

/// Editable product fields. Availability is managed separately.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProductFields {
    pub name: String,
    pub description: String,
    pub price_in_cents: PriceInCents,
    pub file_path: String,
    pub image_path: String,
}

/// Admin access to the product catalog.
#[async_trait]
pub trait ProductRepository: Send + Sync {
    /// Check that the store is reachable.
    async fn ping(&self) -> Result<(), RepositoryError>;

    /// Every product with its order count, by name.
    async fn list_with_order_counts(&self) -> Result<Vec<ProductSummary>, RepositoryError>;

    async fn find(&self, id: ProductId) -> Result<Option<Product>, RepositoryError>;

    /// Insert a new product. New products are never available for purchase.
    async fn create(
        &self,
        fields: &ProductFields,
        now: DateTime<Utc>,
    ) -> Result<Product, RepositoryError>;

    /// Overwrite the editable fields of a product.
    ///
    /// Returns [`RepositoryError::NotFound`] if the product does not exist.
    async fn update(
        &self,
        id: ProductId,
        fields: &ProductFields,
        now: DateTime<Utc>,
    ) -> Result<Product, RepositoryError>;

    /// Returns [`RepositoryError::NotFound`] if the product does not exist.
    async fn set_availability(
        &self,
        id: ProductId,
        available: bool,
        now: DateTime<Utc>,
    ) -> Result<Product, RepositoryError>;

    /// Delete a product and its download tokens, returning the deleted row.
    ///
    /// Returns [`RepositoryError::NotFound`] if the product does not exist and
    /// [`RepositoryError::Conflict`] if orders reference it.
    async fn delete(&self, id: ProductId) -> Result<Product, RepositoryError>;
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
