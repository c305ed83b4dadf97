//! `PostgreSQL` catalog.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use tracing::instrument;

use econ_core::{
    DownloadVerification, DownloadVerificationId, Email, Order, OrderId, Product, ProductId,
    UserId,
};

use super::{Catalog, LiveDownload, NewPurchase, RepositoryError};

const PRODUCT_COLUMNS: &str = "id, name, description, price_in_cents, file_path, image_path, \
     is_available_for_purchase, created_at, updated_at";

/// Catalog backed by the shared `PostgreSQL` database.
#[derive(Clone)]
pub struct PgCatalog {
    pool: PgPool,
}

impl PgCatalog {
    #[must_use]
    pub const fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl Catalog for PgCatalog {
    async fn ping(&self) -> Result<(), RepositoryError> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }

    #[instrument(skip(self), fields(product_id = %id))]
    async fn find_product(&self, id: ProductId) -> Result<Option<Product>, RepositoryError> {
        let product = sqlx::query_as::<_, Product>(&format!(
            "SELECT {PRODUCT_COLUMNS} FROM products WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(product)
    }

    #[instrument(skip(self))]
    async fn list_available_products(&self) -> Result<Vec<Product>, RepositoryError> {
        let products = sqlx::query_as::<_, Product>(&format!(
            "SELECT {PRODUCT_COLUMNS} FROM products \
             WHERE is_available_for_purchase = TRUE \
             ORDER BY name ASC"
        ))
        .fetch_all(&self.pool)
        .await?;

        Ok(products)
    }

    #[instrument(skip(self, purchase), fields(product_id = %purchase.product_id))]
    async fn record_purchase(&self, purchase: &NewPurchase) -> Result<Order, RepositoryError> {
        let mut tx = self.pool.begin().await?;

        // The unique constraint on email serializes concurrent first purchases
        // by the same buyer onto a single row.
        let user_id: UserId = sqlx::query_scalar(
            r"
            INSERT INTO users (id, email, created_at, updated_at)
            VALUES ($1, $2, $3, $3)
            ON CONFLICT (email) DO UPDATE SET updated_at = EXCLUDED.updated_at
            RETURNING id
            ",
        )
        .bind(UserId::generate())
        .bind(&purchase.email)
        .bind(purchase.purchased_at)
        .fetch_one(&mut *tx)
        .await?;

        // A later purchase by the same buyer waits on the user row above, so
        // the database clock orders it after every order it can read back.
        sqlx::query(
            r"
            INSERT INTO orders (id, product_id, user_id, price_paid_in_cents, created_at)
            VALUES ($1, $2, $3, $4, clock_timestamp())
            ",
        )
        .bind(OrderId::generate())
        .bind(purchase.product_id)
        .bind(user_id)
        .bind(purchase.price_paid_in_cents)
        .execute(&mut *tx)
        .await?;

        let order = sqlx::query_as::<_, Order>(
            r"
            SELECT id, product_id, user_id, price_paid_in_cents, created_at
            FROM orders
            WHERE user_id = $1
            ORDER BY created_at DESC, id DESC
            LIMIT 1
            ",
        )
        .bind(user_id)
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;

        Ok(order)
    }

    #[instrument(skip(self, verification), fields(verification_id = %verification.id))]
    async fn create_download_verification(
        &self,
        verification: &DownloadVerification,
    ) -> Result<(), RepositoryError> {
        sqlx::query(
            r"
            INSERT INTO download_verifications (id, product_id, expires_at, created_at)
            VALUES ($1, $2, $3, $4)
            ",
        )
        .bind(verification.id)
        .bind(verification.product_id)
        .bind(verification.expires_at)
        .bind(verification.created_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    #[instrument(skip(self), fields(verification_id = %id))]
    async fn find_live_download(
        &self,
        id: DownloadVerificationId,
        now: DateTime<Utc>,
    ) -> Result<Option<LiveDownload>, RepositoryError> {
        let download = sqlx::query_as::<_, LiveDownload>(
            r"
            SELECT dv.id, dv.product_id, dv.expires_at,
                   p.name AS product_name, p.file_path
            FROM download_verifications dv
            JOIN products p ON p.id = dv.product_id
            WHERE dv.id = $1 AND dv.expires_at > $2
            ",
        )
        .bind(id)
        .bind(now)
        .fetch_optional(&self.pool)
        .await?;

        Ok(download)
    }

    #[instrument(skip(self, email), fields(product_id = %product_id))]
    async fn order_exists(
        &self,
        email: &Email,
        product_id: ProductId,
    ) -> Result<bool, RepositoryError> {
        let exists: bool = sqlx::query_scalar(
            r"
            SELECT EXISTS (
                SELECT 1
                FROM orders o
                JOIN users u ON u.id = o.user_id
                WHERE u.email = $1 AND o.product_id = $2
            )
            ",
        )
        .bind(email)
        .bind(product_id)
        .fetch_one(&self.pool)
        .await?;

        Ok(exists)
    }
}
