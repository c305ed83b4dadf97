//! `PostgreSQL` product repository.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use tracing::instrument;

use econ_core::{Product, ProductId};

use super::{ProductFields, ProductRepository, ProductSummary, RepositoryError};

const PRODUCT_COLUMNS: &str = "id, name, description, price_in_cents, file_path, image_path, \
     is_available_for_purchase, created_at, updated_at";

/// Internal row type for the product list query.
#[derive(Debug, sqlx::FromRow)]
struct ProductSummaryRow {
    #[sqlx(flatten)]
    product: Product,
    order_count: i64,
}

/// Product repository backed by the shared `PostgreSQL` database.
#[derive(Clone)]
pub struct PgProductRepository {
    pool: PgPool,
}

impl PgProductRepository {
    #[must_use]
    pub const fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ProductRepository for PgProductRepository {
    async fn ping(&self) -> Result<(), RepositoryError> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }

    #[instrument(skip(self))]
    async fn list_with_order_counts(&self) -> Result<Vec<ProductSummary>, RepositoryError> {
        let rows = sqlx::query_as::<_, ProductSummaryRow>(
            r"
            SELECT p.id, p.name, p.description, p.price_in_cents, p.file_path, p.image_path,
                   p.is_available_for_purchase, p.created_at, p.updated_at,
                   COUNT(o.id) AS order_count
            FROM products p
            LEFT JOIN orders o ON o.product_id = p.id
            GROUP BY p.id
            ORDER BY p.name ASC
            ",
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .into_iter()
            .map(|row| ProductSummary {
                product: row.product,
                order_count: row.order_count,
            })
            .collect())
    }

    #[instrument(skip(self), fields(product_id = %id))]
    async fn find(&self, id: ProductId) -> Result<Option<Product>, RepositoryError> {
        let product = sqlx::query_as::<_, Product>(&format!(
            "SELECT {PRODUCT_COLUMNS} FROM products WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(product)
    }

    #[instrument(skip(self, fields), fields(name = %fields.name))]
    async fn create(
        &self,
        fields: &ProductFields,
        now: DateTime<Utc>,
    ) -> Result<Product, RepositoryError> {
        let product = sqlx::query_as::<_, Product>(&format!(
            r"
            INSERT INTO products
                (id, name, description, price_in_cents, file_path, image_path,
                 is_available_for_purchase, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, FALSE, $7, $7)
            RETURNING {PRODUCT_COLUMNS}
            "
        ))
        .bind(ProductId::generate())
        .bind(&fields.name)
        .bind(&fields.description)
        .bind(fields.price_in_cents)
        .bind(&fields.file_path)
        .bind(&fields.image_path)
        .bind(now)
        .fetch_one(&self.pool)
        .await?;

        Ok(product)
    }

    #[instrument(skip(self, fields), fields(product_id = %id))]
    async fn update(
        &self,
        id: ProductId,
        fields: &ProductFields,
        now: DateTime<Utc>,
    ) -> Result<Product, RepositoryError> {
        sqlx::query_as::<_, Product>(&format!(
            r"
            UPDATE products
            SET name = $2, description = $3, price_in_cents = $4,
                file_path = $5, image_path = $6, updated_at = $7
            WHERE id = $1
            RETURNING {PRODUCT_COLUMNS}
            "
        ))
        .bind(id)
        .bind(&fields.name)
        .bind(&fields.description)
        .bind(fields.price_in_cents)
        .bind(&fields.file_path)
        .bind(&fields.image_path)
        .bind(now)
        .fetch_optional(&self.pool)
        .await?
        .ok_or(RepositoryError::NotFound)
    }

    #[instrument(skip(self), fields(product_id = %id))]
    async fn set_availability(
        &self,
        id: ProductId,
        available: bool,
        now: DateTime<Utc>,
    ) -> Result<Product, RepositoryError> {
        sqlx::query_as::<_, Product>(&format!(
            r"
            UPDATE products
            SET is_available_for_purchase = $2, updated_at = $3
            WHERE id = $1
            RETURNING {PRODUCT_COLUMNS}
            "
        ))
        .bind(id)
        .bind(available)
        .bind(now)
        .fetch_optional(&self.pool)
        .await?
        .ok_or(RepositoryError::NotFound)
    }

    #[instrument(skip(self), fields(product_id = %id))]
    async fn delete(&self, id: ProductId) -> Result<Product, RepositoryError> {
        let result = sqlx::query_as::<_, Product>(&format!(
            "DELETE FROM products WHERE id = $1 RETURNING {PRODUCT_COLUMNS}"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await;

        match result {
            Ok(Some(product)) => Ok(product),
            Ok(None) => Err(RepositoryError::NotFound),
            // orders.product_id is ON DELETE RESTRICT
            Err(sqlx::Error::Database(e)) if e.is_foreign_key_violation() => Err(
                RepositoryError::Conflict("product has orders and cannot be deleted".to_string()),
            ),
            Err(e) => Err(e.into()),
        }
    }
}
