//! In-memory product repository for tests.

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use econ_core::{Product, ProductId};

use super::{ProductFields, ProductRepository, ProductSummary, RepositoryError};

#[derive(Debug, Default)]
struct Tables {
    products: Vec<Product>,
    order_counts: HashMap<ProductId, i64>,
}

/// A [`ProductRepository`] over plain collections, enforcing the same
/// restrict-on-orders rule as the database.
#[derive(Debug, Default)]
pub struct MemoryProductRepository {
    tables: Mutex<Tables>,
}

impl MemoryProductRepository {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed a product.
    pub fn insert(&self, product: Product) {
        self.lock().products.push(product);
    }

    /// Record that `product_id` has been sold once more.
    pub fn record_order(&self, product_id: ProductId) {
        *self.lock().order_counts.entry(product_id).or_insert(0) += 1;
    }

    #[must_use]
    pub fn products(&self) -> Vec<Product> {
        self.lock().products.clone()
    }

    fn lock(&self) -> MutexGuard<'_, Tables> {
        self.tables.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[async_trait]
impl ProductRepository for MemoryProductRepository {
    async fn ping(&self) -> Result<(), RepositoryError> {
        Ok(())
    }

    async fn list_with_order_counts(&self) -> Result<Vec<ProductSummary>, RepositoryError> {
        let tables = self.lock();
        let mut summaries: Vec<ProductSummary> = tables
            .products
            .iter()
            .map(|p| ProductSummary {
                product: p.clone(),
                order_count: tables.order_counts.get(&p.id).copied().unwrap_or(0),
            })
            .collect();
        summaries.sort_by(|a, b| a.product.name.cmp(&b.product.name));
        Ok(summaries)
    }

    async fn find(&self, id: ProductId) -> Result<Option<Product>, RepositoryError> {
        Ok(self.lock().products.iter().find(|p| p.id == id).cloned())
    }

    async fn create(
        &self,
        fields: &ProductFields,
        now: DateTime<Utc>,
    ) -> Result<Product, RepositoryError> {
        let product = Product {
            id: ProductId::generate(),
            name: fields.name.clone(),
            description: fields.description.clone(),
            price_in_cents: fields.price_in_cents,
            file_path: fields.file_path.clone(),
            image_path: fields.image_path.clone(),
            is_available_for_purchase: false,
            created_at: now,
            updated_at: now,
        };
        self.lock().products.push(product.clone());
        Ok(product)
    }

    async fn update(
        &self,
        id: ProductId,
        fields: &ProductFields,
        now: DateTime<Utc>,
    ) -> Result<Product, RepositoryError> {
        let mut tables = self.lock();
        let product = tables
            .products
            .iter_mut()
            .find(|p| p.id == id)
            .ok_or(RepositoryError::NotFound)?;
        product.name.clone_from(&fields.name);
        product.description.clone_from(&fields.description);
        product.price_in_cents = fields.price_in_cents;
        product.file_path.clone_from(&fields.file_path);
        product.image_path.clone_from(&fields.image_path);
        product.updated_at = now;
        Ok(product.clone())
    }

    async fn set_availability(
        &self,
        id: ProductId,
        available: bool,
        now: DateTime<Utc>,
    ) -> Result<Product, RepositoryError> {
        let mut tables = self.lock();
        let product = tables
            .products
            .iter_mut()
            .find(|p| p.id == id)
            .ok_or(RepositoryError::NotFound)?;
        product.is_available_for_purchase = available;
        product.updated_at = now;
        Ok(product.clone())
    }

    async fn delete(&self, id: ProductId) -> Result<Product, RepositoryError> {
        let mut tables = self.lock();
        let index = tables
            .products
            .iter()
            .position(|p| p.id == id)
            .ok_or(RepositoryError::NotFound)?;
        if tables.order_counts.get(&id).copied().unwrap_or(0) > 0 {
            return Err(RepositoryError::Conflict(
                "product has orders and cannot be deleted".to_string(),
            ));
        }
        Ok(tables.products.remove(index))
    }
}
