//! In-memory catalog for tests.

use std::sync::{Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use econ_core::{
    DownloadVerification, DownloadVerificationId, Email, Order, OrderId, Product, ProductId,
    User, UserId,
};

use super::{Catalog, LiveDownload, NewPurchase, RepositoryError};

#[derive(Debug, Default)]
struct Tables {
    products: Vec<Product>,
    users: Vec<User>,
    orders: Vec<Order>,
    verifications: Vec<DownloadVerification>,
}

/// A [`Catalog`] over plain vectors, with the same upsert and expiry rules
/// as the `PostgreSQL` implementation.
#[derive(Debug, Default)]
pub struct MemoryCatalog {
    tables: Mutex<Tables>,
}

impl MemoryCatalog {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed a product.
    pub fn insert_product(&self, product: Product) {
        self.lock().products.push(product);
    }

    /// Seed a download token directly, e.g. one that has already expired.
    pub fn insert_verification(&self, verification: DownloadVerification) {
        self.lock().verifications.push(verification);
    }

    #[must_use]
    pub fn users(&self) -> Vec<User> {
        self.lock().users.clone()
    }

    #[must_use]
    pub fn orders(&self) -> Vec<Order> {
        self.lock().orders.clone()
    }

    #[must_use]
    pub fn verifications(&self) -> Vec<DownloadVerification> {
        self.lock().verifications.clone()
    }

    fn lock(&self) -> MutexGuard<'_, Tables> {
        self.tables.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[async_trait]
impl Catalog for MemoryCatalog {
    async fn ping(&self) -> Result<(), RepositoryError> {
        Ok(())
    }

    async fn find_product(&self, id: ProductId) -> Result<Option<Product>, RepositoryError> {
        Ok(self.lock().products.iter().find(|p| p.id == id).cloned())
    }

    async fn list_available_products(&self) -> Result<Vec<Product>, RepositoryError> {
        let mut products: Vec<Product> = self
            .lock()
            .products
            .iter()
            .filter(|p| p.is_available_for_purchase)
            .cloned()
            .collect();
        products.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(products)
    }

    async fn record_purchase(&self, purchase: &NewPurchase) -> Result<Order, RepositoryError> {
        let mut tables = self.lock();

        let user_id = if let Some(user) = tables.users.iter_mut().find(|u| u.email == purchase.email) {
            user.updated_at = purchase.purchased_at;
            user.id
        } else {
            let user = User {
                id: UserId::generate(),
                email: purchase.email.clone(),
                created_at: purchase.purchased_at,
                updated_at: purchase.purchased_at,
            };
            let id = user.id;
            tables.users.push(user);
            id
        };

        tables.orders.push(Order {
            id: OrderId::generate(),
            product_id: purchase.product_id,
            user_id,
            price_paid_in_cents: purchase.price_paid_in_cents,
            created_at: purchase.purchased_at,
        });

        // max_by keeps the last of equal elements, i.e. the newest insert on ties
        tables
            .orders
            .iter()
            .filter(|o| o.user_id == user_id)
            .max_by(|a, b| a.created_at.cmp(&b.created_at))
            .cloned()
            .ok_or_else(|| RepositoryError::DataCorruption("order vanished after insert".into()))
    }

    async fn create_download_verification(
        &self,
        verification: &DownloadVerification,
    ) -> Result<(), RepositoryError> {
        self.lock().verifications.push(verification.clone());
        Ok(())
    }

    async fn find_live_download(
        &self,
        id: DownloadVerificationId,
        now: DateTime<Utc>,
    ) -> Result<Option<LiveDownload>, RepositoryError> {
        let tables = self.lock();
        let live = tables
            .verifications
            .iter()
            .find(|v| v.id == id && v.is_live(now))
            .and_then(|v| {
                tables
                    .products
                    .iter()
                    .find(|p| p.id == v.product_id)
                    .map(|p| LiveDownload {
                        id: v.id,
                        product_id: p.id,
                        expires_at: v.expires_at,
                        product_name: p.name.clone(),
                        file_path: p.file_path.clone(),
                    })
            });
        Ok(live)
    }

    async fn order_exists(
        &self,
        email: &Email,
        product_id: ProductId,
    ) -> Result<bool, RepositoryError> {
        let tables = self.lock();
        let Some(user) = tables.users.iter().find(|u| &u.email == email) else {
            return Ok(false);
        };
        Ok(tables
            .orders
            .iter()
            .any(|o| o.user_id == user.id && o.product_id == product_id))
    }
}
