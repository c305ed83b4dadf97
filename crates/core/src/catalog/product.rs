//! Product record.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::types::{PriceInCents, ProductId};

/// A digital product in the catalog.
///
/// `file_path` and `image_path` are blob keys in the object store. Rows
/// written before the move to object storage may hold a full public URL
/// instead; see [`crate::BlobKey::from_stored_path`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "postgres", derive(sqlx::FromRow))]
pub struct Product {
    pub id: ProductId,
    pub name: String,
    pub description: String,
    pub price_in_cents: PriceInCents,
    pub file_path: String,
    pub image_path: String,
    /// New products start hidden from the storefront.
    pub is_available_for_purchase: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}
