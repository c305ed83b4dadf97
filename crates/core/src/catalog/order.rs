//! Order record.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::types::{OrderId, ProductId, UserId};

/// One successful charge for one product. Never updated after insert.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "postgres", derive(sqlx::FromRow))]
pub struct Order {
    pub id: OrderId,
    pub product_id: ProductId,
    pub user_id: UserId,
    /// The amount actually captured, which may differ from the list price.
    pub price_paid_in_cents: i32,
    pub created_at: DateTime<Utc>,
}
