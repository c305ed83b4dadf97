//! JSON API used by the checkout page.

use axum::{Json, extract::State};
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};

use econ_core::{Email, ProductId};

use crate::error::Result;
use crate::state::AppState;

/// Body of `POST /api/orders/exists`.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderExistsRequest {
    pub email: String,
    pub product_id: String,
}

#[derive(Debug, Serialize, PartialEq, Eq)]
pub struct OrderExistsResponse {
    pub exists: bool,
}

/// Whether `email` already owns an order for the product.
///
/// Unparseable emails or product ids own nothing.
#[instrument(skip(state, body), fields(product_id = %body.product_id))]
pub async fn order_exists(
    State(state): State<AppState>,
    Json(body): Json<OrderExistsRequest>,
) -> Result<Json<OrderExistsResponse>> {
    let (Ok(email), Ok(product_id)) = (
        Email::parse(&body.email),
        body.product_id.parse::<ProductId>(),
    ) else {
        debug!("Order lookup with invalid email or product id");
        return Ok(Json(OrderExistsResponse { exists: false }));
    };

    let exists = state.catalog().order_exists(&email, product_id).await?;
    Ok(Json(OrderExistsResponse { exists }))
}
