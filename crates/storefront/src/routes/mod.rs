//! HTTP route handlers for the storefront.
//!
//! # Route Structure
//!
//! ```text
//! GET  /health                          - Liveness
//! GET  /health/ready                    - Readiness (catalog store reachable)
//!
//! # Catalog
//! GET  /products                        - Products for sale
//!
//! # Downloads
//! GET  /products/download               - Missing token page
//! GET  /products/download/expired       - Link expired page
//! GET  /products/download/{id}          - Stream the product file
//!
//! # Payments
//! POST /webhooks/stripe                 - Stripe event delivery
//!
//! # API
//! POST /api/orders/exists               - Has this email bought this product
//! ```

pub mod api;
pub mod downloads;
pub mod products;
pub mod webhooks;

use axum::{
    Router,
    extract::State,
    http::StatusCode,
    routing::{get, post},
};

use crate::state::AppState;

/// Create the product and download routes router.
pub fn product_routes() -> Router<AppState> {
    Router::new()
        .route("/products", get(products::index))
        .route("/products/download", get(downloads::missing_token))
        .route("/products/download/", get(downloads::missing_token))
        .route("/products/download/expired", get(downloads::expired))
        .route("/products/download/{id}", get(downloads::download))
}

/// Build all routes.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/health", get(health))
        .route("/health/ready", get(readiness))
        .merge(product_routes())
        .route("/webhooks/stripe", post(webhooks::stripe))
        .route("/api/orders/exists", post(api::order_exists))
}

/// Liveness health check endpoint.
///
/// Returns "ok" if the server is running. Does not check dependencies.
async fn health() -> &'static str {
    "ok"
}

/// Readiness health check endpoint.
///
/// Returns 503 Service Unavailable if the catalog store is not reachable.
async fn readiness(State(state): State<AppState>) -> StatusCode {
    match state.catalog().ping().await {
        Ok(()) => StatusCode::OK,
        Err(e) => {
            tracing::warn!(error = %e, "Readiness check failed");
            StatusCode::SERVICE_UNAVAILABLE
        }
    }
}
