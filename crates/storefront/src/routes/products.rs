//! Product listing.

use askama::Template;
use askama_web::WebTemplate;
use axum::{extract::State, response::IntoResponse};
use tracing::instrument;

use econ_core::Product;

use crate::error::Result;
use crate::filters;
use crate::state::AppState;

/// Product display data for templates.
#[derive(Debug, Clone)]
pub struct ProductView {
    pub name: String,
    pub description: String,
    pub price: String,
    pub image_url: String,
}

impl From<Product> for ProductView {
    fn from(product: Product) -> Self {
        Self {
            price: product.price_in_cents.to_string(),
            name: product.name,
            description: product.description,
            image_url: product.image_path,
        }
    }
}

/// Product listing page template.
#[derive(Template, WebTemplate)]
#[template(path = "products/index.html")]
pub struct ProductsIndexTemplate {
    pub products: Vec<ProductView>,
}

/// `GET /products`: everything currently for sale, by name.
#[instrument(skip(state))]
pub async fn index(State(state): State<AppState>) -> Result<impl IntoResponse> {
    let products = state
        .catalog()
        .list_available_products()
        .await?
        .into_iter()
        .map(ProductView::from)
        .collect();

    Ok(ProductsIndexTemplate { products })
}
