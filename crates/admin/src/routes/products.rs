//! Product catalog management.

use askama::Template;
use askama_web::WebTemplate;
use axum::{
    Form,
    body::Body,
    extract::{Multipart, Path, State, multipart::MultipartError},
    http::{StatusCode, header},
    response::{IntoResponse, Redirect, Response},
};
use chrono::Utc;
use serde::Deserialize;
use tracing::{info, instrument};

use econ_core::{BlobKey, PriceInCents, Product, ProductId};
use econ_storage::BlobError;

use crate::db::{ProductFields, ProductSummary};
use crate::error::{AppError, Result};
use crate::services::assets::{AssetKind, Upload, remove_stored, store_upload};
use crate::state::AppState;

const PRODUCTS_PATH: &str = "/admin/products";
const DEFAULT_CONTENT_TYPE: &str = "application/octet-stream";

const REQUIRED: &str = "Required";
const NOT_AN_IMAGE: &str = "Must be an image";

/// Product row for the listing.
#[derive(Debug, Clone)]
pub struct ProductRow {
    pub id: String,
    pub name: String,
    pub price: String,
    pub available: bool,
    pub order_count: i64,
}

impl From<ProductSummary> for ProductRow {
    fn from(summary: ProductSummary) -> Self {
        let product = summary.product;
        Self {
            id: product.id.to_string(),
            price: product.price_in_cents.to_string(),
            name: product.name,
            available: product.is_available_for_purchase,
            order_count: summary.order_count,
        }
    }
}

#[derive(Template, WebTemplate)]
#[template(path = "products/index.html")]
pub struct ProductsIndexTemplate {
    pub products: Vec<ProductRow>,
}

/// Text fields as submitted, echoed back when the form is re-rendered.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FormValues {
    pub name: String,
    pub description: String,
    pub price_in_cents: String,
}

impl From<&Product> for FormValues {
    fn from(product: &Product) -> Self {
        Self {
            name: product.name.clone(),
            description: product.description.clone(),
            price_in_cents: product.price_in_cents.cents().to_string(),
        }
    }
}

/// Per-field validation messages.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FormErrors {
    pub name: Option<String>,
    pub description: Option<String>,
    pub price_in_cents: Option<String>,
    pub file: Option<String>,
    pub image: Option<String>,
}

impl FormErrors {
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.name.is_none()
            && self.description.is_none()
            && self.price_in_cents.is_none()
            && self.file.is_none()
            && self.image.is_none()
    }
}

#[derive(Template, WebTemplate)]
#[template(path = "products/form.html")]
pub struct ProductFormTemplate {
    pub heading: &'static str,
    pub action: String,
    pub values: FormValues,
    pub errors: FormErrors,
    pub current_file: Option<String>,
    pub current_image: Option<String>,
}

impl ProductFormTemplate {
    fn new_product(values: FormValues, errors: FormErrors) -> Self {
        Self {
            heading: "Add Product",
            action: PRODUCTS_PATH.to_string(),
            values,
            errors,
            current_file: None,
            current_image: None,
        }
    }

    fn edit_product(product: &Product, values: FormValues, errors: FormErrors) -> Self {
        Self {
            heading: "Edit Product",
            action: format!("{PRODUCTS_PATH}/{}", product.id),
            values,
            errors,
            current_file: Some(product.file_path.clone()),
            current_image: Some(product.image_path.clone()),
        }
    }
}

/// A submitted product form. Empty file inputs are read as `None`.
#[derive(Debug, Default)]
struct ProductForm {
    values: FormValues,
    file: Option<Upload>,
    image: Option<Upload>,
}

impl ProductForm {
    fn price(&self) -> Option<PriceInCents> {
        PriceInCents::parse(&self.values.price_in_cents).ok()
    }

    fn validate(&self, require_assets: bool) -> FormErrors {
        let mut errors = FormErrors::default();
        if self.values.name.trim().is_empty() {
            errors.name = Some(REQUIRED.to_string());
        }
        if self.values.description.trim().is_empty() {
            errors.description = Some(REQUIRED.to_string());
        }
        if let Err(e) = PriceInCents::parse(&self.values.price_in_cents) {
            errors.price_in_cents = Some(e.to_string());
        }
        if require_assets && self.file.is_none() {
            errors.file = Some(REQUIRED.to_string());
        }
        match &self.image {
            None if require_assets => errors.image = Some(REQUIRED.to_string()),
            Some(image) if !image.is_image() => errors.image = Some(NOT_AN_IMAGE.to_string()),
            _ => {}
        }
        errors
    }

    fn fields(&self, price_in_cents: PriceInCents, file_path: String, image_path: String) -> ProductFields {
        ProductFields {
            name: self.values.name.trim().to_string(),
            description: self.values.description.trim().to_string(),
            price_in_cents,
            file_path,
            image_path,
        }
    }
}

fn bad_multipart(e: MultipartError) -> AppError {
    AppError::BadRequest(format!("Invalid form data: {e}"))
}

async fn read_form(mut multipart: Multipart) -> Result<ProductForm> {
    let mut form = ProductForm::default();

    while let Some(field) = multipart.next_field().await.map_err(bad_multipart)? {
        let name = field.name().unwrap_or_default().to_string();
        match name.as_str() {
            "name" => form.values.name = field.text().await.map_err(bad_multipart)?,
            "description" => form.values.description = field.text().await.map_err(bad_multipart)?,
            "priceInCents" => {
                form.values.price_in_cents = field.text().await.map_err(bad_multipart)?;
            }
            "file" | "image" => {
                let upload = Upload {
                    file_name: field.file_name().unwrap_or_default().to_string(),
                    content_type: field.content_type().map(str::to_string),
                    bytes: field.bytes().await.map_err(bad_multipart)?,
                };
                let upload = (!upload.is_empty()).then_some(upload);
                if name == "file" {
                    form.file = upload;
                } else {
                    form.image = upload;
                }
            }
            _ => {}
        }
    }

    Ok(form)
}

fn parse_id(raw: &str) -> Result<ProductId> {
    raw.parse()
        .map_err(|_| AppError::NotFound(format!("product {raw}")))
}

async fn find_product(state: &AppState, raw_id: &str) -> Result<Product> {
    let id = parse_id(raw_id)?;
    state
        .products()
        .find(id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("product {raw_id}")))
}

/// Remove blobs uploaded for a request that then failed. Failures are logged
/// by [`remove_stored`] and otherwise ignored.
async fn discard_uploads(state: &AppState, paths: &[&str]) {
    for path in paths {
        let _ = remove_stored(state.blobs(), path, state.storage_base_url()).await;
    }
}

/// Product listing page.
#[instrument(skip(state))]
pub async fn index(State(state): State<AppState>) -> Result<impl IntoResponse> {
    let products = state
        .products()
        .list_with_order_counts()
        .await?
        .into_iter()
        .map(ProductRow::from)
        .collect();

    Ok(ProductsIndexTemplate { products })
}

/// Empty product form.
pub async fn new_form() -> impl IntoResponse {
    ProductFormTemplate::new_product(FormValues::default(), FormErrors::default())
}

/// Create a product from a multipart form.
#[instrument(skip(state, multipart))]
pub async fn create(State(state): State<AppState>, multipart: Multipart) -> Result<Response> {
    let form = read_form(multipart).await?;
    let errors = form.validate(true);

    let (true, Some(price), Some(file), Some(image)) =
        (errors.is_empty(), form.price(), form.file.as_ref(), form.image.as_ref())
    else {
        let page = ProductFormTemplate::new_product(form.values, errors);
        return Ok((StatusCode::BAD_REQUEST, page).into_response());
    };

    let base = state.storage_base_url();
    let file_path = store_upload(state.blobs(), AssetKind::File, file, base).await?;
    let image_path = match store_upload(state.blobs(), AssetKind::Image, image, base).await {
        Ok(path) => path,
        Err(e) => {
            discard_uploads(&state, &[&file_path]).await;
            return Err(e.into());
        }
    };

    let fields = form.fields(price, file_path, image_path);
    let product = match state.products().create(&fields, Utc::now()).await {
        Ok(product) => product,
        Err(e) => {
            discard_uploads(&state, &[&fields.file_path, &fields.image_path]).await;
            return Err(e.into());
        }
    };

    info!(product_id = %product.id, name = %product.name, "Product created");
    Ok(Redirect::to(PRODUCTS_PATH).into_response())
}

/// Prefilled form for an existing product.
#[instrument(skip(state))]
pub async fn edit_form(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse> {
    let product = find_product(&state, &id).await?;
    let values = FormValues::from(&product);
    Ok(ProductFormTemplate::edit_product(&product, values, FormErrors::default()))
}

/// Update a product from a multipart form.
///
/// A new file or image goes under a fresh key. The blob it replaces is
/// deleted only after the row points at the new one.
#[instrument(skip(state, multipart))]
pub async fn update(
    State(state): State<AppState>,
    Path(id): Path<String>,
    multipart: Multipart,
) -> Result<Response> {
    let product = find_product(&state, &id).await?;
    let form = read_form(multipart).await?;
    let errors = form.validate(false);

    let (true, Some(price)) = (errors.is_empty(), form.price()) else {
        let page = ProductFormTemplate::edit_product(&product, form.values, errors);
        return Ok((StatusCode::BAD_REQUEST, page).into_response());
    };

    let base = state.storage_base_url();
    let new_file = match &form.file {
        Some(file) => Some(store_upload(state.blobs(), AssetKind::File, file, base).await?),
        None => None,
    };
    let new_image = match &form.image {
        Some(image) => match store_upload(state.blobs(), AssetKind::Image, image, base).await {
            Ok(path) => Some(path),
            Err(e) => {
                discard_uploads(&state, &new_file.iter().map(String::as_str).collect::<Vec<_>>())
                    .await;
                return Err(e.into());
            }
        },
        None => None,
    };

    let fields = form.fields(
        price,
        new_file.clone().unwrap_or_else(|| product.file_path.clone()),
        new_image.clone().unwrap_or_else(|| product.image_path.clone()),
    );
    if let Err(e) = state.products().update(product.id, &fields, Utc::now()).await {
        let uploaded: Vec<&str> = new_file.iter().chain(new_image.iter()).map(String::as_str).collect();
        discard_uploads(&state, &uploaded).await;
        return Err(e.into());
    }

    if new_file.is_some() {
        remove_stored(state.blobs(), &product.file_path, base).await?;
    }
    if new_image.is_some() {
        remove_stored(state.blobs(), &product.image_path, base).await?;
    }

    info!(product_id = %product.id, "Product updated");
    Ok(Redirect::to(PRODUCTS_PATH).into_response())
}

#[derive(Debug, Deserialize)]
pub struct AvailabilityForm {
    pub available: bool,
}

/// Make a product available or unavailable for purchase.
#[instrument(skip(state))]
pub async fn set_availability(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Form(form): Form<AvailabilityForm>,
) -> Result<Redirect> {
    let id = parse_id(&id)?;
    state
        .products()
        .set_availability(id, form.available, Utc::now())
        .await?;

    info!(product_id = %id, available = form.available, "Product availability changed");
    Ok(Redirect::to(PRODUCTS_PATH))
}

/// Delete a product that has never been ordered, then its blobs.
#[instrument(skip(state))]
pub async fn delete(State(state): State<AppState>, Path(id): Path<String>) -> Result<Redirect> {
    let id = parse_id(&id)?;
    let product = state.products().delete(id).await?;

    let base = state.storage_base_url();
    let file = remove_stored(state.blobs(), &product.file_path, base).await;
    let image = remove_stored(state.blobs(), &product.image_path, base).await;
    file?;
    image?;

    info!(product_id = %id, name = %product.name, "Product deleted");
    Ok(Redirect::to(PRODUCTS_PATH))
}

/// Stream a product's file to the admin.
#[instrument(skip(state))]
pub async fn download(State(state): State<AppState>, Path(id): Path<String>) -> Result<Response> {
    let product = find_product(&state, &id).await?;
    let key = BlobKey::from_stored_path(&product.file_path, state.storage_base_url());

    let object = state.blobs().get(&key).await.map_err(|e| match e {
        BlobError::NotFound(_) => AppError::NotFound(format!("file for product {id}")),
        other => AppError::Storage(other),
    })?;

    Response::builder()
        .status(StatusCode::OK)
        .header(
            header::CONTENT_DISPOSITION,
            format!(
                "attachment; filename=\"{}\"",
                key.attachment_filename(&product.name)
            ),
        )
        .header(header::CONTENT_LENGTH, object.size.unwrap_or(0))
        .header(
            header::CONTENT_TYPE,
            object
                .content_type
                .unwrap_or_else(|| DEFAULT_CONTENT_TYPE.to_string()),
        )
        .body(Body::from_stream(object.body))
        .map_err(|e| AppError::Internal(format!("Failed to build download response: {e}")))
}
