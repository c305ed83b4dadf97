//! End-to-end purchase flow across the admin and storefront routers.
//!
//! Both routers share one in-memory blob store, as both binaries share one
//! bucket in production. The product row the admin creates is copied into the
//! storefront's catalog, standing in for the shared database.

#![allow(clippy::unwrap_used, clippy::indexing_slicing)]

use std::sync::Arc;

use axum::{
    Router,
    body::Body,
    http::{Request, StatusCode, header},
};
use chrono::Utc;
use secrecy::SecretString;

use econ_admin::db::MemoryProductRepository;
use econ_admin::middleware::{BasicAuth, hash_password};
use econ_integration_tests::{
    MultipartBuilder, STORAGE_BASE_URL, STOREFRONT_BASE_URL, WEBHOOK_SECRET, basic_auth,
    body_bytes, charge_succeeded_event, multipart_request, send,
};
use econ_storage::MemoryBlobStore;
use econ_storefront::db::MemoryCatalog;
use econ_storefront::services::email::RecordingMailer;
use econ_storefront::services::payments::{SIGNATURE_HEADER, sign_payload};
use econ_storefront::state::Services;

const OWNER: &str = "owner";
const OWNER_PASSWORD: &str = "tr0mbone-Lantern";
const PRODUCT_FILE: &[u8] = b"%PDF-1.7 game theory lecture slides";

struct Store {
    blobs: Arc<MemoryBlobStore>,
    products: Arc<MemoryProductRepository>,
    catalog: Arc<MemoryCatalog>,
    mailer: Arc<RecordingMailer>,
    admin: Router,
    storefront: Router,
}

impl Store {
    fn new() -> Self {
        let blobs = Arc::new(MemoryBlobStore::new());
        let products = Arc::new(MemoryProductRepository::new());
        let catalog = Arc::new(MemoryCatalog::new());
        let mailer = Arc::new(RecordingMailer::new());

        let admin_state = econ_admin::state::AppState::new(
            BasicAuth::new(
                OWNER.to_string(),
                SecretString::from(hash_password(OWNER_PASSWORD)),
            ),
            STORAGE_BASE_URL,
            products.clone(),
            blobs.clone(),
        );
        let storefront_state = econ_storefront::state::AppState::with_settings(
            STOREFRONT_BASE_URL,
            STORAGE_BASE_URL,
            SecretString::from(WEBHOOK_SECRET.to_string()),
            Services {
                catalog: catalog.clone(),
                blobs: blobs.clone(),
                mailer: mailer.clone(),
            },
        );

        Self {
            blobs,
            products,
            catalog,
            mailer,
            admin: econ_admin::app(admin_state, 10 * 1024 * 1024),
            storefront: econ_storefront::app(storefront_state),
        }
    }

    /// Create and activate a product through the admin, then publish the row
    /// to the storefront catalog.
    async fn publish_product(&self) -> econ_core::Product {
        let form = MultipartBuilder::new()
            .text("name", "Game Theory")
            .text("priceInCents", "1999")
            .text("description", "Lecture slides")
            .file("file", "slides.pdf", "application/pdf", PRODUCT_FILE)
            .file("image", "cover.png", "image/png", b"\x89PNG");
        let response = send(
            &self.admin,
            multipart_request("/admin/products", &basic_auth(OWNER, OWNER_PASSWORD), form),
        )
        .await;
        assert_eq!(response.status(), StatusCode::SEE_OTHER);

        let id = self.products.products()[0].id;
        let response = send(
            &self.admin,
            Request::builder()
                .method("POST")
                .uri(format!("/admin/products/{id}/availability"))
                .header(header::AUTHORIZATION, basic_auth(OWNER, OWNER_PASSWORD))
                .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
                .body(Body::from("available=true"))
                .unwrap(),
        )
        .await;
        assert_eq!(response.status(), StatusCode::SEE_OTHER);

        let product = self.products.products()[0].clone();
        self.catalog.insert_product(product.clone());
        product
    }

    async fn deliver(&self, payload: &str) -> StatusCode {
        let signature = sign_payload(WEBHOOK_SECRET, Utc::now().timestamp(), payload.as_bytes());
        send(
            &self.storefront,
            Request::builder()
                .method("POST")
                .uri("/webhooks/stripe")
                .header(SIGNATURE_HEADER, signature)
                .body(Body::from(payload.to_string()))
                .unwrap(),
        )
        .await
        .status()
    }
}

#[tokio::test]
async fn test_purchase_delivers_uploaded_file() {
    let store = Store::new();
    let product = store.publish_product().await;
    assert!(product.is_available_for_purchase);
    assert_eq!(store.blobs.len(), 2);

    let listing = send(
        &store.storefront,
        Request::builder().uri("/products").body(Body::empty()).unwrap(),
    )
    .await;
    let listing = String::from_utf8(body_bytes(listing).await).unwrap();
    assert!(listing.contains("Game Theory"));
    assert!(listing.contains("$19.99"));

    let event = charge_succeeded_event(&product.id.to_string(), Some("buyer@example.com"), 1999);
    assert_eq!(store.deliver(&event).await, StatusCode::OK);

    let receipts = store.mailer.sent();
    assert_eq!(receipts.len(), 1);
    let link = &receipts[0].download_url;
    let path = link.strip_prefix(STOREFRONT_BASE_URL).unwrap();
    assert!(path.starts_with("/products/download/"));

    let response = send(
        &store.storefront,
        Request::builder().uri(path).body(Body::empty()).unwrap(),
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response.headers().get(header::CONTENT_DISPOSITION).unwrap(),
        "attachment; filename=\"Game Theory.pdf\""
    );
    assert_eq!(
        response.headers().get(header::CONTENT_LENGTH).unwrap(),
        &PRODUCT_FILE.len().to_string()
    );
    assert_eq!(body_bytes(response).await, PRODUCT_FILE);
}

#[tokio::test]
async fn test_sold_product_cannot_be_deleted() {
    let store = Store::new();
    let product = store.publish_product().await;

    let event = charge_succeeded_event(&product.id.to_string(), Some("buyer@example.com"), 1999);
    assert_eq!(store.deliver(&event).await, StatusCode::OK);
    assert_eq!(store.catalog.orders().len(), 1);
    store.products.record_order(product.id);

    let response = send(
        &store.admin,
        Request::builder()
            .method("POST")
            .uri(format!("/admin/products/{}/delete", product.id))
            .header(header::AUTHORIZATION, basic_auth(OWNER, OWNER_PASSWORD))
            .body(Body::empty())
            .unwrap(),
    )
    .await;

    assert_eq!(response.status(), StatusCode::CONFLICT);
    assert_eq!(store.blobs.len(), 2);
}

#[tokio::test]
async fn test_rejected_charge_leaves_no_trace() {
    let store = Store::new();
    let product = store.publish_product().await;

    let no_email = charge_succeeded_event(&product.id.to_string(), None, 1999);
    assert_eq!(store.deliver(&no_email).await, StatusCode::BAD_REQUEST);

    let unsigned = send(
        &store.storefront,
        Request::builder()
            .method("POST")
            .uri("/webhooks/stripe")
            .header(SIGNATURE_HEADER, "t=1,v1=00")
            .body(Body::from(charge_succeeded_event(
                &product.id.to_string(),
                Some("buyer@example.com"),
                1999,
            )))
            .unwrap(),
    )
    .await;
    assert_eq!(unsigned.status(), StatusCode::BAD_REQUEST);

    assert!(store.catalog.orders().is_empty());
    assert!(store.catalog.users().is_empty());
    assert!(store.catalog.verifications().is_empty());
    assert!(store.mailer.sent().is_empty());
}
