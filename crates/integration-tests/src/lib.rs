//! Integration tests for econ.
//!
//! # Running Tests
//!
//! ```bash
//! # In-memory end-to-end tests
//! cargo test -p econ-integration-tests
//!
//! # Postgres tests (migrations are applied by the tests)
//! TEST_DATABASE_URL=postgres://localhost/econ_test \
//!     cargo test -p econ-integration-tests -- --ignored
//! ```
//!
//! # Test Categories
//!
//! - `purchase_flow` - Admin upload, Stripe webhook, receipt and download
//!   across both routers
//! - `postgres` - Both binaries' repositories against one real database

#![cfg_attr(not(test), forbid(unsafe_code))]

use axum::{
    Router,
    body::{Body, to_bytes},
    http::{Request, header},
    response::Response,
};
use base64::{Engine, engine::general_purpose::STANDARD};
use tower::ServiceExt;

/// Public URL prefix both binaries are configured with.
pub const STORAGE_BASE_URL: &str = "https://econ-site-data.s3.us-east-2.amazonaws.com/";

/// Storefront base URL used in receipt links.
pub const STOREFRONT_BASE_URL: &str = "https://shop.example.org";

/// Stripe webhook signing secret.
pub const WEBHOOK_SECRET: &str = "whsec_integration_Lp7Rt5Wz8Yb4Nc6H";

/// Environment variable naming the database for ignored Postgres tests.
pub const TEST_DATABASE_URL: &str = "TEST_DATABASE_URL";

/// A `charge.succeeded` event as Stripe delivers it.
#[must_use]
pub fn charge_succeeded_event(product_id: &str, email: Option<&str>, amount: i64) -> String {
    serde_json::json!({
        "id": "evt_integration",
        "type": "charge.succeeded",
        "data": { "object": {
            "id": "ch_integration",
            "amount": amount,
            "metadata": { "productId": product_id },
            "billing_details": { "email": email },
        }}
    })
    .to_string()
}

/// `Authorization` header value for HTTP Basic credentials.
#[must_use]
pub fn basic_auth(username: &str, password: &str) -> String {
    format!("Basic {}", STANDARD.encode(format!("{username}:{password}")))
}

/// Send one request through `app`.
///
/// # Panics
///
/// Panics if the router fails, which it never does for axum handlers.
#[allow(clippy::unwrap_used)]
pub async fn send(app: &Router, request: Request<Body>) -> Response {
    app.clone().oneshot(request).await.unwrap()
}

/// Collect a response body.
///
/// # Panics
///
/// Panics if the body stream errors.
#[allow(clippy::unwrap_used)]
pub async fn body_bytes(response: Response) -> Vec<u8> {
    to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap()
        .to_vec()
}

/// A `multipart/form-data` request body and its content type.
#[derive(Debug, Default)]
pub struct MultipartBuilder {
    body: Vec<u8>,
}

impl MultipartBuilder {
    const BOUNDARY: &'static str = "econ-integration-boundary";

    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn text(mut self, name: &str, value: &str) -> Self {
        self.start(&format!("Content-Disposition: form-data; name=\"{name}\"\r\n\r\n"));
        self.body.extend_from_slice(value.as_bytes());
        self.body.extend_from_slice(b"\r\n");
        self
    }

    #[must_use]
    pub fn file(mut self, name: &str, file_name: &str, content_type: &str, bytes: &[u8]) -> Self {
        self.start(&format!(
            "Content-Disposition: form-data; name=\"{name}\"; filename=\"{file_name}\"\r\n\
             Content-Type: {content_type}\r\n\r\n"
        ));
        self.body.extend_from_slice(bytes);
        self.body.extend_from_slice(b"\r\n");
        self
    }

    /// The `Content-Type` header value.
    #[must_use]
    pub fn content_type() -> String {
        format!("multipart/form-data; boundary={}", Self::BOUNDARY)
    }

    #[must_use]
    pub fn finish(mut self) -> Vec<u8> {
        self.body
            .extend_from_slice(format!("--{}--\r\n", Self::BOUNDARY).as_bytes());
        self.body
    }

    fn start(&mut self, headers: &str) {
        self.body
            .extend_from_slice(format!("--{}\r\n", Self::BOUNDARY).as_bytes());
        self.body.extend_from_slice(headers.as_bytes());
    }
}

/// `POST` a multipart form to `uri` with Basic credentials.
///
/// # Panics
///
/// Panics if the request cannot be built.
#[allow(clippy::unwrap_used)]
#[must_use]
pub fn multipart_request(uri: &str, authorization: &str, form: MultipartBuilder) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header(header::AUTHORIZATION, authorization)
        .header(header::CONTENT_TYPE, MultipartBuilder::content_type())
        .body(Body::from(form.finish()))
        .unwrap()
}
