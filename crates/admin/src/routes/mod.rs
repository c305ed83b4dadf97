//! HTTP route handlers for admin.
//!
//! # Route Structure
//!
//! ```text
//! GET  /health                              - Liveness
//! GET  /health/ready                        - Readiness (database reachable)
//!
//! # Products (Basic auth)
//! GET  /admin                               - Redirect to product listing
//! GET  /admin/products                      - Product listing with order counts
//! POST /admin/products                      - Create product (multipart)
//! GET  /admin/products/new                  - New product form
//! GET  /admin/products/{id}/edit            - Edit product form
//! POST /admin/products/{id}                 - Update product (multipart)
//! POST /admin/products/{id}/availability    - Toggle availability
//! POST /admin/products/{id}/delete          - Delete unsold product
//! GET  /admin/products/{id}/download        - Download product file
//! ANY  /admin/{*rest}                       - 404 for authenticated callers
//! ```

pub mod products;

use axum::{
    Router,
    extract::{DefaultBodyLimit, State},
    http::StatusCode,
    middleware,
    response::Redirect,
    routing::{any, get, post},
};

use crate::middleware::require_basic_auth;
use crate::state::AppState;

/// Create the product management router. Every route requires Basic auth.
pub fn admin_routes(state: &AppState, max_upload_bytes: usize) -> Router<AppState> {
    Router::new()
        .route("/admin", get(|| async { Redirect::to("/admin/products") }))
        .route(
            "/admin/products",
            get(products::index).post(products::create),
        )
        .route("/admin/products/new", get(products::new_form))
        .route("/admin/products/{id}", post(products::update))
        .route("/admin/products/{id}/edit", get(products::edit_form))
        .route(
            "/admin/products/{id}/availability",
            post(products::set_availability),
        )
        .route("/admin/products/{id}/delete", post(products::delete))
        .route("/admin/products/{id}/download", get(products::download))
        .route("/admin/{*rest}", any(not_found))
        .layer(DefaultBodyLimit::max(max_upload_bytes))
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            require_basic_auth,
        ))
}

/// Unknown `/admin` paths, reached only after the auth gate.
async fn not_found() -> StatusCode {
    StatusCode::NOT_FOUND
}

/// Build all routes.
pub fn routes(state: &AppState, max_upload_bytes: usize) -> Router<AppState> {
    Router::new()
        .route("/health", get(health))
        .route("/health/ready", get(readiness))
        .merge(admin_routes(state, max_upload_bytes))
}

/// Liveness health check endpoint.
async fn health() -> &'static str {
    "ok"
}

/// Readiness health check endpoint.
///
/// Returns 503 Service Unavailable if the database is not reachable.
async fn readiness(State(state): State<AppState>) -> StatusCode {
    match state.products().ping().await {
        Ok(()) => StatusCode::OK,
        Err(e) => {
            tracing::warn!(error = %e, "Readiness check failed");
            StatusCode::SERVICE_UNAVAILABLE
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::sync::Arc;

    use axum::{
        body::{Body, to_bytes},
        http::{Request, header},
        response::Response,
    };
    use base64::{Engine, engine::general_purpose::STANDARD};
    use bytes::Bytes;
    use chrono::Utc;
    use econ_core::{PriceInCents, Product, ProductId};
    use econ_storage::{BlobStore, MemoryBlobStore};
    use secrecy::SecretString;
    use tower::ServiceExt;

    use super::*;
    use crate::db::MemoryProductRepository;
    use crate::middleware::{BasicAuth, hash_password};

    const USERNAME: &str = "admin";
    const PASSWORD: &str = "correct horse battery staple";
    const STORAGE_BASE: &str = "https://econ-site-data.s3.us-east-2.amazonaws.com/";
    const BOUNDARY: &str = "econ-admin-test-boundary";

    enum Part {
        Text(&'static str, &'static str),
        File {
            name: &'static str,
            file_name: &'static str,
            content_type: &'static str,
            body: &'static [u8],
        },
    }

    fn multipart_body(parts: &[Part]) -> Vec<u8> {
        let mut body = Vec::new();
        for part in parts {
            body.extend_from_slice(format!("--{BOUNDARY}\r\n").as_bytes());
            match part {
                Part::Text(name, value) => {
                    body.extend_from_slice(
                        format!("Content-Disposition: form-data; name=\"{name}\"\r\n\r\n")
                            .as_bytes(),
                    );
                    body.extend_from_slice(value.as_bytes());
                }
                Part::File {
                    name,
                    file_name,
                    content_type,
                    body: bytes,
                } => {
                    body.extend_from_slice(
                        format!(
                            "Content-Disposition: form-data; name=\"{name}\"; filename=\"{file_name}\"\r\n\
                             Content-Type: {content_type}\r\n\r\n"
                        )
                        .as_bytes(),
                    );
                    body.extend_from_slice(bytes);
                }
            }
            body.extend_from_slice(b"\r\n");
        }
        body.extend_from_slice(format!("--{BOUNDARY}--\r\n").as_bytes());
        body
    }

    fn pdf() -> Part {
        Part::File {
            name: "file",
            file_name: "notes.pdf",
            content_type: "application/pdf",
            body: b"%PDF-1.7 notes",
        }
    }

    fn png() -> Part {
        Part::File {
            name: "image",
            file_name: "cover.png",
            content_type: "image/png",
            body: b"\x89PNG cover",
        }
    }

    fn no_file(name: &'static str) -> Part {
        Part::File {
            name,
            file_name: "",
            content_type: "application/octet-stream",
            body: b"",
        }
    }

    fn text_fields() -> [Part; 3] {
        [
            Part::Text("name", "Game Theory"),
            Part::Text("priceInCents", "1999"),
            Part::Text("description", "Lecture slides"),
        ]
    }

    fn basic(username: &str, password: &str) -> String {
        format!("Basic {}", STANDARD.encode(format!("{username}:{password}")))
    }

    struct Harness {
        products: Arc<MemoryProductRepository>,
        blobs: Arc<MemoryBlobStore>,
        app: Router,
    }

    impl Harness {
        fn new() -> Self {
            let products = Arc::new(MemoryProductRepository::new());
            let blobs = Arc::new(MemoryBlobStore::new());
            let auth = BasicAuth::new(
                USERNAME.to_string(),
                SecretString::from(hash_password(PASSWORD)),
            );
            let state = AppState::new(auth, STORAGE_BASE, products.clone(), blobs.clone());
            Self {
                products,
                blobs,
                app: crate::app(state, 1024 * 1024),
            }
        }

        fn seed_product(&self, name: &str) -> Product {
            let now = Utc::now();
            let product = Product {
                id: ProductId::generate(),
                name: name.to_string(),
                description: "Lecture slides".to_string(),
                price_in_cents: PriceInCents::new(1999).unwrap(),
                file_path: format!("{STORAGE_BASE}products/old.pdf"),
                image_path: format!("{STORAGE_BASE}images/old.png"),
                is_available_for_purchase: true,
                created_at: now,
                updated_at: now,
            };
            self.products.insert(product.clone());
            self.blobs.insert(
                "products/old.pdf",
                Bytes::from_static(b"old file"),
                Some("application/pdf"),
            );
            self.blobs
                .insert("images/old.png", Bytes::from_static(b"old image"), Some("image/png"));
            product
        }

        async fn send(&self, request: Request<Body>) -> Response {
            self.app.clone().oneshot(request).await.unwrap()
        }

        async fn get(&self, uri: &str) -> Response {
            self.send(
                Request::builder()
                    .uri(uri)
                    .header(header::AUTHORIZATION, basic(USERNAME, PASSWORD))
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
        }

        async fn post_form(&self, uri: &str, form: &'static str) -> Response {
            self.send(
                Request::builder()
                    .method("POST")
                    .uri(uri)
                    .header(header::AUTHORIZATION, basic(USERNAME, PASSWORD))
                    .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
                    .body(Body::from(form))
                    .unwrap(),
            )
            .await
        }

        async fn post_multipart(&self, uri: &str, parts: &[Part]) -> Response {
            self.send(
                Request::builder()
                    .method("POST")
                    .uri(uri)
                    .header(header::AUTHORIZATION, basic(USERNAME, PASSWORD))
                    .header(
                        header::CONTENT_TYPE,
                        format!("multipart/form-data; boundary={BOUNDARY}"),
                    )
                    .body(Body::from(multipart_body(parts)))
                    .unwrap(),
            )
            .await
        }
    }

    async fn body_text(response: Response) -> String {
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        String::from_utf8_lossy(&bytes).into_owned()
    }

    fn location(response: &Response) -> &str {
        response
            .headers()
            .get(header::LOCATION)
            .unwrap()
            .to_str()
            .unwrap()
    }

    #[tokio::test]
    async fn test_health_needs_no_credentials() {
        let h = Harness::new();
        let request = Request::builder().uri("/health").body(Body::empty()).unwrap();
        assert_eq!(h.send(request).await.status(), StatusCode::OK);
        let request = Request::builder()
            .uri("/health/ready")
            .body(Body::empty())
            .unwrap();
        assert_eq!(h.send(request).await.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_admin_requires_credentials() {
        let h = Harness::new();

        let anonymous = Request::builder()
            .uri("/admin/products")
            .body(Body::empty())
            .unwrap();
        let response = h.send(anonymous).await;
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(
            response.headers().get(header::WWW_AUTHENTICATE).unwrap(),
            "Basic realm=\"admin\""
        );

        let wrong = Request::builder()
            .uri("/admin/products")
            .header(header::AUTHORIZATION, basic(USERNAME, "guess"))
            .body(Body::empty())
            .unwrap();
        assert_eq!(h.send(wrong).await.status(), StatusCode::UNAUTHORIZED);

        let create = Request::builder()
            .method("POST")
            .uri("/admin/products")
            .body(Body::empty())
            .unwrap();
        assert_eq!(h.send(create).await.status(), StatusCode::UNAUTHORIZED);
        assert!(h.products.products().is_empty());

        let unknown = Request::builder()
            .uri("/admin/secret-area")
            .body(Body::empty())
            .unwrap();
        let response = h.send(unknown).await;
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        assert!(response.headers().contains_key(header::WWW_AUTHENTICATE));

        let unknown = Request::builder()
            .uri("/admin/secret-area")
            .header(header::AUTHORIZATION, basic(USERNAME, PASSWORD))
            .body(Body::empty())
            .unwrap();
        assert_eq!(h.send(unknown).await.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_admin_root_redirects() {
        let h = Harness::new();
        let response = h.get("/admin").await;
        assert_eq!(response.status(), StatusCode::SEE_OTHER);
        assert_eq!(location(&response), "/admin/products");
    }

    #[tokio::test]
    async fn test_index_lists_products_with_order_counts() {
        let h = Harness::new();
        let sold = h.seed_product("Game Theory");
        h.seed_product("Auction Design");
        h.products.record_order(sold.id);
        h.products.record_order(sold.id);

        let response = h.get("/admin/products").await;
        assert_eq!(response.status(), StatusCode::OK);
        let body = body_text(response).await;

        assert!(body.contains("Game Theory"));
        assert!(body.contains("Auction Design"));
        assert!(body.contains("$19.99"));
        assert!(body.contains("<td>2</td>"));
        assert!(body.find("Auction Design").unwrap() < body.find("Game Theory").unwrap());
        // Only the unsold product offers a delete button
        assert_eq!(body.matches("/delete\"").count(), 1);
    }

    #[tokio::test]
    async fn test_new_form_renders() {
        let h = Harness::new();
        let response = h.get("/admin/products/new").await;
        assert_eq!(response.status(), StatusCode::OK);
        let body = body_text(response).await;
        assert!(body.contains("action=\"/admin/products\""));
        assert!(body.contains("multipart/form-data"));
    }

    #[tokio::test]
    async fn test_create_stores_assets_and_unavailable_product() {
        let h = Harness::new();
        let [name, price, description] = text_fields();

        let response = h
            .post_multipart("/admin/products", &[name, price, description, pdf(), png()])
            .await;

        assert_eq!(response.status(), StatusCode::SEE_OTHER);
        assert_eq!(location(&response), "/admin/products");

        let products = h.products.products();
        assert_eq!(products.len(), 1);
        let product = &products[0];
        assert_eq!(product.name, "Game Theory");
        assert_eq!(product.price_in_cents.cents(), 1999);
        assert!(!product.is_available_for_purchase);
        assert!(product.file_path.starts_with(&format!("{STORAGE_BASE}products/")));
        assert!(product.file_path.ends_with("-notes.pdf"));
        assert!(product.image_path.starts_with(&format!("{STORAGE_BASE}images/")));
        assert_eq!(h.blobs.len(), 2);
    }

    #[tokio::test]
    async fn test_create_without_image_rerenders_form() {
        let h = Harness::new();
        let [name, price, description] = text_fields();

        let response = h
            .post_multipart(
                "/admin/products",
                &[name, price, description, pdf(), no_file("image")],
            )
            .await;

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let body = body_text(response).await;
        assert!(body.contains("Required"));
        assert!(body.contains("value=\"Game Theory\""));
        assert!(h.products.products().is_empty());
        assert!(h.blobs.is_empty());
    }

    #[tokio::test]
    async fn test_create_rejects_non_image_cover() {
        let h = Harness::new();
        let [name, price, description] = text_fields();
        let not_an_image = Part::File {
            name: "image",
            file_name: "cover.pdf",
            content_type: "application/pdf",
            body: b"%PDF",
        };

        let response = h
            .post_multipart(
                "/admin/products",
                &[name, price, description, pdf(), not_an_image],
            )
            .await;

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert!(body_text(response).await.contains("Must be an image"));
        assert!(h.blobs.is_empty());
    }

    #[tokio::test]
    async fn test_create_rejects_bad_price() {
        let h = Harness::new();

        let response = h
            .post_multipart(
                "/admin/products",
                &[
                    Part::Text("name", "Game Theory"),
                    Part::Text("priceInCents", "0"),
                    Part::Text("description", "Lecture slides"),
                    pdf(),
                    png(),
                ],
            )
            .await;

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert!(h.products.products().is_empty());
    }

    #[tokio::test]
    async fn test_edit_form_prefills() {
        let h = Harness::new();
        let product = h.seed_product("Game Theory");

        let response = h.get(&format!("/admin/products/{}/edit", product.id)).await;
        assert_eq!(response.status(), StatusCode::OK);
        let body = body_text(response).await;
        assert!(body.contains("value=\"Game Theory\""));
        assert!(body.contains("value=\"1999\""));
        assert!(body.contains(&format!("action=\"/admin/products/{}\"", product.id)));

        let missing = h
            .get(&format!("/admin/products/{}/edit", ProductId::generate()))
            .await;
        assert_eq!(missing.status(), StatusCode::NOT_FOUND);
        assert_eq!(
            h.get("/admin/products/not-a-uuid/edit").await.status(),
            StatusCode::NOT_FOUND
        );
    }

    #[tokio::test]
    async fn test_update_replaces_file_and_removes_old_blob() {
        let h = Harness::new();
        let product = h.seed_product("Game Theory");

        let response = h
            .post_multipart(
                &format!("/admin/products/{}", product.id),
                &[
                    Part::Text("name", "Game Theory II"),
                    Part::Text("priceInCents", "2500"),
                    Part::Text("description", "Updated slides"),
                    pdf(),
                    no_file("image"),
                ],
            )
            .await;

        assert_eq!(response.status(), StatusCode::SEE_OTHER);
        let updated = &h.products.products()[0];
        assert_eq!(updated.name, "Game Theory II");
        assert_eq!(updated.price_in_cents.cents(), 2500);
        assert!(updated.is_available_for_purchase);
        assert_ne!(updated.file_path, product.file_path);
        assert_eq!(updated.image_path, product.image_path);

        assert!(!h.blobs.contains("products/old.pdf"));
        assert!(h.blobs.contains("images/old.png"));
        assert_eq!(h.blobs.len(), 2);
    }

    #[tokio::test]
    async fn test_update_unknown_product() {
        let h = Harness::new();
        let [name, price, description] = text_fields();

        let response = h
            .post_multipart(
                &format!("/admin/products/{}", ProductId::generate()),
                &[name, price, description],
            )
            .await;

        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        assert!(h.blobs.is_empty());
    }

    #[tokio::test]
    async fn test_set_availability() {
        let h = Harness::new();
        let product = h.seed_product("Game Theory");
        let uri = format!("/admin/products/{}/availability", product.id);

        let response = h.post_form(&uri, "available=false").await;
        assert_eq!(response.status(), StatusCode::SEE_OTHER);
        assert!(!h.products.products()[0].is_available_for_purchase);

        h.post_form(&uri, "available=true").await;
        assert!(h.products.products()[0].is_available_for_purchase);

        let missing = h
            .post_form(
                &format!("/admin/products/{}/availability", ProductId::generate()),
                "available=true",
            )
            .await;
        assert_eq!(missing.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_delete_removes_row_and_blobs() {
        let h = Harness::new();
        let product = h.seed_product("Game Theory");

        let response = h
            .post_form(&format!("/admin/products/{}/delete", product.id), "")
            .await;

        assert_eq!(response.status(), StatusCode::SEE_OTHER);
        assert!(h.products.products().is_empty());
        assert!(h.blobs.is_empty());
    }

    #[tokio::test]
    async fn test_delete_sold_product_conflicts() {
        let h = Harness::new();
        let product = h.seed_product("Game Theory");
        h.products.record_order(product.id);

        let response = h
            .post_form(&format!("/admin/products/{}/delete", product.id), "")
            .await;

        assert_eq!(response.status(), StatusCode::CONFLICT);
        assert_eq!(h.products.products().len(), 1);
        assert_eq!(h.blobs.len(), 2);
    }

    #[tokio::test]
    async fn test_delete_survives_missing_blobs() {
        let h = Harness::new();
        let product = h.seed_product("Game Theory");
        let key = econ_core::BlobKey::new("products/old.pdf");
        h.blobs.delete(&key).await.unwrap();

        let response = h
            .post_form(&format!("/admin/products/{}/delete", product.id), "")
            .await;

        assert_eq!(response.status(), StatusCode::SEE_OTHER);
        assert!(h.blobs.is_empty());
    }

    #[tokio::test]
    async fn test_download_streams_file() {
        let h = Harness::new();
        let product = h.seed_product("Game Theory");

        let response = h
            .get(&format!("/admin/products/{}/download", product.id))
            .await;

        assert_eq!(response.status(), StatusCode::OK);
        let headers = response.headers();
        assert_eq!(
            headers.get(header::CONTENT_DISPOSITION).unwrap(),
            "attachment; filename=\"Game Theory.pdf\""
        );
        assert_eq!(headers.get(header::CONTENT_LENGTH).unwrap(), "8");
        assert_eq!(headers.get(header::CONTENT_TYPE).unwrap(), "application/pdf");
        assert_eq!(body_text(response).await, "old file");

        let missing = h
            .get(&format!("/admin/products/{}/download", ProductId::generate()))
            .await;
        assert_eq!(missing.status(), StatusCode::NOT_FOUND);
    }
}
