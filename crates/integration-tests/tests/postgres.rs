//! Repository tests against a real `PostgreSQL` database.
//!
//! Ignored by default. Set `TEST_DATABASE_URL` and run with `--ignored`.
//! Each test works on freshly generated ids and emails, so runs do not
//! interfere with each other.

#![allow(clippy::unwrap_used, clippy::expect_used)]

use chrono::{Duration, Utc};
use sqlx::PgPool;

use econ_admin::db::{PgProductRepository, ProductFields, ProductRepository, RepositoryError};
use econ_core::{DownloadVerification, Email, PriceInCents, ProductId};
use econ_integration_tests::TEST_DATABASE_URL;
use econ_storefront::db::{Catalog, NewPurchase, PgCatalog};

async fn pool() -> PgPool {
    let url = std::env::var(TEST_DATABASE_URL).expect("TEST_DATABASE_URL must be set");
    let pool = PgPool::connect(&url).await.unwrap();
    sqlx::migrate!("../../migrations").run(&pool).await.unwrap();
    pool
}

fn fields(name: &str) -> ProductFields {
    ProductFields {
        name: name.to_string(),
        description: "Integration test product".to_string(),
        price_in_cents: PriceInCents::new(1999).unwrap(),
        file_path: format!("products/{name}.pdf"),
        image_path: format!("images/{name}.png"),
    }
}

fn unique_email() -> Email {
    Email::parse(&format!("buyer-{}@example.com", ProductId::generate())).unwrap()
}

#[tokio::test]
#[ignore = "requires TEST_DATABASE_URL"]
async fn test_admin_product_visible_to_storefront_once_available() {
    let pool = pool().await;
    let admin = PgProductRepository::new(pool.clone());
    let catalog = PgCatalog::new(pool);

    let product = admin.create(&fields("visibility"), Utc::now()).await.unwrap();
    assert!(!product.is_available_for_purchase);
    let listed = catalog.list_available_products().await.unwrap();
    assert!(!listed.iter().any(|p| p.id == product.id));

    admin
        .set_availability(product.id, true, Utc::now())
        .await
        .unwrap();
    let listed = catalog.list_available_products().await.unwrap();
    assert!(listed.iter().any(|p| p.id == product.id));

    let found = catalog.find_product(product.id).await.unwrap().unwrap();
    assert_eq!(found.price_in_cents, product.price_in_cents);

    admin.delete(product.id).await.unwrap();
}

#[tokio::test]
#[ignore = "requires TEST_DATABASE_URL"]
async fn test_concurrent_first_purchases_share_one_user() {
    let pool = pool().await;
    let admin = PgProductRepository::new(pool.clone());
    let catalog = PgCatalog::new(pool.clone());
    let product = admin.create(&fields("race"), Utc::now()).await.unwrap();
    let email = unique_email();

    let purchase = NewPurchase {
        email: email.clone(),
        product_id: product.id,
        price_paid_in_cents: 1999,
        purchased_at: Utc::now(),
    };
    let (a, b) = tokio::join!(
        catalog.record_purchase(&purchase),
        catalog.record_purchase(&purchase),
    );
    let (a, b) = (a.unwrap(), b.unwrap());

    assert_eq!(a.user_id, b.user_id);
    assert_ne!(a.id, b.id);
    let users: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM users WHERE email = $1")
        .bind(email.as_str())
        .fetch_one(&pool)
        .await
        .unwrap();
    assert_eq!(users, 1);
    let orders: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM orders WHERE user_id = $1")
        .bind(a.user_id)
        .fetch_one(&pool)
        .await
        .unwrap();
    assert_eq!(orders, 2);

    // Each purchase reads back its own order even with an identical caller clock
    let third = catalog.record_purchase(&purchase).await.unwrap();
    assert!(third.id != a.id && third.id != b.id);
    assert!(third.created_at > a.created_at && third.created_at > b.created_at);

    assert!(catalog.order_exists(&email, product.id).await.unwrap());

    // Orders restrict deletion of the product they reference
    assert!(matches!(
        admin.delete(product.id).await,
        Err(RepositoryError::Conflict(_))
    ));
    let summary = admin
        .list_with_order_counts()
        .await
        .unwrap()
        .into_iter()
        .find(|s| s.product.id == product.id)
        .unwrap();
    assert_eq!(summary.order_count, 3);
}

#[tokio::test]
#[ignore = "requires TEST_DATABASE_URL"]
async fn test_download_token_expires_and_cascades() {
    let pool = pool().await;
    let admin = PgProductRepository::new(pool.clone());
    let catalog = PgCatalog::new(pool);
    let product = admin.create(&fields("expiry"), Utc::now()).await.unwrap();

    let now = Utc::now();
    let verification = DownloadVerification::mint(product.id, now);
    catalog
        .create_download_verification(&verification)
        .await
        .unwrap();

    let live = catalog
        .find_live_download(verification.id, now + Duration::hours(23))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(live.product_name, "expiry");
    assert_eq!(live.file_path, "products/expiry.pdf");

    let expired = catalog
        .find_live_download(verification.id, verification.expires_at)
        .await
        .unwrap();
    assert!(expired.is_none());

    // Deleting an unsold product takes its tokens with it
    admin.delete(product.id).await.unwrap();
    let gone = catalog
        .find_live_download(verification.id, now)
        .await
        .unwrap();
    assert!(gone.is_none());
}
