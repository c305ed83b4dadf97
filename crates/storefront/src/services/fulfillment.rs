//! Turns a verified successful charge into an order, a download link and a
//! receipt.
//!
//! The order and the download token are written in separate steps and are
//! never rolled back: once the buyer has paid, a failed receipt email must
//! not undo their purchase.

use chrono::{DateTime, Utc};
use thiserror::Error;
use tracing::{error, info, instrument, warn};

use econ_core::{DownloadVerification, Email, EmailError, Order, ProductId, format_cents};

use crate::db::{Catalog, NewPurchase, RepositoryError};
use crate::services::downloads::download_url;
use crate::services::email::{Receipt, ReceiptMailer};
use crate::services::payments::ChargeSucceeded;

/// Reasons a charge cannot be fulfilled.
#[derive(Debug, Error)]
pub enum FulfillmentError {
    /// The charge names no product, or one that does not exist.
    #[error("Unknown product: {0:?}")]
    UnknownProduct(Option<String>),

    /// The charge carries no billing email.
    #[error("Charge has no billing email")]
    MissingEmail,

    /// The billing email is not usable.
    #[error("Invalid billing email: {0}")]
    InvalidEmail(#[from] EmailError),

    /// The captured amount does not fit an order row.
    #[error("Invalid charge amount: {0}")]
    InvalidAmount(i64),

    /// Catalog store failure.
    #[error(transparent)]
    Repository(#[from] RepositoryError),
}

impl FulfillmentError {
    /// Whether the charge itself is unusable, as opposed to a server fault.
    #[must_use]
    pub const fn is_bad_request(&self) -> bool {
        !matches!(self, Self::Repository(_))
    }
}

/// What a successful fulfillment produced.
#[derive(Debug, Clone)]
pub struct Fulfillment {
    pub order: Order,
    pub verification: DownloadVerification,
    /// False when the receipt could not be delivered.
    pub receipt_sent: bool,
}

/// Fulfill one successful charge.
///
/// Validates the product and email before any write, so a rejected charge
/// leaves the store untouched.
///
/// # Errors
///
/// Returns [`FulfillmentError`] if the charge is unusable or the catalog
/// store fails. Receipt delivery failures are logged, never returned.
#[instrument(
    skip(catalog, mailer, charge),
    fields(charge_id = %charge.charge_id, product_id = ?charge.product_id)
)]
pub async fn fulfill_charge(
    catalog: &dyn Catalog,
    mailer: &dyn ReceiptMailer,
    storefront_base_url: &str,
    charge: &ChargeSucceeded,
    now: DateTime<Utc>,
) -> Result<Fulfillment, FulfillmentError> {
    let unknown = || FulfillmentError::UnknownProduct(charge.product_id.clone());

    let product_id: ProductId = charge
        .product_id
        .as_deref()
        .and_then(|raw| raw.parse().ok())
        .ok_or_else(unknown)?;
    let product = catalog.find_product(product_id).await?.ok_or_else(unknown)?;

    let email = Email::parse(charge.email.as_deref().ok_or(FulfillmentError::MissingEmail)?)?;
    let price_paid_in_cents = i32::try_from(charge.amount_paid_in_cents)
        .ok()
        .filter(|cents| *cents >= 0)
        .ok_or(FulfillmentError::InvalidAmount(charge.amount_paid_in_cents))?;

    let order = catalog
        .record_purchase(&NewPurchase {
            email: email.clone(),
            product_id,
            price_paid_in_cents,
            purchased_at: now,
        })
        .await?;

    let verification = DownloadVerification::mint(product_id, now);
    catalog.create_download_verification(&verification).await?;

    info!(
        order_id = %order.id,
        verification_id = %verification.id,
        "Charge fulfilled"
    );

    let receipt = Receipt {
        to: email,
        order_id: order.id,
        product_name: product.name,
        product_description: product.description,
        price_paid: format_cents(i64::from(order.price_paid_in_cents)),
        purchased_at: order.created_at,
        download_url: download_url(storefront_base_url, verification.id),
        download_expires_at: verification.expires_at,
    };

    let receipt_sent = match mailer.send_receipt(&receipt).await {
        Ok(()) => true,
        Err(e) => {
            error!(error = %e, order_id = %order.id, "Error sending receipt email");
            false
        }
    };

    if order.price_paid_in_cents != product.price_in_cents.cents() {
        warn!(
            paid = order.price_paid_in_cents,
            list = product.price_in_cents.cents(),
            "Charge amount differs from list price"
        );
    }

    Ok(Fulfillment {
        order,
        verification,
        receipt_sent,
    })
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use econ_core::{PriceInCents, Product};

    use super::*;
    use crate::db::MemoryCatalog;
    use crate::services::email::RecordingMailer;

    const BASE_URL: &str = "https://shop.example.org";

    fn seed_product(catalog: &MemoryCatalog) -> Product {
        let now = Utc::now();
        let product = Product {
            id: ProductId::generate(),
            name: "Microeconomics Notes".to_string(),
            description: "Lecture notes".to_string(),
            price_in_cents: PriceInCents::new(1999).unwrap(),
            file_path: "products/notes.pdf".to_string(),
            image_path: "images/notes.png".to_string(),
            is_available_for_purchase: true,
            created_at: now,
            updated_at: now,
        };
        catalog.insert_product(product.clone());
        product
    }

    fn charge(product_id: Option<String>, email: Option<&str>) -> ChargeSucceeded {
        ChargeSucceeded {
            charge_id: "ch_1".to_string(),
            product_id,
            email: email.map(str::to_string),
            amount_paid_in_cents: 1999,
        }
    }

    #[tokio::test]
    async fn test_fulfill_creates_order_link_and_receipt() {
        let catalog = MemoryCatalog::new();
        let mailer = RecordingMailer::new();
        let product = seed_product(&catalog);
        let now = Utc::now();

        let result = fulfill_charge(
            &catalog,
            &mailer,
            BASE_URL,
            &charge(Some(product.id.to_string()), Some("buyer@example.com")),
            now,
        )
        .await
        .unwrap();

        assert_eq!(catalog.orders().len(), 1);
        assert_eq!(catalog.verifications().len(), 1);
        assert_eq!(result.order.price_paid_in_cents, 1999);
        assert_eq!(result.verification.product_id, product.id);
        assert_eq!(result.verification.expires_at, DownloadVerification::expiry_for(now));
        assert!(result.receipt_sent);

        let sent = mailer.sent();
        assert_eq!(sent.len(), 1);
        assert_eq!(
            sent[0].download_url,
            format!("{BASE_URL}/products/download/{}", result.verification.id)
        );
        assert_eq!(sent[0].price_paid, "$19.99");
    }

    #[tokio::test]
    async fn test_unknown_product_has_no_side_effects() {
        let catalog = MemoryCatalog::new();
        let mailer = RecordingMailer::new();
        seed_product(&catalog);

        let result = fulfill_charge(
            &catalog,
            &mailer,
            BASE_URL,
            &charge(Some(ProductId::generate().to_string()), Some("buyer@example.com")),
            Utc::now(),
        )
        .await;

        assert!(matches!(result, Err(FulfillmentError::UnknownProduct(_))));
        assert!(catalog.orders().is_empty());
        assert!(catalog.users().is_empty());
        assert!(catalog.verifications().is_empty());
        assert!(mailer.sent().is_empty());
    }

    #[tokio::test]
    async fn test_non_uuid_product_is_unknown() {
        let catalog = MemoryCatalog::new();
        let mailer = RecordingMailer::new();

        let result = fulfill_charge(
            &catalog,
            &mailer,
            BASE_URL,
            &charge(Some("not-a-uuid".to_string()), Some("buyer@example.com")),
            Utc::now(),
        )
        .await;

        let err = result.unwrap_err();
        assert!(matches!(err, FulfillmentError::UnknownProduct(_)));
        assert!(err.is_bad_request());
    }

    #[tokio::test]
    async fn test_missing_email_has_no_side_effects() {
        let catalog = MemoryCatalog::new();
        let mailer = RecordingMailer::new();
        let product = seed_product(&catalog);

        let result = fulfill_charge(
            &catalog,
            &mailer,
            BASE_URL,
            &charge(Some(product.id.to_string()), None),
            Utc::now(),
        )
        .await;

        assert!(matches!(result, Err(FulfillmentError::MissingEmail)));
        assert!(catalog.orders().is_empty());
        assert!(catalog.verifications().is_empty());
    }

    #[tokio::test]
    async fn test_email_failure_keeps_order() {
        let catalog = MemoryCatalog::new();
        let mailer = RecordingMailer::new();
        mailer.fail_sends(true);
        let product = seed_product(&catalog);

        let result = fulfill_charge(
            &catalog,
            &mailer,
            BASE_URL,
            &charge(Some(product.id.to_string()), Some("buyer@example.com")),
            Utc::now(),
        )
        .await
        .unwrap();

        assert!(!result.receipt_sent);
        assert_eq!(catalog.orders().len(), 1);
        assert_eq!(catalog.verifications().len(), 1);
    }

    #[tokio::test]
    async fn test_same_new_email_twice_one_user_two_orders() {
        let catalog = MemoryCatalog::new();
        let mailer = RecordingMailer::new();
        let product = seed_product(&catalog);
        let c = charge(Some(product.id.to_string()), Some("repeat@example.com"));

        let (a, b) = tokio::join!(
            fulfill_charge(&catalog, &mailer, BASE_URL, &c, Utc::now()),
            fulfill_charge(&catalog, &mailer, BASE_URL, &c, Utc::now()),
        );
        a.unwrap();
        b.unwrap();

        assert_eq!(catalog.users().len(), 1);
        assert_eq!(catalog.orders().len(), 2);
        assert_eq!(catalog.verifications().len(), 2);
    }

    #[tokio::test]
    async fn test_duplicate_delivery_double_fulfills() {
        let catalog = MemoryCatalog::new();
        let mailer = RecordingMailer::new();
        let product = seed_product(&catalog);
        let c = charge(Some(product.id.to_string()), Some("buyer@example.com"));

        fulfill_charge(&catalog, &mailer, BASE_URL, &c, Utc::now()).await.unwrap();
        fulfill_charge(&catalog, &mailer, BASE_URL, &c, Utc::now()).await.unwrap();

        // No idempotency key is stored, so a redelivered event is fulfilled again
        assert_eq!(catalog.orders().len(), 2);
        assert_eq!(catalog.verifications().len(), 2);
    }

    #[tokio::test]
    async fn test_negative_amount_rejected() {
        let catalog = MemoryCatalog::new();
        let mailer = RecordingMailer::new();
        let product = seed_product(&catalog);
        let mut c = charge(Some(product.id.to_string()), Some("buyer@example.com"));
        c.amount_paid_in_cents = -5;

        let result = fulfill_charge(&catalog, &mailer, BASE_URL, &c, Utc::now()).await;
        assert!(matches!(result, Err(FulfillmentError::InvalidAmount(-5))));
        assert!(catalog.orders().is_empty());
    }
}
