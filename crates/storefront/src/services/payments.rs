//! Stripe webhook verification and event decoding.
//!
//! Stripe signs each delivery with the endpoint's signing secret. The
//! `stripe-signature` header carries a timestamp and one or more `v1` HMAC-SHA256
//! signatures over `"{timestamp}.{raw body}"`. Nothing in the body is trusted
//! until one of those signatures verifies.

use std::collections::HashMap;

use chrono::{DateTime, TimeDelta, Utc};
use hmac::{Hmac, Mac};
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use sha2::Sha256;
use thiserror::Error;
use tracing::debug;

/// Header carrying the Stripe signature.
pub const SIGNATURE_HEADER: &str = "stripe-signature";

/// Maximum clock skew accepted between Stripe and this server.
pub const DEFAULT_TOLERANCE_SECS: i64 = 300;

/// The only event type that triggers fulfillment.
pub const CHARGE_SUCCEEDED: &str = "charge.succeeded";

type HmacSha256 = Hmac<Sha256>;

/// Errors from webhook verification and decoding.
#[derive(Debug, Error)]
pub enum WebhookError {
    /// The signature header is absent.
    #[error("Missing {SIGNATURE_HEADER} header")]
    MissingSignature,

    /// The header is malformed, stale, or no signature matches.
    #[error("Invalid signature: {0}")]
    InvalidSignature(&'static str),

    /// The signature verified but the body is not a usable event.
    #[error("Malformed event payload: {0}")]
    MalformedPayload(#[from] serde_json::Error),
}

/// A verified Stripe event envelope.
#[derive(Debug, Clone, Deserialize)]
pub struct StripeEvent {
    pub id: String,
    #[serde(rename = "type")]
    pub event_type: String,
    pub data: EventData,
}

#[derive(Debug, Clone, Deserialize)]
pub struct EventData {
    pub object: serde_json::Value,
}

/// The fields of a Stripe charge object that fulfillment needs.
#[derive(Debug, Clone, Deserialize)]
pub struct Charge {
    pub id: String,
    /// Amount captured, in the smallest currency unit.
    pub amount: i64,
    #[serde(default)]
    pub metadata: HashMap<String, String>,
    #[serde(default)]
    pub billing_details: BillingDetails,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct BillingDetails {
    pub email: Option<String>,
}

/// A successful charge, as reported by the payment provider.
///
/// Product and email are unvalidated here; fulfillment decides whether they
/// are usable.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChargeSucceeded {
    pub charge_id: String,
    pub product_id: Option<String>,
    pub email: Option<String>,
    pub amount_paid_in_cents: i64,
}

/// A verified event, reduced to what the storefront acts on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PaymentEvent {
    ChargeSucceeded(ChargeSucceeded),
    /// Any other event type. Acknowledged but not acted on.
    Unhandled(String),
}

impl TryFrom<StripeEvent> for PaymentEvent {
    type Error = WebhookError;

    fn try_from(event: StripeEvent) -> Result<Self, Self::Error> {
        if event.event_type != CHARGE_SUCCEEDED {
            return Ok(Self::Unhandled(event.event_type));
        }

        let charge: Charge = serde_json::from_value(event.data.object)?;
        Ok(Self::ChargeSucceeded(ChargeSucceeded {
            product_id: charge.metadata.get("productId").cloned(),
            email: charge.billing_details.email,
            amount_paid_in_cents: charge.amount,
            charge_id: charge.id,
        }))
    }
}

/// Verifies `stripe-signature` headers against the endpoint secret.
#[derive(Clone)]
pub struct WebhookVerifier {
    secret: SecretString,
    tolerance: TimeDelta,
}

impl std::fmt::Debug for WebhookVerifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WebhookVerifier")
            .field("secret", &"[REDACTED]")
            .field("tolerance", &self.tolerance)
            .finish()
    }
}

impl WebhookVerifier {
    #[must_use]
    pub fn new(secret: SecretString) -> Self {
        Self {
            secret,
            tolerance: TimeDelta::seconds(DEFAULT_TOLERANCE_SECS),
        }
    }

    /// Verify `header` over the raw `payload` and decode the event.
    ///
    /// # Errors
    ///
    /// [`WebhookError::MissingSignature`] or [`WebhookError::InvalidSignature`]
    /// if the delivery cannot be authenticated, [`WebhookError::MalformedPayload`]
    /// if it authenticates but is not a Stripe event.
    pub fn verify(
        &self,
        payload: &[u8],
        header: Option<&str>,
        now: DateTime<Utc>,
    ) -> Result<StripeEvent, WebhookError> {
        let header = header.ok_or(WebhookError::MissingSignature)?;
        let parsed = SignatureHeader::parse(header)?;

        let skew = now.timestamp().abs_diff(parsed.timestamp);
        if skew > self.tolerance.num_seconds().unsigned_abs() {
            return Err(WebhookError::InvalidSignature("timestamp outside tolerance"));
        }

        let mut mac = HmacSha256::new_from_slice(self.secret.expose_secret().as_bytes())
            .map_err(|_| WebhookError::InvalidSignature("unusable signing secret"))?;
        mac.update(parsed.timestamp.to_string().as_bytes());
        mac.update(b".");
        mac.update(payload);

        // verify_slice compares in constant time
        let matched = parsed.signatures.iter().any(|candidate| {
            hex::decode(candidate).is_ok_and(|bytes| mac.clone().verify_slice(&bytes).is_ok())
        });
        if !matched {
            return Err(WebhookError::InvalidSignature("no matching signature"));
        }

        let event: StripeEvent = serde_json::from_slice(payload)?;
        debug!(event_id = %event.id, event_type = %event.event_type, "Stripe signature verified");
        Ok(event)
    }
}

/// Parsed `t=...,v1=...` header.
#[derive(Debug)]
struct SignatureHeader<'a> {
    timestamp: i64,
    signatures: Vec<&'a str>,
}

impl<'a> SignatureHeader<'a> {
    fn parse(header: &'a str) -> Result<Self, WebhookError> {
        let mut timestamp = None;
        let mut signatures = Vec::new();

        for part in header.split(',') {
            let Some((key, value)) = part.trim().split_once('=') else {
                continue;
            };
            match key {
                "t" => {
                    timestamp = Some(
                        value
                            .parse::<i64>()
                            .map_err(|_| WebhookError::InvalidSignature("bad timestamp"))?,
                    );
                }
                "v1" => signatures.push(value),
                _ => {}
            }
        }

        let timestamp = timestamp.ok_or(WebhookError::InvalidSignature("missing timestamp"))?;
        if signatures.is_empty() {
            return Err(WebhookError::InvalidSignature("no v1 signature"));
        }

        Ok(Self {
            timestamp,
            signatures,
        })
    }
}

/// Build a `stripe-signature` header for `payload`, as Stripe would.
#[cfg(any(test, feature = "test-util"))]
#[must_use]
#[allow(clippy::missing_panics_doc)]
pub fn sign_payload(secret: &str, timestamp: i64, payload: &[u8]) -> String {
    #[allow(clippy::expect_used)]
    let mut mac = HmacSha256::new_from_slice(secret.as_bytes()).expect("HMAC accepts any key");
    mac.update(timestamp.to_string().as_bytes());
    mac.update(b".");
    mac.update(payload);
    format!("t={timestamp},v1={}", hex::encode(mac.finalize().into_bytes()))
}
