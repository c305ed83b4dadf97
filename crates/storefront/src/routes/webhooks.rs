//! Stripe webhook endpoint.
//!
//! Verifies the delivery, then hands successful charges to fulfillment.

use axum::{
    body::Bytes,
    extract::State,
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
};
use chrono::Utc;
use tracing::{info, instrument, warn};

use crate::error::{AppError, add_breadcrumb};
use crate::services::fulfillment::{FulfillmentError, fulfill_charge};
use crate::services::payments::{PaymentEvent, SIGNATURE_HEADER, WebhookError};
use crate::state::AppState;

const SIGNATURE_FAILED: &str = "Webhook signature verification failed.";
const BAD_REQUEST: &str = "Bad request";
const NOT_HANDLED: &str = "Event type not handled";
const PROCESSED: &str = "Webhook received and processed";

/// Handle `POST /webhooks/stripe`.
///
/// The body is taken as raw bytes so the signature is checked over exactly
/// what Stripe sent.
#[instrument(skip(state, headers, body), fields(event_id = tracing::field::Empty, event_type = tracing::field::Empty))]
pub async fn stripe(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Response, AppError> {
    let signature = headers
        .get(SIGNATURE_HEADER)
        .and_then(|v| v.to_str().ok());

    let event = match state.verifier().verify(&body, signature, Utc::now()) {
        Ok(event) => event,
        Err(e @ (WebhookError::MissingSignature | WebhookError::InvalidSignature(_))) => {
            warn!(error = %e, "Webhook signature verification failed");
            return Ok((StatusCode::BAD_REQUEST, SIGNATURE_FAILED).into_response());
        }
        Err(e @ WebhookError::MalformedPayload(_)) => {
            warn!(error = %e, "Webhook payload rejected");
            return Ok((StatusCode::BAD_REQUEST, BAD_REQUEST).into_response());
        }
    };

    let span = tracing::Span::current();
    span.record("event_id", event.id.as_str());
    span.record("event_type", event.event_type.as_str());

    let charge = match PaymentEvent::try_from(event) {
        Ok(PaymentEvent::ChargeSucceeded(charge)) => charge,
        Ok(PaymentEvent::Unhandled(event_type)) => {
            info!(event_type = %event_type, "Unhandled event type");
            return Ok((StatusCode::BAD_REQUEST, NOT_HANDLED).into_response());
        }
        Err(e) => {
            warn!(error = %e, "Charge object rejected");
            return Ok((StatusCode::BAD_REQUEST, BAD_REQUEST).into_response());
        }
    };

    add_breadcrumb(
        "payments",
        "Charge verified",
        Some(&[("charge_id", charge.charge_id.as_str())]),
    );

    match fulfill_charge(
        state.catalog(),
        state.mailer(),
        state.base_url(),
        &charge,
        Utc::now(),
    )
    .await
    {
        Ok(_) => Ok((StatusCode::OK, PROCESSED).into_response()),
        Err(FulfillmentError::Repository(e)) => Err(AppError::Database(e)),
        Err(e) => {
            warn!(error = %e, charge_id = %charge.charge_id, "Charge not fulfilled");
            Ok((StatusCode::BAD_REQUEST, BAD_REQUEST).into_response())
        }
    }
}
