//! Business logic services for the storefront.
//!
//! # Services
//!
//! - `payments` - Stripe webhook signature verification and event decoding
//! - `fulfillment` - Turns a successful charge into an order, token and receipt
//! - `downloads` - Exchanges a live token for the product file stream
//! - `email` - Purchase receipt email

pub mod downloads;
pub mod email;
pub mod fulfillment;
pub mod payments;
