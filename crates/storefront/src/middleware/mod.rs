//! HTTP middleware stack for the storefront.
//!
//! # Middleware Order (outermost first)
//!
//! 1. Sentry layers (capture errors, one transaction per request)
//! 2. `TraceLayer` (request span)
//! 3. Request ID (record `x-request-id` in the span and on the response)

pub mod request_id;

pub use request_id::{REQUEST_ID_HEADER, request_id_middleware};
