//! HTTP middleware stack for admin.
//!
//! # Middleware Order (outermost first)
//!
//! 1. Sentry layers (capture errors)
//! 2. `TraceLayer` (request tracing)
//! 3. Basic auth gate on every `/admin` route

pub mod basic_auth;

pub use basic_auth::{BasicAuth, hash_password, require_basic_auth};
