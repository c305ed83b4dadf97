//! Econ Admin library.
//!
//! Product catalog management for the store owner: create, edit, price,
//! (de)activate and delete products and their files. Exposed as a library so
//! the router can be tested against in-memory collaborators.
//!
//! # Security
//!
//! Every `/admin` route sits behind HTTP Basic auth against a single
//! configured account. This binary holds write access to the product table
//! and the product bucket.

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod config;
pub mod db;
pub mod error;
pub mod middleware;
pub mod routes;
pub mod services;
pub mod state;

use axum::Router;
use tower_http::trace::{DefaultOnResponse, OnResponse, TraceLayer};
use tracing::Span;

use crate::state::AppState;

/// Build the admin router with request tracing.
///
/// `max_upload_bytes` caps multipart product uploads. Sentry layers are added
/// by the binary.
pub fn app(state: AppState, max_upload_bytes: usize) -> Router {
    routes::routes(&state, max_upload_bytes)
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(|request: &axum::http::Request<_>| {
                    tracing::info_span!(
                        "http_request",
                        method = %request.method(),
                        uri = %request.uri(),
                        status = tracing::field::Empty,
                        latency_ms = tracing::field::Empty,
                    )
                })
                .on_response(
                    |response: &axum::http::Response<_>,
                     latency: std::time::Duration,
                     span: &Span| {
                        span.record("status", response.status().as_u16());
                        span.record(
                            "latency_ms",
                            u64::try_from(latency.as_millis()).unwrap_or(u64::MAX),
                        );
                        DefaultOnResponse::default().on_response(response, latency, span);
                    },
                ),
        )
        .with_state(state)
}
