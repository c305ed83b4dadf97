//! HTTP Basic auth gate for the admin routes.
//!
//! The password is never stored: the configured value is the base64 SHA-512
//! of it, and each request's password is hashed the same way before a
//! constant-time comparison.

use axum::{
    extract::{Request, State},
    http::{HeaderValue, StatusCode, header},
    middleware::Next,
    response::{IntoResponse, Response},
};
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use secrecy::{ExposeSecret, SecretString};
use sha2::{Digest, Sha512};
use tracing::warn;

use crate::config::AdminCredentialsConfig;
use crate::state::AppState;

/// Challenge sent with every 401.
pub const CHALLENGE: &str = "Basic realm=\"admin\"";

/// Hash a password the way `HASHED_ADMIN_PASSWORD` expects: base64 of its
/// SHA-512 digest.
#[must_use]
pub fn hash_password(password: &str) -> String {
    STANDARD.encode(Sha512::digest(password.as_bytes()))
}

/// The configured admin credentials.
#[derive(Clone)]
pub struct BasicAuth {
    username: String,
    hashed_password: SecretString,
}

impl std::fmt::Debug for BasicAuth {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BasicAuth")
            .field("username", &self.username)
            .field("hashed_password", &"[REDACTED]")
            .finish()
    }
}

impl BasicAuth {
    #[must_use]
    pub const fn new(username: String, hashed_password: SecretString) -> Self {
        Self {
            username,
            hashed_password,
        }
    }

    #[must_use]
    pub fn from_config(config: &AdminCredentialsConfig) -> Self {
        Self::new(config.username.clone(), config.hashed_password.clone())
    }

    /// Check a user name and plain password.
    #[must_use]
    pub fn verify(&self, username: &str, password: &str) -> bool {
        let user_ok = constant_time_compare(username, &self.username);
        let password_ok =
            constant_time_compare(&hash_password(password), self.hashed_password.expose_secret());
        user_ok & password_ok
    }

    /// Check an `Authorization` header value.
    #[must_use]
    pub fn verify_header(&self, authorization: Option<&str>) -> bool {
        authorization
            .and_then(decode_basic)
            .is_some_and(|(username, password)| self.verify(&username, &password))
    }
}

/// Split `Basic <base64(user:pass)>` into its parts.
///
/// The password is everything after the first `:`, so it may contain colons.
fn decode_basic(value: &str) -> Option<(String, String)> {
    let (scheme, encoded) = value.trim().split_once(' ')?;
    if !scheme.eq_ignore_ascii_case("basic") {
        return None;
    }
    let decoded = STANDARD.decode(encoded.trim()).ok()?;
    let decoded = String::from_utf8(decoded).ok()?;
    let (username, password) = decoded.split_once(':')?;
    Some((username.to_string(), password.to_string()))
}

/// Constant-time string comparison to prevent timing attacks.
fn constant_time_compare(a: &str, b: &str) -> bool {
    if a.len() != b.len() {
        return false;
    }

    let mut result: u8 = 0;
    for (x, y) in a.bytes().zip(b.bytes()) {
        result |= x ^ y;
    }

    result == 0
}

/// Reject requests without valid admin credentials.
pub async fn require_basic_auth(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Response {
    let authorization = request
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok());

    if state.auth().verify_header(authorization) {
        return next.run(request).await;
    }

    warn!(path = %request.uri().path(), "Rejected admin request without valid credentials");
    let mut response = (StatusCode::UNAUTHORIZED, "Unauthorized").into_response();
    response
        .headers_mut()
        .insert(header::WWW_AUTHENTICATE, HeaderValue::from_static(CHALLENGE));
    response
}
