//! Admin configuration loaded from environment variables.
//!
//! # Environment Variables
//!
//! ## Required
//! - `ADMIN_DATABASE_URL` - `PostgreSQL` connection string (falls back to `DATABASE_URL`)
//! - `ADMIN_USERNAME` - Basic auth user name
//! - `HASHED_ADMIN_PASSWORD` - base64 SHA-512 of the admin password
//!   (print one with `econ-cli hash-password`)
//! - `STORAGE_BUCKET` - Object storage bucket for product files and images
//!
//! ## Optional
//! - `ADMIN_HOST` - Bind address (default: 127.0.0.1)
//! - `ADMIN_PORT` - Listen port (default: 3001)
//! - `ADMIN_MAX_UPLOAD_MB` - Largest accepted multipart body (default: 100)
//! - `STORAGE_REGION` - Bucket region (default: us-east-2)
//! - `STORAGE_BASE_URL` - Public URL prefix written into product paths
//!   (default: `https://<bucket>.s3.<region>.amazonaws.com/`)
//! - `STORAGE_ENDPOINT_URL` - Endpoint override for S3-compatible services
//! - `SENTRY_DSN`, `SENTRY_ENVIRONMENT`, `SENTRY_SAMPLE_RATE`, `SENTRY_TRACES_SAMPLE_RATE`

use std::net::{IpAddr, SocketAddr};

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use econ_storage::S3Config;
use secrecy::SecretString;
use thiserror::Error;

/// SHA-512 digest length in bytes.
const SHA512_LEN: usize = 64;

const DEFAULT_MAX_UPLOAD_MB: usize = 100;

/// Configuration errors that can occur during loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing environment variable: {0}")]
    MissingEnvVar(String),
    #[error("Invalid environment variable {0}: {1}")]
    InvalidEnvVar(String, String),
    #[error("Insecure secret in {0}: {1}")]
    InsecureSecret(String, String),
}

/// Admin application configuration.
#[derive(Debug, Clone)]
pub struct AdminConfig {
    /// `PostgreSQL` database connection URL (contains password)
    pub database_url: SecretString,
    /// IP address to bind the server to
    pub host: IpAddr,
    /// Port to listen on
    pub port: u16,
    /// Basic auth credentials
    pub credentials: AdminCredentialsConfig,
    /// Object storage for product files and images
    pub storage: StorageConfig,
    /// Largest accepted request body, in bytes
    pub max_upload_bytes: usize,
    /// Sentry DSN for error tracking
    pub sentry_dsn: Option<String>,
    /// Sentry environment (e.g., "development", "staging", "production")
    pub sentry_environment: Option<String>,
    /// Sentry error sample rate (0.0 to 1.0)
    pub sentry_sample_rate: f32,
    /// Sentry traces sample rate for performance monitoring (0.0 to 1.0)
    pub sentry_traces_sample_rate: f32,
}

/// Basic auth credentials.
///
/// Implements `Debug` manually to redact the password hash.
#[derive(Clone)]
pub struct AdminCredentialsConfig {
    pub username: String,
    /// base64 SHA-512 of the password
    pub hashed_password: SecretString,
}

impl std::fmt::Debug for AdminCredentialsConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AdminCredentialsConfig")
            .field("username", &self.username)
            .field("hashed_password", &"[REDACTED]")
            .finish()
    }
}

/// Object storage configuration.
#[derive(Debug, Clone)]
pub struct StorageConfig {
    pub bucket: String,
    pub region: String,
    /// Public URL prefix written into `file_path` and `image_path`
    pub base_url: String,
    pub endpoint_url: Option<String>,
}

impl StorageConfig {
    /// Connection settings for the S3 blob store.
    #[must_use]
    pub fn s3(&self) -> S3Config {
        let config = S3Config::new(&self.bucket, &self.region);
        match &self.endpoint_url {
            Some(endpoint) => config.with_endpoint_url(endpoint),
            None => config,
        }
    }

    fn from_env() -> Result<Self, ConfigError> {
        let bucket = get_required_env("STORAGE_BUCKET")?;
        let region = get_env_or_default("STORAGE_REGION", "us-east-2");
        let base_url = get_optional_env("STORAGE_BASE_URL")
            .unwrap_or_else(|| S3Config::new(&bucket, &region).public_base_url());

        Ok(Self {
            bucket,
            region,
            base_url,
            endpoint_url: get_optional_env("STORAGE_ENDPOINT_URL"),
        })
    }
}

impl AdminCredentialsConfig {
    fn from_env() -> Result<Self, ConfigError> {
        let username = get_required_env("ADMIN_USERNAME")?;
        if username.is_empty() || username.contains(':') {
            return Err(ConfigError::InvalidEnvVar(
                "ADMIN_USERNAME".to_string(),
                "must be non-empty and must not contain ':'".to_string(),
            ));
        }

        let hashed = get_required_env("HASHED_ADMIN_PASSWORD")?;
        validate_password_hash(&hashed, "HASHED_ADMIN_PASSWORD")?;

        Ok(Self {
            username,
            hashed_password: SecretString::from(hashed),
        })
    }
}

impl AdminConfig {
    /// Load configuration from environment variables.
    ///
    /// Calls `dotenvy::dotenv()` to load from `.env` file if present.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if required variables are missing or invalid, or
    /// if the password hash is not a base64 SHA-512 digest.
    pub fn from_env() -> Result<Self, ConfigError> {
        // Load .env file if present (ignore errors if not found)
        let _ = dotenvy::dotenv();

        let database_url = get_database_url("ADMIN_DATABASE_URL")?;
        let host = get_env_or_default("ADMIN_HOST", "127.0.0.1")
            .parse::<IpAddr>()
            .map_err(|e| ConfigError::InvalidEnvVar("ADMIN_HOST".to_string(), e.to_string()))?;
        let port = get_env_or_default("ADMIN_PORT", "3001")
            .parse::<u16>()
            .map_err(|e| ConfigError::InvalidEnvVar("ADMIN_PORT".to_string(), e.to_string()))?;
        let max_upload_mb = get_optional_env("ADMIN_MAX_UPLOAD_MB")
            .map(|v| v.parse::<usize>())
            .transpose()
            .map_err(|e| {
                ConfigError::InvalidEnvVar("ADMIN_MAX_UPLOAD_MB".to_string(), e.to_string())
            })?
            .unwrap_or(DEFAULT_MAX_UPLOAD_MB);

        let credentials = AdminCredentialsConfig::from_env()?;
        let storage = StorageConfig::from_env()?;
        let sentry_dsn = get_optional_env("SENTRY_DSN");
        let sentry_environment = get_optional_env("SENTRY_ENVIRONMENT");
        let sentry_sample_rate = get_optional_env("SENTRY_SAMPLE_RATE")
            .and_then(|s| s.parse().ok())
            .unwrap_or(1.0);
        let sentry_traces_sample_rate = get_optional_env("SENTRY_TRACES_SAMPLE_RATE")
            .and_then(|s| s.parse().ok())
            .unwrap_or(1.0);

        Ok(Self {
            database_url,
            host,
            port,
            credentials,
            storage,
            max_upload_bytes: max_upload_mb.saturating_mul(1024 * 1024),
            sentry_dsn,
            sentry_environment,
            sentry_sample_rate,
            sentry_traces_sample_rate,
        })
    }

    /// Returns the socket address for binding the server.
    #[must_use]
    pub const fn socket_addr(&self) -> SocketAddr {
        SocketAddr::new(self.host, self.port)
    }
}

// =============================================================================
// Helper Functions
// =============================================================================

/// Get a required environment variable.
fn get_required_env(key: &str) -> Result<String, ConfigError> {
    std::env::var(key).map_err(|_| ConfigError::MissingEnvVar(key.to_string()))
}

/// Get database URL with fallback to generic `DATABASE_URL` (used by Fly.io postgres attach).
fn get_database_url(primary_key: &str) -> Result<SecretString, ConfigError> {
    if let Ok(value) = std::env::var(primary_key) {
        return Ok(SecretString::from(value));
    }
    if let Ok(value) = std::env::var("DATABASE_URL") {
        return Ok(SecretString::from(value));
    }
    Err(ConfigError::MissingEnvVar(primary_key.to_string()))
}

/// Get an optional environment variable.
fn get_optional_env(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.is_empty())
}

/// Get an environment variable with a default value.
fn get_env_or_default(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}

/// Check that `value` is a base64 SHA-512 digest rather than a plain password.
fn validate_password_hash(value: &str, var_name: &str) -> Result<(), ConfigError> {
    match STANDARD.decode(value) {
        Ok(digest) if digest.len() == SHA512_LEN => Ok(()),
        Ok(digest) => Err(ConfigError::InsecureSecret(
            var_name.to_string(),
            format!(
                "decodes to {} bytes, expected a {SHA512_LEN} byte SHA-512 digest. Use `econ-cli hash-password`.",
                digest.len()
            ),
        )),
        Err(_) => Err(ConfigError::InsecureSecret(
            var_name.to_string(),
            "is not base64; it looks like a plain password. Use `econ-cli hash-password`."
                .to_string(),
        )),
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::middleware::basic_auth::hash_password;

    #[test]
    fn test_validate_password_hash_accepts_digest() {
        let hashed = hash_password("correct horse battery staple");
        assert!(validate_password_hash(&hashed, "HASHED_ADMIN_PASSWORD").is_ok());
    }

    #[test]
    fn test_validate_password_hash_rejects_plain_password() {
        assert!(matches!(
            validate_password_hash("hunter2!", "HASHED_ADMIN_PASSWORD"),
            Err(ConfigError::InsecureSecret(_, _))
        ));
        assert!(matches!(
            validate_password_hash("aGVsbG8=", "HASHED_ADMIN_PASSWORD"),
            Err(ConfigError::InsecureSecret(_, _))
        ));
    }

    #[test]
    fn test_credentials_debug_redacts_hash() {
        let credentials = AdminCredentialsConfig {
            username: "admin".to_string(),
            hashed_password: SecretString::from(hash_password("pw")),
        };

        let debug_output = format!("{credentials:?}");
        assert!(debug_output.contains("admin"));
        assert!(debug_output.contains("[REDACTED]"));
        assert!(!debug_output.contains(&hash_password("pw")));
    }

    #[test]
    fn test_storage_s3_settings() {
        let storage = StorageConfig {
            bucket: "econ-site-data".to_string(),
            region: "us-west-1".to_string(),
            base_url: "https://econ-site-data.s3.us-west-1.amazonaws.com/".to_string(),
            endpoint_url: None,
        };

        let s3 = storage.s3();
        assert_eq!(s3.region, "us-west-1");
        assert!(s3.endpoint_url.is_none());
    }
}
