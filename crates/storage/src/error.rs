use thiserror::Error;

/// Errors from blob store operations.
#[derive(Debug, Error)]
pub enum BlobError {
    /// No object exists under the key.
    #[error("blob not found: {0}")]
    NotFound(String),

    /// The backend failed or could not be reached.
    #[error("blob store unavailable: {0}")]
    Unavailable(String),

    /// The key is empty or otherwise unusable.
    #[error("invalid blob key: {0:?}")]
    InvalidKey(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        assert_eq!(
            BlobError::NotFound("products/a.pdf".into()).to_string(),
            "blob not found: products/a.pdf"
        );
        assert_eq!(
            BlobError::InvalidKey(String::new()).to_string(),
            "invalid blob key: \"\""
        );
    }
}
