//! Blob keys for product files and images.
//!
//! A blob key is the storage-relative path of an object, independent of the
//! public base URL the bucket is served from. Product rows normally store the
//! bare key, but older rows stored the full public URL, so every read path
//! goes through [`BlobKey::from_stored_path`].

use core::fmt;

/// Prefix for downloadable product files.
pub const PRODUCT_FILE_PREFIX: &str = "products";

/// Prefix for product cover images.
pub const PRODUCT_IMAGE_PREFIX: &str = "images";

/// A storage-relative object key.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct BlobKey(String);

impl BlobKey {
    /// Wrap an already-relative key.
    #[must_use]
    pub fn new(key: impl Into<String>) -> Self {
        Self(key.into())
    }

    /// Derive the key from a stored file path, stripping `base_url` when the
    /// path starts with it. Paths without the prefix are returned unchanged.
    ///
    /// ```
    /// use econ_core::BlobKey;
    ///
    /// let base = "https://bucket.s3.us-east-2.amazonaws.com/";
    /// let key = BlobKey::from_stored_path("https://bucket.s3.us-east-2.amazonaws.com/products/a.pdf", base);
    /// assert_eq!(key.as_str(), "products/a.pdf");
    /// assert_eq!(BlobKey::from_stored_path("products/a.pdf", base).as_str(), "products/a.pdf");
    /// ```
    #[must_use]
    pub fn from_stored_path(path: &str, base_url: &str) -> Self {
        let base = base_url.trim_end_matches('/');
        let key = if base.is_empty() {
            path
        } else {
            path.strip_prefix(base)
                .and_then(|rest| rest.strip_prefix('/'))
                .unwrap_or(path)
        };
        Self(key.to_owned())
    }

    /// Build a fresh key for an uploaded file: `<prefix>/<uuid>-<file name>`.
    ///
    /// Only the final path component of `file_name` is kept so client-supplied
    /// names cannot escape the prefix.
    #[must_use]
    pub fn for_upload(prefix: &str, file_name: &str) -> Self {
        let name = file_name
            .rsplit(['/', '\\'])
            .next()
            .filter(|name| !name.is_empty())
            .unwrap_or("upload");
        Self(format!("{prefix}/{}-{name}", uuid::Uuid::new_v4()))
    }

    /// The path stored in the catalog for this key: the public storage URL,
    /// or the bare key when no base URL is configured.
    ///
    /// Inverse of [`BlobKey::from_stored_path`].
    #[must_use]
    pub fn stored_path(&self, base_url: &str) -> String {
        if base_url.is_empty() {
            return self.0.clone();
        }
        format!("{}/{}", base_url.trim_end_matches('/'), self.0)
    }

    /// The key as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// The suffix after the last `.` of the final path component, if any.
    #[must_use]
    pub fn extension(&self) -> Option<&str> {
        let file = self.0.rsplit('/').next().unwrap_or(&self.0);
        file.rsplit_once('.')
            .map(|(_, ext)| ext)
            .filter(|ext| !ext.is_empty())
    }

    /// The attachment file name offered to the buyer: `<product name>.<ext>`.
    ///
    /// Double quotes and control characters in the product name are replaced
    /// so the value can sit inside a quoted `Content-Disposition` parameter.
    #[must_use]
    pub fn attachment_filename(&self, product_name: &str) -> String {
        let name: String = product_name
            .chars()
            .map(|c| if c == '"' || c.is_control() { '_' } else { c })
            .collect();
        match self.extension() {
            Some(ext) => format!("{name}.{ext}"),
            None => name,
        }
    }
}

impl fmt::Display for BlobKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for BlobKey {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl From<BlobKey> for String {
    fn from(key: BlobKey) -> Self {
        key.0
    }
}
