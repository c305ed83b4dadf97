//! S3-compatible object storage backend.

use async_stream::stream;
use async_trait::async_trait;
use aws_sdk_s3::error::DisplayErrorContext;
use aws_sdk_s3::operation::get_object::GetObjectError;
use aws_sdk_s3::primitives::ByteStream;
use bytes::Bytes;
use tracing::{debug, error, info, instrument};

use econ_core::BlobKey;

use crate::{BlobError, BlobObject, BlobStore, BlobStream};

/// Connection settings for [`S3BlobStore`].
#[derive(Clone)]
pub struct S3Config {
    pub bucket: String,
    pub region: String,
    /// Endpoint override for S3-compatible services (`MinIO`, `LocalStack`).
    pub endpoint_url: Option<String>,
}

impl std::fmt::Debug for S3Config {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("S3Config")
            .field("bucket", &self.bucket)
            .field("region", &self.region)
            .field("endpoint_url", &self.endpoint_url)
            .finish()
    }
}

impl S3Config {
    /// Settings for `bucket` in `region` against the default AWS endpoint.
    pub fn new(bucket: impl Into<String>, region: impl Into<String>) -> Self {
        Self {
            bucket: bucket.into(),
            region: region.into(),
            endpoint_url: None,
        }
    }

    /// Set the endpoint URL override.
    #[must_use]
    pub fn with_endpoint_url(mut self, endpoint_url: impl Into<String>) -> Self {
        self.endpoint_url = Some(endpoint_url.into());
        self
    }

    /// Public base URL objects in this bucket are served from.
    #[must_use]
    pub fn public_base_url(&self) -> String {
        format!("https://{}.s3.{}.amazonaws.com/", self.bucket, self.region)
    }
}

/// Blob store backed by an S3 bucket.
///
/// Credentials come from the standard AWS environment chain.
#[derive(Clone)]
pub struct S3BlobStore {
    bucket: String,
    client: aws_sdk_s3::Client,
}

impl std::fmt::Debug for S3BlobStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("S3BlobStore")
            .field("bucket", &self.bucket)
            .field("client", &"<S3Client>")
            .finish()
    }
}

impl S3BlobStore {
    /// Build a client from the environment credential chain.
    pub async fn new(config: S3Config) -> Self {
        let mut loader =
            aws_config::from_env().region(aws_config::Region::new(config.region.clone()));

        if let Some(endpoint) = &config.endpoint_url {
            debug!(endpoint = %endpoint, "using custom S3 endpoint");
            loader = loader.endpoint_url(endpoint);
        }

        let sdk_config = loader.load().await;
        let mut builder = aws_sdk_s3::config::Builder::from(&sdk_config);
        // S3-compatible services generally do not support virtual-hosted buckets
        if config.endpoint_url.is_some() {
            builder = builder.force_path_style(true);
        }

        Self {
            bucket: config.bucket,
            client: aws_sdk_s3::Client::from_conf(builder.build()),
        }
    }

    /// Bucket this store reads and writes.
    #[must_use]
    pub fn bucket(&self) -> &str {
        &self.bucket
    }
}

fn check_key(key: &BlobKey) -> Result<(), BlobError> {
    if key.as_str().trim().is_empty() {
        return Err(BlobError::InvalidKey(key.to_string()));
    }
    Ok(())
}

fn body_stream(mut body: ByteStream) -> BlobStream {
    Box::pin(stream! {
        loop {
            match body.try_next().await {
                Ok(Some(chunk)) => yield Ok(chunk),
                Ok(None) => break,
                Err(e) => {
                    error!(error = %DisplayErrorContext(&e), "S3 body stream failed");
                    yield Err(BlobError::Unavailable(e.to_string()));
                    break;
                }
            }
        }
    })
}

#[async_trait]
impl BlobStore for S3BlobStore {
    #[instrument(skip(self), fields(bucket = %self.bucket, key = %key))]
    async fn get(&self, key: &BlobKey) -> Result<BlobObject, BlobError> {
        check_key(key)?;

        let output = self
            .client
            .get_object()
            .bucket(&self.bucket)
            .key(key.as_str())
            .send()
            .await
            .map_err(|e| {
                if e.as_service_error().is_some_and(GetObjectError::is_no_such_key) {
                    BlobError::NotFound(key.to_string())
                } else {
                    let detail = DisplayErrorContext(&e).to_string();
                    error!(error = %detail, "S3 get_object failed");
                    BlobError::Unavailable(detail)
                }
            })?;

        let size = output.content_length().and_then(|n| u64::try_from(n).ok());
        let content_type = output.content_type().map(str::to_owned);
        debug!(?size, ?content_type, "S3 object opened");

        Ok(BlobObject {
            body: body_stream(output.body),
            size,
            content_type,
        })
    }

    #[instrument(skip(self, body), fields(bucket = %self.bucket, key = %key, size = body.len()))]
    async fn put(
        &self,
        key: &BlobKey,
        body: Bytes,
        content_type: Option<&str>,
    ) -> Result<BlobKey, BlobError> {
        check_key(key)?;

        let mut request = self
            .client
            .put_object()
            .bucket(&self.bucket)
            .key(key.as_str())
            .body(ByteStream::from(body));

        if let Some(ct) = content_type {
            request = request.content_type(ct);
        }

        request.send().await.map_err(|e| {
            let detail = DisplayErrorContext(&e).to_string();
            error!(error = %detail, "S3 put_object failed");
            BlobError::Unavailable(detail)
        })?;

        info!("S3 object uploaded");
        Ok(key.clone())
    }

    #[instrument(skip(self), fields(bucket = %self.bucket, key = %key))]
    async fn delete(&self, key: &BlobKey) -> Result<(), BlobError> {
        check_key(key)?;

        // S3 reports success for absent keys, so NotFound never surfaces here.
        self.client
            .delete_object()
            .bucket(&self.bucket)
            .key(key.as_str())
            .send()
            .await
            .map_err(|e| {
                let detail = DisplayErrorContext(&e).to_string();
                error!(error = %detail, "S3 delete_object failed");
                BlobError::Unavailable(detail)
            })?;

        info!("S3 object deleted");
        Ok(())
    }
}
