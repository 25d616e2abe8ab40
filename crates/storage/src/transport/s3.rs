//! S3-compatible transport.
//!
//! Works with AWS S3, Backblaze B2, Tigris (Fly.io), MinIO and any other
//! service speaking the S3 API. Credentials are provided explicitly via the
//! configuration file.

use crate::error::{ErrorKind, Result};
use crate::key::DestinationKey;
use crate::transport::{Payload, TransferEvent, TransferStream, Transport};
use async_stream::stream;
use aws_sdk_s3::{
    Client,
    config::{BehaviorVersion, Credentials, Region, retry::RetryConfig},
    error::DisplayErrorContext,
    primitives::ByteStream,
};
use exn::ResultExt;
use std::sync::Arc;
use tokio::sync::{OwnedSemaphorePermit, Semaphore};

/// Upper bound on concurrent `PutObject` requests from one transport, however
/// many batches share it.
const DEFAULT_CONCURRENT_REQUESTS: usize = 16;

/// S3-compatible transport.
///
/// Objects are stored in a bucket, optionally under a key prefix. The SDK's
/// own retries are disabled: the upload pipeline owns the retry policy, and
/// stacking two policies makes attempt counts and timeouts meaningless.
///
/// # Examples
///
/// ```no_run
/// use keepsake_storage::transport::S3Transport;
///
/// # fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let transport = S3Transport::new(
///     "weddings",
///     "wedding-media",
///     Some("uploads/".to_string()),
///     "us-west-004",
///     Some("https://s3.us-west-004.backblazeb2.com".to_string()),
///     "access_key_id",
///     "secret_access_key",
/// )?
/// .with_public_url("https://media.example.com");
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct S3Transport {
    name: String,
    client: Client,
    bucket: String,
    prefix: Option<String>,
    endpoint: Option<String>,
    region: String,
    /// Public (CDN) base URL objects are served from, if not the endpoint.
    public_url: Option<String>,
    rate_limiter: Arc<Semaphore>,
}

impl S3Transport {
    /// Create a new S3 transport.
    ///
    /// # Arguments
    /// * `name` - A name for this transport (used in logging)
    /// * `bucket` - S3 bucket name
    /// * `prefix` - Optional key prefix (acts as virtual directory)
    /// * `region` - AWS region or provider-specific region (e.g., "us-west-004" for Backblaze)
    /// * `endpoint` - Custom endpoint URL for S3-compatible services
    /// * `key_id` - Access key ID
    /// * `key_secret` - Secret access key
    pub fn new(
        name: impl Into<String>,
        bucket: impl Into<String>,
        prefix: Option<String>,
        region: impl Into<String>,
        endpoint: Option<String>,
        key_id: impl Into<String>,
        key_secret: impl Into<String>,
    ) -> Result<Self> {
        let prefix = prefix
            .map(|p| DestinationKey::parse(&p).map(|key| key.as_str().to_string()))
            .transpose()?;
        let region = region.into();
        let credentials = Credentials::new(key_id, key_secret, None, None, "keepsake-config");
        let mut config_builder = aws_sdk_s3::Config::builder()
            .behavior_version(BehaviorVersion::latest())
            .credentials_provider(credentials)
            .region(Region::new(region.clone()))
            .retry_config(RetryConfig::disabled())
            // Path-style addressing for S3-compatible services (Backblaze, MinIO, etc.)
            .force_path_style(true);
        if let Some(endpoint_url) = &endpoint {
            config_builder = config_builder.endpoint_url(endpoint_url);
        }
        Ok(Self {
            name: name.into(),
            client: Client::from_conf(config_builder.build()),
            bucket: bucket.into(),
            prefix,
            endpoint,
            region,
            public_url: None,
            rate_limiter: Arc::new(Semaphore::new(DEFAULT_CONCURRENT_REQUESTS)),
        })
    }

    /// Serve completed objects from `public_url` (usually a CDN) instead of
    /// the bucket endpoint.
    pub fn with_public_url(mut self, public_url: impl Into<String>) -> Self {
        self.public_url = Some(public_url.into());
        self
    }

    /// Construct the full S3 key from a destination key.
    fn full_key(&self, key: &DestinationKey) -> String {
        join_prefix(self.prefix.as_deref(), key)
    }

    fn url_for(&self, full_key: &str) -> String {
        object_url(
            self.public_url.as_deref(),
            self.endpoint.as_deref(),
            &self.region,
            &self.bucket,
            full_key,
        )
    }

    /// Acquire a rate limiter permit before making an S3 API call.
    async fn acquire_permit(&self) -> Result<OwnedSemaphorePermit> {
        self.rate_limiter
            .clone()
            .acquire_owned()
            .await
            .or_raise(|| ErrorKind::BackendError("S3 rate limiter closed".to_string()))
    }
}

fn join_prefix(prefix: Option<&str>, key: &DestinationKey) -> String {
    match prefix {
        Some(prefix) => format!("{}/{}", prefix.trim_end_matches('/'), key),
        None => key.to_string(),
    }
}

fn object_url(public_url: Option<&str>, endpoint: Option<&str>, region: &str, bucket: &str, full_key: &str) -> String {
    match (public_url, endpoint) {
        (Some(public), _) => format!("{}/{}", public.trim_end_matches('/'), full_key),
        // Path-style, matching how the client addresses the bucket.
        (None, Some(endpoint)) => format!("{}/{}/{}", endpoint.trim_end_matches('/'), bucket, full_key),
        (None, None) => format!("https://s3.{region}.amazonaws.com/{bucket}/{full_key}"),
    }
}

impl Transport for S3Transport {
    fn name(&self) -> &str {
        &self.name
    }

    fn transfer<'a>(&'a self, key: &'a DestinationKey, payload: Payload) -> TransferStream<'a> {
        Box::pin(stream! {
            let full_key = self.full_key(key);
            let total = payload.len();
            let _permit = match self.acquire_permit().await {
                Ok(permit) => permit,
                Err(e) => { yield Err(e); return; },
            };
            // PutObject is a single request; the SDK exposes no byte-level
            // progress for it, so report the start and the acknowledgement.
            yield Ok(TransferEvent::Progress { transferred: 0, total });

            let mut request = self
                .client
                .put_object()
                .bucket(&self.bucket)
                .key(&full_key)
                .content_type(&payload.content_type)
                .content_length(i64::try_from(total).unwrap_or(i64::MAX));
            if let Some(encoding) = payload.encoding.content_encoding() {
                request = request.content_encoding(encoding);
            }
            let result = request.body(ByteStream::from(payload.bytes)).send().await;
            if let Err(e) = result {
                let message = DisplayErrorContext(&e).to_string();
                tracing::debug!(transport = %self.name, key = %full_key, error = %message, "PutObject failed");
                yield Err(exn::Exn::from(ErrorKind::Network(message)));
                return;
            }

            yield Ok(TransferEvent::Progress { transferred: total, total });
            yield Ok(TransferEvent::Complete { url: self.url_for(&full_key) });
        })
    }
}
