//! Transport trait and implementations.
//!
//! A [`Transport`] moves one in-memory payload to remote object storage and
//! hands back a URL the object can be downloaded from. Everything above this
//! crate (compression, naming, retries, timeouts, concurrency) treats a
//! transport as an opaque "upload a blob, get back a URL" service.
//!

mod local;
#[cfg(feature = "mock")]
mod mock;
#[cfg(feature = "s3")]
mod s3;

pub use self::local::LocalTransport;
#[cfg(feature = "mock")]
pub use self::mock::{Behaviour, MockTransport};
#[cfg(feature = "s3")]
pub use self::s3::S3Transport;
use crate::error::{ErrorKind, Result};
use crate::key::DestinationKey;
use futures::{Stream, StreamExt};
use keepsake_compress::Compression;
use std::pin::Pin;

/// A running transfer.
///
/// Yields any number of [`TransferEvent::Progress`] events followed by
/// exactly one [`TransferEvent::Complete`], or an error. Nothing is yielded
/// after the terminal item.
///
/// **Dropping the stream cancels the transfer.** There is no separate cancel
/// handle: the stream *is* the handle.
pub type TransferStream<'a> = Pin<Box<dyn Stream<Item = Result<TransferEvent>> + Send + 'a>>;

/// Something that happened during a transfer.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum TransferEvent {
    /// Bytes acknowledged so far. `transferred` never exceeds `total` and
    /// never decreases within one transfer.
    Progress { transferred: u64, total: u64 },
    /// The object is stored and can be downloaded from `url`.
    Complete { url: String },
}

/// The bytes to store, plus the headers they should be served with.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Payload {
    pub bytes: Vec<u8>,
    pub content_type: String,
    /// How `bytes` are encoded; [`Compression::None`] for as-is.
    pub encoding: Compression,
}
impl Payload {
    pub fn new(bytes: impl Into<Vec<u8>>, content_type: impl Into<String>) -> Self {
        Self {
            bytes: bytes.into(),
            content_type: content_type.into(),
            encoding: Compression::None,
        }
    }

    pub fn with_encoding(mut self, encoding: Compression) -> Self {
        self.encoding = encoding;
        self
    }

    /// Size of the payload in bytes.
    pub fn len(&self) -> u64 {
        // Infallible: a usize (either 32- or 64-bit) will always fit in a u64.
        u64::try_from(self.bytes.len()).unwrap_or(u64::MAX)
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}

/// Unified interface for object storage transports.
///
/// It's a single-method interface that streams its own progress. Retrying,
/// timing out and limiting concurrency are the caller's job; implementations
/// should make **one** attempt per call and report failure promptly.
///
/// # Examples
///
/// ```
/// use futures::StreamExt;
/// use keepsake_storage::{DestinationKey, Payload, TransferEvent, Transport, error::Result};
///
/// async fn upload_and_report(transport: &dyn Transport) -> Result<Option<String>> {
///     let key = DestinationKey::parse("gallery-42/toast.m4a")?;
///     let mut transfer = transport.transfer(&key, Payload::new(b"...".to_vec(), "audio/mp4"));
///     while let Some(event) = transfer.next().await {
///         match event? {
///             TransferEvent::Progress { transferred, total } => println!("{transferred}/{total}"),
///             TransferEvent::Complete { url } => return Ok(Some(url)),
///         }
///     }
///     Ok(None)
/// }
/// ```
pub trait Transport: Send + Sync {
    /// Name of the configured transport (used for logging only).
    fn name(&self) -> &str;

    /// Start transferring `payload` to `key`.
    ///
    /// Nothing happens until the returned stream is polled. Writing to an
    /// existing key overwrites it.
    fn transfer<'a>(&'a self, key: &'a DestinationKey, payload: Payload) -> TransferStream<'a>;
}

/// Drive a transfer to completion, discarding progress, and return the URL.
///
/// Returns [`Interrupted`](crate::error::ErrorKind::Interrupted) if the
/// stream ends without a [`TransferEvent::Complete`].
pub async fn complete(mut transfer: TransferStream<'_>) -> Result<String> {
    while let Some(event) = transfer.next().await {
        if let TransferEvent::Complete { url } = event? {
            return Ok(url);
        }
    }
    exn::bail!(ErrorKind::Interrupted("stream ended without completing".to_string()))
}
