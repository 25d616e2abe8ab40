//! Local filesystem transport.
//!
//! Stores objects in a configured directory using `tokio::fs`. Useful for
//! self-hosted galleries served by a plain web server, and for development.

use crate::error::{ErrorKind, Result};
use crate::key::DestinationKey;
use crate::transport::{Payload, TransferEvent, TransferStream, Transport};
use async_stream::stream;
use std::path::{Path, PathBuf};
use tokio::fs::{self, File};
use tokio::io::AsyncWriteExt;

/// Payloads are written (and progress reported) in slices of this size.
const SLICE_SIZE: usize = 64 * 1024;
/// Suffix of the file a payload is written to before it is renamed into place.
const PARTIAL_SUFFIX: &str = ".partial";

/// Local filesystem transport.
///
/// All keys are relative to the configured root directory. Objects are
/// written to a `.partial` sibling first and renamed into place once every
/// byte is on disk, so a cancelled transfer never leaves a truncated object
/// behind under its real key.
///
/// # Examples
///
/// ```no_run
/// use keepsake_storage::transport::LocalTransport;
///
/// # fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let transport = LocalTransport::new("local", "/srv/gallery/media")?
///     .with_base_url("https://photos.example.com/media");
/// # Ok(())
/// # }
/// ```
#[derive(Clone, Debug)]
pub struct LocalTransport {
    name: String,
    /// Root directory objects are stored under
    root: PathBuf,
    /// Public URL the root directory is served from, if any
    base_url: Option<String>,
}
impl LocalTransport {
    /// Create a new local filesystem transport.
    ///
    /// # Errors
    ///
    /// Returns an error if the path is not absolute, or exists and is not a
    /// directory.
    pub fn new(name: impl Into<String>, root: impl AsRef<Path>) -> Result<Self> {
        let root = root.as_ref().to_path_buf();
        if !root.is_absolute() {
            exn::bail!(ErrorKind::InvalidRoot(root.display().to_string()));
        }
        if root.exists() {
            if !root.is_dir() {
                exn::bail!(ErrorKind::InvalidRoot(root.display().to_string()));
            }
        } else {
            // Use non-async here; it'll only happen once on startup and it's
            // not worth the hassle of making the constructor async.
            std::fs::create_dir_all(&root).map_err(|e| Self::map_io_error(e, &root))?;
        }
        Ok(Self {
            name: name.into(),
            root,
            base_url: None,
        })
    }

    /// Serve completed objects from `base_url` instead of `file://` URLs.
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = Some(base_url.into());
        self
    }

    fn absolute_path(&self, key: &DestinationKey) -> PathBuf {
        // Keys are validated on construction: no `..`, no leading `/`.
        self.root.join(key.as_str())
    }

    fn url_for(&self, key: &DestinationKey, path: &Path) -> String {
        match &self.base_url {
            Some(base) => format!("{}/{}", base.trim_end_matches('/'), key),
            None => format!("file://{}", path.display()),
        }
    }

    fn map_io_error(e: std::io::Error, path: &Path) -> ErrorKind {
        match e.kind() {
            std::io::ErrorKind::PermissionDenied => ErrorKind::PermissionDenied(path.display().to_string()),
            _ => ErrorKind::Io(e),
        }
    }

    /// Create parent directories and open the partial file. Extracted so the
    /// stream body can stay a flat sequence of yields.
    async fn open_partial(&self, path: &Path) -> Result<(PartialFile, File)> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).await.map_err(|e| Self::map_io_error(e, parent))?;
        }
        let mut partial = path.as_os_str().to_owned();
        partial.push(PARTIAL_SUFFIX);
        let partial = PathBuf::from(partial);
        let file = File::create(&partial).await.map_err(|e| Self::map_io_error(e, &partial))?;
        Ok((PartialFile { path: partial, renamed: false }, file))
    }
}

/// Deletes the partial file when dropped, unless it was renamed into place.
///
/// The transfer stream owns this, so an error partway through and a caller
/// dropping the stream both clean up the same way.
struct PartialFile {
    path: PathBuf,
    renamed: bool,
}
impl PartialFile {
    async fn rename_to(&mut self, path: &Path) -> std::io::Result<()> {
        fs::rename(&self.path, path).await?;
        self.renamed = true;
        Ok(())
    }
}
impl Drop for PartialFile {
    fn drop(&mut self) {
        if self.renamed {
            return;
        }
        // Drop can't be async; unlinking one file is quick enough to block on.
        if let Err(e) = std::fs::remove_file(&self.path)
            && e.kind() != std::io::ErrorKind::NotFound
        {
            tracing::warn!(path = %self.path.display(), error = %e, "Could not remove partial file");
        }
    }
}

impl Transport for LocalTransport {
    fn name(&self) -> &str {
        &self.name
    }

    fn transfer<'a>(&'a self, key: &'a DestinationKey, payload: Payload) -> TransferStream<'a> {
        let path = self.absolute_path(key);
        let total = payload.len();
        Box::pin(stream! {
            let (mut partial, mut file) = match self.open_partial(&path).await {
                Ok(opened) => opened,
                Err(e) => { yield Err(e); return; },
            };
            yield Ok(TransferEvent::Progress { transferred: 0, total });

            let mut transferred = 0u64;
            for slice in payload.bytes.chunks(SLICE_SIZE) {
                if let Err(e) = file.write_all(slice).await {
                    yield Err(exn::Exn::from(Self::map_io_error(e, &partial.path)));
                    return;
                }
                transferred += slice.len() as u64;
                yield Ok(TransferEvent::Progress { transferred, total });
            }
            if let Err(e) = file.sync_all().await {
                yield Err(exn::Exn::from(Self::map_io_error(e, &partial.path)));
                return;
            }
            drop(file);
            if let Err(e) = partial.rename_to(&path).await {
                yield Err(exn::Exn::from(Self::map_io_error(e, &path)));
                return;
            }
            tracing::debug!(transport = %self.name, key = %key, bytes = total, "Stored object");
            yield Ok(TransferEvent::Complete { url: self.url_for(key, &path) });
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::complete;
    use futures::StreamExt;

    fn key(raw: &str) -> DestinationKey {
        DestinationKey::parse(raw).unwrap()
    }

    #[test]
    fn test_new_requires_absolute_path() {
        let result = LocalTransport::new("local", "relative/path");
        assert!(matches!(&*result.unwrap_err(), ErrorKind::InvalidRoot(_)));
    }

    #[test]
    fn test_new_rejects_files() {
        let temp_dir = tempfile::tempdir().unwrap();
        let file_path = temp_dir.path().join("file.txt");
        std::fs::write(&file_path, b"data").unwrap();
        assert!(LocalTransport::new("local", &file_path).is_err());
    }

    #[test]
    fn test_new_creates_root() {
        let temp_dir = tempfile::tempdir().unwrap();
        let root = temp_dir.path().join("a/b/media");
        LocalTransport::new("local", &root).unwrap();
        assert!(root.is_dir());
    }

    #[tokio::test]
    async fn test_transfer_writes_object_and_returns_url() {
        let temp_dir = tempfile::tempdir().unwrap();
        let transport = LocalTransport::new("local", temp_dir.path()).unwrap().with_base_url("https://cdn.example/media/");
        let key = key("gallery-1/photo.jpg");
        let url = complete(transport.transfer(&key, Payload::new(b"jpeg bytes".to_vec(), "image/jpeg"))).await.unwrap();
        assert_eq!(url, "https://cdn.example/media/gallery-1/photo.jpg");
        assert_eq!(std::fs::read(temp_dir.path().join("gallery-1/photo.jpg")).unwrap(), b"jpeg bytes");
        assert!(!temp_dir.path().join("gallery-1/photo.jpg.partial").exists());
    }

    #[tokio::test]
    async fn test_transfer_without_base_url_uses_file_scheme() {
        let temp_dir = tempfile::tempdir().unwrap();
        let transport = LocalTransport::new("local", temp_dir.path()).unwrap();
        let key = key("memo.m4a");
        let url = complete(transport.transfer(&key, Payload::new(b"aac".to_vec(), "audio/mp4"))).await.unwrap();
        assert!(url.starts_with("file://"));
        assert!(url.ends_with("memo.m4a"));
    }

    #[tokio::test]
    async fn test_transfer_reports_monotonic_progress() {
        let temp_dir = tempfile::tempdir().unwrap();
        let transport = LocalTransport::new("local", temp_dir.path()).unwrap();
        let key = key("big.bin");
        let bytes = vec![7u8; SLICE_SIZE * 3 + 10];
        let total = bytes.len() as u64;
        let events: Vec<_> = transport.transfer(&key, Payload::new(bytes, "application/octet-stream")).collect().await;

        let progress: Vec<u64> = events
            .iter()
            .filter_map(|e| match e.as_ref().unwrap() {
                TransferEvent::Progress { transferred, total: t } => {
                    assert_eq!(*t, total);
                    Some(*transferred)
                },
                TransferEvent::Complete { .. } => None,
            })
            .collect();
        assert_eq!(progress.first(), Some(&0));
        assert_eq!(progress.last(), Some(&total));
        assert!(progress.windows(2).all(|w| w[0] <= w[1]));
        assert!(matches!(events.last().unwrap().as_ref().unwrap(), TransferEvent::Complete { .. }));
    }

    #[tokio::test]
    async fn test_transfer_overwrites_existing_object() {
        let temp_dir = tempfile::tempdir().unwrap();
        let transport = LocalTransport::new("local", temp_dir.path()).unwrap();
        let key = key("photo.jpg");
        complete(transport.transfer(&key, Payload::new(b"first".to_vec(), "image/jpeg"))).await.unwrap();
        complete(transport.transfer(&key, Payload::new(b"second".to_vec(), "image/jpeg"))).await.unwrap();
        assert_eq!(std::fs::read(temp_dir.path().join("photo.jpg")).unwrap(), b"second");
    }

    #[tokio::test]
    async fn test_dropped_transfer_leaves_no_object() {
        let temp_dir = tempfile::tempdir().unwrap();
        let transport = LocalTransport::new("local", temp_dir.path()).unwrap();
        let key = key("cancelled.bin");
        let mut transfer = transport.transfer(&key, Payload::new(vec![1u8; SLICE_SIZE * 4], "application/octet-stream"));
        // Take the first couple of progress ticks, then walk away.
        transfer.next().await.unwrap().unwrap();
        transfer.next().await.unwrap().unwrap();
        drop(transfer);
        assert!(!temp_dir.path().join("cancelled.bin").exists());
    }

    #[tokio::test]
    async fn test_dropped_transfer_removes_partial_file() {
        let temp_dir = tempfile::tempdir().unwrap();
        let transport = LocalTransport::new("local", temp_dir.path()).unwrap();
        let key = key("gallery/1-abc-photo.jpg");
        let mut transfer = transport.transfer(&key, Payload::new(vec![3u8; 200 * 1024], "image/jpeg"));
        transfer.next().await.unwrap().unwrap();
        transfer.next().await.unwrap().unwrap();
        assert!(temp_dir.path().join("gallery/1-abc-photo.jpg.partial").exists());
        drop(transfer);
        assert_eq!(std::fs::read_dir(temp_dir.path().join("gallery")).unwrap().count(), 0);
    }

    #[tokio::test]
    async fn test_failed_rename_removes_partial_file() {
        let temp_dir = tempfile::tempdir().unwrap();
        let transport = LocalTransport::new("local", temp_dir.path()).unwrap();
        // A directory already sits where the object should go.
        std::fs::create_dir_all(temp_dir.path().join("blocked.jpg/inside")).unwrap();
        let key = key("blocked.jpg");
        let result = complete(transport.transfer(&key, Payload::new(b"jpeg".to_vec(), "image/jpeg"))).await;
        assert!(result.is_err());
        assert!(!temp_dir.path().join("blocked.jpg.partial").exists());
        assert!(temp_dir.path().join("blocked.jpg/inside").is_dir());
    }
}
