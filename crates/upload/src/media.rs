//! Media files going in, upload records coming out.

use crate::error::{ErrorKind, Result};
use async_trait::async_trait;
use exn::ResultExt;
use keepsake_compress::Compression;
use keepsake_storage::Payload;
use serde::Serialize;
use std::path::{Path, PathBuf};
use time::OffsetDateTime;

/// One guest-selected file, held in memory.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MediaFile {
    /// Original file name as chosen by the guest (may contain anything).
    pub name: String,
    /// MIME type, e.g. `image/jpeg` or `audio/mp4`.
    pub content_type: String,
    /// How `data` is encoded; [`Compression::None`] for as-is.
    pub encoding: Compression,
    pub data: Vec<u8>,
}
impl MediaFile {
    pub fn new(name: impl Into<String>, content_type: impl Into<String>, data: impl Into<Vec<u8>>) -> Self {
        Self {
            name: name.into(),
            content_type: content_type.into(),
            encoding: Compression::None,
            data: data.into(),
        }
    }

    /// Size of the file in bytes.
    pub fn size(&self) -> u64 {
        // Infallible: a usize (either 32- or 64-bit) will always fit in a u64.
        u64::try_from(self.data.len()).unwrap_or(u64::MAX)
    }

    /// Everything about the file except its bytes.
    pub fn meta(&self) -> FileMeta {
        FileMeta {
            name: self.name.clone(),
            size: self.size(),
            content_type: self.content_type.clone(),
        }
    }

    /// A file is usable for upload if it has a name, a type and some bytes.
    /// Used to reject malformed compressor output.
    pub(crate) fn is_well_formed(&self) -> bool {
        !self.name.trim().is_empty() && !self.content_type.trim().is_empty() && !self.data.is_empty()
    }

    pub(crate) fn into_payload(self) -> Payload {
        Payload::new(self.data, self.content_type).with_encoding(self.encoding)
    }
}

/// File metadata, as reported in progress snapshots.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct FileMeta {
    pub name: String,
    /// Size of the original (uncompressed) file in bytes.
    pub size: u64,
    pub content_type: String,
}

/// A stored upload.
///
/// This is the record the gallery's metadata store persists for each
/// uploaded file; nothing in this crate stores it.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadedMedia {
    /// Original file name.
    pub name: String,
    /// Where the object can be downloaded from.
    pub url: String,
    /// Stored size in bytes (after compression).
    pub size: u64,
    pub content_type: String,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}

/// Somewhere a file's bytes can be fetched from.
///
/// The scheduler only asks for [`meta`](Self::meta) up front. Bytes are
/// [`load`](Self::load)ed once a task is admitted and dropped as soon as it
/// settles, so only the current chunk's admitted files are ever resident.
#[async_trait]
pub trait MediaSource: Send + Sync {
    fn meta(&self) -> FileMeta;

    async fn load(&self) -> Result<MediaFile>;
}

/// Already in memory; loading hands out a copy.
#[async_trait]
impl MediaSource for MediaFile {
    fn meta(&self) -> FileMeta {
        MediaFile::meta(self)
    }

    async fn load(&self) -> Result<MediaFile> {
        Ok(self.clone())
    }
}

/// A file on local disk, read when its task is admitted.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MediaPath {
    path: PathBuf,
    meta: FileMeta,
}
impl MediaPath {
    /// Stat `path` without reading it.
    pub async fn open(path: impl Into<PathBuf>, content_type: impl Into<String>) -> Result<Self> {
        let path = path.into();
        let name = path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .ok_or_else(|| exn::Exn::from(ErrorKind::Load(path.display().to_string())))?;
        let metadata = tokio::fs::metadata(&path).await.or_raise(|| ErrorKind::Load(name.clone()))?;
        if !metadata.is_file() {
            exn::bail!(ErrorKind::Load(name));
        }
        Ok(Self {
            meta: FileMeta {
                name,
                size: metadata.len(),
                content_type: content_type.into(),
            },
            path,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[async_trait]
impl MediaSource for MediaPath {
    fn meta(&self) -> FileMeta {
        self.meta.clone()
    }

    async fn load(&self) -> Result<MediaFile> {
        let data = tokio::fs::read(&self.path).await.or_raise(|| ErrorKind::Load(self.meta.name.clone()))?;
        tracing::trace!(path = %self.path.display(), bytes = data.len(), "Loaded file");
        Ok(MediaFile::new(self.meta.name.clone(), self.meta.content_type.clone(), data))
    }
}
