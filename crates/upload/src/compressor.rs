//! The compressor seam.
//!
//! A [`Compressor`] turns one [`MediaFile`] into a possibly-smaller one.
//! Compression is best-effort: whatever a compressor does (errors, garbage
//! output, panics), the upload carries on with the original bytes. See
//! [`compress_or_original`].

use crate::error::{ErrorKind, Result};
use crate::media::MediaFile;
use async_trait::async_trait;
use exn::ResultExt;
use futures::FutureExt;
use keepsake_compress::Compression;
use serde::{Deserialize, Serialize};
use std::borrow::Cow;
use std::panic::AssertUnwindSafe;
use tracing::instrument;

const BYTES_PER_MB: f64 = 1024.0 * 1024.0;

/// Knobs passed to every compressor call.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CompressOptions {
    /// Files at or under this size are left alone.
    pub max_size_mb: f64,
    /// Longest edge, in pixels, for compressors that resample images.
    pub max_dimension: u32,
}
impl Default for CompressOptions {
    fn default() -> Self {
        Self { max_size_mb: 1.0, max_dimension: 1920 }
    }
}
impl CompressOptions {
    fn max_size_bytes(&self) -> f64 {
        self.max_size_mb * BYTES_PER_MB
    }
}

#[async_trait]
pub trait Compressor: Send + Sync {
    /// Compress `file`.
    ///
    /// Returns `Ok(None)` when the original should be sent unchanged.
    async fn compress(&self, file: &MediaFile, options: &CompressOptions) -> Result<Option<MediaFile>>;
}

/// Sends every file as-is.
#[derive(Clone, Copy, Debug, Default)]
pub struct Passthrough;

#[async_trait]
impl Compressor for Passthrough {
    async fn compress(&self, _file: &MediaFile, _options: &CompressOptions) -> Result<Option<MediaFile>> {
        Ok(None)
    }
}

/// Compresses files with a general-purpose byte codec and records it as the
/// payload's `Content-Encoding`.
///
/// Only worth it for raw formats (BMP, TIFF, WAV, SVG, ...): JPEG, HEIC, AAC
/// and friends are already compressed and are skipped without trying. Byte
/// codecs can't resample, so `max_dimension` is ignored.
#[derive(Clone, Copy, Debug)]
pub struct CodecCompressor {
    codec: Compression,
}
impl CodecCompressor {
    pub fn new(codec: Compression) -> Self {
        Self { codec }
    }

    pub fn codec(&self) -> Compression {
        self.codec
    }
}

#[async_trait]
impl Compressor for CodecCompressor {
    #[instrument(skip_all, fields(file = %file.name, codec = %self.codec, size = file.data.len()))]
    async fn compress(&self, file: &MediaFile, options: &CompressOptions) -> Result<Option<MediaFile>> {
        if self.codec == Compression::None
            || file.encoding != Compression::None
            || is_precompressed(&file.content_type)
            || (file.data.len() as f64) <= options.max_size_bytes()
        {
            return Ok(None);
        }
        let codec = self.codec;
        let data = file.data.clone();
        let compressed = tokio::task::spawn_blocking(move || codec.compress_if_smaller(&data))
            .await
            .or_raise(|| ErrorKind::Compression)?
            .or_raise(|| ErrorKind::Compression)?;
        Ok(compressed.map(|data| MediaFile {
            name: file.name.clone(),
            content_type: file.content_type.clone(),
            encoding: codec,
            data,
        }))
    }
}

/// Media types whose payload is already entropy-coded.
fn is_precompressed(content_type: &str) -> bool {
    let essence = content_type.split(';').next().unwrap_or_default().trim().to_ascii_lowercase();
    let Some((kind, subtype)) = essence.split_once('/') else {
        return false;
    };
    match kind {
        "image" => !matches!(subtype, "bmp" | "x-ms-bmp" | "svg+xml" | "tiff" | "x-portable-pixmap"),
        "audio" => !matches!(subtype, "wav" | "x-wav" | "wave" | "vnd.wave" | "aiff" | "x-aiff"),
        "video" => true,
        "application" => matches!(subtype, "zip" | "gzip" | "x-bzip2" | "zstd" | "x-7z-compressed" | "pdf"),
        _ => false,
    }
}

/// Run `compressor` on `file`, falling back to the original on any failure.
///
/// Never fails: compressor errors, panics and malformed output (missing
/// name, type or bytes) all yield the original file.
pub async fn compress_or_original<'a>(
    compressor: &dyn Compressor,
    file: &'a MediaFile,
    options: &CompressOptions,
) -> Cow<'a, MediaFile> {
    match AssertUnwindSafe(compressor.compress(file, options)).catch_unwind().await {
        Ok(Ok(Some(compressed))) if compressed.is_well_formed() => {
            tracing::debug!(file = %file.name, from = file.size(), to = compressed.size(), "Compressed");
            Cow::Owned(compressed)
        },
        Ok(Ok(Some(_))) => {
            tracing::warn!(file = %file.name, "Compressor returned a malformed file; sending original");
            Cow::Borrowed(file)
        },
        Ok(Ok(None)) => Cow::Borrowed(file),
        Ok(Err(error)) => {
            tracing::warn!(file = %file.name, error = ?error, "Compression failed; sending original");
            Cow::Borrowed(file)
        },
        Err(_panic) => {
            tracing::warn!(file = %file.name, "Compressor panicked; sending original");
            Cow::Borrowed(file)
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    struct Failing;
    #[async_trait]
    impl Compressor for Failing {
        async fn compress(&self, _file: &MediaFile, _options: &CompressOptions) -> Result<Option<MediaFile>> {
            exn::bail!(ErrorKind::Compression)
        }
    }

    struct Panicking;
    #[async_trait]
    impl Compressor for Panicking {
        async fn compress(&self, _file: &MediaFile, _options: &CompressOptions) -> Result<Option<MediaFile>> {
            panic!("decoder exploded")
        }
    }

    struct Nameless;
    #[async_trait]
    impl Compressor for Nameless {
        async fn compress(&self, file: &MediaFile, _options: &CompressOptions) -> Result<Option<MediaFile>> {
            Ok(Some(MediaFile::new("", file.content_type.clone(), vec![1])))
        }
    }

    fn raw_audio(len: usize) -> MediaFile {
        MediaFile::new("toast.wav", "audio/wav", b"RIFF....WAVE".iter().copied().cycle().take(len).collect::<Vec<_>>())
    }

    #[rstest]
    #[case("image/jpeg", true)]
    #[case("image/HEIC", true)]
    #[case("image/bmp", false)]
    #[case("image/svg+xml; charset=utf-8", false)]
    #[case("audio/mp4", true)]
    #[case("audio/wav", false)]
    #[case("video/quicktime", true)]
    #[case("application/zip", true)]
    #[case("application/octet-stream", false)]
    #[case("text/plain", false)]
    #[case("garbage", false)]
    fn test_is_precompressed(#[case] content_type: &str, #[case] expected: bool) {
        assert_eq!(is_precompressed(content_type), expected);
    }

    #[tokio::test]
    async fn test_codec_compresses_large_raw_files() {
        let file = raw_audio(2 * 1024 * 1024);
        let compressed = CodecCompressor::new(Compression::Gzip)
            .compress(&file, &CompressOptions::default())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(compressed.encoding, Compression::Gzip);
        assert_eq!(compressed.name, file.name);
        assert!(compressed.size() < file.size());
        assert_eq!(Compression::Gzip.decompress(&compressed.data).unwrap(), file.data);
    }

    #[rstest]
    #[case::small(raw_audio(1024), "audio/wav")]
    #[case::precompressed(raw_audio(2 * 1024 * 1024), "image/jpeg")]
    #[tokio::test]
    async fn test_codec_skips(#[case] mut file: MediaFile, #[case] content_type: &str) {
        file.content_type = content_type.to_string();
        let result = CodecCompressor::new(Compression::Gzip).compress(&file, &CompressOptions::default()).await;
        assert_eq!(result.unwrap(), None);
    }

    #[tokio::test]
    async fn test_codec_none_skips() {
        let file = raw_audio(2 * 1024 * 1024);
        let result = CodecCompressor::new(Compression::None).compress(&file, &CompressOptions::default()).await;
        assert_eq!(result.unwrap(), None);
    }

    #[rstest]
    #[case::failing(&Failing)]
    #[case::panicking(&Panicking)]
    #[case::malformed(&Nameless)]
    #[case::passthrough(&Passthrough)]
    #[tokio::test]
    async fn test_falls_back_to_original(#[case] compressor: &dyn Compressor) {
        let file = raw_audio(64);
        let result = compress_or_original(compressor, &file, &CompressOptions::default()).await;
        assert!(matches!(result, Cow::Borrowed(_)));
        assert_eq!(*result, file);
    }

    #[tokio::test]
    async fn test_keeps_well_formed_output() {
        let file = raw_audio(2 * 1024 * 1024);
        let compressor = CodecCompressor::new(Compression::Bzip2);
        let result = compress_or_original(&compressor, &file, &CompressOptions::default()).await;
        assert_eq!(result.encoding, Compression::Bzip2);
    }
}
