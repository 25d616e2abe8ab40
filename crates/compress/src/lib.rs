//! Byte codecs for shrinking uploads in memory.
//!
//! This crate wraps a couple of compression libraries behind a unified
//! [`Compression`] enum, providing:
//!
//! - **Parsing** from configuration strings ([`Compression::from_str`](std::str::FromStr))
//! - **In-memory** compression/decompression ([`Compression::compress`],
//!   [`Compression::decompress`])
//! - **Opportunistic** compression that only keeps the result when it is
//!   actually smaller ([`Compression::compress_if_smaller`])
//!
//! Gzip and Bzip2 are always available. Zstd is behind the `zstd` feature.
//! Uploads are compressed once and then held in memory for the lifetime of a
//! transfer, so nothing here streams.

pub mod cli;
mod construct;
pub mod error;
mod ops;
mod util;

/// A supported compression format.
///
/// Variants gated behind feature flags are only available when the
/// corresponding feature is enabled. Defaults to [`None`](Self::None)
/// (uncompressed, sent as-is).
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum Compression {
    /// Uncompressed
    #[default]
    None,
    /// Bzip2 compression
    Bzip2,
    /// Gzip compression
    Gzip,
    /// Zstd compression
    #[cfg(feature = "zstd")]
    Zstd,
}
