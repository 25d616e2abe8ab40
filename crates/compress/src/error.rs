//! Codec Error Types

use derive_more::{Display, Error};

/// A codec error with automatic location tracking.
pub type Error = exn::Exn<ErrorKind>;
pub type Result<T> = std::result::Result<T, Error>;

/// What went wrong, grouped by what an uploader can do about it.
///
/// Callers on the upload path treat every kind the same way (send the file
/// uncompressed); the distinction matters for configuration and decoding.
#[derive(Debug, Display, Error, Clone, PartialEq, Eq)]
pub enum ErrorKind {
    /// The codec library refused to set up an encoder or decoder.
    #[display("could not initialise codec")]
    Encoder,
    /// Input isn't valid for the codec it was decoded with.
    #[display("invalid or corrupted data")]
    InvalidData,
    /// A codec name nobody recognises, e.g. in a config file.
    #[display("unsupported format: {_0}")]
    UnsupportedFormat(#[error(not(source))] String),
    /// A known codec that this build was compiled without.
    #[display("disabled format: {_0}")]
    DisabledFormat(#[error(not(source))] String),
    /// Writing into the in-memory encoder failed.
    #[display("I/O error")]
    Io,
}
