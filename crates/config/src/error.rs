//! Config Error Types

use derive_more::{Display, Error};
use std::path::PathBuf;

/// A configuration error with automatic location tracking.
pub type Error = exn::Exn<ErrorKind>;
/// Result type alias for configuration operations.
pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Display, Error)]
pub enum ErrorKind {
    /// An explicitly requested config file does not exist.
    #[display("config file not found: {}", _0.display())]
    NotFound(#[error(not(source))] PathBuf),
    /// A provider could not be read, or its values don't fit the schema.
    #[display("could not load configuration")]
    Load,
    /// Values parsed, but make no sense together.
    #[display("invalid configuration: {_0}")]
    Invalid(#[error(not(source))] String),
    /// The configured storage needs a feature this build doesn't have.
    #[display("storage kind {_0:?} is not supported by this build (enable the `{_0}` feature)")]
    Unsupported(#[error(not(source))] &'static str),
    /// The transport could not be constructed.
    #[display("could not set up storage")]
    Storage,
}
