//! Storage Error Types
//!
//! This module provides structured errors using `exn` for automatic location
//! tracking and error tree construction.

use derive_more::{Display, Error};
use std::io::Error as IoError;

/// A storage error with automatic location tracking.
pub type Error = exn::Exn<ErrorKind>;
/// Result type alias for storage operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Actionable error categories.
///
/// These describe what the caller should *do*, not what went wrong internally.
#[derive(Debug, Display, Error)]
pub enum ErrorKind {
    /// Destination key contains invalid characters or escapes the root
    #[display("invalid destination key: {_0:?}")]
    InvalidKey(#[error(not(source))] String),
    /// Transport root is relative, or exists and is not a directory
    #[display("invalid transport root: {_0}")]
    InvalidRoot(#[error(not(source))] String),
    /// Access denied (permissions or credentials)
    #[display("permission denied: {_0}")]
    PermissionDenied(#[error(not(source))] String),
    /// Underlying I/O error
    #[display("I/O error: {_0}")]
    Io(IoError),
    /// Network-related error (S3 connections, etc.)
    #[display("network error: {_0}")]
    Network(#[error(not(source))] String),
    /// Backend-specific error
    #[display("backend error: {_0}")]
    BackendError(#[error(not(source))] String),
    /// The transfer ended without reporting completion.
    #[display("transfer interrupted: {_0}")]
    Interrupted(#[error(not(source))] String),
    /// The remote side refused the payload.
    #[display("transfer rejected: {_0}")]
    Rejected(#[error(not(source))] String),
}
impl From<IoError> for ErrorKind {
    fn from(err: IoError) -> Self {
        Self::Io(err)
    }
}

impl ErrorKind {
    /// Returns `true` if retrying might succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::Io(_) | Self::Network(_) | Self::BackendError(_) | Self::Interrupted(_) | Self::Rejected(_)
        )
    }
}
