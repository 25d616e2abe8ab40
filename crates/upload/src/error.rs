//! Upload Error Types
//!
//! This module provides structured errors using `exn` for automatic location
//! tracking and error tree construction. Transport and codec failures are
//! raised as children of [`ErrorKind::Transfer`] and
//! [`ErrorKind::Compression`] so the original frame stays in the tree.

use derive_more::{Display, Error};
use std::time::Duration;

/// An upload error with automatic location tracking.
pub type Error = exn::Exn<ErrorKind>;
/// Result type alias for upload operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Classifies the origin of an upload failure.
///
/// ### Caller Input Errors
/// Rejected before any task is scheduled.
/// - [`ErrorKind::EmptyBatch`]
/// - [`ErrorKind::MissingDestination`]
/// - [`ErrorKind::InvalidDestination`]
///
/// ### Per-file Errors
/// Only ever surfaced through a [`FailedUpload`](crate::FailedUpload).
/// Retryable kinds are retried until every attempt is used up; the rest
/// end the task on the spot.
/// - [`ErrorKind::Transfer`] (retryable)
/// - [`ErrorKind::TimedOut`] (retryable)
/// - [`ErrorKind::Refused`]
/// - [`ErrorKind::Load`]
///
/// ### Absorbed Errors
/// Logged, never surfaced.
/// - [`ErrorKind::Compression`]
/// - [`ErrorKind::Notify`]
#[derive(Debug, Display, Error)]
pub enum ErrorKind {
    /// The batch contained no files.
    #[display("no files to upload")]
    EmptyBatch,
    /// The destination identifier was empty.
    #[display("missing destination")]
    MissingDestination,
    /// The destination identifier cannot be used as an object key prefix.
    #[display("invalid destination: {_0:?}")]
    InvalidDestination(#[error(not(source))] String),
    /// The transport reported an error, or ended without completing.
    #[display("transfer failed")]
    Transfer,
    /// The transport reported an error that won't go away on its own
    /// (bad key, no permission).
    #[display("transfer refused")]
    Refused,
    /// The file's bytes could not be read when its task was admitted.
    #[display("could not load {_0:?}")]
    Load(#[error(not(source))] String),
    /// The transport did not reach a terminal state in time; the transfer
    /// was cancelled.
    #[display("transfer timed out after {}ms", _0.as_millis())]
    TimedOut(#[error(not(source))] Duration),
    /// A compressor failed or produced something unusable.
    #[display("compression failed")]
    Compression,
    /// The batch-completed notification could not be delivered.
    #[display("notification delivery failed")]
    Notify,
}

impl ErrorKind {
    /// Returns `true` if retrying might succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Transfer | Self::TimedOut(_) | Self::Notify)
    }
}
