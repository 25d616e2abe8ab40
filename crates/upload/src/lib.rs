//! Batch media upload orchestration.
//!
//! Takes any number of guest-selected files, compresses them, names them,
//! and transfers them to object storage through a
//! [`Transport`](keepsake_storage::Transport), with:
//!
//! - bounded, adaptive concurrency and memory-bounding chunks ([`UploadBatch`]),
//! - per-file retries and transfer timeouts ([`task`]),
//! - a live ledger and [`UploadSummary`] after every change ([`UploadObserver`]).
//!
//! Per-file failures never fail the batch; they end up in
//! [`BatchReport::failed`].

pub mod batch;
pub mod compressor;
pub mod error;
mod media;
pub mod naming;
mod observer;
mod summary;
pub mod task;
mod tuning;

pub use crate::batch::{BatchReport, FailedUpload, UploadBatch};
pub use crate::compressor::{CodecCompressor, CompressOptions, Compressor, Passthrough};
pub use crate::media::{FileMeta, MediaFile, MediaPath, MediaSource, UploadedMedia};
pub use crate::observer::{BatchNotice, FnObserver, Notifier, UploadObserver};
pub use crate::summary::{Ledger, TaskSnapshot, UploadSummary, summarize};
pub use crate::tuning::Tuning;
