//! The Batch Scheduler.
//!
//! A batch is split into chunks of `chunk_size` files; chunks run strictly
//! one after the other, which bounds how many files' buffers are in flight.
//! Within a chunk, tasks are admitted in file order while fewer than the
//! current concurrency limit are active. After every settlement the
//! scheduler pauses for `admission_pause` before admitting more work.
//!
//! One coordinator owns all batch-wide state (ledger, tally, limit): tasks
//! run as futures polled by that coordinator and report back over a
//! channel, so nothing is shared between them.

mod concurrency;
mod report;
mod scheduler;

pub use self::report::{BatchReport, FailedUpload};
pub use self::scheduler::UploadBatch;
