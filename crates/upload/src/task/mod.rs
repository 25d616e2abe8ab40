//! Upload Tasks: one file's compress-then-transfer lifecycle, retries included.
//!
//! - `waiting -> running`: admitted by the scheduler.
//! - `running -> success`: the transport returned a URL.
//! - `running -> canceled`: the transfer timed out and was dropped.
//! - `running | canceled -> retry`: failed with attempts remaining; after the
//!   retry delay, `retry -> running` with the attempt bumped and bytes reset.
//! - `running | canceled -> error`: failed on the last attempt, or with an
//!   error retrying can't fix.

mod run;
mod state;

pub(crate) use self::run::{TaskContext, run};
pub use self::state::{
    Active, AfterFailure, Canceled, Failed, Phase, Retrying, Running, Succeeded, Task, TaskId, TaskState, Waiting,
};
