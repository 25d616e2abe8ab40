//! Progress aggregation.
//!
//! [`summarize`] is a pure projection from the ledger (the latest snapshot of
//! every task) to an [`UploadSummary`]. It holds no state between calls; the
//! scheduler re-runs it after every ledger change.

use crate::media::FileMeta;
use crate::task::{TaskId, TaskState};
use serde::Serialize;
use std::collections::BTreeMap;

/// The latest snapshot of every task in a batch, in submission order.
pub type Ledger = BTreeMap<TaskId, TaskSnapshot>;

/// One task's state, as seen by the progress callback.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskSnapshot {
    pub file: FileMeta,
    /// Percentage of the current attempt's bytes acknowledged, 0 to 100.
    pub progress: u8,
    pub state: TaskState,
    pub uploaded_bytes: u64,
    pub total_bytes: u64,
    pub attempt: u32,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadSummary {
    pub total: usize,
    pub completed: usize,
    pub failed: usize,
    /// Running, cancelled, or waiting to retry.
    pub in_progress: usize,
    pub waiting: usize,
    /// Mean of every task's own percentage (not weighted by size).
    pub overall_progress: u8,
    pub total_size: u64,
    pub uploaded_size: u64,
}
impl UploadSummary {
    /// Every task has reached a terminal state.
    pub fn is_finished(&self) -> bool {
        self.completed + self.failed == self.total
    }
}

pub fn summarize(ledger: &Ledger) -> UploadSummary {
    let mut summary = UploadSummary {
        total: ledger.len(),
        ..UploadSummary::default()
    };
    let mut progress_sum = 0u64;
    for snapshot in ledger.values() {
        summary.total_size += snapshot.total_bytes;
        summary.uploaded_size += snapshot.uploaded_bytes;
        progress_sum += u64::from(snapshot.progress);
        match snapshot.state {
            TaskState::Success => summary.completed += 1,
            TaskState::Error => summary.failed += 1,
            TaskState::Running | TaskState::Retry | TaskState::Canceled => summary.in_progress += 1,
            TaskState::Waiting => summary.waiting += 1,
        }
    }
    if let Ok(count) = u64::try_from(ledger.len())
        && count > 0
    {
        summary.overall_progress = u8::try_from(progress_sum / count).unwrap_or(100);
    }
    summary
}
