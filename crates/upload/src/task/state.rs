//! The per-file state machine.
//!
//! States are types: a [`Task<Running>`] can make progress, succeed, be
//! cancelled or fail; a [`Task<Waiting>`] can only be started. Every
//! transition consumes the task and publishes a [`TaskSnapshot`] to the
//! coordinator, so the ledger can only ever show transitions that exist
//! here. [`TaskState`] is the value-level mirror of the phase, for
//! snapshots and mixed collections.

use crate::media::FileMeta;
use crate::summary::TaskSnapshot;
use serde::{Serialize, Serializer};
use std::fmt::{Display, Formatter, Result as FmtResult};
use std::marker::PhantomData;
use tokio::sync::mpsc::UnboundedSender;

/// Snapshot updates flowing from tasks to the coordinator.
pub(crate) type Updates = UnboundedSender<(TaskId, TaskSnapshot)>;

/// Stable identity of one file within a batch, across all of its attempts.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TaskId {
    index: usize,
    name: String,
}
impl TaskId {
    pub fn new(index: usize, name: impl Into<String>) -> Self {
        Self { index, name: name.into() }
    }

    /// Position of the file in the submitted batch.
    pub fn index(&self) -> usize {
        self.index
    }

    pub fn name(&self) -> &str {
        &self.name
    }
}
impl Display for TaskId {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        write!(f, "{}-{}", self.index, self.name)
    }
}
// Ledgers are maps keyed by `TaskId`; JSON object keys must be strings.
impl Serialize for TaskId {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskState {
    /// Not yet admitted by the scheduler.
    Waiting,
    /// Compressing or transferring.
    Running,
    /// Failed; waiting out the retry delay before the next attempt.
    Retry,
    /// Stored. Terminal.
    Success,
    /// Failed on its last attempt. Terminal.
    Error,
    /// Timed out; the transfer was dropped. Always followed by `Retry` or `Error`.
    Canceled,
}
impl TaskState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Success | Self::Error)
    }
}

mod sealed {
    pub trait Sealed {}
}
pub trait Phase: sealed::Sealed {
    const STATE: TaskState;
}
/// Phases a task can fail from.
pub trait Active: Phase {}

macro_rules! phase {
    ($name:ident => $state:ident) => {
        pub struct $name;
        impl sealed::Sealed for $name {}
        impl Phase for $name {
            const STATE: TaskState = TaskState::$state;
        }
    };
}
phase!(Waiting => Waiting);
phase!(Running => Running);
phase!(Retrying => Retry);
phase!(Succeeded => Success);
phase!(Failed => Error);
phase!(Canceled => Canceled);
impl Active for Running {}
impl Active for Canceled {}

pub struct Task<P: Phase = Waiting> {
    id: TaskId,
    file: FileMeta,
    attempt: u32,
    max_attempts: u32,
    uploaded_bytes: u64,
    total_bytes: u64,
    progress: u8,
    updates: Updates,
    _phase: PhantomData<P>,
}

impl<P: Phase> Task<P> {
    pub fn id(&self) -> &TaskId {
        &self.id
    }

    /// 1-based attempt counter; never exceeds the configured maximum.
    pub fn attempt(&self) -> u32 {
        self.attempt
    }

    pub fn state(&self) -> TaskState {
        P::STATE
    }

    pub fn snapshot(&self) -> TaskSnapshot {
        TaskSnapshot {
            file: self.file.clone(),
            progress: self.progress,
            state: P::STATE,
            uploaded_bytes: self.uploaded_bytes,
            total_bytes: self.total_bytes,
            attempt: self.attempt,
        }
    }

    fn publish(&self) {
        // The coordinator outlives every task it runs; a closed channel only
        // means nobody is listening any more.
        let _ = self.updates.send((self.id.clone(), self.snapshot()));
    }

    fn into_phase<Q: Phase>(self) -> Task<Q> {
        Task {
            id: self.id,
            file: self.file,
            attempt: self.attempt,
            max_attempts: self.max_attempts,
            uploaded_bytes: self.uploaded_bytes,
            total_bytes: self.total_bytes,
            progress: self.progress,
            updates: self.updates,
            _phase: PhantomData,
        }
    }

    fn transition<Q: Phase>(self) -> Task<Q> {
        let task = self.into_phase();
        task.publish();
        task
    }
}

impl Task<Waiting> {
    /// A fresh task. Nothing is published until it is started; the caller
    /// seeds its ledger from [`snapshot`](Task::snapshot).
    pub(crate) fn new(id: TaskId, file: FileMeta, max_attempts: u32, updates: Updates) -> Self {
        Self {
            id,
            total_bytes: file.size,
            file,
            attempt: 1,
            max_attempts: max_attempts.max(1),
            uploaded_bytes: 0,
            progress: 0,
            updates,
            _phase: PhantomData,
        }
    }

    pub fn start(self) -> Task<Running> {
        self.transition()
    }
}

impl Task<Running> {
    /// Record transport progress. Bytes never go backwards within an attempt,
    /// and nothing is published if nothing changed.
    pub fn progress(&mut self, transferred: u64, total: u64) {
        let uploaded = transferred.min(total).max(self.uploaded_bytes.min(total));
        let progress = percentage(uploaded, total);
        if uploaded == self.uploaded_bytes && total == self.total_bytes && progress == self.progress {
            return;
        }
        self.uploaded_bytes = uploaded;
        self.total_bytes = total;
        self.progress = progress;
        tracing::trace!(task = %self.id, uploaded, total, progress, "Progress");
        self.publish();
    }

    /// The transport stored `size` bytes.
    pub fn succeed(mut self, size: u64) -> Task<Succeeded> {
        self.uploaded_bytes = size;
        self.total_bytes = size;
        self.progress = 100;
        self.transition()
    }

    /// The transfer was dropped for taking too long.
    pub fn cancel(self) -> Task<Canceled> {
        self.transition()
    }
}

/// Where a failed attempt leads.
pub enum AfterFailure {
    /// Attempts remain; wait, then [`resume`](Task::resume).
    Retry(Task<Retrying>),
    /// That was the last attempt.
    Exhausted(Task<Failed>),
}

impl<P: Active> Task<P> {
    pub fn fail(self) -> AfterFailure {
        if self.attempt < self.max_attempts {
            AfterFailure::Retry(self.transition())
        } else {
            AfterFailure::Exhausted(self.transition())
        }
    }

    /// Fail for good, whatever attempts remain.
    pub fn abandon(self) -> Task<Failed> {
        self.transition()
    }
}

impl Task<Retrying> {
    /// Begin the next attempt from zero bytes.
    pub fn resume(mut self) -> Task<Running> {
        self.attempt += 1;
        self.uploaded_bytes = 0;
        self.progress = 0;
        self.transition()
    }
}

fn percentage(uploaded: u64, total: u64) -> u8 {
    if total == 0 {
        return 0;
    }
    let percent = u128::from(uploaded) * 100 / u128::from(total);
    u8::try_from(percent.min(100)).unwrap_or(100)
}
