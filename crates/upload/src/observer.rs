//! Callbacks out of the scheduler.
//!
//! An [`UploadObserver`] is called synchronously from the scheduler's
//! coordinator loop: first [`on_progress`](UploadObserver::on_progress) with
//! the whole ledger, then [`on_summary`](UploadObserver::on_summary) with its
//! projection. Keep them cheap; uploads don't progress while they run.
//!
//! A [`Notifier`] hears about a batch once, after it completes, on its own
//! task. The scheduler never waits for it.

use crate::error::Result;
use crate::media::UploadedMedia;
use crate::summary::{Ledger, UploadSummary};
use async_trait::async_trait;

pub trait UploadObserver: Send {
    fn on_progress(&mut self, _ledger: &Ledger) {}

    fn on_summary(&mut self, _summary: &UploadSummary) {}
}

/// Ignores everything.
impl UploadObserver for () {}

/// Adapts a pair of closures into an [`UploadObserver`].
///
/// # Examples
///
/// ```
/// use keepsake_upload::FnObserver;
///
/// let mut percentages = Vec::new();
/// let observer = FnObserver::new(|_ledger| {}, |summary| percentages.push(summary.overall_progress));
/// # drop(observer);
/// ```
pub struct FnObserver<P, S> {
    progress: P,
    summary: S,
}
impl<P, S> FnObserver<P, S>
where
    P: FnMut(&Ledger) + Send,
    S: FnMut(&UploadSummary) + Send,
{
    pub fn new(progress: P, summary: S) -> Self {
        Self { progress, summary }
    }
}
impl<P, S> UploadObserver for FnObserver<P, S>
where
    P: FnMut(&Ledger) + Send,
    S: FnMut(&UploadSummary) + Send,
{
    fn on_progress(&mut self, ledger: &Ledger) {
        (self.progress)(ledger);
    }

    fn on_summary(&mut self, summary: &UploadSummary) {
        (self.summary)(summary);
    }
}

/// What a [`Notifier`] is told about a finished batch.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BatchNotice {
    /// Destination (gallery) the batch was uploaded to.
    pub destination: String,
    pub uploaded: Vec<UploadedMedia>,
    /// Names of the files that could not be uploaded.
    pub failed: Vec<String>,
}

/// Downstream side effects of a completed batch (e.g. emailing the gallery
/// owner).
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn batch_completed(&self, notice: &BatchNotice) -> Result<()>;
}
