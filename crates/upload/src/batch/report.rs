use crate::error::Error;
use crate::media::{FileMeta, MediaFile, UploadedMedia};
use crate::summary::UploadSummary;
use crate::task::TaskId;

/// A file that used up every attempt, or failed in a way retrying can't fix.
#[derive(Debug)]
pub struct FailedUpload<S = MediaFile> {
    pub id: TaskId,
    pub file: FileMeta,
    /// Where the file came from, ready to be resubmitted.
    pub source: S,
    /// Error from the last attempt.
    pub error: Error,
}

/// Outcome of a whole batch.
#[derive(Debug)]
pub struct BatchReport<S = MediaFile> {
    /// Stored files, in submission order.
    pub uploaded: Vec<UploadedMedia>,
    /// Files that could not be stored, in submission order.
    pub failed: Vec<FailedUpload<S>>,
    /// Final summary; every task is terminal.
    pub summary: UploadSummary,
    /// Concurrency limit in force when the batch finished.
    pub concurrency: usize,
}
impl<S> BatchReport<S> {
    pub fn is_success(&self) -> bool {
        self.failed.is_empty()
    }

    /// Names of the files left in the failed state.
    pub fn failed_names(&self) -> impl Iterator<Item = &str> {
        self.failed.iter().map(|failure| failure.file.name.as_str())
    }

    /// Hand back the failed sources, e.g. to resubmit them as a new batch.
    pub fn into_failed_files(self) -> Vec<S> {
        self.failed.into_iter().map(|failure| failure.source).collect()
    }
}

/// Collects outcomes as tasks settle, in whatever order that happens.
pub(crate) struct ReportBuilder<S> {
    uploaded: Vec<(TaskId, UploadedMedia)>,
    failed: Vec<FailedUpload<S>>,
}
impl<S> Default for ReportBuilder<S> {
    fn default() -> Self {
        Self {
            uploaded: Vec::new(),
            failed: Vec::new(),
        }
    }
}
impl<S> ReportBuilder<S> {
    pub fn uploaded(&mut self, id: TaskId, media: UploadedMedia) {
        self.uploaded.push((id, media));
    }

    pub fn failed(&mut self, failure: FailedUpload<S>) {
        self.failed.push(failure);
    }

    pub fn finish(mut self, summary: UploadSummary, concurrency: usize) -> BatchReport<S> {
        self.uploaded.sort_by(|(a, _), (b, _)| a.cmp(b));
        self.failed.sort_by(|a, b| a.id.cmp(&b.id));
        BatchReport {
            uploaded: self.uploaded.into_iter().map(|(_, media)| media).collect(),
            failed: self.failed,
            summary,
            concurrency,
        }
    }
}
