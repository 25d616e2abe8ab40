use crate::batch::FailedUpload;
use crate::compressor::{CompressOptions, Compressor, compress_or_original};
use crate::error::{Error, ErrorKind, Result};
use crate::media::{MediaFile, MediaSource, UploadedMedia};
use crate::naming::destination_key;
use crate::task::state::{AfterFailure, Running, Task, TaskId, Waiting};
use crate::tuning::Tuning;
use futures::StreamExt;
use keepsake_storage::{DestinationKey, TransferEvent, Transport};
use time::OffsetDateTime;
use tokio::time::{Instant, timeout_at};
use tracing::instrument;

/// Everything a task borrows from its batch.
pub(crate) struct TaskContext<'a> {
    pub transport: &'a dyn Transport,
    pub compressor: &'a dyn Compressor,
    pub options: &'a CompressOptions,
    pub tuning: &'a Tuning,
    pub destination: &'a DestinationKey,
}

pub(crate) type Outcome<S> = std::result::Result<(TaskId, UploadedMedia), FailedUpload<S>>;

/// Drive one file from `waiting` to a terminal state.
///
/// The file's bytes are loaded on the first attempt and released when this
/// returns. Attempts are bounded by the state machine: [`Task::fail`] only
/// offers a retry while attempts remain, and errors that aren't retryable
/// skip straight to [`Task::abandon`].
pub(crate) async fn run<S: MediaSource>(task: Task<Waiting>, source: S, ctx: &TaskContext<'_>) -> Outcome<S> {
    let mut running = task.start();
    let mut loaded: Option<MediaFile> = None;
    loop {
        let result = match loaded.take() {
            Some(file) => Ok(file),
            None => source.load().await,
        };
        let error = match result {
            Ok(file) => {
                let result = attempt(&mut running, &file, ctx).await;
                loaded = Some(file);
                match result {
                    Ok(media) => {
                        let done = running.succeed(media.size);
                        tracing::info!(task = %done.id(), attempt = done.attempt(), url = %media.url, "Uploaded");
                        return Ok((done.id().clone(), media));
                    },
                    Err(error) => error,
                }
            },
            Err(error) => error,
        };
        let after = if !error.is_retryable() {
            AfterFailure::Exhausted(running.abandon())
        } else if matches!(&*error, ErrorKind::TimedOut(_)) {
            running.cancel().fail()
        } else {
            running.fail()
        };
        match after {
            AfterFailure::Retry(retrying) => {
                tracing::warn!(
                    task = %retrying.id(),
                    attempt = retrying.attempt(),
                    delay_ms = u64::try_from(ctx.tuning.retry_delay.as_millis()).unwrap_or(u64::MAX),
                    error = ?error,
                    "Attempt failed; retrying",
                );
                tokio::time::sleep(ctx.tuning.retry_delay).await;
                running = retrying.resume();
            },
            AfterFailure::Exhausted(failed) => {
                tracing::error!(task = %failed.id(), attempts = failed.attempt(), error = ?error, "Upload failed");
                return Err(FailedUpload {
                    id: failed.id().clone(),
                    file: source.meta(),
                    source,
                    error,
                });
            },
        }
    }
}

/// Storage errors that retrying can't fix are raised as [`ErrorKind::Refused`].
fn transfer_error(error: keepsake_storage::error::Error) -> Error {
    let kind = if error.is_retryable() {
        ErrorKind::Transfer
    } else {
        ErrorKind::Refused
    };
    error.raise(kind)
}

/// One compress, name, transfer pass. Dropping the transfer stream on
/// timeout is what cancels it.
#[instrument(skip_all, fields(task = %task.id(), attempt = task.attempt(), key))]
async fn attempt(task: &mut Task<Running>, file: &MediaFile, ctx: &TaskContext<'_>) -> Result<UploadedMedia> {
    let upload = compress_or_original(ctx.compressor, file, ctx.options).await.into_owned();
    let key = destination_key(ctx.destination, &file.name, OffsetDateTime::now_utc())?;
    tracing::Span::current().record("key", key.as_str());

    let payload = upload.into_payload();
    let size = payload.len();
    let content_type = payload.content_type.clone();
    let deadline = Instant::now() + ctx.tuning.transfer_timeout;
    let mut transfer = ctx.transport.transfer(&key, payload);
    loop {
        let event = match timeout_at(deadline, transfer.next()).await {
            Ok(Some(event)) => event.map_err(transfer_error)?,
            Ok(None) => exn::bail!(ErrorKind::Transfer),
            Err(_elapsed) => {
                tracing::warn!(timeout_ms = ?ctx.tuning.transfer_timeout.as_millis(), "Transfer stalled; cancelling");
                exn::bail!(ErrorKind::TimedOut(ctx.tuning.transfer_timeout))
            },
        };
        match event {
            TransferEvent::Progress { transferred, total } => task.progress(transferred, total),
            TransferEvent::Complete { url } => {
                return Ok(UploadedMedia {
                    name: file.name.clone(),
                    url,
                    size,
                    content_type,
                    created_at: OffsetDateTime::now_utc(),
                });
            },
        }
    }
}
