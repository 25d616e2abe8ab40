use crate::batch::concurrency::{ConcurrencyLimit, Tally};
use crate::batch::report::{BatchReport, ReportBuilder};
use crate::compressor::{CompressOptions, Compressor, Passthrough};
use crate::error::{ErrorKind, Result};
use crate::media::MediaSource;
use crate::observer::{BatchNotice, Notifier, UploadObserver};
use crate::summary::{Ledger, TaskSnapshot, summarize};
use crate::task::{Task, TaskContext, TaskId, Waiting, run};
use crate::tuning::Tuning;
use exn::ResultExt;
use futures::StreamExt;
use futures::stream::FuturesUnordered;
use keepsake_storage::{DestinationKey, TransportHandle};
use std::collections::VecDeque;
use std::sync::Arc;
use tokio::sync::mpsc::{UnboundedReceiver, unbounded_channel};
use tokio::time::{Instant, sleep_until};
use tracing::{Instrument, instrument};

/// Uploads batches of files to one transport.
///
/// # Examples
///
/// ```
/// use keepsake_storage::transport::MockTransport;
/// use keepsake_upload::{MediaFile, UploadBatch};
/// use std::sync::Arc;
///
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let batch = UploadBatch::new(Arc::new(MockTransport::default()));
/// let files = vec![MediaFile::new("first-dance.jpg", "image/jpeg", vec![0xFF; 64])];
/// let report = batch.upload_batch("gallery-42", files, None, &mut ()).await?;
/// assert!(report.is_success());
/// assert_eq!(report.summary.overall_progress, 100);
/// # Ok(())
/// # }
/// ```
pub struct UploadBatch {
    transport: TransportHandle,
    compressor: Arc<dyn Compressor>,
    options: CompressOptions,
    tuning: Tuning,
    notifier: Option<Arc<dyn Notifier>>,
}

impl UploadBatch {
    /// Upload to `transport`, sending files as-is with the default tuning.
    pub fn new(transport: TransportHandle) -> Self {
        Self {
            transport,
            compressor: Arc::new(Passthrough),
            options: CompressOptions::default(),
            tuning: Tuning::default(),
            notifier: None,
        }
    }

    pub fn with_compressor(mut self, compressor: impl Compressor + 'static) -> Self {
        self.compressor = Arc::new(compressor);
        self
    }

    pub fn with_compress_options(mut self, options: CompressOptions) -> Self {
        self.options = options;
        self
    }

    pub fn with_tuning(mut self, tuning: Tuning) -> Self {
        self.tuning = tuning;
        self
    }

    /// Tell `notifier` about every completed batch.
    pub fn with_notifier(mut self, notifier: impl Notifier + 'static) -> Self {
        self.notifier = Some(Arc::new(notifier));
        self
    }

    pub fn tuning(&self) -> &Tuning {
        &self.tuning
    }

    /// Upload `files` under `destination` and wait for every one of them to
    /// reach a terminal state.
    ///
    /// Each source is only [`load`](MediaSource::load)ed once its task is
    /// admitted, and its bytes are released as soon as the task settles.
    /// `concurrency` is the caller's hint (the tuning's default if `None`);
    /// the limit actually used also depends on the batch size, and drops to
    /// 1 if failures start to outnumber successes. Files are processed in
    /// chunks of `chunk_size`, one chunk at a time, in submission order.
    ///
    /// The observer sees the ledger, then its summary, after every change.
    ///
    /// # Errors
    ///
    /// Only caller input errors, before anything is scheduled:
    /// [`MissingDestination`](ErrorKind::MissingDestination),
    /// [`InvalidDestination`](ErrorKind::InvalidDestination) or
    /// [`EmptyBatch`](ErrorKind::EmptyBatch). Per-file failures are reported
    /// in [`BatchReport::failed`].
    #[instrument(skip(self, files, observer), fields(transport = self.transport.name(), files = files.len()))]
    pub async fn upload_batch<S: MediaSource>(
        &self,
        destination: &str,
        files: Vec<S>,
        concurrency: Option<usize>,
        observer: &mut dyn UploadObserver,
    ) -> Result<BatchReport<S>> {
        let destination = parse_destination(destination)?;
        if files.is_empty() {
            exn::bail!(ErrorKind::EmptyBatch);
        }

        // The coordinator keeps a sender alive, so `recv()` never reports a
        // closed channel while it is polled.
        let (updates_tx, mut updates) = unbounded_channel();
        let prepared: Vec<(Task<Waiting>, S)> = files
            .into_iter()
            .enumerate()
            .map(|(index, source)| {
                let meta = source.meta();
                let id = TaskId::new(index, meta.name.clone());
                (Task::new(id, meta, self.tuning.max_attempts, updates_tx.clone()), source)
            })
            .collect();
        let mut ledger: Ledger = prepared.iter().map(|(task, _)| (task.id().clone(), task.snapshot())).collect();
        publish(observer, &ledger);

        let requested = concurrency.unwrap_or(self.tuning.default_concurrency);
        let mut limit = ConcurrencyLimit::initial(prepared.len(), requested, &self.tuning);
        tracing::info!(limit = limit.current(), requested, "Starting batch");

        let ctx = TaskContext {
            transport: self.transport.as_ref(),
            compressor: self.compressor.as_ref(),
            options: &self.options,
            tuning: &self.tuning,
            destination: &destination,
        };
        let mut tally = Tally::default();
        let mut report = ReportBuilder::default();
        let mut admit_at: Option<Instant> = None;
        let mut remaining = prepared.into_iter();
        for chunk in 1.. {
            let mut queue: VecDeque<_> = remaining.by_ref().take(self.tuning.chunk_size.max(1)).collect();
            if queue.is_empty() {
                break;
            }
            tracing::info!(chunk, files = queue.len(), "Starting chunk");
            let mut active = FuturesUnordered::new();
            loop {
                if admit_at.is_none() {
                    while active.len() < limit.current()
                        && let Some((task, source)) = queue.pop_front()
                    {
                        active.push(run(task, source, &ctx));
                    }
                }
                if queue.is_empty() && active.is_empty() {
                    break;
                }
                tokio::select! {
                    biased;
                    Some((id, snapshot)) = updates.recv() => {
                        ledger.insert(id, snapshot);
                        publish(observer, &ledger);
                    },
                    Some(outcome) = active.next(), if !active.is_empty() => {
                        // A task publishes its terminal snapshot before it returns.
                        drain(&mut updates, &mut ledger, observer);
                        match outcome {
                            Ok((id, media)) => {
                                tally.succeeded += 1;
                                report.uploaded(id, media);
                            },
                            Err(failure) => {
                                tally.failed += 1;
                                report.failed(failure);
                            },
                        }
                        if limit.observe(tally) {
                            tracing::info!(
                                succeeded = tally.succeeded,
                                failed = tally.failed,
                                limit = limit.current(),
                                "Failures outnumber successes; reducing concurrency",
                            );
                        }
                        admit_at = Some(Instant::now() + self.tuning.admission_pause);
                    },
                    () = sleep_until(admit_at.unwrap_or_else(Instant::now)), if admit_at.is_some() => {
                        admit_at = None;
                    },
                }
            }
        }
        drain(&mut updates, &mut ledger, observer);

        let summary = summarize(&ledger);
        tracing::info!(
            completed = summary.completed,
            failed = summary.failed,
            uploaded_bytes = summary.uploaded_size,
            "Batch complete",
        );
        let report = report.finish(summary, limit.current());
        if let Some(notifier) = &self.notifier {
            let notice = BatchNotice {
                destination: destination.to_string(),
                uploaded: report.uploaded.clone(),
                failed: report.failed_names().map(str::to_string).collect(),
            };
            notify(Arc::clone(notifier), notice);
        }
        Ok(report)
    }
}

fn parse_destination(destination: &str) -> Result<DestinationKey> {
    if destination.trim().is_empty() {
        exn::bail!(ErrorKind::MissingDestination);
    }
    DestinationKey::parse(destination).or_raise(|| ErrorKind::InvalidDestination(destination.to_string()))
}

fn publish(observer: &mut dyn UploadObserver, ledger: &Ledger) {
    observer.on_progress(ledger);
    observer.on_summary(&summarize(ledger));
}

fn drain(
    updates: &mut UnboundedReceiver<(TaskId, TaskSnapshot)>,
    ledger: &mut Ledger,
    observer: &mut dyn UploadObserver,
) {
    while let Ok((id, snapshot)) = updates.try_recv() {
        ledger.insert(id, snapshot);
        publish(observer, ledger);
    }
}

/// Fire and forget: the batch is already complete.
fn notify(notifier: Arc<dyn Notifier>, notice: BatchNotice) {
    tokio::spawn(
        async move {
            if let Err(error) = notifier.batch_completed(&notice).await {
                tracing::warn!(destination = %notice.destination, error = ?error, "Batch notification failed");
            }
        }
        .in_current_span(),
    );
}
