//! In-memory transport for testing.

use crate::error::ErrorKind;
use crate::key::DestinationKey;
use crate::transport::{Payload, TransferEvent, TransferStream, Transport};
use async_stream::stream;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Mutex, PoisonError};
use std::time::Duration;
use tokio::sync::RwLock;

/// How the mock responds to transfers whose key ends with a given suffix.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Behaviour {
    /// Every attempt succeeds.
    Succeed,
    /// The first `n` attempts fail halfway through, later attempts succeed.
    FailTimes(u32),
    /// Every attempt fails halfway through.
    AlwaysFail,
    /// The first `n` attempts report 0% and then never make progress again.
    StallTimes(u32),
    /// Every attempt stalls.
    AlwaysStall,
}
impl Behaviour {
    fn fails(&self, attempt: u32) -> bool {
        match self {
            Self::FailTimes(n) => attempt <= *n,
            Self::AlwaysFail => true,
            _ => false,
        }
    }

    fn stalls(&self, attempt: u32) -> bool {
        match self {
            Self::StallTimes(n) => attempt <= *n,
            Self::AlwaysStall => true,
            _ => false,
        }
    }
}

/// In-memory transport for testing.
///
/// Objects are stored in a `HashMap` behind a [`RwLock`]. Transfers tick
/// through a fixed number of progress steps with a (virtual-time friendly)
/// [`tokio::time::sleep`] between them, so concurrent transfers genuinely
/// interleave. Per-file [`Behaviour`]s script failures and stalls, and the
/// mock records how many transfers were in flight at once.
///
/// # Examples
///
/// ```
/// use keepsake_storage::transport::{Behaviour, MockTransport, complete};
/// use keepsake_storage::{DestinationKey, Payload, Transport};
///
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let transport = MockTransport::default().with_behaviour("flaky.jpg", Behaviour::FailTimes(1));
/// let key = DestinationKey::parse("gallery/1-abc-flaky.jpg").unwrap();
/// assert!(complete(transport.transfer(&key, Payload::new(b"x".to_vec(), "image/jpeg"))).await.is_err());
/// assert!(complete(transport.transfer(&key, Payload::new(b"x".to_vec(), "image/jpeg"))).await.is_ok());
/// assert_eq!(transport.attempts("flaky.jpg"), 2);
/// # Ok(())
/// # }
/// ```
pub struct MockTransport {
    name: String,
    storage: RwLock<HashMap<DestinationKey, Payload>>,
    behaviours: Vec<(String, Behaviour)>,
    transfers: Mutex<Vec<DestinationKey>>,
    steps: u64,
    step_delay: Duration,
    in_flight: AtomicUsize,
    peak: AtomicUsize,
}

impl MockTransport {
    /// Change the name of the mock transport.
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Script the behaviour of every transfer whose key ends with `suffix`.
    /// The first matching suffix wins; unmatched keys always succeed.
    pub fn with_behaviour(mut self, suffix: impl Into<String>, behaviour: Behaviour) -> Self {
        self.behaviours.push((suffix.into(), behaviour));
        self
    }

    /// Number of progress ticks per transfer, and the delay before each.
    pub fn with_pacing(mut self, steps: u64, step_delay: Duration) -> Self {
        self.steps = steps.max(1);
        self.step_delay = step_delay;
        self
    }

    /// How many transfers have been started for keys ending with `suffix`.
    pub fn attempts(&self, suffix: &str) -> usize {
        let transfers = self.transfers.lock().unwrap_or_else(PoisonError::into_inner);
        transfers.iter().filter(|key| key.as_str().ends_with(suffix)).count()
    }

    /// Every key a transfer was started for, in start order.
    pub fn transfer_log(&self) -> Vec<DestinationKey> {
        self.transfers.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }

    /// The most transfers that were ever in flight at the same time.
    pub fn peak_in_flight(&self) -> usize {
        self.peak.load(Ordering::SeqCst)
    }

    /// Transfers currently in flight (started, not finished, not dropped).
    pub fn in_flight(&self) -> usize {
        self.in_flight.load(Ordering::SeqCst)
    }

    /// The stored payload for the first completed key ending with `suffix`.
    pub async fn object(&self, suffix: &str) -> Option<Payload> {
        let storage = self.storage.read().await;
        storage.iter().find(|(key, _)| key.as_str().ends_with(suffix)).map(|(_, payload)| payload.clone())
    }

    /// Number of completed objects.
    pub async fn len(&self) -> usize {
        self.storage.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.storage.read().await.is_empty()
    }

    /// Record the transfer and work out which attempt (1-based) this is for
    /// the matching behaviour.
    fn begin(&self, key: &DestinationKey) -> (Behaviour, u32) {
        let mut transfers = self.transfers.lock().unwrap_or_else(PoisonError::into_inner);
        transfers.push(key.clone());
        let Some((suffix, behaviour)) = self.behaviours.iter().find(|(suffix, _)| key.as_str().ends_with(suffix.as_str()))
        else {
            return (Behaviour::Succeed, 1);
        };
        let attempt = transfers.iter().filter(|k| k.as_str().ends_with(suffix.as_str())).count();
        (*behaviour, u32::try_from(attempt).unwrap_or(u32::MAX))
    }
}
impl Default for MockTransport {
    fn default() -> Self {
        Self {
            name: "mock".to_string(),
            storage: RwLock::new(HashMap::new()),
            behaviours: Vec::new(),
            transfers: Mutex::new(Vec::new()),
            steps: 4,
            step_delay: Duration::from_millis(100),
            in_flight: AtomicUsize::new(0),
            peak: AtomicUsize::new(0),
        }
    }
}

/// Counts a transfer as in flight for as long as its stream is alive,
/// including when the stream is dropped part-way through.
struct InFlight<'a> {
    counter: &'a AtomicUsize,
}
impl<'a> InFlight<'a> {
    fn enter(counter: &'a AtomicUsize, peak: &AtomicUsize) -> Self {
        let now = counter.fetch_add(1, Ordering::SeqCst) + 1;
        peak.fetch_max(now, Ordering::SeqCst);
        Self { counter }
    }
}
impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.counter.fetch_sub(1, Ordering::SeqCst);
    }
}

impl Transport for MockTransport {
    fn name(&self) -> &str {
        &self.name
    }

    fn transfer<'a>(&'a self, key: &'a DestinationKey, payload: Payload) -> TransferStream<'a> {
        Box::pin(stream! {
            let (behaviour, attempt) = self.begin(key);
            let _in_flight = InFlight::enter(&self.in_flight, &self.peak);
            let total = payload.len();
            yield Ok(TransferEvent::Progress { transferred: 0, total });

            if behaviour.stalls(attempt) {
                futures::future::pending::<()>().await;
            }
            let fail_at = behaviour.fails(attempt).then_some(self.steps.div_ceil(2));
            for step in 1..=self.steps {
                tokio::time::sleep(self.step_delay).await;
                if fail_at == Some(step) {
                    yield Err(exn::Exn::from(ErrorKind::Rejected(format!("scripted failure (attempt {attempt})"))));
                    return;
                }
                yield Ok(TransferEvent::Progress { transferred: total * step / self.steps, total });
            }

            self.storage.write().await.insert(key.clone(), payload);
            yield Ok(TransferEvent::Complete { url: format!("mock://{}/{}", self.name, key) });
        })
    }
}
