//! Scheduling and retry constants.
//!
//! None of these are correctness boundaries; they were picked empirically
//! and are exposed so deployments can adjust them.

use serde::{Deserialize, Serialize};
use std::time::Duration;

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Tuning {
    /// Attempts per file, including the first.
    pub max_attempts: u32,
    /// Fixed pause between a failed attempt and the next one.
    #[serde(with = "millis")]
    pub retry_delay: Duration,
    /// A transfer that hasn't completed or failed by then is cancelled.
    #[serde(with = "millis")]
    pub transfer_timeout: Duration,
    /// Pause after each settled task before admitting more work.
    #[serde(with = "millis")]
    pub admission_pause: Duration,
    /// Files per chunk; at most one chunk is in flight at a time.
    pub chunk_size: usize,
    /// Batches with more files than this start at `medium_batch_concurrency`.
    pub medium_batch_threshold: usize,
    /// Batches with more files than this start at `large_batch_concurrency`.
    pub large_batch_threshold: usize,
    pub medium_batch_concurrency: usize,
    pub large_batch_concurrency: usize,
    /// Concurrency requested when the caller doesn't give a hint.
    pub default_concurrency: usize,
}
impl Default for Tuning {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            retry_delay: Duration::from_millis(2000),
            transfer_timeout: Duration::from_millis(30_000),
            admission_pause: Duration::from_millis(500),
            chunk_size: 50,
            medium_batch_threshold: 10,
            large_batch_threshold: 20,
            medium_batch_concurrency: 2,
            large_batch_concurrency: 2,
            default_concurrency: 3,
        }
    }
}

/// Durations as whole milliseconds.
mod millis {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(u64::try_from(duration.as_millis()).unwrap_or(u64::MAX))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        u64::deserialize(deserializer).map(Duration::from_millis)
    }
}
