//! Adaptive concurrency.
//!
//! The limit is picked from the batch size up front and can only ever drop
//! (to 1) afterwards, once failures outnumber successes across the batch.

use crate::tuning::Tuning;

/// Settled tasks so far, across every chunk of the batch.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub(crate) struct Tally {
    pub succeeded: usize,
    pub failed: usize,
}

/// Starting limit for a batch of `batch_len` files.
pub(crate) fn initial_limit(batch_len: usize, requested: usize, tuning: &Tuning) -> usize {
    let limit = if batch_len > tuning.large_batch_threshold {
        tuning.large_batch_concurrency
    } else if batch_len > tuning.medium_batch_threshold {
        tuning.medium_batch_concurrency
    } else {
        requested.saturating_sub(1)
    };
    limit.max(1)
}

/// The limit after observing `tally`. Never greater than `current`.
pub(crate) fn next_limit(current: usize, tally: Tally) -> usize {
    if tally.failed > tally.succeeded && current > 1 { 1 } else { current }
}

/// The scheduler's current limit.
#[derive(Debug)]
pub(crate) struct ConcurrencyLimit {
    current: usize,
}
impl ConcurrencyLimit {
    pub fn initial(batch_len: usize, requested: usize, tuning: &Tuning) -> Self {
        Self { current: initial_limit(batch_len, requested, tuning) }
    }

    pub fn current(&self) -> usize {
        self.current
    }

    /// Re-evaluate after a settlement. Returns `true` if the limit dropped.
    pub fn observe(&mut self, tally: Tally) -> bool {
        let next = next_limit(self.current, tally);
        let degraded = next < self.current;
        self.current = next;
        degraded
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case::small_batch(5, 6, 5)]
    #[case::at_medium_threshold(10, 6, 5)]
    #[case::medium_batch(11, 6, 2)]
    #[case::at_large_threshold(20, 6, 2)]
    #[case::large_batch(25, 6, 2)]
    #[case::hint_of_one(3, 1, 1)]
    #[case::hint_of_zero(3, 0, 1)]
    #[case::large_batch_ignores_hint(100, 1, 2)]
    fn test_initial_limit(#[case] batch_len: usize, #[case] requested: usize, #[case] expected: usize) {
        assert_eq!(initial_limit(batch_len, requested, &Tuning::default()), expected);
    }

    #[test]
    fn test_thresholds_are_tunable() {
        let tuning = Tuning {
            medium_batch_threshold: 2,
            medium_batch_concurrency: 4,
            large_batch_threshold: 8,
            large_batch_concurrency: 6,
            ..Tuning::default()
        };
        assert_eq!(initial_limit(2, 10, &tuning), 9);
        assert_eq!(initial_limit(3, 10, &tuning), 4);
        assert_eq!(initial_limit(9, 10, &tuning), 6);
    }

    #[rstest]
    #[case(2, Tally { succeeded: 2, failed: 3 }, 1)]
    #[case(2, Tally { succeeded: 2, failed: 2 }, 2)]
    #[case(5, Tally { succeeded: 0, failed: 1 }, 1)]
    #[case(1, Tally { succeeded: 0, failed: 9 }, 1)]
    #[case(4, Tally { succeeded: 0, failed: 0 }, 4)]
    fn test_next_limit(#[case] current: usize, #[case] tally: Tally, #[case] expected: usize) {
        assert_eq!(next_limit(current, tally), expected);
    }

    #[test]
    fn test_degradation_is_one_directional() {
        // Failures take the lead, then successes recover it; the limit stays at 1.
        let outcomes = [false, false, false, true, true, true, true, true, true];
        let mut limit = ConcurrencyLimit { current: 4 };
        let mut tally = Tally::default();
        let mut history = Vec::new();
        for succeeded in outcomes {
            if succeeded {
                tally.succeeded += 1;
            } else {
                tally.failed += 1;
            }
            limit.observe(tally);
            history.push(limit.current());
        }
        assert_eq!(history, vec![1; outcomes.len()]);
        assert!(history.windows(2).all(|w| w[1] <= w[0]));
    }

    #[test]
    fn test_observe_reports_drop_once() {
        let mut limit = ConcurrencyLimit { current: 2 };
        assert!(!limit.observe(Tally { succeeded: 1, failed: 0 }));
        assert!(limit.observe(Tally { succeeded: 1, failed: 2 }));
        assert!(!limit.observe(Tally { succeeded: 1, failed: 3 }));
        assert_eq!(limit.current(), 1);
    }
}
