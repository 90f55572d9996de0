//! Staleness detection: is a pull result newer than what is on screen?

use super::TimestampComparison;
use crate::domain::bid_log::{BidLogEntry, BidLogState};
use chrono::{DateTime, Utc};

/// The local state a reconciliation compares against.
///
/// Captured once when a reconciliation starts and carried through all of its
/// retries, so every attempt is judged against the same reference even if
/// optimistic inserts land in the meantime.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Baseline {
    pub count: usize,
    /// `date_time_update` of the local entry at index 0.
    pub latest: Option<DateTime<Utc>>,
}

impl Baseline {
    pub fn capture(state: &BidLogState) -> Self {
        Self {
            count: state.len(),
            latest: state.latest_timestamp(),
        }
    }

    pub fn of(entries: &[BidLogEntry]) -> Self {
        Self {
            count: entries.len(),
            latest: entries.first().map(|e| e.date_time_update),
        }
    }
}

/// Two-tier check: once a local timestamp exists it is the only signal;
/// before that (first load) a longer list counts as newer.
pub fn has_newer_data(
    fetched: &[BidLogEntry],
    baseline: &Baseline,
    comparison: TimestampComparison,
) -> bool {
    match (fetched.first(), baseline.latest) {
        (Some(head), Some(latest)) => match comparison {
            TimestampComparison::Strict => head.date_time_update > latest,
            TimestampComparison::Inclusive => head.date_time_update >= latest,
        },
        _ => fetched.len() > baseline.count,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reconcile::test_support::{entry, ts};

    const STRICT: TimestampComparison = TimestampComparison::Strict;

    #[test]
    fn test_later_head_is_newer() {
        let base = Baseline { count: 5, latest: Some(ts(10)) };
        assert!(has_newer_data(&[entry("x", "b", 11)], &base, STRICT));
    }

    #[test]
    fn test_equal_head_is_not_newer_when_strict() {
        let base = Baseline { count: 1, latest: Some(ts(10)) };
        let fetched = [entry("x", "b", 10), entry("y", "c", 5)];
        assert!(!has_newer_data(&fetched, &base, STRICT));
        assert!(has_newer_data(&fetched, &base, TimestampComparison::Inclusive));
    }

    #[test]
    fn test_timestamp_wins_over_count_once_known() {
        // More entries but an older head: still not newer.
        let base = Baseline { count: 1, latest: Some(ts(10)) };
        let fetched = [entry("x", "b", 9), entry("y", "c", 8), entry("z", "d", 7)];
        assert!(!has_newer_data(&fetched, &base, STRICT));
    }

    #[test]
    fn test_count_fallback_on_first_load() {
        let base = Baseline::default();
        assert!(has_newer_data(&[entry("x", "b", 1)], &base, STRICT));
        assert!(!has_newer_data(&[], &base, STRICT));
    }

    #[test]
    fn test_empty_fetch_against_known_timestamp_uses_count() {
        let base = Baseline { count: 2, latest: Some(ts(10)) };
        assert!(!has_newer_data(&[], &base, STRICT));
    }

    #[test]
    fn test_baseline_of_entries() {
        let b = Baseline::of(&[entry("x", "b", 30), entry("y", "c", 20)]);
        assert_eq!(b.count, 2);
        assert_eq!(b.latest, Some(ts(30)));
        assert_eq!(Baseline::of(&[]), Baseline::default());
    }
}
