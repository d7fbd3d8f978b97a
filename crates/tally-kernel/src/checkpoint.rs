//! Append-only, time-ordered checkpoint logs.
//!
//! A [`CheckpointLog`] records how a single value changed over time. Writes
//! at the timestamp of the last entry overwrite it in place (coalescing), so
//! a log grows by one entry per *distinct* timestamp, not per write. Nothing
//! is ever removed.

use serde::{Deserialize, Serialize};
use tally_types::Timestamp;

/// A single recorded value and the time it took effect.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckpointEntry<V> {
    pub timestamp: Timestamp,
    pub value: V,
}

/// A write was attempted at a timestamp older than the log's last entry.
///
/// Only possible if the time source moved backwards.
#[derive(thiserror::Error, Debug, Clone, Copy, PartialEq, Eq)]
#[error("clock regression: write at {attempted} precedes last checkpoint at {last}")]
pub struct ClockRegression {
    pub last: Timestamp,
    pub attempted: Timestamp,
}

/// Time-ordered history of a value with same-timestamp coalescing.
///
/// Invariant: entry timestamps are strictly increasing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckpointLog<V> {
    entries: Vec<CheckpointEntry<V>>,
}

impl<V> Default for CheckpointLog<V> {
    fn default() -> Self {
        Self {
            entries: Vec::new(),
        }
    }
}

impl<V> CheckpointLog<V> {
    /// Creates an empty log.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a log holding a single entry.
    pub fn starting_at(timestamp: Timestamp, value: V) -> Self {
        Self {
            entries: vec![CheckpointEntry { timestamp, value }],
        }
    }

    /// Records `value` as of `timestamp`.
    ///
    /// Appends when the log is empty or `timestamp` is newer than the last
    /// entry, overwrites the last entry's value when they are equal, and
    /// fails with [`ClockRegression`] when `timestamp` is older.
    pub fn append_or_coalesce(
        &mut self,
        timestamp: Timestamp,
        value: V,
    ) -> Result<(), ClockRegression> {
        match self.entries.last_mut() {
            Some(last) if timestamp < last.timestamp => Err(ClockRegression {
                last: last.timestamp,
                attempted: timestamp,
            }),
            Some(last) if timestamp == last.timestamp => {
                last.value = value;
                Ok(())
            }
            _ => {
                self.entries.push(CheckpointEntry { timestamp, value });
                debug_assert!(
                    self.entries
                        .windows(2)
                        .all(|w| w[0].timestamp < w[1].timestamp),
                    "checkpoint timestamps must be strictly increasing"
                );
                Ok(())
            }
        }
    }

    /// Returns the current value, or `None` if the log was never written.
    pub fn latest(&self) -> Option<&V> {
        self.entries.last().map(|e| &e.value)
    }

    /// Returns the timestamp of the last entry.
    pub fn latest_timestamp(&self) -> Option<Timestamp> {
        self.entries.last().map(|e| e.timestamp)
    }

    /// Returns true once at least one entry has been recorded.
    pub fn is_initialized(&self) -> bool {
        !self.entries.is_empty()
    }

    /// Returns the value in effect at `timestamp`.
    ///
    /// That is the value of the last entry recorded at or before
    /// `timestamp`; `None` if the log starts after it.
    pub fn value_at(&self, timestamp: Timestamp) -> Option<&V> {
        let idx = self.entries.partition_point(|e| e.timestamp <= timestamp);
        idx.checked_sub(1).map(|i| &self.entries[i].value)
    }

    /// Returns the full history, oldest first.
    pub fn entries(&self) -> &[CheckpointEntry<V>] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_case::test_case;

    fn ts(secs: u64) -> Timestamp {
        Timestamp::from_secs(secs)
    }

    fn log_of(points: &[(u64, u32)]) -> CheckpointLog<u32> {
        let mut log = CheckpointLog::new();
        for (t, v) in points {
            log.append_or_coalesce(ts(*t), *v).unwrap();
        }
        log
    }

    #[test]
    fn empty_log_has_no_latest() {
        let log: CheckpointLog<u32> = CheckpointLog::new();
        assert!(!log.is_initialized());
        assert!(log.is_empty());
        assert_eq!(log.latest(), None);
        assert_eq!(log.latest_timestamp(), None);
        assert_eq!(log.value_at(ts(100)), None);
    }

    #[test]
    fn first_write_initializes() {
        let log = log_of(&[(10, 0)]);
        assert!(log.is_initialized());
        assert_eq!(log.latest(), Some(&0));
        assert_eq!(log.latest_timestamp(), Some(ts(10)));
    }

    #[test]
    fn same_timestamp_writes_coalesce() {
        let log = log_of(&[(10, 1), (10, 2)]);
        assert_eq!(log.len(), 1);
        assert_eq!(log.latest(), Some(&2));
        assert_eq!(log.entries()[0].timestamp, ts(10));
    }

    #[test]
    fn newer_timestamp_appends() {
        let log = log_of(&[(10, 1), (11, 2), (11, 3), (20, 4)]);
        let stamps: Vec<u64> = log
            .entries()
            .iter()
            .map(|e| e.timestamp.as_secs())
            .collect();
        let values: Vec<u32> = log.entries().iter().map(|e| e.value).collect();
        assert_eq!(stamps, vec![10, 11, 20]);
        assert_eq!(values, vec![1, 3, 4]);
    }

    #[test]
    fn older_timestamp_is_rejected_without_change() {
        let mut log = log_of(&[(10, 1)]);
        let err = log.append_or_coalesce(ts(9), 5).unwrap_err();
        assert_eq!(
            err,
            ClockRegression {
                last: ts(10),
                attempted: ts(9)
            }
        );
        assert_eq!(log.len(), 1);
        assert_eq!(log.latest(), Some(&1));
    }

    #[test_case(9, None; "before first entry")]
    #[test_case(10, Some(1); "at first entry")]
    #[test_case(15, Some(1); "between entries")]
    #[test_case(20, Some(2); "at second entry")]
    #[test_case(29, Some(2); "just before third")]
    #[test_case(30, Some(3); "at last entry")]
    #[test_case(u64::MAX, Some(3); "far future")]
    fn value_at_finds_entry_in_effect(at: u64, expected: Option<u32>) {
        let log = log_of(&[(10, 1), (20, 2), (30, 3)]);
        assert_eq!(log.value_at(ts(at)).copied(), expected);
    }

    mod proptests {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            #[test]
            fn timestamps_strictly_increase(steps in prop::collection::vec((0u64..3, any::<u32>()), 1..50)) {
                let mut log = CheckpointLog::new();
                let mut now = 0u64;
                for (advance, value) in steps {
                    now += advance;
                    log.append_or_coalesce(ts(now), value).unwrap();
                }
                for pair in log.entries().windows(2) {
                    prop_assert!(pair[0].timestamp < pair[1].timestamp);
                }
            }

            #[test]
            fn one_entry_per_distinct_timestamp(steps in prop::collection::vec((0u64..3, any::<u32>()), 1..50)) {
                let mut log = CheckpointLog::new();
                let mut now = 0u64;
                let mut last_per_tick = std::collections::BTreeMap::new();
                for (advance, value) in steps {
                    now += advance;
                    log.append_or_coalesce(ts(now), value).unwrap();
                    last_per_tick.insert(now, value);
                }
                prop_assert_eq!(log.len(), last_per_tick.len());
                for (tick, value) in &last_per_tick {
                    prop_assert_eq!(log.value_at(ts(*tick)), Some(value));
                }
            }
        }
    }
}
