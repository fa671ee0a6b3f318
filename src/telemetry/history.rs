//! Append-only log of every state record
//!
//! Entries are kept in arrival order, which is only roughly timestamp order.
//! The backward-scanning queries stop early at time boundaries, so records
//! that arrived badly out of order may be missed (never misreported).

use std::fmt;

use chrono::{DateTime, Utc};

use super::StateRecord;

/// A retained copy of one record, numbered by arrival
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HistoryEntry {
    pub seq: u64,
    pub record: StateRecord,
}

impl HistoryEntry {
    pub fn timestamp(&self) -> DateTime<Utc> {
        self.record.timestamp
    }
}

impl fmt::Display for HistoryEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let r = &self.record;
        write!(
            f,
            "{} {} {}.{}={}",
            r.timestamp.format("%H:%M:%S%.3f"),
            r.handle,
            r.type_tag,
            r.field,
            r.value
        )
    }
}

#[derive(Debug, Default)]
pub struct HistoryLog {
    entries: Vec<HistoryEntry>,
    next_seq: u64,
}

impl HistoryLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn append(&mut self, record: StateRecord) {
        self.entries.push(HistoryEntry {
            seq: self.next_seq,
            record,
        });
        self.next_seq += 1;
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn entries(&self) -> &[HistoryEntry] {
        &self.entries
    }

    pub fn last(&self) -> Option<&HistoryEntry> {
        self.entries.last()
    }

    /// The most recent `n` entries accepted by `filter`, newest first
    ///
    /// Scanning stops once `n` matches are found or an entry older than
    /// `not_before` is reached.
    pub fn tail<F>(
        &self,
        n: usize,
        not_before: Option<DateTime<Utc>>,
        filter: F,
    ) -> Vec<&HistoryEntry>
    where
        F: Fn(&StateRecord) -> bool,
    {
        let mut found = Vec::new();
        if n == 0 {
            return found;
        }
        for entry in self.entries.iter().rev() {
            if not_before.is_some_and(|boundary| entry.timestamp() < boundary) {
                break;
            }
            if filter(&entry.record) {
                found.push(entry);
                if found.len() >= n {
                    break;
                }
            }
        }
        found
    }

    /// Entries accepted by `filter` with `begin <= timestamp <= end`, newest first
    pub fn window<F>(
        &self,
        begin: DateTime<Utc>,
        end: DateTime<Utc>,
        filter: F,
    ) -> Vec<&HistoryEntry>
    where
        F: Fn(&StateRecord) -> bool,
    {
        let mut found = Vec::new();
        for entry in self.entries.iter().rev() {
            let t = entry.timestamp();
            if t < begin {
                break;
            }
            if t <= end && filter(&entry.record) {
                found.push(entry);
            }
        }
        found
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    fn at(secs: i64, field: &str) -> StateRecord {
        StateRecord {
            handle: "0x1".to_string(),
            type_tag: "T".to_string(),
            field: field.to_string(),
            value: secs.to_string(),
            timestamp: Utc.timestamp_opt(1_700_000_000 + secs, 0).unwrap(),
        }
    }

    fn base() -> DateTime<Utc> {
        Utc.timestamp_opt(1_700_000_000, 0).unwrap()
    }

    #[test]
    fn test_append_keeps_insertion_order() {
        let mut log = HistoryLog::new();
        log.append(at(5, "a"));
        log.append(at(1, "b"));
        let fields: Vec<&str> = log.entries().iter().map(|e| e.record.field.as_str()).collect();
        assert_eq!(fields, vec!["a", "b"]);
        assert_eq!(log.entries()[1].seq, 1);
    }

    #[test]
    fn test_tail_returns_newest_matches_first() {
        let mut log = HistoryLog::new();
        for (t, f) in [(1, "x"), (2, "y"), (3, "x"), (4, "x"), (5, "y")] {
            log.append(at(t, f));
        }

        let hits = log.tail(2, None, |r| r.field == "x");
        let values: Vec<&str> = hits.iter().map(|e| e.record.value.as_str()).collect();
        assert_eq!(values, vec!["4", "3"]);

        assert!(log.tail(0, None, |_| true).is_empty());
        assert_eq!(log.tail(10, None, |r| r.field == "y").len(), 2);
    }

    #[test]
    fn test_tail_stops_at_time_boundary() {
        let mut log = HistoryLog::new();
        for t in 1..=5 {
            log.append(at(t, "x"));
        }
        let hits = log.tail(10, Some(base() + Duration::seconds(3)), |_| true);
        assert_eq!(hits.len(), 3);
    }

    #[test]
    fn test_window_is_inclusive() {
        let mut log = HistoryLog::new();
        for t in 1..=6 {
            log.append(at(t, "x"));
        }
        let hits = log.window(
            base() + Duration::seconds(2),
            base() + Duration::seconds(4),
            |_| true,
        );
        let values: Vec<&str> = hits.iter().map(|e| e.record.value.as_str()).collect();
        assert_eq!(values, vec!["4", "3", "2"]);
    }

    #[test]
    fn test_out_of_order_arrival_can_be_missed_but_not_misreported() {
        let mut log = HistoryLog::new();
        log.append(at(10, "x"));
        log.append(at(1, "x")); // late frame
        log.append(at(11, "x"));

        let hits = log.window(
            base() + Duration::seconds(5),
            base() + Duration::seconds(20),
            |_| true,
        );
        assert_eq!(hits.len(), 1);
        assert!(hits.iter().all(|e| e.timestamp() >= base() + Duration::seconds(5)));
    }

    #[test]
    fn test_clear_twice() {
        let mut log = HistoryLog::new();
        log.append(at(1, "x"));
        log.clear();
        log.clear();
        assert!(log.is_empty());
    }
}
