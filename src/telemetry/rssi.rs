//! Pairwise signal-strength measurements reported by `RssiDataTracker`
//!
//! The tracker logs one field per received ping, named
//! `rssi_<sender>_<recipient>_<channel>` with the measured RSSI as value.

use std::collections::BTreeSet;
use std::fmt;

use chrono::{DateTime, Utc};

use super::history::{HistoryEntry, HistoryLog};
use super::StateRecord;

pub const TRACKER_TYPE: &str = "RssiDataTracker";

/// One received ping between two devices
#[derive(Debug, Clone, PartialEq)]
pub struct PingMessage {
    pub timestamp: DateTime<Utc>,
    pub sender: String,
    pub recipient: String,
    pub channel: u8,
    pub rssi: f64,
}

impl PingMessage {
    /// Interpret a tracker record, `None` for anything that is not a ping
    pub fn from_record(record: &StateRecord) -> Option<Self> {
        if record.type_tag != TRACKER_TYPE {
            return None;
        }
        let mut parts = record.field.split('_');
        if parts.next() != Some("rssi") {
            return None;
        }
        let sender = parts.next()?;
        let recipient = parts.next()?;
        let channel = parts.next()?.parse().ok()?;
        if parts.next().is_some() || sender.is_empty() || recipient.is_empty() {
            return None;
        }
        let rssi = record.value.trim().parse().ok()?;

        Some(Self {
            timestamp: record.timestamp,
            sender: sender.to_string(),
            recipient: recipient.to_string(),
            channel,
            rssi,
        })
    }
}

impl fmt::Display for PingMessage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{},{},{},{},{}",
            self.timestamp.to_rfc3339(),
            self.sender,
            self.recipient,
            self.channel,
            self.rssi
        )
    }
}

/// Unordered pair of device ids: `(i, j)` also matches pings from `j` to `i`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HandlePair {
    a: String,
    b: String,
}

impl HandlePair {
    pub fn new(i: impl Into<String>, j: impl Into<String>) -> Self {
        Self {
            a: i.into(),
            b: j.into(),
        }
    }

    pub fn matches(&self, ping: &PingMessage) -> bool {
        (ping.sender == self.a && ping.recipient == self.b)
            || (ping.sender == self.b && ping.recipient == self.a)
    }

    fn accepts(&self, record: &StateRecord) -> bool {
        PingMessage::from_record(record).is_some_and(|ping| self.matches(&ping))
    }
}

/// The last `n` pings exchanged by `pair`, newest first
pub fn last_n<'a>(history: &'a HistoryLog, pair: &HandlePair, n: usize) -> Vec<&'a HistoryEntry> {
    history.tail(n, None, |r| pair.accepts(r))
}

/// Pings exchanged by `pair` within `[begin, end]`, newest first
pub fn in_window<'a>(
    history: &'a HistoryLog,
    pair: &HandlePair,
    begin: DateTime<Utc>,
    end: DateTime<Utc>,
) -> Vec<&'a HistoryEntry> {
    history.window(begin, end, |r| pair.accepts(r))
}

pub fn mean_rssi_last_n(history: &HistoryLog, pair: &HandlePair, n: usize) -> Option<f64> {
    mean_rssi(&last_n(history, pair, n))
}

pub fn mean_rssi_in_window(
    history: &HistoryLog,
    pair: &HandlePair,
    begin: DateTime<Utc>,
    end: DateTime<Utc>,
) -> Option<f64> {
    mean_rssi(&in_window(history, pair, begin, end))
}

fn mean_rssi(entries: &[&HistoryEntry]) -> Option<f64> {
    let values: Vec<f64> = entries
        .iter()
        .filter_map(|e| PingMessage::from_record(&e.record))
        .map(|ping| ping.rssi)
        .collect();
    if values.is_empty() {
        return None;
    }
    Some(values.iter().sum::<f64>() / values.len() as f64)
}

/// Every device id seen as sender or recipient
pub fn active_ids(history: &HistoryLog) -> BTreeSet<String> {
    let mut ids = BTreeSet::new();
    for ping in history
        .entries()
        .iter()
        .filter_map(|e| PingMessage::from_record(&e.record))
    {
        ids.insert(ping.sender);
        ids.insert(ping.recipient);
    }
    ids
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    fn base() -> DateTime<Utc> {
        Utc.timestamp_opt(1_700_000_000, 0).unwrap()
    }

    fn ping(secs: i64, field: &str, value: &str) -> StateRecord {
        StateRecord {
            handle: "0x20004000".to_string(),
            type_tag: TRACKER_TYPE.to_string(),
            field: field.to_string(),
            value: value.to_string(),
            timestamp: base() + Duration::seconds(secs),
        }
    }

    fn sample_history() -> HistoryLog {
        let mut log = HistoryLog::new();
        log.append(ping(1, "rssi_1_2_37", "-60"));
        log.append(ping(2, "rssi_2_1_38", "-70"));
        log.append(ping(3, "rssi_1_3_37", "-80"));
        log.append(ping(4, "rssi_1_2_39", "-50"));
        log.append(StateRecord {
            type_tag: "SwitchAggregator".to_string(),
            ..ping(5, "rssi_1_2_37", "-1")
        });
        log
    }

    #[test]
    fn test_ping_from_record() {
        let parsed = PingMessage::from_record(&ping(0, "rssi_5_9_37", "-63.5")).unwrap();
        assert_eq!(parsed.sender, "5");
        assert_eq!(parsed.recipient, "9");
        assert_eq!(parsed.channel, 37);
        assert_eq!(parsed.rssi, -63.5);
    }

    #[test]
    fn test_ping_rejects_other_fields() {
        assert!(PingMessage::from_record(&ping(0, "rssi_5_9", "-63")).is_none());
        assert!(PingMessage::from_record(&ping(0, "rssi_5_9_37_1", "-63")).is_none());
        assert!(PingMessage::from_record(&ping(0, "count_5_9_37", "-63")).is_none());
        assert!(PingMessage::from_record(&ping(0, "rssi_5_9_x", "-63")).is_none());
        assert!(PingMessage::from_record(&ping(0, "rssi_5_9_37", "n/a")).is_none());
    }

    #[test]
    fn test_pair_is_symmetric() {
        let history = sample_history();
        let pair = HandlePair::new("2", "1");
        let hits = last_n(&history, &pair, 10);
        assert_eq!(hits.len(), 3);
        assert_eq!(hits[0].record.field, "rssi_1_2_39");
    }

    #[test]
    fn test_means() {
        let history = sample_history();
        let pair = HandlePair::new("1", "2");
        assert_eq!(mean_rssi_last_n(&history, &pair, 2), Some(-60.0));
        assert_eq!(
            mean_rssi_in_window(
                &history,
                &pair,
                base() + Duration::seconds(1),
                base() + Duration::seconds(2),
            ),
            Some(-65.0)
        );
        assert_eq!(mean_rssi_last_n(&history, &HandlePair::new("7", "8"), 5), None);
    }

    #[test]
    fn test_active_ids() {
        let ids: Vec<String> = active_ids(&sample_history()).into_iter().collect();
        assert_eq!(ids, vec!["1", "2", "3"]);
    }
}
