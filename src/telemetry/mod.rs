//! Firmware state telemetry: ingestion, latest-state store and history
//!
//! The transport delivers frames on its own context; the [`Ingestor`] only
//! parses them and queues the records. [`Telemetry`] owns the queue's
//! receiving end and applies everything queued before any read, so each
//! query sees a fully drained, consistent snapshot.

mod history;
mod ingest;
pub mod rssi;
mod store;

use chrono::{DateTime, Utc};
use tokio::sync::mpsc;

use crate::device::Frame;

pub use history::{HistoryEntry, HistoryLog};
pub use ingest::{parse_payload, type_tag_from_scope, Ingestor, ParseError, FIELD_DELIMITER};
pub use store::{ObjectState, StateStore};

/// One parsed state update
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StateRecord {
    pub handle: String,
    pub type_tag: String,
    pub field: String,
    pub value: String,
    pub timestamp: DateTime<Utc>,
}

/// State store and history for one test run
pub struct Telemetry {
    store: StateStore,
    history: HistoryLog,
    tx: mpsc::UnboundedSender<StateRecord>,
    rx: mpsc::UnboundedReceiver<StateRecord>,
}

impl Telemetry {
    pub fn new() -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        Self {
            store: StateStore::new(),
            history: HistoryLog::new(),
            tx,
            rx,
        }
    }

    /// A frame subscriber feeding this context
    pub fn ingestor(&self, opcode: u16) -> Ingestor {
        Ingestor::new(opcode, self.tx.clone())
    }

    /// Apply every queued record, returning how many there were
    pub fn drain(&mut self) -> usize {
        let mut applied = 0;
        while let Ok(record) = self.rx.try_recv() {
            self.record(record);
            applied += 1;
        }
        if applied > 0 {
            tracing::trace!(applied, "Drained telemetry queue");
        }
        applied
    }

    /// Parse and apply one frame directly, bypassing the queue
    ///
    /// Returns whether the frame produced a record.
    pub fn ingest_frame(&mut self, frame: &Frame, opcode: u16) -> bool {
        if frame.opcode != opcode {
            return false;
        }
        match parse_payload(&frame.payload, Utc::now()) {
            Ok(record) => {
                self.drain();
                self.record(record);
                true
            }
            Err(e) => {
                tracing::warn!(error = %e, "Dropping malformed telemetry frame");
                false
            }
        }
    }

    fn record(&mut self, record: StateRecord) {
        self.store.apply(&record);
        self.history.append(record);
    }

    pub fn store(&mut self) -> &StateStore {
        self.drain();
        &self.store
    }

    pub fn history(&mut self) -> &HistoryLog {
        self.drain();
        &self.history
    }

    /// Forget all state, including records still queued
    pub fn clear(&mut self) {
        self.drain();
        self.store.clear();
        self.history.clear();
    }
}

impl Default for Telemetry {
    fn default() -> Self {
        Self::new()
    }
}
