//! Turning raw firmware state frames into [`StateRecord`]s
//!
//! The firmware logs every tracked variable as one text payload:
//! ```text
//! <handle>@<scope>@<field>@<value>
//! ```
//! where `scope` is the compiler's decorated signature of the logging
//! function (`void SwitchAggregator::updateState(bool)`). The input is live
//! and noisy, so nothing in here ever fails the process: malformed frames are
//! logged and dropped.

use chrono::{DateTime, Utc};
use thiserror::Error;
use tokio::sync::mpsc;

use crate::device::{Frame, FrameCallback};

use super::StateRecord;

/// Separator between the four payload fields
pub const FIELD_DELIMITER: char = '@';

const FIELD_COUNT: usize = 4;

/// Why a frame was dropped
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ParseError {
    #[error("payload is empty")]
    Empty,

    #[error("non-printable byte 0x{byte:02x} at offset {offset}")]
    NonPrintable { byte: u8, offset: usize },

    #[error("expected 4 fields, got {0}")]
    FieldCount(usize),

    #[error("object handle is empty")]
    EmptyHandle,

    #[error("field name is empty")]
    EmptyField,
}

/// Parse one state payload received at `timestamp`
pub fn parse_payload(
    payload: &[u8],
    timestamp: DateTime<Utc>,
) -> Result<StateRecord, ParseError> {
    // C strings may arrive with their terminator
    let end = payload
        .iter()
        .rposition(|b| *b != 0)
        .map_or(0, |last| last + 1);
    let payload = &payload[..end];

    if payload.is_empty() {
        return Err(ParseError::Empty);
    }

    if let Some(offset) = payload.iter().position(|b| !is_printable(*b)) {
        return Err(ParseError::NonPrintable {
            byte: payload[offset],
            offset,
        });
    }

    // all bytes are printable ASCII at this point
    let text = String::from_utf8_lossy(payload);
    let parts: Vec<&str> = text.split(FIELD_DELIMITER).collect();
    if parts.len() != FIELD_COUNT {
        return Err(ParseError::FieldCount(parts.len()));
    }

    let raw_handle = parts[0].trim();
    if raw_handle.is_empty() {
        return Err(ParseError::EmptyHandle);
    }
    let field = parts[2].trim();
    if field.is_empty() {
        return Err(ParseError::EmptyField);
    }

    Ok(StateRecord {
        handle: normalize_handle(raw_handle),
        type_tag: type_tag_from_scope(parts[1]),
        field: field.to_string(),
        value: parts[3].to_string(),
        timestamp,
    })
}

fn is_printable(byte: u8) -> bool {
    (0x20..=0x7e).contains(&byte)
}

/// Handles are addresses; the firmware sends them as bare hex
fn normalize_handle(raw: &str) -> String {
    if raw.starts_with("0x") || raw.starts_with("0X") {
        format!("0x{}", &raw[2..])
    } else {
        format!("0x{raw}")
    }
}

/// Best-effort type name from a decorated function signature
///
/// Takes the part before the first `::` and returns its last
/// whitespace-separated token, with pointer/reference marks and template
/// arguments stripped:
/// `void SwitchAggregator::updateState(bool)` gives `SwitchAggregator`.
/// Anything that does not end up as a plain identifier yields an empty tag.
/// Free functions cannot be told apart from class names this way.
pub fn type_tag_from_scope(scope: &str) -> String {
    let leading = scope.split("::").next().unwrap_or_default();
    let token = leading.split_whitespace().next_back().unwrap_or_default();
    let token = token.trim_start_matches(['*', '&']);
    let token = token.split('<').next().unwrap_or_default();

    if is_identifier(token) {
        token.to_string()
    } else {
        tracing::warn!(scope, "Could not identify type name; using empty type tag");
        String::new()
    }
}

fn is_identifier(token: &str) -> bool {
    let mut chars = token.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

/// Frame subscriber feeding parsed records into a telemetry queue
///
/// Runs in whatever context the transport delivers frames on; it only parses
/// and enqueues, the owner of the queue applies records when it drains.
#[derive(Debug, Clone)]
pub struct Ingestor {
    opcode: u16,
    queue: mpsc::UnboundedSender<StateRecord>,
}

impl Ingestor {
    pub(super) fn new(opcode: u16, queue: mpsc::UnboundedSender<StateRecord>) -> Self {
        Self { opcode, queue }
    }

    /// Handle one frame from the transport
    pub fn on_frame(&self, frame: &Frame) {
        if frame.opcode != self.opcode {
            tracing::trace!(opcode = frame.opcode, "Ignoring non-telemetry frame");
            return;
        }

        match parse_payload(&frame.payload, Utc::now()) {
            Ok(record) => {
                tracing::debug!(
                    handle = %record.handle,
                    type_tag = %record.type_tag,
                    field = %record.field,
                    value = %record.value,
                    "Firmware state update"
                );
                if self.queue.send(record).is_err() {
                    tracing::trace!("Telemetry queue closed; dropping record");
                }
            }
            Err(e) => {
                tracing::warn!(
                    error = %e,
                    payload = %String::from_utf8_lossy(&frame.payload),
                    "Dropping malformed telemetry frame"
                );
            }
        }
    }

    /// Wrap this ingestor as a transport subscription
    pub fn into_callback(self) -> FrameCallback {
        Box::new(move |frame| self.on_frame(&frame))
    }
}
