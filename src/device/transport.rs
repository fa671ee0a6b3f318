//! The seam between the harness and whatever carries bytes to the device

use crate::common::Result;

use super::protocol::{CommandType, EventType};

/// One decoded frame received from the device
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    pub opcode: u16,
    pub payload: Vec<u8>,
}

impl Frame {
    pub fn new(opcode: u16, payload: impl Into<Vec<u8>>) -> Self {
        Self {
            opcode,
            payload: payload.into(),
        }
    }
}

/// Callback invoked for every incoming frame, possibly from another thread
pub type FrameCallback = Box<dyn Fn(Frame) + Send + Sync>;

/// Command and event channel to the device under test
///
/// Implementations do not retry; a failed send is reported once.
pub trait Transport: Send {
    /// Send a control command
    fn send(&mut self, command: CommandType, payload: &[u8]) -> Result<()>;

    /// Inject an event on the firmware's internal event bus
    fn send_event(&mut self, event: EventType, payload: &[u8]) -> Result<()>;

    /// Register a callback for incoming frames
    fn subscribe(&mut self, on_frame: FrameCallback);
}
