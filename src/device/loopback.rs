//! In-process transport
//!
//! Records everything sent and hands it to a responder that may answer with
//! frames. The frames are delivered to subscribers synchronously, inside the
//! `send` call.

use std::sync::{Arc, Mutex};

use crate::common::Result;

use super::protocol::{CommandType, EventType};
use super::sim::SimulatedFirmware;
use super::transport::{Frame, FrameCallback, Transport};

/// A message that went out through a [`Loopback`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SentMessage {
    Command { command: CommandType, payload: Vec<u8> },
    Event { event: EventType, payload: Vec<u8> },
}

/// Shared view of everything a [`Loopback`] has sent
#[derive(Debug, Clone, Default)]
pub struct SentLog(Arc<Mutex<Vec<SentMessage>>>);

impl SentLog {
    fn push(&self, message: SentMessage) {
        if let Ok(mut messages) = self.0.lock() {
            messages.push(message);
        }
    }

    /// Snapshot of all messages in send order
    pub fn messages(&self) -> Vec<SentMessage> {
        self.0.lock().map(|m| m.clone()).unwrap_or_default()
    }

    /// Payloads of every command of the given type, in send order
    pub fn payloads_of(&self, command: CommandType) -> Vec<Vec<u8>> {
        self.messages()
            .into_iter()
            .filter_map(|m| match m {
                SentMessage::Command { command: c, payload } if c == command => Some(payload),
                _ => None,
            })
            .collect()
    }

    /// Every clock value sent with `CommandType::SetTime`
    pub fn clock_sets(&self) -> Vec<u32> {
        self.payloads_of(CommandType::SetTime)
            .into_iter()
            .filter_map(|p| <[u8; 4]>::try_from(p.as_slice()).ok())
            .map(u32::from_le_bytes)
            .collect()
    }

    /// Every internal event sent, in send order
    pub fn events(&self) -> Vec<EventType> {
        self.messages()
            .into_iter()
            .filter_map(|m| match m {
                SentMessage::Event { event, .. } => Some(event),
                SentMessage::Command { .. } => None,
            })
            .collect()
    }
}

type Responder = Box<dyn FnMut(&SentMessage) -> Vec<Frame> + Send>;

pub struct Loopback {
    log: SentLog,
    responder: Responder,
    subscribers: Vec<FrameCallback>,
}

impl Loopback {
    /// A loopback that never answers
    pub fn new() -> Self {
        Self::with_responder(|_| Vec::new())
    }

    pub fn with_responder(
        responder: impl FnMut(&SentMessage) -> Vec<Frame> + Send + 'static,
    ) -> Self {
        Self {
            log: SentLog::default(),
            responder: Box::new(responder),
            subscribers: Vec::new(),
        }
    }

    /// A loopback answered by a simulated firmware
    pub fn with_firmware(mut firmware: SimulatedFirmware) -> Self {
        Self::with_responder(move |message| match message {
            SentMessage::Command { command, payload } => firmware.handle_command(*command, payload),
            SentMessage::Event { event, payload } => firmware.handle_event(*event, payload),
        })
    }

    /// Handle to the record of sent messages, usable after the loopback is boxed
    pub fn log(&self) -> SentLog {
        self.log.clone()
    }

    fn dispatch(&mut self, message: SentMessage) {
        let frames = (self.responder)(&message);
        self.log.push(message);
        for frame in frames {
            for callback in &self.subscribers {
                callback(frame.clone());
            }
        }
    }
}

impl Default for Loopback {
    fn default() -> Self {
        Self::new()
    }
}

impl Transport for Loopback {
    fn send(&mut self, command: CommandType, payload: &[u8]) -> Result<()> {
        self.dispatch(SentMessage::Command {
            command,
            payload: payload.to_vec(),
        });
        Ok(())
    }

    fn send_event(&mut self, event: EventType, payload: &[u8]) -> Result<()> {
        self.dispatch(SentMessage::Event {
            event,
            payload: payload.to_vec(),
        });
        Ok(())
    }

    fn subscribe(&mut self, on_frame: FrameCallback) {
        self.subscribers.push(on_frame);
    }
}
