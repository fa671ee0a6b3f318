//! Transport over an external bridge process
//!
//! The bridge owns the serial port and the device's wire encoding. We talk to
//! it over its stdin/stdout using the framing in [`super::codec`].

use std::path::Path;
use std::process::Stdio;
use std::sync::{Arc, RwLock};

use tokio::io::{BufReader, BufWriter};
use tokio::process::{Child, Command};
use tokio::sync::mpsc;

use crate::common::{Error, Result};

use super::codec::{self, BridgeMessage, MessageKind};
use super::protocol::{CommandType, EventType};
use super::transport::{Frame, FrameCallback, Transport};

type Subscribers = Arc<RwLock<Vec<FrameCallback>>>;

/// Transport backed by a spawned bridge process
pub struct BridgeTransport {
    /// Bridge subprocess, killed when the transport is dropped
    _bridge: Child,
    /// Outgoing messages, written by the writer task
    outgoing: mpsc::UnboundedSender<BridgeMessage>,
    /// Callbacks for incoming frames, shared with the reader task
    subscribers: Subscribers,
}

impl BridgeTransport {
    /// Spawn the bridge and start its reader and writer tasks
    ///
    /// Must be called from within a tokio runtime.
    pub async fn spawn(program: &Path, args: &[String]) -> Result<Self> {
        let mut cmd = Command::new(program);
        cmd.args(args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::inherit())
            .kill_on_drop(true);

        let mut bridge = cmd.spawn().map_err(|e| {
            Error::BridgeStartFailed(format!("Failed to start {}: {}", program.display(), e))
        })?;

        let stdin = bridge
            .stdin
            .take()
            .ok_or_else(|| Error::BridgeStartFailed("Failed to get bridge stdin".to_string()))?;
        let stdout = bridge
            .stdout
            .take()
            .ok_or_else(|| Error::BridgeStartFailed("Failed to get bridge stdout".to_string()))?;

        tracing::info!(program = %program.display(), "Bridge started");

        let (outgoing, mut outgoing_rx) = mpsc::unbounded_channel::<BridgeMessage>();
        tokio::spawn(async move {
            let mut writer = BufWriter::new(stdin);
            while let Some(message) = outgoing_rx.recv().await {
                if let Err(e) = codec::write_message(&mut writer, &message).await {
                    tracing::error!(error = %e, "Failed to write to bridge");
                    break;
                }
            }
        });

        let subscribers: Subscribers = Arc::new(RwLock::new(Vec::new()));
        let reader_subscribers = Arc::clone(&subscribers);
        tokio::spawn(async move {
            let mut reader = BufReader::new(stdout);
            loop {
                match codec::read_message(&mut reader).await {
                    Ok(Some(message)) if message.kind == MessageKind::Frame => {
                        let frame = Frame::new(message.code, message.payload);
                        if let Ok(callbacks) = reader_subscribers.read() {
                            for callback in callbacks.iter() {
                                callback(frame.clone());
                            }
                        }
                    }
                    Ok(Some(message)) => {
                        tracing::warn!(
                            kind = ?message.kind,
                            "Ignoring unexpected message from bridge"
                        );
                    }
                    Ok(None) => {
                        tracing::info!("Bridge closed its output");
                        break;
                    }
                    Err(e) => {
                        tracing::error!(error = %e, "Bridge read failed");
                        break;
                    }
                }
            }
        });

        Ok(Self {
            _bridge: bridge,
            outgoing,
            subscribers,
        })
    }

    fn push(&self, kind: MessageKind, code: u16, payload: &[u8]) -> Result<()> {
        self.outgoing
            .send(BridgeMessage {
                kind,
                code,
                payload: payload.to_vec(),
            })
            .map_err(|_| Error::BridgeClosed)
    }
}

impl Transport for BridgeTransport {
    fn send(&mut self, command: CommandType, payload: &[u8]) -> Result<()> {
        tracing::debug!(command = ?command, len = payload.len(), "Bridge >>> command");
        self.push(MessageKind::Command, command.code(), payload)
    }

    fn send_event(&mut self, event: EventType, payload: &[u8]) -> Result<()> {
        tracing::debug!(event = ?event, len = payload.len(), "Bridge >>> event");
        self.push(MessageKind::Event, event.code(), payload)
    }

    fn subscribe(&mut self, on_frame: FrameCallback) {
        match self.subscribers.write() {
            Ok(mut callbacks) => callbacks.push(on_frame),
            Err(_) => tracing::error!("Subscriber list poisoned; frame callback not installed"),
        }
    }
}
