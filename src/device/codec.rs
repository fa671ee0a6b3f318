//! Bridge wire framing
//!
//! The harness and the bridge exchange header-framed messages with a raw
//! binary body:
//! ```text
//! Kind: command|event|frame\r\n
//! Type: <decimal code>\r\n
//! Content-Length: <byte-length>\r\n
//! \r\n
//! <payload bytes>
//! ```
//! `command` and `event` flow towards the device, `frame` flows back.

use std::io;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncReadExt, AsyncWrite, AsyncWriteExt};

use crate::common::Error;

/// Largest payload accepted from the bridge
const MAX_PAYLOAD: usize = 64 * 1024;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageKind {
    Command,
    Event,
    Frame,
}

impl MessageKind {
    fn as_str(self) -> &'static str {
        match self {
            Self::Command => "command",
            Self::Event => "event",
            Self::Frame => "frame",
        }
    }

    fn parse(value: &str) -> Option<Self> {
        match value {
            "command" => Some(Self::Command),
            "event" => Some(Self::Event),
            "frame" => Some(Self::Frame),
            _ => None,
        }
    }
}

/// One message on the bridge link
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BridgeMessage {
    pub kind: MessageKind,
    pub code: u16,
    pub payload: Vec<u8>,
}

/// Read a bridge message from the stream
///
/// Returns `Ok(None)` on a clean end of stream before any header.
pub async fn read_message<R: AsyncBufRead + Unpin>(
    reader: &mut R,
) -> Result<Option<BridgeMessage>, Error> {
    let mut kind: Option<MessageKind> = None;
    let mut code: Option<u16> = None;
    let mut content_length: Option<usize> = None;
    let mut saw_header = false;

    loop {
        let mut line = String::new();
        let bytes_read = reader.read_line(&mut line).await?;

        if bytes_read == 0 {
            if saw_header {
                return Err(Error::BridgeClosed);
            }
            return Ok(None);
        }

        // Empty line (just \r\n) signals end of headers
        if line == "\r\n" || line == "\n" {
            if !saw_header {
                continue;
            }
            break;
        }
        saw_header = true;

        let line = line.trim();
        if let Some(value) = line.strip_prefix("Kind:") {
            kind = Some(MessageKind::parse(value.trim()).ok_or_else(|| {
                Error::BridgeProtocol(format!("Unknown message kind: {}", value.trim()))
            })?);
        } else if let Some(value) = line.strip_prefix("Type:") {
            code = Some(value.trim().parse().map_err(|_| {
                Error::BridgeProtocol(format!("Invalid Type: {}", value.trim()))
            })?);
        } else if let Some(value) = line.strip_prefix("Content-Length:") {
            content_length = Some(value.trim().parse().map_err(|_| {
                Error::BridgeProtocol(format!("Invalid Content-Length: {}", value.trim()))
            })?);
        }
        // Ignore other headers
    }

    let kind = kind.ok_or_else(|| Error::BridgeProtocol("Missing Kind header".to_string()))?;
    let code = code.ok_or_else(|| Error::BridgeProtocol("Missing Type header".to_string()))?;
    let len = content_length
        .ok_or_else(|| Error::BridgeProtocol("Missing Content-Length header".to_string()))?;

    if len > MAX_PAYLOAD {
        return Err(Error::BridgeProtocol(format!(
            "Content-Length too large: {} bytes",
            len
        )));
    }

    let mut payload = vec![0u8; len];
    reader.read_exact(&mut payload).await.map_err(|e| {
        if e.kind() == io::ErrorKind::UnexpectedEof {
            Error::BridgeClosed
        } else {
            Error::Io(e)
        }
    })?;

    Ok(Some(BridgeMessage {
        kind,
        code,
        payload,
    }))
}

/// Encode a bridge message into bytes
pub fn encode_message(message: &BridgeMessage) -> Vec<u8> {
    let header = format!(
        "Kind: {}\r\nType: {}\r\nContent-Length: {}\r\n\r\n",
        message.kind.as_str(),
        message.code,
        message.payload.len()
    );
    let mut bytes = header.into_bytes();
    bytes.extend_from_slice(&message.payload);
    bytes
}

/// Write a bridge message to the stream
pub async fn write_message<W: AsyncWrite + Unpin>(
    writer: &mut W,
    message: &BridgeMessage,
) -> Result<(), Error> {
    writer.write_all(&encode_message(message)).await?;
    writer.flush().await?;
    Ok(())
}
