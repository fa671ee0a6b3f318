//! Mock device bridge for integration testing
//!
//! Speaks the bridge framing on stdin/stdout and answers commands with the
//! telemetry of a simulated firmware, so the bridge transport can be tested
//! without hardware.
//!
//! Usage: `mock_device [--opcode <n>] [--boot-report]`

use tokio::io::{AsyncWrite, BufReader};

use harness::common::config::DEFAULT_TELEMETRY_OPCODE;
use harness::device::codec::{self, BridgeMessage, MessageKind};
use harness::device::protocol::{CommandType, EventType};
use harness::device::sim::SimulatedFirmware;
use harness::device::Frame;

struct Options {
    opcode: u16,
    boot_report: bool,
}

fn parse_options() -> Options {
    let mut options = Options {
        opcode: DEFAULT_TELEMETRY_OPCODE,
        boot_report: false,
    };
    let mut args = std::env::args().skip(1);
    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--opcode" => {
                if let Some(opcode) = args.next().and_then(|v| v.parse().ok()) {
                    options.opcode = opcode;
                }
            }
            "--boot-report" => options.boot_report = true,
            other => eprintln!("mock_device: ignoring argument {other}"),
        }
    }
    options
}

#[tokio::main(flavor = "current_thread")]
async fn main() {
    let options = parse_options();
    let mut firmware = SimulatedFirmware::new(options.opcode);
    let mut reader = BufReader::new(tokio::io::stdin());
    let mut writer = tokio::io::stdout();

    if options.boot_report && !send_frames(&mut writer, firmware.full_report()).await {
        return;
    }

    loop {
        let message = match codec::read_message(&mut reader).await {
            Ok(Some(message)) => message,
            Ok(None) => break,
            Err(e) => {
                eprintln!("mock_device: {e}");
                break;
            }
        };

        let frames = match message.kind {
            MessageKind::Command => match CommandType::from_code(message.code) {
                Some(command) => firmware.handle_command(command, &message.payload),
                None => Vec::new(),
            },
            MessageKind::Event => match EventType::from_code(message.code) {
                Some(event) => firmware.handle_event(event, &message.payload),
                None => Vec::new(),
            },
            MessageKind::Frame => Vec::new(),
        };

        if !send_frames(&mut writer, frames).await {
            break;
        }
    }
}

async fn send_frames<W: AsyncWrite + Unpin>(writer: &mut W, frames: Vec<Frame>) -> bool {
    for frame in frames {
        let message = BridgeMessage {
            kind: MessageKind::Frame,
            code: frame.opcode,
            payload: frame.payload,
        };
        if codec::write_message(writer, &message).await.is_err() {
            return false;
        }
    }
    true
}
