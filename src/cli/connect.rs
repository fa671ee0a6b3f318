//! Connecting a [`Bench`] to the device under test

use crate::common::config::Config;
use crate::common::Result;
use crate::device::bridge::BridgeTransport;
use crate::device::loopback::Loopback;
use crate::device::sim::SimulatedFirmware;
use crate::device::{Device, Transport};
use crate::scenario::Bench;

/// Open a bench on the configured bridge, or on the simulated firmware
///
/// The simulated firmware answers synchronously, so no settle delay is
/// applied to it.
pub async fn open_bench(config: &Config, simulate: bool) -> Result<Bench> {
    let opcode = config.telemetry.opcode;
    let mut device_config = config.device.clone();

    let transport: Box<dyn Transport> = if simulate {
        tracing::info!("Using simulated firmware");
        device_config.settle_delay_ms = 0;
        device_config.reboot_wait_secs = 0;
        let firmware = SimulatedFirmware::new(opcode);
        Box::new(Loopback::with_firmware(firmware))
    } else {
        let program = config.resolve_bridge()?;
        Box::new(BridgeTransport::spawn(&program, &config.bridge.args).await?)
    };

    Ok(Bench::new(Device::new(transport, &device_config), opcode))
}
