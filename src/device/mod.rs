//! Device under test: command helpers over a [`Transport`]
//!
//! Every command and event is followed by a fixed settle delay so the firmware
//! has processed it before the next scenario action runs.

pub mod bridge;
pub mod codec;
pub mod loopback;
pub mod protocol;
pub mod sim;
pub mod transport;

use std::time::Duration;

use crate::common::config::DeviceConfig;
use crate::common::{Error, Result};

use protocol::{switch_value, CommandType, EventType};
pub use transport::{Frame, FrameCallback, Transport};

/// The device under test, as seen through its command channel
pub struct Device {
    transport: Box<dyn Transport>,
    settle_delay: Duration,
    reboot_wait: Duration,
}

impl Device {
    pub fn new(transport: Box<dyn Transport>, config: &DeviceConfig) -> Self {
        Self {
            transport,
            settle_delay: config.settle_delay(),
            reboot_wait: config.reboot_wait(),
        }
    }

    /// Register a callback for incoming frames
    pub fn subscribe(&mut self, on_frame: FrameCallback) {
        self.transport.subscribe(on_frame);
    }

    /// Send a control command, then wait for the firmware to settle
    pub fn send_command(&mut self, command: CommandType, payload: &[u8]) -> Result<()> {
        self.transport.send(command, payload)?;
        self.settle();
        Ok(())
    }

    /// Inject an internal event, then wait for the firmware to settle
    pub fn send_event(&mut self, event: EventType, payload: &[u8]) -> Result<()> {
        self.transport.send_event(event, payload)?;
        self.settle();
        Ok(())
    }

    fn settle(&self) {
        if !self.settle_delay.is_zero() {
            std::thread::sleep(self.settle_delay);
        }
    }

    /// Set the device clock to an absolute value
    ///
    /// 0 means "time never set" to the firmware and is refused here.
    pub fn set_time(&mut self, time: u32) -> Result<()> {
        if time == 0 {
            return Err(Error::ReservedTime(time));
        }
        tracing::info!(
            time,
            clock = %format_clock(time),
            "setTime called"
        );
        self.send_command(CommandType::SetTime, &time.to_le_bytes())
    }

    /// Send a switch command with an intensity or one of [`switch_value`]
    pub fn switch(&mut self, value: u8) -> Result<()> {
        self.send_command(CommandType::Switch, &[value])
    }

    /// Simulate a switchcraft (power toggle) on the internal event bus
    pub fn switchcraft(&mut self) -> Result<()> {
        self.send_event(EventType::SwitchToggle, &[])
    }

    /// Reset the switch aggregator with the debug reset-all switch value
    pub fn reset_aggregator_via_switch_value(&mut self) -> Result<()> {
        self.switch(switch_value::DEBUG_RESET_ALL)
    }

    /// Reset the switch aggregator by injecting the reset event
    pub fn reset_aggregator_via_event(&mut self) -> Result<()> {
        self.send_event(EventType::SwitchAggregatorReset, &[])
    }

    // Note: the three clears below are ignored by the firmware in dumb home mode.

    pub fn clear_override(&mut self) -> Result<()> {
        self.switch(switch_value::DEBUG_RESET_OVERRIDE)
    }

    pub fn clear_aggregated(&mut self) -> Result<()> {
        self.switch(switch_value::DEBUG_RESET_AGGREGATED)
    }

    pub fn clear_override_and_aggregated(&mut self) -> Result<()> {
        self.switch(switch_value::DEBUG_RESET_AGGREGATED_OVERRIDE)
    }

    pub fn clear_behaviour_store(&mut self) -> Result<()> {
        self.send_event(EventType::ClearBehaviourStore, &[])
    }

    /// Store an already encoded behaviour packet at `index`
    pub fn replace_behaviour(&mut self, index: u8, packet: &[u8]) -> Result<()> {
        let mut payload = Vec::with_capacity(packet.len() + 1);
        payload.push(index);
        payload.extend_from_slice(packet);
        self.send_command(CommandType::ReplaceBehaviour, &payload)
    }

    pub fn set_allow_dimming(&mut self, allowed: bool) -> Result<()> {
        self.send_command(CommandType::AllowDimming, &[u8::from(allowed)])
    }

    /// Switch between dumb home (behaviours inactive) and smart home
    pub fn set_dumb_mode(&mut self, home_is_dumb: bool) -> Result<()> {
        self.send_command(
            CommandType::SetState,
            &protocol::behaviour_settings_packet(home_is_dumb),
        )
    }

    /// Reboot the device without waiting for it
    pub fn reset(&mut self) -> Result<()> {
        self.send_command(CommandType::Reset, &[])
    }

    /// Reboot the device and wait until it is expected to be up again
    pub fn full_reset(&mut self) -> Result<()> {
        tracing::info!(
            wait_secs = self.reboot_wait.as_secs(),
            "Resetting device and waiting for it to boot"
        );
        self.reset()?;
        std::thread::sleep(self.reboot_wait);
        Ok(())
    }
}

/// Render an absolute device time as a wall clock `HH:MM`
pub fn format_clock(time: u32) -> String {
    format!("{:02}:{:02}", (time / 3600) % 24, (time % 3600) / 60)
}
