//! A small simulated firmware
//!
//! Models just enough of the switch aggregator to answer commands with the
//! state-update telemetry a real device would log. Used by `--simulate`, the
//! `mock_device` binary and the tests.

use super::protocol::{switch_value, CommandType, EventType, StateType};
use super::transport::Frame;
use crate::telemetry::FIELD_DELIMITER;

const AGGREGATOR_HANDLE: &str = "20001a2b";
const BEHAVIOUR_HANDLER_HANDLE: &str = "20002c10";
const TWILIGHT_HANDLER_HANDLE: &str = "20002d40";
const SYSTEM_TIME_HANDLE: &str = "20000f08";
const BEHAVIOUR_STORE_HANDLE: &str = "20003a00";

const AGGREGATOR_SCOPE: &str = "void SwitchAggregator::updateState(bool)";
const BEHAVIOUR_HANDLER_SCOPE: &str = "bool BehaviourHandler::update()";
const TWILIGHT_HANDLER_SCOPE: &str = "bool TwilightHandler::update()";
const SYSTEM_TIME_SCOPE: &str = "static void SystemTime::setTime(uint32_t, bool)";
const BEHAVIOUR_STORE_SCOPE: &str = "ErrorCodesGeneral BehaviourStore::replaceBehaviour(uint8_t)";

/// Translucent/unset marker used by the firmware for optional states
const UNSET: i32 = -1;

#[derive(Debug, Clone)]
pub struct SimulatedFirmware {
    opcode: u16,
    clock: u32,
    override_state: i32,
    behaviour_state: i32,
    twilight_state: i32,
    aggregated_state: i32,
    smart_home: bool,
    dimming_allowed: bool,
    stored_behaviours: u32,
}

impl SimulatedFirmware {
    /// Create a freshly booted device emitting telemetry under `opcode`
    pub fn new(opcode: u16) -> Self {
        Self {
            opcode,
            clock: 0,
            override_state: UNSET,
            behaviour_state: UNSET,
            twilight_state: UNSET,
            aggregated_state: UNSET,
            smart_home: true,
            dimming_allowed: false,
            stored_behaviours: 0,
        }
    }

    /// Current device clock, 0 when never set
    pub fn clock(&self) -> u32 {
        self.clock
    }

    pub fn dimming_allowed(&self) -> bool {
        self.dimming_allowed
    }

    /// Process a control command, returning the telemetry it causes
    pub fn handle_command(&mut self, command: CommandType, payload: &[u8]) -> Vec<Frame> {
        match command {
            CommandType::Switch => match payload.first() {
                Some(&value) => self.switch(value),
                None => Vec::new(),
            },
            CommandType::SetTime => match <[u8; 4]>::try_from(payload) {
                Ok(bytes) => {
                    let t = u32::from_le_bytes(bytes);
                    // the firmware refuses 0, it means "never set"
                    if t == 0 {
                        return Vec::new();
                    }
                    self.clock = t;
                    vec![self.frame(
                        SYSTEM_TIME_HANDLE,
                        SYSTEM_TIME_SCOPE,
                        "posixTime",
                        &t.to_string(),
                    )]
                }
                Err(_) => Vec::new(),
            },
            CommandType::SetState => self.set_state(payload),
            CommandType::AllowDimming => {
                self.dimming_allowed = payload.first().is_some_and(|b| *b != 0);
                Vec::new()
            }
            CommandType::ReplaceBehaviour => {
                self.stored_behaviours += 1;
                vec![self.frame(
                    BEHAVIOUR_STORE_HANDLE,
                    BEHAVIOUR_STORE_SCOPE,
                    "count",
                    &self.stored_behaviours.to_string(),
                )]
            }
            CommandType::Reset => {
                *self = Self::new(self.opcode);
                self.full_report()
            }
        }
    }

    /// Process an internal event, returning the telemetry it causes
    pub fn handle_event(&mut self, event: EventType, _payload: &[u8]) -> Vec<Frame> {
        match event {
            EventType::SwitchToggle => self.toggle(),
            EventType::SwitchAggregatorReset => self.reset_all(),
            EventType::ClearBehaviourStore => {
                self.stored_behaviours = 0;
                vec![self.frame(BEHAVIOUR_STORE_HANDLE, BEHAVIOUR_STORE_SCOPE, "count", "0")]
            }
        }
    }

    /// Everything the firmware reports right after boot
    pub fn full_report(&self) -> Vec<Frame> {
        let mut frames = self.aggregator_report();
        frames.extend(self.handler_report());
        frames
    }

    fn switch(&mut self, value: u8) -> Vec<Frame> {
        match value {
            switch_value::OFF..=switch_value::FULLY_ON => {
                self.override_state = i32::from(value);
                self.recompute();
            }
            switch_value::SMART_ON => {
                self.override_state = i32::from(value);
                self.recompute();
            }
            switch_value::TOGGLE => return self.toggle(),
            switch_value::BEHAVIOUR => {
                self.override_state = UNSET;
                self.recompute();
            }
            switch_value::DEBUG_RESET_ALL => return self.reset_all(),
            switch_value::DEBUG_RESET_AGGREGATED => self.aggregated_state = UNSET,
            switch_value::DEBUG_RESET_OVERRIDE => {
                self.override_state = UNSET;
                self.recompute();
            }
            switch_value::DEBUG_RESET_AGGREGATED_OVERRIDE => {
                self.override_state = UNSET;
                self.aggregated_state = UNSET;
            }
            _ => return Vec::new(),
        }
        self.aggregator_report()
    }

    fn toggle(&mut self) -> Vec<Frame> {
        self.override_state = if self.aggregated_state > 0 {
            i32::from(switch_value::OFF)
        } else {
            i32::from(switch_value::SMART_ON)
        };
        self.recompute();
        self.aggregator_report()
    }

    fn reset_all(&mut self) -> Vec<Frame> {
        self.override_state = UNSET;
        self.behaviour_state = UNSET;
        self.twilight_state = UNSET;
        self.aggregated_state = UNSET;
        self.aggregator_report()
    }

    fn recompute(&mut self) {
        self.aggregated_state = match self.override_state {
            UNSET => self.behaviour_state.max(0),
            v if v == i32::from(switch_value::SMART_ON) => {
                if self.twilight_state > 0 {
                    self.twilight_state
                } else {
                    i32::from(switch_value::FULLY_ON)
                }
            }
            v => v,
        };
    }

    fn set_state(&mut self, payload: &[u8]) -> Vec<Frame> {
        if payload.len() < 10 {
            return Vec::new();
        }
        let state_type = u16::from_le_bytes([payload[0], payload[1]]);
        if state_type != StateType::BehaviourSettings as u16 {
            return Vec::new();
        }
        let value = u32::from_le_bytes([payload[6], payload[7], payload[8], payload[9]]);
        self.smart_home = value != 0;
        self.handler_report()
    }

    fn aggregator_report(&self) -> Vec<Frame> {
        [
            ("overrideState", self.override_state),
            ("behaviourState", self.behaviour_state),
            ("twilightState", self.twilight_state),
            ("aggregatedState", self.aggregated_state),
        ]
        .into_iter()
        .map(|(field, value)| {
            self.frame(AGGREGATOR_HANDLE, AGGREGATOR_SCOPE, field, &value.to_string())
        })
        .collect()
    }

    fn handler_report(&self) -> Vec<Frame> {
        let active = if self.smart_home { "True" } else { "False" };
        vec![
            self.frame(
                BEHAVIOUR_HANDLER_HANDLE,
                BEHAVIOUR_HANDLER_SCOPE,
                "isActive",
                active,
            ),
            self.frame(
                TWILIGHT_HANDLER_HANDLE,
                TWILIGHT_HANDLER_SCOPE,
                "isActive",
                active,
            ),
        ]
    }

    fn frame(&self, handle: &str, scope: &str, field: &str, value: &str) -> Frame {
        let d = FIELD_DELIMITER;
        Frame::new(self.opcode, format!("{handle}{d}{scope}{d}{field}{d}{value}").into_bytes())
    }
}
