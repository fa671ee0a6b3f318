//! Code tables shared with the bridge
//!
//! The bridge owns the actual wire encoding; the harness only names what it
//! wants sent by these numeric codes.

/// Control command types (see PROTOCOL.md#command-types of the firmware)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u16)]
pub enum CommandType {
    SetState = 3,
    Reset = 10,
    Switch = 20,
    SetTime = 30,
    AllowDimming = 40,
    ReplaceBehaviour = 61,
}

impl CommandType {
    pub fn code(self) -> u16 {
        self as u16
    }

    pub fn from_code(code: u16) -> Option<Self> {
        Some(match code {
            3 => Self::SetState,
            10 => Self::Reset,
            20 => Self::Switch,
            30 => Self::SetTime,
            40 => Self::AllowDimming,
            61 => Self::ReplaceBehaviour,
            _ => return None,
        })
    }
}

const INTERNAL_BASE: u16 = 0x100;
const INTERNAL_BASE_SWITCH: u16 = INTERNAL_BASE + 20;
const INTERNAL_BASE_BEHAVIOUR: u16 = INTERNAL_BASE + 170;

/// Events injected on the firmware's internal event bus
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u16)]
pub enum EventType {
    SwitchToggle = INTERNAL_BASE_SWITCH + 2,
    SwitchAggregatorReset = INTERNAL_BASE_SWITCH + 9,
    ClearBehaviourStore = INTERNAL_BASE_BEHAVIOUR + 6,
}

impl EventType {
    pub fn code(self) -> u16 {
        self as u16
    }

    pub fn from_code(code: u16) -> Option<Self> {
        [
            Self::SwitchToggle,
            Self::SwitchAggregatorReset,
            Self::ClearBehaviourStore,
        ]
        .into_iter()
        .find(|e| e.code() == code)
    }
}

/// State types addressable through `CommandType::SetState`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u16)]
pub enum StateType {
    BehaviourSettings = 150,
}

/// Values understood by the switch command
pub mod switch_value {
    pub const OFF: u8 = 0;
    /// Dimmed values range from 1 to 99
    pub const FULLY_ON: u8 = 100;
    pub const DEBUG_RESET_ALL: u8 = 129;
    pub const DEBUG_RESET_AGGREGATED: u8 = 130;
    pub const DEBUG_RESET_OVERRIDE: u8 = 131;
    pub const DEBUG_RESET_AGGREGATED_OVERRIDE: u8 = 132;
    /// Off when currently on, smart-on when currently off
    pub const TOGGLE: u8 = 253;
    pub const BEHAVIOUR: u8 = 254;
    pub const SMART_ON: u8 = 255;
}

/// Build the SET_STATE payload for the behaviour settings state
///
/// Layout: state type (u16 LE), state id 0 (u16), persistence mode RAM (u8),
/// reserved (u8), then the u32 LE value: 0 means dumb home, 1 smart home.
pub fn behaviour_settings_packet(home_is_dumb: bool) -> Vec<u8> {
    let mut packet = Vec::with_capacity(10);
    packet.extend_from_slice(&(StateType::BehaviourSettings as u16).to_le_bytes());
    packet.extend_from_slice(&[0x00, 0x00]);
    packet.push(0x00);
    packet.push(0x00);
    let value: u32 = if home_is_dumb { 0 } else { 1 };
    packet.extend_from_slice(&value.to_le_bytes());
    packet
}
