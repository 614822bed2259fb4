//! Property vocabulary, decoded values and the property codec.
//!
//! Property names are the ESC/VP21 command mnemonics. Reads are sent as
//! `NAME?`, writes as `NAME VALUE`.

mod codec;
pub mod tables;

use std::fmt;

pub use codec::{Decoded, PropertyCodec};

// ── Property names ───────────────────────────────────────────────

pub const AUTO_IRIS_MODE: &str = "IRIS";
pub const BRIGHTNESS: &str = "BRIGHT";
pub const COLOR_MODE: &str = "CMODE";
pub const ERROR: &str = "ERR";
pub const LAMP_HOURS: &str = "LAMP";
pub const MUTE: &str = "MUTE";
pub const POWER: &str = "PWR";
pub const POWER_CONSUMPTION_MODE: &str = "LUMINANCE";
pub const SERIAL_NUMBER: &str = "SNO";
pub const SOURCE: &str = "SOURCE";
pub const SOURCE_LIST: &str = "SOURCELIST";
pub const VOLUME: &str = "VOL";

pub const ON: &str = "ON";
pub const OFF: &str = "OFF";

// ── Bare commands ────────────────────────────────────────────────

pub const COMMAND_KEY: &str = "KEY";
pub const COMMAND_LOAD_LENS_MEMORY: &str = "POPLP";
pub const COMMAND_LOAD_PICTURE_MEMORY: &str = "POPMEM";

/// Memory type selector sent before the picture memory slot.
pub const PICTURE_MEMORY_TYPE: &str = "02";

/// Two-digit uppercase hex rendering used for memory slot arguments.
pub fn to_hex(id: u8) -> String {
    format!("{id:02X}")
}

// ── PowerState ───────────────────────────────────────────────────

/// Power state as tracked by the power gate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PowerState {
    Off,
    WarmingUp,
    On,
    CoolingDown,
    /// The device reported something we could not map.
    Error,
}

impl PowerState {
    /// `On` and `Off` end a power transition.
    pub fn is_terminal(self) -> bool {
        matches!(self, PowerState::On | PowerState::Off)
    }

    /// `WarmingUp` and `CoolingDown` defer new requests.
    pub fn is_transition(self) -> bool {
        matches!(self, PowerState::WarmingUp | PowerState::CoolingDown)
    }

    /// Map a `PWR=xx` answer.
    pub fn from_power_code(code: &str) -> Option<Self> {
        match code {
            "00" | "04" | "05" | "09" => Some(PowerState::Off),
            "01" => Some(PowerState::On),
            "02" => Some(PowerState::WarmingUp),
            "03" => Some(PowerState::CoolingDown),
            _ => None,
        }
    }

    /// Map the power code of a status event.
    pub fn from_event_code(code: u32) -> Option<Self> {
        match code {
            1 => Some(PowerState::Off),
            2 => Some(PowerState::WarmingUp),
            3 => Some(PowerState::On),
            4 => Some(PowerState::CoolingDown),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            PowerState::Off => "off",
            PowerState::WarmingUp => "warmup",
            PowerState::On => "on",
            PowerState::CoolingDown => "cooldown",
            PowerState::Error => "error",
        }
    }
}

impl fmt::Display for PowerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ── PropertyValue ────────────────────────────────────────────────

/// A decoded value for a named property.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PropertyValue {
    /// No value: bare acknowledgements and cleared conditions.
    Empty,
    /// The raw value could not be decoded.
    Unknown,
    Text(String),
    Integer(i64),
    Flag(bool),
    List(Vec<String>),
    Power(PowerState),
}

impl PropertyValue {
    pub fn as_power(&self) -> Option<PowerState> {
        match self {
            PropertyValue::Power(state) => Some(*state),
            _ => None,
        }
    }

    pub fn is_unknown(&self) -> bool {
        matches!(self, PropertyValue::Unknown)
    }
}

impl fmt::Display for PropertyValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PropertyValue::Empty => Ok(()),
            PropertyValue::Unknown => write!(f, "unknown"),
            PropertyValue::Text(text) => write!(f, "{text}"),
            PropertyValue::Integer(n) => write!(f, "{n}"),
            PropertyValue::Flag(true) => write!(f, "{ON}"),
            PropertyValue::Flag(false) => write!(f, "{OFF}"),
            PropertyValue::List(items) => write!(f, "{}", items.join(", ")),
            PropertyValue::Power(state) => write!(f, "{state}"),
        }
    }
}

impl From<&str> for PropertyValue {
    fn from(text: &str) -> Self {
        PropertyValue::Text(text.to_string())
    }
}

impl From<String> for PropertyValue {
    fn from(text: String) -> Self {
        PropertyValue::Text(text)
    }
}

impl From<i64> for PropertyValue {
    fn from(n: i64) -> Self {
        PropertyValue::Integer(n)
    }
}

impl From<bool> for PropertyValue {
    fn from(flag: bool) -> Self {
        PropertyValue::Flag(flag)
    }
}

impl From<PowerState> for PropertyValue {
    fn from(state: PowerState) -> Self {
        PropertyValue::Power(state)
    }
}

// ── RemoteKey ────────────────────────────────────────────────────

/// Remote-control keys sent with the `KEY` command.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RemoteKey {
    Play,
    Stop,
    Pause,
    Previous,
    Next,
    Mute,
    VolumeUp,
    VolumeDown,
}

impl RemoteKey {
    pub fn code(self) -> &'static str {
        match self {
            RemoteKey::Play => "D1",
            RemoteKey::Stop => "D2",
            RemoteKey::Pause => "D3",
            RemoteKey::Previous => "D4",
            RemoteKey::Next => "D5",
            RemoteKey::Mute => "D8",
            RemoteKey::VolumeUp => "56",
            RemoteKey::VolumeDown => "57",
        }
    }
}

impl std::str::FromStr for RemoteKey {
    type Err = crate::error::EscvpError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "play" => Ok(RemoteKey::Play),
            "stop" => Ok(RemoteKey::Stop),
            "pause" => Ok(RemoteKey::Pause),
            "previous" | "prev" => Ok(RemoteKey::Previous),
            "next" => Ok(RemoteKey::Next),
            "mute" => Ok(RemoteKey::Mute),
            "volume-up" | "volup" => Ok(RemoteKey::VolumeUp),
            "volume-down" | "voldown" => Ok(RemoteKey::VolumeDown),
            other => Err(crate::error::EscvpError::InvalidCommand(format!(
                "unknown remote key \"{other}\""
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn power_codes() {
        assert_eq!(PowerState::from_power_code("01"), Some(PowerState::On));
        assert_eq!(PowerState::from_power_code("04"), Some(PowerState::Off));
        assert_eq!(PowerState::from_power_code("09"), Some(PowerState::Off));
        assert_eq!(PowerState::from_power_code("07"), None);
        assert_eq!(PowerState::from_event_code(3), Some(PowerState::On));
        assert_eq!(PowerState::from_event_code(0xFF), None);
    }

    #[test]
    fn power_classification() {
        assert!(PowerState::On.is_terminal());
        assert!(!PowerState::WarmingUp.is_terminal());
        assert!(PowerState::CoolingDown.is_transition());
        assert!(!PowerState::Error.is_transition());
    }

    #[test]
    fn value_display() {
        assert_eq!(PropertyValue::Flag(true).to_string(), "ON");
        assert_eq!(PropertyValue::Power(PowerState::WarmingUp).to_string(), "warmup");
        assert_eq!(
            PropertyValue::List(vec!["HDMI1".into(), "PC".into()]).to_string(),
            "HDMI1, PC"
        );
        assert_eq!(PropertyValue::Empty.to_string(), "");
    }

    #[test]
    fn remote_keys() {
        assert_eq!("play".parse::<RemoteKey>().unwrap().code(), "D1");
        assert_eq!("VolUp".parse::<RemoteKey>().unwrap(), RemoteKey::VolumeUp);
        assert!("rewind".parse::<RemoteKey>().is_err());
    }

    #[test]
    fn hex_arguments() {
        assert_eq!(to_hex(1), "01");
        assert_eq!(to_hex(10), "0A");
    }
}
