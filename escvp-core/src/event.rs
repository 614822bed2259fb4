//! Decoder for unsolicited `IMEVENT` status frames.
//!
//! The frame value is a space-separated token sequence:
//!
//! ```text
//! token[0]  event subtype
//! token[1]  power code (hex); 0xFF marks an abnormal state
//! token[2]  warning bitmask (hex)
//! token[3]  alarm bitmask (hex), meaningful with the abnormal code
//! ```

use tracing::{debug, error, warn};

use crate::error::{EscvpError, Result};
use crate::property::PowerState;

/// Power code signalling an alarm instead of a power state.
pub const POWER_CODE_ABNORMAL: u32 = 0xFF;

/// Bit index → warning name.
pub const WARNING_BITS: &[(u32, &str)] = &[
    (0, "Lamp life"),
    (1, "No signal"),
    (2, "Unsupported signal"),
    (3, "Air filter"),
    (4, "High temperature"),
];

/// Bit index → alarm name.
pub const ALARM_BITS: &[(u32, &str)] = &[
    (0, "Lamp ON failure"),
    (1, "Lamp lid"),
    (2, "Lamp burnout"),
    (3, "Fan"),
    (4, "Temperature sensor"),
    (5, "High temperature"),
    (6, "Interior (system)"),
];

/// What a status event reports.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct StatusEvent {
    pub subtype: String,
    /// Reported power state; `None` for abnormal or unmapped codes.
    pub power: Option<PowerState>,
    /// Active warnings. Logged only.
    pub warnings: Vec<&'static str>,
    /// Active alarms. Non-empty means the device error is latched.
    pub alarms: Vec<&'static str>,
}

impl StatusEvent {
    /// Human-readable alarm list delivered as the error property.
    pub fn alarm_text(&self) -> Option<String> {
        if self.alarms.is_empty() {
            None
        } else {
            Some(self.alarms.join(", "))
        }
    }
}

fn parse_hex(token: &str) -> Result<u32> {
    u32::from_str_radix(token, 16)
        .map_err(|e| EscvpError::ParseAnomaly(format!("invalid hex token \"{token}\": {e}")))
}

fn bit_names(mask: u32, bits: &[(u32, &'static str)]) -> Vec<&'static str> {
    bits.iter()
        .filter(|(bit, _)| mask & (1 << *bit) != 0)
        .map(|(_, name)| *name)
        .collect()
}

/// Decode an `IMEVENT` value. Errors are anomalies for the caller to
/// log; they never end the read loop.
pub fn decode(value: &str) -> Result<StatusEvent> {
    let parts: Vec<&str> = value.split_whitespace().collect();
    if parts.len() < 2 {
        return Err(EscvpError::ParseAnomaly(format!(
            "event \"{value}\" has fewer than 2 tokens"
        )));
    }

    let mut event = StatusEvent {
        subtype: parts[0].to_string(),
        ..Default::default()
    };

    if let Some(token) = parts.get(2) {
        event.warnings = bit_names(parse_hex(token)?, WARNING_BITS);
        for warning in &event.warnings {
            warn!(warning, "projector warning");
        }
    }

    let power_code = parse_hex(parts[1])?;
    if power_code == POWER_CODE_ABNORMAL {
        let Some(token) = parts.get(3) else {
            return Err(EscvpError::ParseAnomaly(format!(
                "abnormal event \"{value}\" has no alarm bitmask"
            )));
        };
        error!(alarm_bitmask = token, "abnormal power code");
        event.alarms = bit_names(parse_hex(token)?, ALARM_BITS);
        for alarm in &event.alarms {
            error!(alarm, "projector alarm");
        }
    } else {
        event.power = PowerState::from_event_code(power_code);
        if event.power.is_none() {
            warn!(power_code, "unsupported event power code");
        }
    }

    debug!(?event, "decoded status event");
    Ok(event)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn power_code_maps_to_state() {
        let event = decode("02 03").unwrap();
        assert_eq!(event.subtype, "02");
        assert_eq!(event.power, Some(PowerState::On));
        assert!(event.alarms.is_empty());

        assert_eq!(decode("0001 01 00000000").unwrap().power, Some(PowerState::Off));
        assert_eq!(decode("0001 04").unwrap().power, Some(PowerState::CoolingDown));
    }

    #[test]
    fn warnings_are_collected() {
        let event = decode("0001 03 00000012").unwrap();
        assert_eq!(event.warnings, vec!["No signal", "High temperature"]);
        assert_eq!(event.power, Some(PowerState::On));
    }

    #[test]
    fn alarm_mask_yields_error_text() {
        let event = decode("02 FF 00 04").unwrap();
        assert_eq!(event.power, None);
        assert_eq!(event.alarm_text().as_deref(), Some("Lamp burnout"));

        let event = decode("02 FF 00 28").unwrap();
        assert_eq!(event.alarm_text().as_deref(), Some("Fan, High temperature"));
    }

    #[test]
    fn empty_alarm_mask_latches_nothing() {
        let event = decode("02 FF 00 00").unwrap();
        assert!(event.alarm_text().is_none());
    }

    #[test]
    fn malformed_events_are_anomalies() {
        assert!(matches!(decode("02"), Err(EscvpError::ParseAnomaly(_))));
        assert!(matches!(decode("02 ZZ"), Err(EscvpError::ParseAnomaly(_))));
        assert!(matches!(decode("02 FF 00"), Err(EscvpError::ParseAnomaly(_))));
        assert!(matches!(decode(""), Err(EscvpError::ParseAnomaly(_))));
    }

    #[test]
    fn unmapped_power_code_is_ignored() {
        let event = decode("02 09").unwrap();
        assert_eq!(event.power, None);
    }
}
