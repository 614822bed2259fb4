//! Table-driven parsing and encoding of property values.

use std::collections::HashMap;

use tracing::warn;

use super::tables::{self, CodeTable};
use super::{OFF, ON, PowerState, PropertyValue};
use crate::error::{EscvpError, Result};

/// How the value of a given property is decoded and encoded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ValueKind {
    Power,
    Integer,
    OnOff,
    Source,
    SourceList,
    AutoIrisMode,
    ColorMode,
    ErrorCode,
    PowerConsumptionMode,
}

/// Result of decoding one property value.
///
/// Decoding never fails: an undecodable value yields
/// [`PropertyValue::Unknown`] and the cause is carried in `anomaly`.
#[derive(Debug, Clone)]
pub struct Decoded {
    pub value: PropertyValue,
    pub anomaly: Option<EscvpError>,
}

impl Decoded {
    fn ok(value: PropertyValue) -> Self {
        Self {
            value,
            anomaly: None,
        }
    }

    fn unknown(anomaly: String) -> Self {
        Self {
            value: PropertyValue::Unknown,
            anomaly: Some(EscvpError::ParseAnomaly(anomaly)),
        }
    }
}

/// Immutable lookup tables mapping property names to their decoders
/// and encoders. Built once per client.
#[derive(Debug, Clone)]
pub struct PropertyCodec {
    kinds: HashMap<&'static str, ValueKind>,
    auto_iris_modes: CodeTable,
    color_modes: CodeTable,
    error_codes: CodeTable,
    power_consumption_modes: CodeTable,
    sources: CodeTable,
}

impl Default for PropertyCodec {
    fn default() -> Self {
        Self::new()
    }
}

impl PropertyCodec {
    pub fn new() -> Self {
        let kinds = HashMap::from([
            (super::AUTO_IRIS_MODE, ValueKind::AutoIrisMode),
            (super::BRIGHTNESS, ValueKind::Integer),
            (super::COLOR_MODE, ValueKind::ColorMode),
            (super::ERROR, ValueKind::ErrorCode),
            (super::LAMP_HOURS, ValueKind::Integer),
            (super::MUTE, ValueKind::OnOff),
            (super::POWER, ValueKind::Power),
            (super::POWER_CONSUMPTION_MODE, ValueKind::PowerConsumptionMode),
            (super::SOURCE, ValueKind::Source),
            (super::SOURCE_LIST, ValueKind::SourceList),
            (super::VOLUME, ValueKind::Integer),
        ]);
        Self {
            kinds,
            auto_iris_modes: CodeTable::new(tables::AUTO_IRIS_MODES),
            color_modes: CodeTable::new(tables::COLOR_MODES),
            error_codes: CodeTable::new(tables::ERROR_CODES),
            power_consumption_modes: CodeTable::new(tables::POWER_CONSUMPTION_MODES),
            sources: CodeTable::new(tables::SOURCES),
        }
    }

    fn table(&self, kind: ValueKind) -> Option<&CodeTable> {
        match kind {
            ValueKind::AutoIrisMode => Some(&self.auto_iris_modes),
            ValueKind::ColorMode => Some(&self.color_modes),
            ValueKind::ErrorCode => Some(&self.error_codes),
            ValueKind::PowerConsumptionMode => Some(&self.power_consumption_modes),
            ValueKind::Source => Some(&self.sources),
            _ => None,
        }
    }

    /// Decode the value part of a `KEY=VALUE` frame.
    ///
    /// Unknown property names pass the raw string through unchanged.
    pub fn decode(&self, property: &str, raw: &str) -> Decoded {
        let Some(kind) = self.kinds.get(property).copied() else {
            return Decoded::ok(PropertyValue::Text(raw.to_string()));
        };
        match kind {
            ValueKind::Power => match PowerState::from_power_code(raw) {
                Some(state) => Decoded::ok(PropertyValue::Power(state)),
                None => Decoded::unknown(format!("{property} has unknown value \"{raw}\"")),
            },
            ValueKind::Integer => match raw.trim().parse::<i64>() {
                Ok(n) => Decoded::ok(PropertyValue::Integer(n)),
                Err(e) => Decoded::unknown(format!("{property} value \"{raw}\": {e}")),
            },
            ValueKind::OnOff => Decoded::ok(PropertyValue::Flag(raw == ON)),
            ValueKind::Source => Decoded::ok(PropertyValue::Text(
                self.sources.name(raw).unwrap_or(raw).to_string(),
            )),
            ValueKind::SourceList => self.decode_source_list(raw),
            kind => match self.table(kind).and_then(|table| table.name(raw)) {
                Some(name) => Decoded::ok(PropertyValue::Text(name.to_string())),
                None => Decoded::unknown(format!("{property} has unknown value \"{raw}\"")),
            },
        }
    }

    /// `SOURCELIST` answers alternate a source code with its label.
    /// Only the codes are kept, mapped to known names where possible.
    fn decode_source_list(&self, raw: &str) -> Decoded {
        let parts: Vec<&str> = raw.split_whitespace().collect();
        let sources = parts
            .chunks_exact(2)
            .map(|pair| self.sources.name(pair[0]).unwrap_or(pair[0]).to_string())
            .collect();
        let anomaly = if parts.len() % 2 == 1 {
            warn!(raw, "source list has an odd number of values");
            Some(EscvpError::ParseAnomaly(format!(
                "source list has an odd number of values: \"{raw}\""
            )))
        } else {
            None
        };
        Decoded {
            value: PropertyValue::List(sources),
            anomaly,
        }
    }

    /// Encode the value portion of a `NAME VALUE` write.
    pub fn encode(&self, property: &str, value: &PropertyValue) -> Result<String> {
        let kind = self.kinds.get(property).copied();
        let invalid = || {
            EscvpError::InvalidCommand(format!("cannot set {property} to {value:?}"))
        };
        match (kind, value) {
            (_, PropertyValue::Empty | PropertyValue::Unknown | PropertyValue::List(_)) => {
                Err(invalid())
            }
            (Some(ValueKind::Power), PropertyValue::Power(PowerState::On)) => Ok(ON.into()),
            (Some(ValueKind::Power), PropertyValue::Power(PowerState::Off)) => Ok(OFF.into()),
            (Some(ValueKind::Power), PropertyValue::Power(_)) => Err(invalid()),
            (Some(ValueKind::Power), PropertyValue::Integer(_)) => Err(invalid()),
            (_, PropertyValue::Power(_)) => Err(invalid()),
            (_, PropertyValue::Flag(true)) => Ok(ON.into()),
            (_, PropertyValue::Flag(false)) => Ok(OFF.into()),
            (_, PropertyValue::Integer(n)) => Ok(n.to_string()),
            (Some(kind), PropertyValue::Text(text)) => Ok(self
                .table(kind)
                .and_then(|table| table.code(text))
                .unwrap_or(text)
                .to_string()),
            (None, PropertyValue::Text(text)) => Ok(text.clone()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::property;

    #[test]
    fn decode_power() {
        let codec = PropertyCodec::new();
        let decoded = codec.decode(property::POWER, "01");
        assert_eq!(decoded.value, PropertyValue::Power(PowerState::On));
        assert!(decoded.anomaly.is_none());

        let decoded = codec.decode(property::POWER, "07");
        assert!(decoded.value.is_unknown());
        assert!(matches!(decoded.anomaly, Some(EscvpError::ParseAnomaly(_))));
    }

    #[test]
    fn decode_integers() {
        let codec = PropertyCodec::new();
        assert_eq!(codec.decode(property::VOLUME, "12").value, PropertyValue::Integer(12));
        assert_eq!(codec.decode(property::LAMP_HOURS, "1520").value, PropertyValue::Integer(1520));
        let decoded = codec.decode(property::BRIGHTNESS, "bright");
        assert!(decoded.value.is_unknown());
        assert!(decoded.anomaly.is_some());
    }

    #[test]
    fn decode_tables() {
        let codec = PropertyCodec::new();
        assert_eq!(codec.decode(property::SOURCE, "30").value, PropertyValue::from("HDMI1"));
        // Unknown source codes are passed through.
        assert_eq!(codec.decode(property::SOURCE, "B1").value, PropertyValue::from("B1"));
        assert_eq!(codec.decode(property::COLOR_MODE, "06").value, PropertyValue::from("Dynamic"));
        assert_eq!(codec.decode(property::ERROR, "00").value, PropertyValue::from("None"));
        assert!(codec.decode(property::AUTO_IRIS_MODE, "09").value.is_unknown());
        assert_eq!(codec.decode(property::MUTE, "ON").value, PropertyValue::Flag(true));
        assert_eq!(codec.decode(property::MUTE, "OFF").value, PropertyValue::Flag(false));
    }

    #[test]
    fn unknown_property_passes_through() {
        let codec = PropertyCodec::new();
        let decoded = codec.decode(property::SERIAL_NUMBER, "X4B1234567");
        assert_eq!(decoded.value, PropertyValue::from("X4B1234567"));
        assert!(decoded.anomaly.is_none());
    }

    #[test]
    fn decode_source_list() {
        let codec = PropertyCodec::new();
        let decoded = codec.decode(property::SOURCE_LIST, "30 HDMI1 A0 HDMI2 B1 Other");
        assert_eq!(
            decoded.value,
            PropertyValue::List(vec!["HDMI1".into(), "HDMI2".into(), "B1".into()])
        );
        assert!(decoded.anomaly.is_none());
    }

    #[test]
    fn odd_source_list_is_reported_not_fatal() {
        let codec = PropertyCodec::new();
        let decoded = codec.decode(property::SOURCE_LIST, "30 HDMI1 A0");
        assert_eq!(decoded.value, PropertyValue::List(vec!["HDMI1".into()]));
        assert!(decoded.anomaly.is_some());
    }

    #[test]
    fn encode_values() {
        let codec = PropertyCodec::new();
        assert_eq!(codec.encode(property::SOURCE, &"HDMI2".into()).unwrap(), "A0");
        assert_eq!(codec.encode(property::SOURCE, &"30".into()).unwrap(), "30");
        assert_eq!(codec.encode(property::COLOR_MODE, &"Cinema".into()).unwrap(), "15");
        assert_eq!(codec.encode(property::VOLUME, &PropertyValue::Integer(0)).unwrap(), "0");
        assert_eq!(codec.encode(property::MUTE, &true.into()).unwrap(), "ON");
        assert_eq!(
            codec.encode(property::POWER, &PowerState::Off.into()).unwrap(),
            "OFF"
        );
        assert_eq!(codec.encode(property::POWER, &"ON".into()).unwrap(), "ON");
    }

    #[test]
    fn encode_rejects_unrepresentable_values() {
        let codec = PropertyCodec::new();
        assert!(codec.encode(property::POWER, &PowerState::WarmingUp.into()).is_err());
        assert!(codec.encode(property::VOLUME, &PropertyValue::Empty).is_err());
        assert!(codec.encode(property::SOURCE_LIST, &PropertyValue::List(vec![])).is_err());
    }
}
