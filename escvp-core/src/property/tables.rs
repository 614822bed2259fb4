//! Code ↔ name tables for table-driven properties.
//!
//! The raw entries are constants; [`CodeTable`] indexes them once when
//! the [`PropertyCodec`](super::PropertyCodec) is built.

use std::collections::HashMap;

pub type Entries = &'static [(&'static str, &'static str)];

pub const AUTO_IRIS_MODES: Entries = &[("00", "Off"), ("01", "Normal"), ("02", "High")];

pub const COLOR_MODES: Entries = &[
    ("00", "Auto"),
    ("05", "Theatre"),
    ("06", "Dynamic"),
    ("07", "Natural"),
    ("09", "Theatre Black 1/HD"),
    ("0A", "Theatre Black 2/Silver Screen"),
    ("0B", "x.v.Color"),
    ("0C", "Bright Cinema"),
    ("0D", "Game"),
    ("13", "THX"),
    ("15", "Cinema"),
    ("16", "Stage"),
    ("17", "3D Cinema"),
    ("18", "3D Dynamic"),
    ("19", "3D THX"),
    ("20", "B&W Cinema"),
    ("21", "Adobe RGB"),
    ("22", "Digital Cinema"),
    ("C1", "AutoColor"),
];

/// Description reported for error code `00`.
pub const ERROR_NONE: &str = "None";

pub const ERROR_CODES: Entries = &[
    ("00", ERROR_NONE),
    ("01", "Fan error"),
    ("03", "Lamp failure at power on"),
    ("04", "High internal temperature error"),
    ("06", "Lamp error"),
    ("07", "Open Lamp cover door error"),
    ("08", "Cinema filter error"),
    ("09", "Electric dual-layered capacitor is disconnected"),
    ("0A", "Auto iris error"),
    ("0B", "Subsystem Error"),
    ("0C", "Low air flow error"),
    ("0D", "Air filter air flow sensor error"),
    ("0E", "Power supply unit error (Ballast)"),
    ("0F", "Shutter error"),
    ("10", "Cooling system error (peltiert element)"),
    ("11", "Cooling system error (Pump)"),
    ("12", "Static iris error"),
    ("13", "Power supply unit error (Disagreement of Ballast)"),
    ("14", "Exhaust shutter error"),
    ("15", "Obstacle detection error"),
    ("16", "IF board discernment error"),
    ("17", "Communication error of stack projection function"),
    ("18", "I2C error"),
    ("1A", "Lens shift error"),
    ("1B", "Quarts N Polarizer error"),
    ("1C", "No lens error"),
    ("1D", "Subsystem error 2"),
    ("1E", "Power supply voltage error"),
    ("1F", "Other error"),
];

pub const POWER_CONSUMPTION_MODES: Entries = &[("00", "High"), ("01", "ECO"), ("02", "Medium")];

pub const SOURCES: Entries = &[
    ("10", "PC"),
    ("20", "PC2"),
    ("30", "HDMI1"),
    ("40", "VIDEO"),
    ("52", "USB"),
    ("53", "LAN"),
    ("56", "WiFi Direct"),
    ("A0", "HDMI2"),
    ("D0", "WirelessHD"),
];

// ── CodeTable ────────────────────────────────────────────────────

/// Bidirectional lookup over a fixed list of `(code, name)` pairs.
#[derive(Debug, Clone)]
pub struct CodeTable {
    by_code: HashMap<&'static str, &'static str>,
    by_name: HashMap<&'static str, &'static str>,
}

impl CodeTable {
    pub fn new(entries: Entries) -> Self {
        Self {
            by_code: entries.iter().copied().collect(),
            by_name: entries.iter().map(|(code, name)| (*name, *code)).collect(),
        }
    }

    pub fn name(&self, code: &str) -> Option<&'static str> {
        self.by_code.get(code).copied()
    }

    pub fn code(&self, name: &str) -> Option<&'static str> {
        self.by_name.get(name).copied()
    }

    pub fn len(&self) -> usize {
        self.by_code.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_code.is_empty()
    }
}
