//! Printing listener used by `escvp monitor`.

use std::io::Write;
use std::sync::Mutex;

use async_trait::async_trait;
use escvp_core::{PropertyListener, PropertyValue};

/// Writes one `PROPERTY=value` line per update.
pub struct LinePrinter<W> {
    out: Mutex<W>,
}

impl<W> LinePrinter<W> {
    pub fn new(out: W) -> Self {
        Self {
            out: Mutex::new(out),
        }
    }

    pub fn into_inner(self) -> W {
        self.out.into_inner().unwrap_or_else(|e| e.into_inner())
    }
}

pub fn format_update(property: &str, value: &PropertyValue) -> String {
    format!("{property}={value}")
}

#[async_trait]
impl<W: Write + Send + 'static> PropertyListener for LinePrinter<W> {
    async fn notify(&self, property: &str, value: &PropertyValue) {
        let line = format_update(property, value);
        let mut out = self.out.lock().unwrap_or_else(|e| e.into_inner());
        if let Err(e) = writeln!(out, "{line}").and_then(|_| out.flush()) {
            tracing::warn!(error = %e, "could not print update");
        }
    }
}

/// Interpret a command-line value: integers stay numeric, anything
/// else is sent as text (table names are mapped to codes on encode).
pub fn parse_value(raw: &str) -> PropertyValue {
    match raw.parse::<i64>() {
        Ok(n) => PropertyValue::Integer(n),
        Err(_) => PropertyValue::Text(raw.to_string()),
    }
}
