//! Client connection settings.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Well-known ESC/VP.net TCP port.
pub const DEFAULT_PORT: u16 = 3629;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    /// Projector host name or IP address.
    pub host: String,
    pub port: u16,
    /// Bound on TCP connect plus handshake.
    pub connect_timeout_ms: u64,
    /// Bound on ordinary command round trips.
    pub request_timeout_ms: u64,
    /// Bound on power commands and on waiting out a warm-up or cool-down.
    pub power_timeout_ms: u64,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".into(),
            port: DEFAULT_PORT,
            connect_timeout_ms: 60_000,
            request_timeout_ms: 10_000,
            power_timeout_ms: 60_000,
        }
    }
}

impl ClientConfig {
    pub fn new(host: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            ..Self::default()
        }
    }

    pub fn with_port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    /// `host:port`, suitable for `TcpStream::connect`.
    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }

    pub fn power_timeout(&self) -> Duration {
        Duration::from_millis(self.power_timeout_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let config = ClientConfig::new("10.0.0.5");
        assert_eq!(config.address(), "10.0.0.5:3629");
        assert_eq!(config.connect_timeout(), Duration::from_secs(60));
        assert_eq!(config.request_timeout(), Duration::from_secs(10));
        assert_eq!(config.power_timeout(), Duration::from_secs(60));
    }

    #[test]
    fn partial_toml_falls_back_to_defaults() {
        let config: ClientConfig = toml::from_str(
            r#"
            host = "projector.local"
            request_timeout_ms = 2500
            "#,
        )
        .unwrap();
        assert_eq!(config.host, "projector.local");
        assert_eq!(config.port, DEFAULT_PORT);
        assert_eq!(config.request_timeout(), Duration::from_millis(2500));
    }

    #[test]
    fn toml_roundtrip() {
        let config = ClientConfig::new("192.168.1.20").with_port(4000);
        let text = toml::to_string_pretty(&config).unwrap();
        let parsed: ClientConfig = toml::from_str(&text).unwrap();
        assert_eq!(parsed, config);
    }
}
