//! Domain-specific error types for the ESC/VP.net client.
//!
//! All fallible operations return `Result<T, EscvpError>`. The error is
//! `Clone` so a single outcome can be handed to every caller waiting on
//! the same completion handle.

use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;

/// Convenience alias used throughout the crate.
pub type Result<T, E = EscvpError> = std::result::Result<T, E>;

/// The canonical error type for the ESC/VP.net client.
#[derive(Debug, Clone, Error)]
pub enum EscvpError {
    // ── Connection Errors ────────────────────────────────────────
    /// Opening the socket or the handshake failed (timeout, refusal,
    /// malformed response or a non-OK status byte).
    #[error("connect failed: {0}")]
    ConnectFailed(String),

    /// The session was closed while the request was still queued.
    #[error("connection closed")]
    ConnectionClosed,

    /// The TCP/IO layer reported an error.
    #[error("connection error: {0}")]
    Io(Arc<std::io::Error>),

    // ── Request Errors ───────────────────────────────────────────
    /// No matching frame arrived within the timeout window.
    #[error("request \"{command}\" timed out after {after:?}")]
    RequestTimeout { command: String, after: Duration },

    /// The device answered the command with the error token.
    #[error("device returned an error for command \"{command}\"")]
    DeviceError { command: String },

    /// The caller stopped waiting before the command was answered.
    #[error("request cancelled")]
    Cancelled,

    /// A command could not be built from the supplied arguments.
    #[error("invalid command: {0}")]
    InvalidCommand(String),

    // ── Protocol Errors ──────────────────────────────────────────
    /// A decode step produced an unexpected shape. Always recovered
    /// locally; never terminates the read loop.
    #[error("parse anomaly: {0}")]
    ParseAnomaly(String),

    /// A numeric value did not map to any known enum variant.
    #[error("unknown {type_name} discriminant: {value:#x}")]
    UnknownVariant { type_name: &'static str, value: u64 },
}

impl EscvpError {
    /// Returns `true` for failures that only concern the session (the
    /// caller can retry and a fresh connection will be opened).
    pub fn is_connection_error(&self) -> bool {
        matches!(
            self,
            Self::ConnectFailed(_) | Self::ConnectionClosed | Self::Io(_)
        )
    }
}

// ── Convenient From implementations ──────────────────────────────

impl From<std::io::Error> for EscvpError {
    fn from(e: std::io::Error) -> Self {
        EscvpError::Io(Arc::new(e))
    }
}
