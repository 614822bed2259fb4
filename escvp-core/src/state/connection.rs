//! Connection lifecycle state machine.
//!
//! Transitions are validated and return `Result` instead of panicking.

use crate::error::EscvpError;

// ── ConnectionPhase ──────────────────────────────────────────────

/// The current phase of the projector session.
///
/// ```text
///  Disconnected ──► Connecting ──► Handshaking ──► Open
///       ▲                │               │           │
///       └────────────────┴───────────────┴───────────┘
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum ConnectionPhase {
    /// No socket. Initial / terminal state.
    #[default]
    Disconnected,

    /// TCP connection initiated but not yet established.
    Connecting,

    /// Socket is up; ESC/VP.net handshake in progress.
    Handshaking,

    /// Handshake accepted; commands may be written.
    Open,
}

impl std::fmt::Display for ConnectionPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Disconnected => write!(f, "Disconnected"),
            Self::Connecting => write!(f, "Connecting"),
            Self::Handshaking => write!(f, "Handshaking"),
            Self::Open => write!(f, "Open"),
        }
    }
}

impl ConnectionPhase {
    pub fn is_open(&self) -> bool {
        matches!(self, Self::Open)
    }

    pub fn is_disconnected(&self) -> bool {
        matches!(self, Self::Disconnected)
    }

    // ── Transitions ──────────────────────────────────────────────

    /// Valid from: `Disconnected`.
    pub fn begin_connect(&mut self) -> Result<(), EscvpError> {
        match self {
            Self::Disconnected => {
                *self = Self::Connecting;
                Ok(())
            }
            _ => Err(EscvpError::ConnectFailed(format!(
                "cannot connect while {self}"
            ))),
        }
    }

    /// Valid from: `Connecting`.
    pub fn begin_handshake(&mut self) -> Result<(), EscvpError> {
        match self {
            Self::Connecting => {
                *self = Self::Handshaking;
                Ok(())
            }
            _ => Err(EscvpError::ConnectFailed(format!(
                "cannot handshake while {self}"
            ))),
        }
    }

    /// Valid from: `Handshaking`.
    pub fn complete_handshake(&mut self) -> Result<(), EscvpError> {
        match self {
            Self::Handshaking => {
                *self = Self::Open;
                Ok(())
            }
            _ => Err(EscvpError::ConnectFailed(format!(
                "cannot complete handshake while {self}"
            ))),
        }
    }

    /// Back to `Disconnected` from any phase. Returns `true` if the
    /// session was open.
    pub fn disconnect(&mut self) -> bool {
        let was_open = self.is_open();
        *self = Self::Disconnected;
        was_open
    }
}

// ── Tests ────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn happy_path_lifecycle() {
        let mut phase = ConnectionPhase::Disconnected;

        phase.begin_connect().unwrap();
        assert_eq!(phase, ConnectionPhase::Connecting);

        phase.begin_handshake().unwrap();
        assert_eq!(phase, ConnectionPhase::Handshaking);

        phase.complete_handshake().unwrap();
        assert!(phase.is_open());

        assert!(phase.disconnect());
        assert!(phase.is_disconnected());
    }

    #[test]
    fn invalid_transition_connect_when_open() {
        let mut phase = ConnectionPhase::Open;
        assert!(phase.begin_connect().is_err());
    }

    #[test]
    fn invalid_transition_handshake_from_disconnected() {
        let mut phase = ConnectionPhase::Disconnected;
        assert!(phase.begin_handshake().is_err());
    }

    #[test]
    fn invalid_transition_complete_handshake_from_connecting() {
        let mut phase = ConnectionPhase::Connecting;
        assert!(phase.complete_handshake().is_err());
    }

    #[test]
    fn disconnect_from_handshaking_was_not_open() {
        let mut phase = ConnectionPhase::Handshaking;
        assert!(!phase.disconnect());
        assert!(phase.is_disconnected());
    }

    #[test]
    fn display_format() {
        assert_eq!(ConnectionPhase::Disconnected.to_string(), "Disconnected");
        assert_eq!(ConnectionPhase::Connecting.to_string(), "Connecting");
        assert_eq!(ConnectionPhase::Handshaking.to_string(), "Handshaking");
        assert_eq!(ConnectionPhase::Open.to_string(), "Open");
    }

    #[test]
    fn default_phase_is_disconnected() {
        assert!(ConnectionPhase::default().is_disconnected());
    }
}
