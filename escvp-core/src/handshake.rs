//! ESC/VP.net session handshake.
//!
//! Both the request and the response share one 16-byte layout:
//!
//! ```text
//! protocol:      [u8; 10]  "ESC/VP.net"
//! version:       u8        0x10
//! type:          u8        0x03 (CONNECT)
//! sequence:      u16       0x0000
//! status:        u8        0x00 in requests, result code in responses
//! header_count:  u8        0x00
//! ```

use std::fmt;

use crate::error::EscvpError;

/// Magic token at the start of every handshake frame.
pub const PROTOCOL_NAME: &[u8; 10] = b"ESC/VP.net";

/// Size of a handshake frame on the wire.
pub const HANDSHAKE_LEN: usize = 16;

/// Protocol version sent in the connect request.
pub const PROTOCOL_VERSION: u8 = 0x10;

/// Message type of a connect request.
pub const TYPE_CONNECT: u8 = 0x03;

/// Offset of the status byte in the response.
pub const STATUS_OFFSET: usize = 14;

pub type HandshakeBytes = [u8; HANDSHAKE_LEN];

/// The fixed frame written right after the TCP connection opens.
pub fn connect_request() -> HandshakeBytes {
    HandshakeHeader {
        version: PROTOCOL_VERSION,
        kind: TYPE_CONNECT,
        sequence: 0,
        status: 0,
        header_count: 0,
    }
    .to_bytes()
}

// ── ConnectStatus ────────────────────────────────────────────────

/// Result code carried in the handshake response.
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ConnectStatus {
    Ok = 0x20,
    BadRequest = 0x40,
    Unauthorized = 0x41,
    Forbidden = 0x43,
    ServiceUnavailable = 0x45,
    ProtocolVersionNotSupported = 0x55,
}

impl TryFrom<u8> for ConnectStatus {
    type Error = EscvpError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0x20 => Ok(ConnectStatus::Ok),
            0x40 => Ok(ConnectStatus::BadRequest),
            0x41 => Ok(ConnectStatus::Unauthorized),
            0x43 => Ok(ConnectStatus::Forbidden),
            0x45 => Ok(ConnectStatus::ServiceUnavailable),
            0x55 => Ok(ConnectStatus::ProtocolVersionNotSupported),
            _ => Err(EscvpError::UnknownVariant {
                type_name: "ConnectStatus",
                value: value as u64,
            }),
        }
    }
}

impl fmt::Display for ConnectStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConnectStatus::Ok => write!(f, "OK"),
            ConnectStatus::BadRequest => write!(f, "Bad Request"),
            ConnectStatus::Unauthorized => write!(f, "Unauthorized"),
            ConnectStatus::Forbidden => write!(f, "Forbidden"),
            ConnectStatus::ServiceUnavailable => write!(f, "Service Unavailable"),
            ConnectStatus::ProtocolVersionNotSupported => {
                write!(f, "Protocol Version Not Supported")
            }
        }
    }
}

// ── HandshakeHeader ──────────────────────────────────────────────

/// Fields of a handshake frame following the protocol name.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HandshakeHeader {
    pub version: u8,
    pub kind: u8,
    pub sequence: u16,
    pub status: u8,
    pub header_count: u8,
}

impl HandshakeHeader {
    pub fn to_bytes(&self) -> HandshakeBytes {
        let mut frame: HandshakeBytes = [0; HANDSHAKE_LEN];
        frame[0..10].copy_from_slice(PROTOCOL_NAME);
        frame[10] = self.version;
        frame[11] = self.kind;
        frame[12..14].copy_from_slice(&self.sequence.to_be_bytes());
        frame[STATUS_OFFSET] = self.status;
        frame[15] = self.header_count;
        frame
    }

    /// Parse a handshake response. Fails on a short frame or a
    /// mismatched protocol name.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, EscvpError> {
        if bytes.len() < HANDSHAKE_LEN {
            return Err(EscvpError::ConnectFailed(format!(
                "handshake response too short: {} < {}",
                bytes.len(),
                HANDSHAKE_LEN
            )));
        }
        if &bytes[0..10] != PROTOCOL_NAME {
            return Err(EscvpError::ConnectFailed(
                "unsupported handshake response format".into(),
            ));
        }
        Ok(Self {
            version: bytes[10],
            kind: bytes[11],
            sequence: u16::from_be_bytes([bytes[12], bytes[13]]),
            status: bytes[STATUS_OFFSET],
            header_count: bytes[15],
        })
    }

    /// Succeeds only for the OK status code.
    pub fn ensure_ok(&self) -> Result<(), EscvpError> {
        match ConnectStatus::try_from(self.status) {
            Ok(ConnectStatus::Ok) => Ok(()),
            Ok(status) => Err(EscvpError::ConnectFailed(format!(
                "handshake returned error status={status}"
            ))),
            Err(_) => Err(EscvpError::ConnectFailed(format!(
                "handshake returned unknown status={:#04x}",
                self.status
            ))),
        }
    }
}

/// Validate a raw handshake response.
pub fn validate_response(bytes: &[u8]) -> Result<HandshakeHeader, EscvpError> {
    let header = HandshakeHeader::from_bytes(bytes)?;
    header.ensure_ok()?;
    Ok(header)
}
