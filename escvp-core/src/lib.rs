//! # escvp-core
//!
//! Persistent control client for projectors speaking ESC/VP.net over TCP.
//!
//! This crate contains:
//! - **Handshake**: the 16-byte session header and its status codes
//! - **Codec**: `EscvpCodec` for `:`-delimited frames via `tokio_util`
//! - **Property**: typed values, code tables and the value codec
//! - **Event**: decoding of unsolicited `IMEVENT` status reports
//! - **State**: request queue, completion handles, power gate, session
//! - **Network**: `Projector`, the connection manager
//! - **Listener**: ordered property change notification
//! - **Error**: `EscvpError`, a `thiserror`-based error type

pub mod codec;
pub mod config;
pub mod error;
pub mod event;
pub mod handshake;
pub mod listener;
pub mod network;
pub mod property;
pub mod state;
pub mod task;

// ── Re-exports for ergonomic usage ───────────────────────────────

pub use codec::{EscvpCodec, Frame};
pub use config::{ClientConfig, DEFAULT_PORT};
pub use error::{EscvpError, Result};
pub use event::StatusEvent;
pub use handshake::{ConnectStatus, HandshakeHeader};
pub use listener::{FnListener, PropertyListener, PropertyUpdate};
pub use network::Projector;
pub use property::{PowerState, PropertyCodec, PropertyValue, RemoteKey};
pub use state::{Completion, ConnectionPhase};
pub use task::TaskPool;
