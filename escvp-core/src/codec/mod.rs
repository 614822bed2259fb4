//! Line codec for the ESC/VP.net command channel.
//!
//! Outgoing commands are ASCII text terminated by `\r`. Incoming frames
//! are terminated by a `:` byte, optionally preceded by `\r`. A frame
//! body has one of three shapes:
//!
//! ```text
//! ""            acknowledgement
//! "ERR"         the command was rejected
//! "KEY=VALUE"   a property value, or an unsolicited IMEVENT
//! ```

use bytes::BytesMut;
use tokio_util::codec::{Decoder, Encoder};
use tracing::warn;

use crate::error::EscvpError;

/// Byte that terminates every inbound frame.
pub const FRAME_DELIMITER: u8 = b':';

/// Byte appended to every outbound command.
pub const COMMAND_TERMINATOR: u8 = b'\r';

/// Body of a frame that rejects the current command.
pub const ERROR_TOKEN: &str = "ERR";

/// Reserved key of unsolicited status events.
pub const EVENT_KEY: &str = "IMEVENT";

/// Undelimited input beyond this many bytes is dropped.
pub const MAX_FRAME_SIZE: usize = 4096;

// ── Frame ────────────────────────────────────────────────────────

/// A decoded inbound frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Frame {
    /// Empty body: the command at the head of the queue was accepted.
    Ack,
    /// The error token: the command at the head of the queue failed.
    Error,
    /// `KEY=VALUE` answer to a query (or an unsolicited property push).
    Property { key: String, value: String },
    /// Value of an `IMEVENT=...` frame.
    Event(String),
    /// Anything else. Logged and discarded by the read loop.
    Unhandled(String),
}

impl Frame {
    /// Classify a frame body produced by [`decode_frame`].
    pub fn parse(body: &str) -> Self {
        if body.is_empty() {
            return Frame::Ack;
        }
        if body == ERROR_TOKEN {
            return Frame::Error;
        }
        match body.split_once('=') {
            Some((key, value)) if key == EVENT_KEY => Frame::Event(value.to_string()),
            Some((key, value)) => Frame::Property {
                key: key.to_string(),
                value: value.to_string(),
            },
            None => Frame::Unhandled(body.to_string()),
        }
    }
}

/// Encode a command for the wire: the text followed by a single `\r`.
pub fn encode(command: &str) -> Vec<u8> {
    let mut bytes = Vec::with_capacity(command.len() + 1);
    bytes.extend_from_slice(command.as_bytes());
    bytes.push(COMMAND_TERMINATOR);
    bytes
}

/// Strip the trailing `:` and at most one `\r` before it.
pub fn decode_frame(bytes: &[u8]) -> String {
    let body = bytes.strip_suffix(&[FRAME_DELIMITER]).unwrap_or(bytes);
    let body = body.strip_suffix(&[COMMAND_TERMINATOR]).unwrap_or(body);
    String::from_utf8_lossy(body).into_owned()
}

// ── EscvpCodec ───────────────────────────────────────────────────

/// `tokio_util` codec used with `FramedRead` / `FramedWrite`.
#[derive(Debug, Clone, Copy, Default)]
pub struct EscvpCodec;

impl Decoder for EscvpCodec {
    type Item = Frame;
    type Error = EscvpError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        match src.iter().position(|b| *b == FRAME_DELIMITER) {
            Some(end) => {
                let raw = src.split_to(end + 1);
                Ok(Some(Frame::parse(&decode_frame(&raw))))
            }
            None => {
                if src.len() > MAX_FRAME_SIZE {
                    warn!(len = src.len(), "dropping undelimited input");
                    src.clear();
                }
                Ok(None)
            }
        }
    }
}

impl Encoder<String> for EscvpCodec {
    type Error = EscvpError;

    fn encode(&mut self, item: String, dst: &mut BytesMut) -> Result<(), Self::Error> {
        dst.extend_from_slice(&encode(&item));
        Ok(())
    }
}

// ── Tests ────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn encode_appends_carriage_return() {
        assert_eq!(encode("PWR?"), b"PWR?\r");
        assert_eq!(encode("KEY D1"), b"KEY D1\r");
    }

    #[test]
    fn decode_frame_strips_delimiters() {
        assert_eq!(decode_frame(b":"), "");
        assert_eq!(decode_frame(b"\r:"), "");
        assert_eq!(decode_frame(b"ERR\r:"), "ERR");
        assert_eq!(decode_frame(b"PWR=01\r:"), "PWR=01");
        assert_eq!(decode_frame(b"PWR=01:"), "PWR=01");
    }

    #[test]
    fn parse_frame_shapes() {
        assert_eq!(Frame::parse(""), Frame::Ack);
        assert_eq!(Frame::parse("ERR"), Frame::Error);
        assert_eq!(
            Frame::parse("ERR=04"),
            Frame::Property {
                key: "ERR".into(),
                value: "04".into()
            }
        );
        assert_eq!(
            Frame::parse("IMEVENT=0001 03 00000000"),
            Frame::Event("0001 03 00000000".into())
        );
        assert_eq!(Frame::parse("garbage"), Frame::Unhandled("garbage".into()));
    }

    #[test]
    fn value_keeps_later_equals_signs() {
        assert_eq!(
            Frame::parse("SNO=A=B"),
            Frame::Property {
                key: "SNO".into(),
                value: "A=B".into()
            }
        );
    }

    #[test]
    fn decoder_splits_multiple_frames() {
        let mut codec = EscvpCodec;
        let mut buf = BytesMut::from(&b":PWR=01\r:VOL"[..]);

        assert_eq!(codec.decode(&mut buf).unwrap(), Some(Frame::Ack));
        assert_eq!(
            codec.decode(&mut buf).unwrap(),
            Some(Frame::Property {
                key: "PWR".into(),
                value: "01".into()
            })
        );
        assert_eq!(codec.decode(&mut buf).unwrap(), None);
        assert_eq!(&buf[..], b"VOL");

        buf.extend_from_slice(b"=10\r:");
        assert_eq!(
            codec.decode(&mut buf).unwrap(),
            Some(Frame::Property {
                key: "VOL".into(),
                value: "10".into()
            })
        );
        assert!(buf.is_empty());
    }

    #[test]
    fn decoding_same_bytes_is_stable() {
        let mut codec = EscvpCodec;
        let mut first = BytesMut::from(&b"SOURCE=30\r:"[..]);
        let mut second = first.clone();
        assert_eq!(
            codec.decode(&mut first).unwrap(),
            codec.decode(&mut second).unwrap()
        );
    }

    #[test]
    fn decoder_drops_oversized_garbage() {
        let mut codec = EscvpCodec;
        let mut buf = BytesMut::from(&vec![b'x'; MAX_FRAME_SIZE + 1][..]);
        assert_eq!(codec.decode(&mut buf).unwrap(), None);
        assert!(buf.is_empty());
    }

    #[test]
    fn encoder_writes_terminated_line() {
        let mut codec = EscvpCodec;
        let mut buf = BytesMut::new();
        codec.encode("VOL 0".to_string(), &mut buf).unwrap();
        assert_eq!(&buf[..], b"VOL 0\r");
    }

    #[tokio::test]
    async fn framed_read_across_chunks() {
        use futures::StreamExt;
        use tokio_util::codec::FramedRead;

        let io = tokio_test::io::Builder::new()
            .read(b":PW")
            .read(b"R=01\r:ERR\r")
            .read(b":")
            .build();
        let mut frames = FramedRead::new(io, EscvpCodec);

        assert_eq!(frames.next().await.unwrap().unwrap(), Frame::Ack);
        assert_eq!(
            frames.next().await.unwrap().unwrap(),
            Frame::Property {
                key: "PWR".into(),
                value: "01".into()
            }
        );
        assert_eq!(frames.next().await.unwrap().unwrap(), Frame::Error);
        assert!(frames.next().await.is_none());
    }

    #[tokio::test]
    async fn framed_write_terminates_commands() {
        use futures::SinkExt;
        use tokio_util::codec::FramedWrite;

        let io = tokio_test::io::Builder::new()
            .write(b"PWR?\r")
            .write(b"KEY D1\r")
            .build();
        let mut sink = FramedWrite::new(io, EscvpCodec);
        sink.send("PWR?".to_string()).await.unwrap();
        sink.send("KEY D1".to_string()).await.unwrap();
    }
}
