//! Transport-agnostic frames.
//!
//! Transports (WebSocket, in-memory) convert to and from `Frame` so the
//! channel state machine never sees a concrete socket type.

use bytes::{BufMut, Bytes, BytesMut};

/// Label prepended to echoed frames.
pub const ECHO_PREFIX: &str = "Echo: ";

/// One application-level frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Frame {
    Text(String),
    Binary(Bytes),
    Ping(Bytes),
    Pong(Bytes),
    /// Graceful close requested.
    Close,
}

impl Frame {
    /// Payload length in bytes (0 for `Close`).
    pub fn len(&self) -> usize {
        match self {
            Frame::Text(s) => s.len(),
            Frame::Binary(b) | Frame::Ping(b) | Frame::Pong(b) => b.len(),
            Frame::Close => 0,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Short label for logs and metric labels.
    pub fn kind(&self) -> &'static str {
        match self {
            Frame::Text(_) => "text",
            Frame::Binary(_) => "binary",
            Frame::Ping(_) => "ping",
            Frame::Pong(_) => "pong",
            Frame::Close => "close",
        }
    }

    /// Echo of a data frame: same frame kind, payload prefixed with
    /// `ECHO_PREFIX`. Control frames have no echo.
    pub fn echo(&self) -> Option<Frame> {
        match self {
            Frame::Text(s) => Some(Frame::Text(format!("{ECHO_PREFIX}{s}"))),
            Frame::Binary(b) => {
                let mut out = BytesMut::with_capacity(ECHO_PREFIX.len() + b.len());
                out.put_slice(ECHO_PREFIX.as_bytes());
                out.put_slice(b);
                Some(Frame::Binary(out.freeze()))
            }
            _ => None,
        }
    }
}
