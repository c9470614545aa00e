//! Transport layer.
//!
//! A channel talks to its peer through `FrameTransport`, so the state machine
//! is the same whether frames come from an axum WebSocket or from the
//! in-memory pair used by tests.

pub mod codec;
pub mod memory;
pub mod ws;

use async_trait::async_trait;

use agentwire_core::error::Result;
use agentwire_core::protocol::frame::Frame;

/// Framed, already-authenticated duplex session.
#[async_trait]
pub trait FrameTransport: Send {
    /// Wait for the next inbound frame. `None` once the peer is gone.
    ///
    /// Must be cancel-safe: the channel drops this future when a shutdown
    /// or keepalive tick wins the race.
    async fn recv(&mut self) -> Option<Result<Frame>>;

    /// Send one frame and wait for it to be flushed.
    async fn send(&mut self, frame: Frame) -> Result<()>;

    /// Best-effort graceful close.
    async fn close(&mut self) -> Result<()>;

    /// Whether the transport answers inbound pings itself. When it does, the
    /// channel must not send a second pong.
    fn replies_to_pings(&self) -> bool {
        false
    }
}
