//! In-memory transport pair with fault injection.
//!
//! `memory_pair` returns the hub side (`MemoryTransport`, handed to the
//! channel manager) and the remote side (`MemoryPeer`, driven by tests or
//! in-process agents). Dropping or resetting the peer behaves like the
//! network going away.

use async_trait::async_trait;
use tokio::sync::mpsc;

use agentwire_core::error::{AgentWireError, Result};
use agentwire_core::protocol::frame::Frame;

use crate::transport::FrameTransport;

/// Hub side of an in-memory connection.
pub struct MemoryTransport {
    inbound: mpsc::Receiver<Result<Frame>>,
    outbound: mpsc::Sender<Frame>,
}

/// Remote side of an in-memory connection.
pub struct MemoryPeer {
    tx: PeerSender,
    rx: PeerReceiver,
}

/// Sending half of a `MemoryPeer`.
#[derive(Clone)]
pub struct PeerSender {
    tx: mpsc::Sender<Result<Frame>>,
}

/// Receiving half of a `MemoryPeer`.
pub struct PeerReceiver {
    rx: mpsc::Receiver<Frame>,
}

/// Build a connected pair. `capacity` bounds each direction.
pub fn memory_pair(capacity: usize) -> (MemoryTransport, MemoryPeer) {
    let (in_tx, in_rx) = mpsc::channel(capacity.max(1));
    let (out_tx, out_rx) = mpsc::channel(capacity.max(1));
    (
        MemoryTransport {
            inbound: in_rx,
            outbound: out_tx,
        },
        MemoryPeer {
            tx: PeerSender { tx: in_tx },
            rx: PeerReceiver { rx: out_rx },
        },
    )
}

#[async_trait]
impl FrameTransport for MemoryTransport {
    async fn recv(&mut self) -> Option<Result<Frame>> {
        self.inbound.recv().await
    }

    async fn send(&mut self, frame: Frame) -> Result<()> {
        self.outbound
            .send(frame)
            .await
            .map_err(|_| AgentWireError::Transport("connection reset by peer".into()))
    }

    async fn close(&mut self) -> Result<()> {
        self.send(Frame::Close).await
    }
}

impl PeerSender {
    pub async fn send(&self, frame: Frame) -> Result<()> {
        self.tx
            .send(Ok(frame))
            .await
            .map_err(|_| AgentWireError::TransportClosed("hub side dropped".into()))
    }

    pub async fn send_text(&self, text: impl Into<String>) -> Result<()> {
        self.send(Frame::Text(text.into())).await
    }

    /// Deliver a transport-level error to the hub side.
    pub async fn fail(&self, reason: impl Into<String>) -> Result<()> {
        self.tx
            .send(Err(AgentWireError::Transport(reason.into())))
            .await
            .map_err(|_| AgentWireError::TransportClosed("hub side dropped".into()))
    }
}

impl PeerReceiver {
    /// Next frame from the hub; `None` once the hub side is gone.
    pub async fn recv(&mut self) -> Option<Frame> {
        self.rx.recv().await
    }
}

impl MemoryPeer {
    pub async fn send(&self, frame: Frame) -> Result<()> {
        self.tx.send(frame).await
    }

    pub async fn send_text(&self, text: impl Into<String>) -> Result<()> {
        self.tx.send_text(text).await
    }

    pub async fn recv(&mut self) -> Option<Frame> {
        self.rx.recv().await
    }

    /// Peer sends a graceful close frame.
    pub async fn close(&self) -> Result<()> {
        self.tx.send(Frame::Close).await
    }

    /// Simulate a network reset: frames already queued toward the hub are
    /// still delivered, followed by an I/O error; anything the hub sends
    /// from now on fails.
    pub fn reset(self) {
        let _ = self
            .tx
            .tx
            .try_send(Err(AgentWireError::Transport("connection reset".into())));
        drop(self.rx);
    }

    pub fn into_split(self) -> (PeerSender, PeerReceiver) {
        (self.tx, self.rx)
    }
}
