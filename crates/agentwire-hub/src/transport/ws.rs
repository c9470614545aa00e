//! WebSocket entry point.
//!
//! Responsibilities:
//! - Upgrade HTTP -> WS on `/`, `/ws` and `/ws/:agent_id`
//! - Pick up the connection metadata the TLS listener attached to the request
//! - Hand the socket to the channel manager (one task per channel)

use axum::{
    extract::{ws::WebSocket, ws::WebSocketUpgrade, State},
    http::Uri,
    response::Response,
    Extension,
};
use async_trait::async_trait;

use agentwire_core::error::{AgentWireError, Result};
use agentwire_core::protocol::frame::Frame;

use crate::app_state::HubState;
use crate::channel::ConnMeta;
use crate::server::ConnectionInfo;
use crate::transport::codec::{decode, encode};
use crate::transport::FrameTransport;

/// `FrameTransport` over an upgraded axum socket.
pub struct WsTransport {
    socket: WebSocket,
}

impl WsTransport {
    pub fn new(socket: WebSocket) -> Self {
        Self { socket }
    }
}

#[async_trait]
impl FrameTransport for WsTransport {
    async fn recv(&mut self) -> Option<Result<Frame>> {
        match self.socket.recv().await? {
            Ok(msg) => Some(Ok(decode(msg))),
            Err(e) => Some(Err(AgentWireError::Transport(e.to_string()))),
        }
    }

    async fn send(&mut self, frame: Frame) -> Result<()> {
        self.socket
            .send(encode(frame))
            .await
            .map_err(|e| AgentWireError::Transport(e.to_string()))
    }

    async fn close(&mut self) -> Result<()> {
        self.send(Frame::Close).await
    }

    // tungstenite queues the pong while reading the ping.
    fn replies_to_pings(&self) -> bool {
        true
    }
}

pub async fn ws_upgrade(
    State(hub): State<HubState>,
    Extension(conn): Extension<ConnectionInfo>,
    uri: Uri,
    ws: WebSocketUpgrade,
) -> Response {
    let path = uri.path().to_string();
    hub.metrics().ws_upgrades.inc(&[]);

    ws.on_upgrade(move |socket| async move {
        let meta = ConnMeta::new(conn.remote_addr, path, conn.tls);
        let accepted = hub.manager().accept(WsTransport::new(socket), meta);
        tracing::debug!(channel_id = %accepted.id, "websocket upgraded");
    })
}
