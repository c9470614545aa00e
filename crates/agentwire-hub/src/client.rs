//! Agent-side mTLS WebSocket client.
//!
//! Connects to a hub over `wss://`, presenting the agent's certificate, and
//! exchanges text frames or envelopes on the resulting channel.

use std::sync::Arc;

use futures_util::{SinkExt, StreamExt};
use rustls::pki_types::ServerName;
use rustls::ClientConfig;
use tokio::net::TcpStream;
use tokio_rustls::client::TlsStream;
use tokio_rustls::TlsConnector;
use tokio_tungstenite::tungstenite::http::Uri;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::WebSocketStream;
use tracing::debug;

use agentwire_core::error::{AgentWireError, Result};
use agentwire_core::protocol::envelope::Envelope;

fn transport_err(e: impl std::fmt::Display) -> AgentWireError {
    AgentWireError::Transport(e.to_string())
}

/// One agent connection to the hub.
pub struct AgentClient {
    ws: WebSocketStream<TlsStream<TcpStream>>,
}

impl AgentClient {
    /// Connect to `url` (`wss://host[:port]/path`, default port 443).
    pub async fn connect(url: &str, tls: Arc<ClientConfig>) -> Result<Self> {
        let uri: Uri = url
            .parse()
            .map_err(|e| AgentWireError::Config(format!("invalid hub url {url:?}: {e}")))?;
        if uri.scheme_str() != Some("wss") {
            return Err(AgentWireError::Config(format!("hub url must use wss://, got {url:?}")));
        }
        let host = uri
            .host()
            .ok_or_else(|| AgentWireError::Config(format!("hub url {url:?} has no host")))?
            .to_string();
        let port = uri.port_u16().unwrap_or(443);

        let tcp = TcpStream::connect((host.as_str(), port)).await.map_err(transport_err)?;
        let server_name = ServerName::try_from(host.clone())
            .map_err(|e| AgentWireError::Config(format!("invalid server name {host:?}: {e}")))?;
        let stream = TlsConnector::from(tls)
            .connect(server_name, tcp)
            .await
            .map_err(|e| AgentWireError::Tls(format!("handshake with {host}:{port} failed: {e}")))?;

        let (ws, resp) = tokio_tungstenite::client_async(url, stream)
            .await
            .map_err(transport_err)?;
        debug!(url, status = %resp.status(), "connected to hub");

        Ok(Self { ws })
    }

    pub async fn send_text(&mut self, text: impl Into<String>) -> Result<()> {
        self.ws.send(Message::Text(text.into())).await.map_err(transport_err)
    }

    pub async fn send_envelope(&mut self, env: &Envelope) -> Result<()> {
        self.send_text(env.to_json()?).await
    }

    /// Next text frame from the hub; `None` once the hub closed the channel.
    /// Control frames are handled by the socket and skipped here.
    pub async fn recv_text(&mut self) -> Result<Option<String>> {
        while let Some(msg) = self.ws.next().await {
            match msg.map_err(transport_err)? {
                Message::Text(s) => return Ok(Some(s)),
                Message::Close(_) => return Ok(None),
                _ => continue,
            }
        }
        Ok(None)
    }

    /// Next frame parsed as an envelope (strict mode).
    pub async fn recv_envelope(&mut self) -> Result<Option<Envelope>> {
        match self.recv_text().await? {
            Some(s) => Envelope::parse(s).map(Some),
            None => Ok(None),
        }
    }

    pub async fn close(mut self) -> Result<()> {
        self.ws.close(None).await.map_err(transport_err)
    }
}
