//! Channel state machine: one live mTLS duplex connection.
//!
//! Lifecycle:
//! - HANDSHAKING: entered on accept (TLS is already done); identity is
//!   resolved and the channel moves on even when the peer is unknown
//! - OPEN: receive loop; echo (and ACK in envelope mode) per inbound frame
//! - CLOSING: peer close, I/O error, idle timeout or shutdown; best-effort
//!   close bounded by `close_grace`
//! - CLOSED: removed from the registry, never reused
//!
//! Per-message envelope errors are logged and dropped. Only transport errors
//! end a channel, and they end only that channel.

mod state;

pub use state::ChannelState;

use std::fmt;
use std::net::SocketAddr;
use std::sync::Arc;

use bytes::Bytes;
use serde::Deserialize;
use tokio::sync::Notify;
use tokio::time::{self, Duration, Instant, Interval, MissedTickBehavior};
use tracing::{debug, error, info, info_span, warn, Instrument};

use agentwire_core::error::{AgentWireError, Result};
use agentwire_core::protocol::envelope::{Envelope, ParseMode};
use agentwire_core::protocol::frame::Frame;

use crate::identity::{self, PeerIdentity, TlsPeer};
use crate::manager::{ChannelId, ChannelInfo, ChannelRegistry};
use crate::obs::metrics::HubMetrics;
use crate::transport::FrameTransport;

/// What a channel does with inbound data frames.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChannelMode {
    /// Echo every text/binary frame verbatim with an `Echo: ` label.
    #[default]
    Echo,
    /// Parse frames as envelopes; ACK when asked, then echo. Invalid
    /// envelopes are dropped.
    Envelope,
}

/// Per-channel behaviour knobs.
#[derive(Debug, Clone)]
pub struct ChannelConfig {
    pub mode: ChannelMode,
    pub parse_mode: ParseMode,
    /// Keepalive ping period; `None` disables pings.
    pub ping_interval: Option<Duration>,
    /// Close after this long without an inbound frame; `None` waits forever.
    pub idle_timeout: Option<Duration>,
    /// Upper bound on the close handshake while CLOSING.
    pub close_grace: Duration,
}

impl Default for ChannelConfig {
    fn default() -> Self {
        Self {
            mode: ChannelMode::Echo,
            parse_mode: ParseMode::Strict,
            ping_interval: None,
            idle_timeout: None,
            close_grace: Duration::from_millis(1000),
        }
    }
}

/// Immutable metadata of an accepted connection.
#[derive(Debug, Clone)]
pub struct ConnMeta {
    pub remote_addr: SocketAddr,
    /// Requested endpoint path (routing hint, e.g. `/ws/<agent_id>`).
    pub path: String,
    pub tls: TlsPeer,
}

impl ConnMeta {
    pub fn new(remote_addr: SocketAddr, path: impl Into<String>, tls: TlsPeer) -> Self {
        Self {
            remote_addr,
            path: path.into(),
            tls,
        }
    }

    /// Agent id from a `/ws/<agent_id>` path.
    pub fn agent_id(&self) -> Option<&str> {
        self.path
            .strip_prefix("/ws/")
            .filter(|id| !id.is_empty() && !id.contains('/'))
    }
}

/// Why a channel left OPEN.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CloseReason {
    /// Close frame or end of stream from the peer.
    PeerClosed,
    /// Unexpected I/O fault (receive or send).
    TransportError(String),
    /// Explicit shutdown from the manager.
    Shutdown,
    /// No inbound frame within the idle timeout.
    IdleTimeout,
}

impl CloseReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            CloseReason::PeerClosed => "peer_closed",
            CloseReason::TransportError(_) => "transport_error",
            CloseReason::Shutdown => "shutdown",
            CloseReason::IdleTimeout => "idle_timeout",
        }
    }

    fn from_error(e: AgentWireError) -> Self {
        match e {
            AgentWireError::TransportClosed(_) => CloseReason::PeerClosed,
            other => CloseReason::TransportError(other.to_string()),
        }
    }
}

impl fmt::Display for CloseReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CloseReason::TransportError(msg) => write!(f, "transport_error: {msg}"),
            other => f.write_str(other.as_str()),
        }
    }
}

/// Final report of a channel run.
#[derive(Debug, Clone)]
pub struct ChannelSummary {
    pub id: ChannelId,
    pub peer: PeerIdentity,
    pub reason: CloseReason,
    pub frames_in: u64,
    pub frames_out: u64,
    pub envelope_errors: u64,
}

/// One channel, exclusively owned by its task.
pub struct Channel<T> {
    id: ChannelId,
    meta: ConnMeta,
    state: ChannelState,
    peer: PeerIdentity,
    transport: T,
    cfg: Arc<ChannelConfig>,
    registry: Arc<ChannelRegistry>,
    metrics: Arc<HubMetrics>,
    shutdown: Arc<Notify>,
    frames_in: u64,
    frames_out: u64,
    envelope_errors: u64,
}

impl<T: FrameTransport> Channel<T> {
    pub(crate) fn new(
        id: ChannelId,
        meta: ConnMeta,
        transport: T,
        cfg: Arc<ChannelConfig>,
        registry: Arc<ChannelRegistry>,
        metrics: Arc<HubMetrics>,
    ) -> Self {
        Self {
            id,
            meta,
            state: ChannelState::Handshaking,
            peer: PeerIdentity::Unknown,
            transport,
            cfg,
            registry,
            metrics,
            shutdown: Arc::new(Notify::new()),
            frames_in: 0,
            frames_out: 0,
            envelope_errors: 0,
        }
    }

    /// Drive the channel from HANDSHAKING to CLOSED.
    pub async fn run(self) -> ChannelSummary {
        let span = info_span!(
            "channel",
            channel_id = %self.id,
            remote = %self.meta.remote_addr,
            path = %self.meta.path,
        );
        self.run_inner().instrument(span).await
    }

    async fn run_inner(mut self) -> ChannelSummary {
        self.peer = identity::resolve(&self.meta.tls);
        if !self.peer.is_known() {
            self.metrics.identity_unresolved.inc(&[]);
        }
        self.transition(ChannelState::Open);
        info!(peer = %self.peer, agent = self.meta.agent_id().unwrap_or("-"), "channel open");

        let reason = self.receive_loop().await;

        self.transition(ChannelState::Closing);
        match &reason {
            CloseReason::TransportError(msg) => {
                error!(peer = %self.peer, error = %msg, "channel transport error")
            }
            other => info!(peer = %self.peer, reason = other.as_str(), "channel closing"),
        }

        // Drain: the only pending send left is our close frame.
        match time::timeout(self.cfg.close_grace, self.transport.close()).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => debug!(error = %e, "close frame not delivered"),
            Err(_) => debug!("close grace period elapsed"),
        }

        self.transition(ChannelState::Closed);
        self.metrics.channels_closed.inc(&[("reason", reason.as_str())]);
        info!(
            peer = %self.peer,
            frames_in = self.frames_in,
            frames_out = self.frames_out,
            "channel closed"
        );

        ChannelSummary {
            id: self.id,
            peer: self.peer,
            reason,
            frames_in: self.frames_in,
            frames_out: self.frames_out,
            envelope_errors: self.envelope_errors,
        }
    }

    fn transition(&mut self, next: ChannelState) {
        if !self.state.can_transition_to(next) {
            warn!(from = %self.state, to = %next, "ignoring illegal channel transition");
            return;
        }
        self.state = next;

        match next {
            ChannelState::Open => {
                let info = ChannelInfo::new(
                    self.id,
                    self.meta.remote_addr,
                    self.peer.clone(),
                    self.meta.path.clone(),
                );
                self.registry.insert(info, Arc::clone(&self.shutdown));
                self.metrics.channels_active.inc(&[]);
                // Shutdown may have started while we were handshaking.
                if self.registry.is_draining() {
                    self.shutdown.notify_one();
                }
            }
            ChannelState::Closing => self.registry.set_state(self.id, next),
            ChannelState::Closed => {
                self.registry.remove(self.id);
                self.metrics.channels_active.dec(&[]);
            }
            ChannelState::Handshaking => {}
        }
    }

    async fn receive_loop(&mut self) -> CloseReason {
        let shutdown = Arc::clone(&self.shutdown);
        let mut ping = self.cfg.ping_interval.map(|every| {
            let mut t = time::interval_at(Instant::now() + every, every);
            t.set_missed_tick_behavior(MissedTickBehavior::Delay);
            t
        });
        let mut last_activity = Instant::now();

        loop {
            let idle_deadline = self.cfg.idle_timeout.map(|d| last_activity + d);

            tokio::select! {
                _ = shutdown.notified() => return CloseReason::Shutdown,

                _ = idle_expired(idle_deadline) => return CloseReason::IdleTimeout,

                _ = next_tick(&mut ping) => {
                    tokio::select! {
                        _ = shutdown.notified() => return CloseReason::Shutdown,
                        sent = self.send(Frame::Ping(Bytes::new())) => {
                            if let Err(e) = sent {
                                return CloseReason::from_error(e);
                            }
                        }
                    }
                }

                incoming = self.transport.recv() => {
                    let frame = match incoming {
                        None => return CloseReason::PeerClosed,
                        Some(Err(e)) => return CloseReason::from_error(e),
                        Some(Ok(frame)) => frame,
                    };
                    last_activity = Instant::now();
                    // A peer that stops reading must not pin the channel in OPEN.
                    tokio::select! {
                        _ = shutdown.notified() => return CloseReason::Shutdown,
                        handled = self.on_frame(frame) => {
                            if let Err(reason) = handled {
                                return reason;
                            }
                        }
                    }
                }
            }
        }
    }

    async fn on_frame(&mut self, frame: Frame) -> std::result::Result<(), CloseReason> {
        self.frames_in += 1;
        self.metrics.frames_in.inc(&[("kind", frame.kind())]);

        let sent = match frame {
            Frame::Close => return Err(CloseReason::PeerClosed),
            Frame::Ping(_) if self.transport.replies_to_pings() => Ok(()),
            Frame::Ping(payload) => self.send(Frame::Pong(payload)).await,
            Frame::Pong(_) => Ok(()),
            Frame::Text(_) | Frame::Binary(_) => match self.cfg.mode {
                ChannelMode::Echo => self.echo(&frame).await,
                ChannelMode::Envelope => self.handle_envelope(&frame).await,
            },
        };

        sent.map_err(CloseReason::from_error)
    }

    async fn echo(&mut self, frame: &Frame) -> Result<()> {
        match frame.echo() {
            Some(echo) => self.send(echo).await,
            None => Ok(()),
        }
    }

    async fn handle_envelope(&mut self, frame: &Frame) -> Result<()> {
        let raw: &[u8] = match frame {
            Frame::Text(s) => s.as_bytes(),
            Frame::Binary(b) => b.as_ref(),
            _ => return Ok(()),
        };

        let env = match Envelope::parse_with(raw, self.cfg.parse_mode) {
            Ok(env) => env,
            Err(e) => {
                self.envelope_errors += 1;
                self.metrics.envelope_errors.inc(&[("code", e.code().as_str())]);
                warn!(code = e.code().as_str(), error = %e, "dropping invalid envelope");
                return Ok(());
            }
        };

        debug!(
            message_id = env.message_id(),
            msg_type = env.msg_type(),
            origin = env.origin(),
            requires_ack = env.requires_ack(),
            "envelope received"
        );

        // ACK goes out before the echo.
        if env.requires_ack() {
            match env.ack().to_json() {
                Ok(ack) => {
                    self.send(Frame::Text(ack)).await?;
                    self.metrics.acks_sent.inc(&[]);
                }
                Err(e) => error!(error = %e, message_id = env.message_id(), "ack encode failed"),
            }
        }

        self.echo(frame).await
    }

    /// Single send; a failure is final for this channel (no retry).
    async fn send(&mut self, frame: Frame) -> Result<()> {
        let kind = frame.kind();
        self.transport.send(frame).await?;
        self.frames_out += 1;
        self.metrics.frames_out.inc(&[("kind", kind)]);
        Ok(())
    }
}

async fn idle_expired(deadline: Option<Instant>) {
    match deadline {
        Some(at) => time::sleep_until(at).await,
        None => std::future::pending().await,
    }
}

async fn next_tick(ping: &mut Option<Interval>) {
    match ping {
        Some(t) => {
            t.tick().await;
        }
        None => std::future::pending().await,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::manager::ChannelManager;
    use crate::transport::memory::{memory_pair, MemoryTransport};
    use async_trait::async_trait;

    /// Memory transport that claims to answer pings on its own, like a
    /// WebSocket stack does.
    struct SelfPonging(MemoryTransport);

    #[async_trait]
    impl FrameTransport for SelfPonging {
        async fn recv(&mut self) -> Option<Result<Frame>> {
            self.0.recv().await
        }

        async fn send(&mut self, frame: Frame) -> Result<()> {
            self.0.send(frame).await
        }

        async fn close(&mut self) -> Result<()> {
            self.0.close().await
        }

        fn replies_to_pings(&self) -> bool {
            true
        }
    }

    fn meta(path: &str) -> ConnMeta {
        ConnMeta::new("127.0.0.1:4000".parse().unwrap(), path, TlsPeer::none())
    }

    #[test]
    fn agent_id_from_path() {
        assert_eq!(meta("/ws/agent-7").agent_id(), Some("agent-7"));
        assert_eq!(meta("/ws/").agent_id(), None);
        assert_eq!(meta("/ws").agent_id(), None);
        assert_eq!(meta("/ws/a/b").agent_id(), None);
        assert_eq!(meta("/").agent_id(), None);
    }

    #[test]
    fn send_side_closed_counts_as_peer_close() {
        assert_eq!(
            CloseReason::from_error(AgentWireError::TransportClosed("eof".into())),
            CloseReason::PeerClosed
        );
        assert_eq!(
            CloseReason::from_error(AgentWireError::Transport("reset".into())).as_str(),
            "transport_error"
        );
    }

    #[test]
    fn default_config_is_baseline_echo() {
        let cfg = ChannelConfig::default();
        assert_eq!(cfg.mode, ChannelMode::Echo);
        assert_eq!(cfg.parse_mode, ParseMode::Strict);
        assert!(cfg.ping_interval.is_none());
        assert!(cfg.idle_timeout.is_none());
    }

    #[tokio::test]
    async fn no_second_pong_when_transport_replies_itself() {
        let mgr = ChannelManager::new(ChannelConfig::default(), Arc::new(HubMetrics::default()));
        let (transport, mut peer) = memory_pair(8);
        let _ch = mgr.accept(SelfPonging(transport), meta("/ws"));

        peer.send(Frame::Ping(Bytes::from_static(b"hb"))).await.unwrap();
        peer.send_text("after ping").await.unwrap();

        let first = time::timeout(Duration::from_secs(5), peer.recv()).await.unwrap();
        assert_eq!(first, Some(Frame::Text("Echo: after ping".into())));
    }
}
