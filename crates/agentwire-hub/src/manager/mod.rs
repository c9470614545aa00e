//! Channel manager: accepts transports and runs one channel per task.
//!
//! The manager owns the registry of live channels. It does not route or
//! broadcast; fan-out belongs to a layer built on top of it.

mod registry;

pub use registry::{ChannelId, ChannelInfo, ChannelRegistry};

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use tokio::task::JoinHandle;

use crate::channel::{Channel, ChannelConfig, ChannelSummary, ConnMeta};
use crate::obs::metrics::HubMetrics;
use crate::transport::FrameTransport;

/// A channel that has been handed its own task.
pub struct AcceptedChannel {
    pub id: ChannelId,
    /// Resolves once the channel is CLOSED.
    pub handle: JoinHandle<ChannelSummary>,
}

pub struct ChannelManager {
    cfg: Arc<ChannelConfig>,
    registry: Arc<ChannelRegistry>,
    metrics: Arc<HubMetrics>,
    seq: AtomicU64,
}

impl ChannelManager {
    pub fn new(cfg: ChannelConfig, metrics: Arc<HubMetrics>) -> Self {
        Self {
            cfg: Arc::new(cfg),
            registry: Arc::new(ChannelRegistry::new()),
            metrics,
            seq: AtomicU64::new(1),
        }
    }

    /// Start a channel lifecycle for an accepted transport.
    ///
    /// Must be called from within a tokio runtime.
    pub fn accept<T>(&self, transport: T, meta: ConnMeta) -> AcceptedChannel
    where
        T: FrameTransport + 'static,
    {
        let id = ChannelId::new(self.seq.fetch_add(1, Ordering::Relaxed));
        self.metrics.channels_accepted.inc(&[]);

        let channel = Channel::new(
            id,
            meta,
            transport,
            Arc::clone(&self.cfg),
            Arc::clone(&self.registry),
            Arc::clone(&self.metrics),
        );
        let handle = tokio::spawn(channel.run());

        AcceptedChannel { id, handle }
    }

    pub fn get(&self, id: ChannelId) -> Option<ChannelInfo> {
        self.registry.get(id)
    }

    pub fn snapshot(&self) -> Vec<ChannelInfo> {
        self.registry.snapshot()
    }

    pub fn len(&self) -> usize {
        self.registry.len()
    }

    pub fn is_empty(&self) -> bool {
        self.registry.is_empty()
    }

    /// Explicitly shut down one channel.
    pub fn close(&self, id: ChannelId) -> bool {
        self.registry.signal(id)
    }

    /// Shut down every live channel and any that open afterwards.
    pub fn shutdown_all(&self) -> usize {
        self.registry.signal_all()
    }
}
