//! Shared application state for the agentwire hub.

use std::sync::Arc;

use crate::channel::ChannelConfig;
use crate::config::HubConfig;
use crate::manager::ChannelManager;
use crate::obs::metrics::HubMetrics;

#[derive(Clone)]
pub struct HubState {
    manager: Arc<ChannelManager>,
    metrics: Arc<HubMetrics>,
}

impl HubState {
    /// Build state from a validated config.
    pub fn new(cfg: HubConfig) -> Self {
        Self::with_channel_config(cfg.channel_config())
    }

    /// State without file-backed config (embedding, tests).
    pub fn with_channel_config(channel_cfg: ChannelConfig) -> Self {
        let metrics = Arc::new(HubMetrics::default());
        let manager = Arc::new(ChannelManager::new(channel_cfg, Arc::clone(&metrics)));
        Self { manager, metrics }
    }

    pub fn manager(&self) -> Arc<ChannelManager> {
        Arc::clone(&self.manager)
    }

    pub fn metrics(&self) -> Arc<HubMetrics> {
        Arc::clone(&self.metrics)
    }

    pub fn set_draining(&self) {
        self.metrics.set_draining();
    }

    pub fn is_draining(&self) -> bool {
        self.metrics.is_draining()
    }

    /// Gauges computed at scrape time.
    pub fn metrics_extra(&self) -> Vec<(&'static str, u64)> {
        vec![("agentwire_registry_channels", self.manager.len() as u64)]
    }
}
