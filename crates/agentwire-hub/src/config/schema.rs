use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use serde::Deserialize;

use agentwire_core::error::{AgentWireError, Result};
use agentwire_core::protocol::envelope::ParseMode;

use crate::channel::{ChannelConfig, ChannelMode};

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct HubConfig {
    pub version: u32,

    #[serde(default)]
    pub hub: HubSection,

    #[serde(default)]
    pub channel: ChannelSection,

    pub tls: TlsSection,
}

impl HubConfig {
    pub fn validate(&self) -> Result<()> {
        if self.version != 1 {
            return Err(AgentWireError::Config(format!(
                "unsupported config version {}",
                self.version
            )));
        }
        self.hub.validate()?;
        self.tls.validate()?;
        Ok(())
    }

    /// Per-channel settings derived from the `hub` and `channel` sections.
    pub fn channel_config(&self) -> ChannelConfig {
        ChannelConfig {
            mode: self.channel.mode,
            parse_mode: if self.channel.strict_timestamps {
                ParseMode::Strict
            } else {
                ParseMode::Lenient
            },
            ping_interval: non_zero_ms(self.hub.ping_interval_ms),
            idle_timeout: non_zero_ms(self.hub.idle_timeout_ms),
            close_grace: Duration::from_millis(self.hub.close_grace_ms),
        }
    }
}

fn non_zero_ms(ms: u64) -> Option<Duration> {
    (ms > 0).then(|| Duration::from_millis(ms))
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct HubSection {
    #[serde(default = "default_listen")]
    pub listen: String,

    /// 0 disables keepalive pings.
    #[serde(default = "default_ping_interval_ms")]
    pub ping_interval_ms: u64,

    /// 0 disables the idle timeout.
    #[serde(default = "default_idle_timeout_ms")]
    pub idle_timeout_ms: u64,

    #[serde(default = "default_close_grace_ms")]
    pub close_grace_ms: u64,
}

impl Default for HubSection {
    fn default() -> Self {
        Self {
            listen: default_listen(),
            ping_interval_ms: default_ping_interval_ms(),
            idle_timeout_ms: default_idle_timeout_ms(),
            close_grace_ms: default_close_grace_ms(),
        }
    }
}

impl HubSection {
    pub fn validate(&self) -> Result<()> {
        self.listen_addr()?;
        if self.ping_interval_ms != 0 && !(1000..=120000).contains(&self.ping_interval_ms) {
            return Err(AgentWireError::Config(
                "hub.ping_interval_ms must be 0 or between 1000 and 120000".into(),
            ));
        }
        if self.idle_timeout_ms != 0 && !(5000..=3600000).contains(&self.idle_timeout_ms) {
            return Err(AgentWireError::Config(
                "hub.idle_timeout_ms must be 0 or between 5000 and 3600000".into(),
            ));
        }
        if self.ping_interval_ms != 0
            && self.idle_timeout_ms != 0
            && self.idle_timeout_ms <= self.ping_interval_ms
        {
            return Err(AgentWireError::Config(
                "hub.idle_timeout_ms must be greater than ping_interval_ms".into(),
            ));
        }
        if self.close_grace_ms > 30000 {
            return Err(AgentWireError::Config(
                "hub.close_grace_ms must be at most 30000".into(),
            ));
        }
        Ok(())
    }

    pub fn listen_addr(&self) -> Result<SocketAddr> {
        self.listen
            .parse()
            .map_err(|e| AgentWireError::Config(format!("hub.listen {:?}: {e}", self.listen)))
    }
}

fn default_listen() -> String {
    "0.0.0.0:8443".into()
}
fn default_ping_interval_ms() -> u64 {
    20000
}
fn default_idle_timeout_ms() -> u64 {
    60000
}
fn default_close_grace_ms() -> u64 {
    1000
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ChannelSection {
    #[serde(default)]
    pub mode: ChannelMode,

    /// Reject envelopes whose timestamp is not ISO-8601.
    #[serde(default = "default_true")]
    pub strict_timestamps: bool,
}

impl Default for ChannelSection {
    fn default() -> Self {
        Self {
            mode: ChannelMode::default(),
            strict_timestamps: true,
        }
    }
}

fn default_true() -> bool {
    true
}

/// PEM trust material. Loading happens in `tls`; only shape is checked here.
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TlsSection {
    pub cert: PathBuf,
    pub key: PathBuf,
    pub client_ca: PathBuf,

    /// Refuse handshakes without a client certificate (mTLS).
    #[serde(default = "default_true")]
    pub require_client_cert: bool,
}

impl TlsSection {
    pub fn validate(&self) -> Result<()> {
        for (name, p) in [("cert", &self.cert), ("key", &self.key), ("client_ca", &self.client_ca)] {
            if p.as_os_str().is_empty() {
                return Err(AgentWireError::Config(format!("tls.{name} must not be empty")));
            }
        }
        Ok(())
    }
}
