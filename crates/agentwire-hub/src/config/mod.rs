//! Hub config loader (strict parsing).

pub mod schema;

use std::fs;

use agentwire_core::error::{AgentWireError, Result};

pub use schema::{ChannelSection, HubConfig, HubSection, TlsSection};

pub fn load_from_file(path: &str) -> Result<HubConfig> {
    let s = fs::read_to_string(path)
        .map_err(|e| AgentWireError::Config(format!("read config {path} failed: {e}")))?;
    load_from_str(&s)
}

pub fn load_from_str(s: &str) -> Result<HubConfig> {
    let cfg: HubConfig = serde_yaml::from_str(s)
        .map_err(|e| AgentWireError::Config(format!("invalid yaml: {e}")))?;
    cfg.validate()?;
    Ok(cfg)
}
