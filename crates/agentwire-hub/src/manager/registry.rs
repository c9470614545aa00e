use std::fmt;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use dashmap::DashMap;
use serde::Serialize;
use tokio::sync::Notify;

use agentwire_core::protocol::envelope::now_timestamp;

use crate::channel::ChannelState;
use crate::identity::PeerIdentity;

/// Opaque per-process channel id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct ChannelId(u64);

impl ChannelId {
    pub fn new(raw: u64) -> Self {
        Self(raw)
    }

    pub fn as_u64(self) -> u64 {
        self.0
    }
}

impl fmt::Display for ChannelId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ch-{}", self.0)
    }
}

/// Observability view of one live channel.
#[derive(Debug, Clone, Serialize)]
pub struct ChannelInfo {
    pub id: ChannelId,
    pub remote_address: SocketAddr,
    pub peer_identity: PeerIdentity,
    pub path: String,
    pub state: ChannelState,
    pub opened_at: String,
}

impl ChannelInfo {
    pub fn new(id: ChannelId, remote_address: SocketAddr, peer_identity: PeerIdentity, path: String) -> Self {
        Self {
            id,
            remote_address,
            peer_identity,
            path,
            state: ChannelState::Open,
            opened_at: now_timestamp(),
        }
    }
}

struct ChannelEntry {
    info: ChannelInfo,
    shutdown: Arc<Notify>,
}

/// Live channels: `channel_id -> {info, shutdown handle}`.
///
/// Entries are added when a channel turns OPEN and removed when it reaches
/// CLOSED, so a lookup never returns a closed channel.
#[derive(Default)]
pub struct ChannelRegistry {
    channels: DashMap<ChannelId, ChannelEntry>,
    draining: AtomicBool,
}

impl ChannelRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, info: ChannelInfo, shutdown: Arc<Notify>) {
        self.channels.insert(info.id, ChannelEntry { info, shutdown });
    }

    pub fn set_state(&self, id: ChannelId, state: ChannelState) {
        if let Some(mut e) = self.channels.get_mut(&id) {
            e.info.state = state;
        }
    }

    pub fn remove(&self, id: ChannelId) -> Option<ChannelInfo> {
        self.channels.remove(&id).map(|(_, entry)| entry.info)
    }

    pub fn get(&self, id: ChannelId) -> Option<ChannelInfo> {
        self.channels.get(&id).map(|r| r.value().info.clone())
    }

    /// All live channels ordered by id.
    pub fn snapshot(&self) -> Vec<ChannelInfo> {
        let mut all: Vec<ChannelInfo> = self.channels.iter().map(|r| r.value().info.clone()).collect();
        all.sort_by_key(|i| i.id);
        all
    }

    pub fn len(&self) -> usize {
        self.channels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.channels.is_empty()
    }

    /// Ask one channel to close. Returns false if it is not live.
    pub fn signal(&self, id: ChannelId) -> bool {
        match self.channels.get(&id) {
            Some(e) => {
                e.value().shutdown.notify_one();
                true
            }
            None => false,
        }
    }

    /// Stop admitting channels and ask every live one to close.
    pub fn signal_all(&self) -> usize {
        self.draining.store(true, Ordering::Relaxed);
        let mut n = 0;
        for e in self.channels.iter() {
            e.value().shutdown.notify_one();
            n += 1;
        }
        n
    }

    pub fn is_draining(&self) -> bool {
        self.draining.load(Ordering::Relaxed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn info(n: u64) -> ChannelInfo {
        ChannelInfo::new(
            ChannelId::new(n),
            "10.0.0.1:5000".parse().unwrap(),
            PeerIdentity::Unknown,
            "/ws".into(),
        )
    }

    #[test]
    fn insert_update_remove() {
        let reg = ChannelRegistry::new();
        reg.insert(info(2), Arc::new(Notify::new()));
        reg.insert(info(1), Arc::new(Notify::new()));
        assert_eq!(reg.len(), 2);

        let ids: Vec<u64> = reg.snapshot().iter().map(|i| i.id.as_u64()).collect();
        assert_eq!(ids, [1, 2]);

        reg.set_state(ChannelId::new(1), ChannelState::Closing);
        assert_eq!(reg.get(ChannelId::new(1)).unwrap().state, ChannelState::Closing);

        assert!(reg.remove(ChannelId::new(1)).is_some());
        assert!(reg.get(ChannelId::new(1)).is_none());
        assert!(!reg.signal(ChannelId::new(1)));
        assert!(reg.signal(ChannelId::new(2)));
    }

    #[tokio::test]
    async fn signal_wakes_the_channel() {
        let reg = ChannelRegistry::new();
        let notify = Arc::new(Notify::new());
        reg.insert(info(7), Arc::clone(&notify));

        assert_eq!(reg.signal_all(), 1);
        assert!(reg.is_draining());
        // permit is stored even though nobody was waiting yet
        notify.notified().await;
    }

    #[test]
    fn id_display() {
        assert_eq!(ChannelId::new(3).to_string(), "ch-3");
        assert_eq!(serde_json::to_string(&ChannelId::new(3)).unwrap(), "3");
    }
}
