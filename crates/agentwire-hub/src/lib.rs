//! agentwire hub library entry.
//!
//! Wires the mTLS listener, the WebSocket transport, peer identity
//! resolution and the channel manager into one hub. Consumed by the
//! `agentwire-hub` binary, the agent CLI and integration tests.

pub mod app_state;
pub mod channel;
pub mod client;
pub mod config;
pub mod identity;
pub mod manager;
pub mod obs;
pub mod ops;
pub mod router;
pub mod server;
pub mod tls;
pub mod transport;
