//! agentwire core: transport-agnostic envelope model, frames and error types.
//!
//! This crate defines the wire-level contracts of the agent messaging protocol
//! shared by the hub, the agent client and tests. It carries no transport or
//! runtime dependencies so it can be embedded by any agent process.
//!
//! # Defensive guarantees
//! Panics, `unwrap`, and `expect` are compile-denied here
//! (`#![deny(clippy::panic, clippy::unwrap_used, clippy::expect_used)]`).
//! All fallible paths surface as `AgentWireError`/`Result` so a hub never
//! crashes on malformed input from a peer.

#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![deny(clippy::panic)]

pub mod error;
pub mod protocol;

/// Shared result type.
pub use error::{AgentWireError, ErrorCode, Result};
pub use protocol::envelope::{Envelope, EnvelopeBuilder, ParseMode};
pub use protocol::frame::Frame;
