//! Protocol modules (envelopes + frames).
//!
//! - `envelope`: the JSON message unit agents exchange, with construction
//!   defaults and parse/validate rules.
//! - `frame`: transport-agnostic frames a channel reads and writes.
//!
//! Parsers are panic-free: malformed input is reported as `AgentWireError`
//! so a single bad peer message never takes a channel down.

pub mod envelope;
pub mod frame;
