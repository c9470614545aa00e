//! Top-level facade crate for agentwire.
//!
//! Re-exports the envelope model and the hub library so agents and embedders
//! can depend on a single crate.

pub mod core {
    pub use agentwire_core::*;
}

pub mod hub {
    pub use agentwire_hub::*;
}
