//! Channel lifecycle states.

use std::fmt;

use serde::Serialize;

/// HANDSHAKING -> OPEN -> CLOSING -> CLOSED (terminal).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ChannelState {
    Handshaking,
    Open,
    Closing,
    Closed,
}

impl ChannelState {
    /// Whether `next` is a legal successor of `self`.
    ///
    /// A channel may fail straight out of HANDSHAKING into CLOSING.
    pub fn can_transition_to(self, next: ChannelState) -> bool {
        use ChannelState::*;
        matches!(
            (self, next),
            (Handshaking, Open) | (Handshaking, Closing) | (Open, Closing) | (Closing, Closed)
        )
    }

    pub fn is_terminal(self) -> bool {
        self == ChannelState::Closed
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ChannelState::Handshaking => "HANDSHAKING",
            ChannelState::Open => "OPEN",
            ChannelState::Closing => "CLOSING",
            ChannelState::Closed => "CLOSED",
        }
    }
}

impl fmt::Display for ChannelState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
