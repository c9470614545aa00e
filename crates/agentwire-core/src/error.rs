//! Shared error type across agentwire crates.

use thiserror::Error;

/// Stable error codes (used in logs, metrics labels and tests).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCode {
    /// Wire data is not a well-formed envelope object.
    MalformedEnvelope,
    /// Structurally valid envelope lacking required fields.
    MissingField,
    /// Timestamp does not parse as ISO-8601 (strict mode only).
    InvalidTimestamp,
    /// Peer or network ended the session.
    TransportClosed,
    /// Unexpected I/O fault on the transport.
    TransportError,
    /// Peer identity could not be extracted.
    IdentityUnresolved,
    /// Invalid configuration.
    Config,
    /// TLS material could not be loaded or assembled.
    Tls,
    /// Internal error.
    Internal,
}

impl ErrorCode {
    /// String representation used in logs and metric labels.
    pub fn as_str(self) -> &'static str {
        match self {
            ErrorCode::MalformedEnvelope => "MALFORMED_ENVELOPE",
            ErrorCode::MissingField => "MISSING_FIELD",
            ErrorCode::InvalidTimestamp => "INVALID_TIMESTAMP",
            ErrorCode::TransportClosed => "TRANSPORT_CLOSED",
            ErrorCode::TransportError => "TRANSPORT_ERROR",
            ErrorCode::IdentityUnresolved => "IDENTITY_UNRESOLVED",
            ErrorCode::Config => "CONFIG",
            ErrorCode::Tls => "TLS",
            ErrorCode::Internal => "INTERNAL",
        }
    }
}

/// Shared result type.
pub type Result<T> = std::result::Result<T, AgentWireError>;

/// Unified error type used by core and hub.
#[derive(Debug, Error)]
pub enum AgentWireError {
    #[error("malformed envelope: {0}")]
    MalformedEnvelope(String),
    #[error("missing required fields: {}", .0.join(", "))]
    MissingField(Vec<&'static str>),
    #[error("invalid timestamp: {0}")]
    InvalidTimestamp(String),
    #[error("transport closed: {0}")]
    TransportClosed(String),
    #[error("transport error: {0}")]
    Transport(String),
    #[error("identity unresolved: {0}")]
    IdentityUnresolved(String),
    #[error("config: {0}")]
    Config(String),
    #[error("tls: {0}")]
    Tls(String),
    #[error("internal: {0}")]
    Internal(String),
}

impl AgentWireError {
    /// Map to a stable error code.
    pub fn code(&self) -> ErrorCode {
        match self {
            AgentWireError::MalformedEnvelope(_) => ErrorCode::MalformedEnvelope,
            AgentWireError::MissingField(_) => ErrorCode::MissingField,
            AgentWireError::InvalidTimestamp(_) => ErrorCode::InvalidTimestamp,
            AgentWireError::TransportClosed(_) => ErrorCode::TransportClosed,
            AgentWireError::Transport(_) => ErrorCode::TransportError,
            AgentWireError::IdentityUnresolved(_) => ErrorCode::IdentityUnresolved,
            AgentWireError::Config(_) => ErrorCode::Config,
            AgentWireError::Tls(_) => ErrorCode::Tls,
            AgentWireError::Internal(_) => ErrorCode::Internal,
        }
    }

    /// Envelope-level failures: the message is dropped, the channel survives.
    pub fn is_per_message(&self) -> bool {
        matches!(
            self,
            AgentWireError::MalformedEnvelope(_)
                | AgentWireError::MissingField(_)
                | AgentWireError::InvalidTimestamp(_)
        )
    }

    /// Transport-level failures: terminal for the one channel that saw them.
    pub fn is_transport(&self) -> bool {
        matches!(
            self,
            AgentWireError::TransportClosed(_) | AgentWireError::Transport(_)
        )
    }
}
