//! Agent envelope (JSON).
//!
//! Construction always stamps `message_id` and `timestamp`; parsing never
//! invents them. Optional fields are absent rather than `null` on the wire.
//! Unknown top-level fields are ignored on parse and are not merged into
//! `payload`.

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use uuid::Uuid;

use crate::error::{AgentWireError, Result};

/// Well-known message kind: session start.
pub const INIT: &str = "INIT";
/// Well-known message kind: acknowledgement.
pub const ACK: &str = "ACK";
/// Well-known message kind: application data.
pub const DATA: &str = "DATA";

/// Open-ended application payload.
pub type Payload = Map<String, Value>;

/// Required fields in canonical order (also the order `MissingField` reports).
pub const REQUIRED_FIELDS: [&str; 5] = ["type", "message_id", "origin", "destination", "timestamp"];

/// How much validation `parse` applies beyond field presence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ParseMode {
    /// Presence checks plus ISO-8601 timestamp validation.
    #[default]
    Strict,
    /// Presence checks only.
    Lenient,
}

/// The unit of exchange between agents.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Envelope {
    #[serde(rename = "type")]
    msg_type: String,
    message_id: String,
    origin: String,
    destination: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    in_reply_to: Option<String>,
    timestamp: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    session_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    sequence_number: Option<u64>,
    requires_ack: bool,
    payload: Payload,
}

/// Wire shape: every field optional so presence can be checked explicitly.
#[derive(Debug, Deserialize)]
struct WireEnvelope {
    #[serde(rename = "type")]
    msg_type: Option<String>,
    message_id: Option<String>,
    origin: Option<String>,
    destination: Option<String>,
    in_reply_to: Option<String>,
    timestamp: Option<String>,
    session_id: Option<String>,
    sequence_number: Option<u64>,
    requires_ack: Option<bool>,
    payload: Option<Payload>,
}

/// Current UTC instant, RFC 3339 with milliseconds and a `Z` suffix.
pub fn now_timestamp() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true)
}

impl Envelope {
    /// Construct with defaults: fresh v4 `message_id`, current timestamp,
    /// no ack, empty payload.
    pub fn new(
        msg_type: impl Into<String>,
        origin: impl Into<String>,
        destination: impl Into<String>,
    ) -> Self {
        Self::builder(msg_type, origin, destination).build()
    }

    /// Start a builder for the optional fields.
    pub fn builder(
        msg_type: impl Into<String>,
        origin: impl Into<String>,
        destination: impl Into<String>,
    ) -> EnvelopeBuilder {
        EnvelopeBuilder {
            msg_type: msg_type.into(),
            origin: origin.into(),
            destination: destination.into(),
            message_id: None,
            in_reply_to: None,
            session_id: None,
            sequence_number: None,
            requires_ack: false,
            payload: Payload::new(),
        }
    }

    /// Parse in the default (strict) mode.
    pub fn parse(raw: impl AsRef<[u8]>) -> Result<Self> {
        Self::parse_with(raw, ParseMode::default())
    }

    /// Parse wire bytes or text into an envelope.
    ///
    /// Fails with `MalformedEnvelope` for non-JSON, non-object input or
    /// mistyped fields, `MissingField` naming every absent required field
    /// (`null` and an empty `type` count as absent), and in strict mode
    /// `InvalidTimestamp` when the timestamp is not RFC 3339.
    pub fn parse_with(raw: impl AsRef<[u8]>, mode: ParseMode) -> Result<Self> {
        let value: Value = serde_json::from_slice(raw.as_ref())
            .map_err(|e| AgentWireError::MalformedEnvelope(e.to_string()))?;
        if !value.is_object() {
            return Err(AgentWireError::MalformedEnvelope(
                "envelope must be a JSON object".into(),
            ));
        }
        let wire: WireEnvelope = serde_json::from_value(value)
            .map_err(|e| AgentWireError::MalformedEnvelope(e.to_string()))?;

        let msg_type = wire.msg_type.filter(|t| !t.is_empty());
        let present = [
            msg_type.is_some(),
            wire.message_id.is_some(),
            wire.origin.is_some(),
            wire.destination.is_some(),
            wire.timestamp.is_some(),
        ];
        let missing: Vec<&'static str> = REQUIRED_FIELDS
            .iter()
            .zip(present)
            .filter(|(_, ok)| !ok)
            .map(|(name, _)| *name)
            .collect();

        let (Some(msg_type), Some(message_id), Some(origin), Some(destination), Some(timestamp)) = (
            msg_type,
            wire.message_id,
            wire.origin,
            wire.destination,
            wire.timestamp,
        ) else {
            return Err(AgentWireError::MissingField(missing));
        };

        if mode == ParseMode::Strict {
            DateTime::parse_from_rfc3339(&timestamp)
                .map_err(|e| AgentWireError::InvalidTimestamp(format!("{timestamp:?}: {e}")))?;
        }

        Ok(Self {
            msg_type,
            message_id,
            origin,
            destination,
            in_reply_to: wire.in_reply_to,
            timestamp,
            session_id: wire.session_id,
            sequence_number: wire.sequence_number,
            requires_ack: wire.requires_ack.unwrap_or(false),
            payload: wire.payload.unwrap_or_default(),
        })
    }

    /// Serialize the canonical field set as JSON text.
    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string(self)
            .map_err(|e| AgentWireError::Internal(format!("envelope encode failed: {e}")))
    }

    /// Build the acknowledgement for this envelope: fresh id, `ACK` type,
    /// `in_reply_to` pointing here, origin and destination swapped.
    pub fn ack(&self) -> Envelope {
        let mut b = Envelope::builder(ACK, self.destination.clone(), self.origin.clone())
            .in_reply_to(self.message_id.clone());
        if let Some(sid) = &self.session_id {
            b = b.session_id(sid.clone());
        }
        b.build()
    }

    pub fn msg_type(&self) -> &str {
        &self.msg_type
    }

    pub fn message_id(&self) -> &str {
        &self.message_id
    }

    pub fn origin(&self) -> &str {
        &self.origin
    }

    pub fn destination(&self) -> &str {
        &self.destination
    }

    pub fn in_reply_to(&self) -> Option<&str> {
        self.in_reply_to.as_deref()
    }

    pub fn timestamp(&self) -> &str {
        &self.timestamp
    }

    pub fn session_id(&self) -> Option<&str> {
        self.session_id.as_deref()
    }

    pub fn sequence_number(&self) -> Option<u64> {
        self.sequence_number
    }

    pub fn requires_ack(&self) -> bool {
        self.requires_ack
    }

    pub fn payload(&self) -> &Payload {
        &self.payload
    }
}

/// Builder for envelopes with optional fields.
#[derive(Debug, Clone)]
pub struct EnvelopeBuilder {
    msg_type: String,
    origin: String,
    destination: String,
    message_id: Option<String>,
    in_reply_to: Option<String>,
    session_id: Option<String>,
    sequence_number: Option<u64>,
    requires_ack: bool,
    payload: Payload,
}

impl EnvelopeBuilder {
    /// Use a caller-supplied id instead of a generated one.
    pub fn message_id(mut self, id: impl Into<String>) -> Self {
        self.message_id = Some(id.into());
        self
    }

    pub fn in_reply_to(mut self, id: impl Into<String>) -> Self {
        self.in_reply_to = Some(id.into());
        self
    }

    pub fn session_id(mut self, id: impl Into<String>) -> Self {
        self.session_id = Some(id.into());
        self
    }

    pub fn sequence_number(mut self, n: u64) -> Self {
        self.sequence_number = Some(n);
        self
    }

    pub fn requires_ack(mut self, yes: bool) -> Self {
        self.requires_ack = yes;
        self
    }

    /// Replace the whole payload.
    pub fn payload(mut self, payload: Payload) -> Self {
        self.payload = payload;
        self
    }

    /// Insert one payload entry.
    pub fn with(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.payload.insert(key.into(), value.into());
        self
    }

    pub fn build(self) -> Envelope {
        Envelope {
            msg_type: self.msg_type,
            message_id: self
                .message_id
                .unwrap_or_else(|| Uuid::new_v4().to_string()),
            origin: self.origin,
            destination: self.destination,
            in_reply_to: self.in_reply_to,
            timestamp: now_timestamp(),
            session_id: self.session_id,
            sequence_number: self.sequence_number,
            requires_ack: self.requires_ack,
            payload: self.payload,
        }
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]

    use super::*;

    #[test]
    fn timestamp_is_utc_with_z_suffix() {
        let ts = now_timestamp();
        assert!(ts.ends_with('Z'), "{ts}");
        assert!(!ts.contains('+'));
        // millisecond precision: "YYYY-MM-DDTHH:MM:SS.mmmZ"
        assert_eq!(ts.len(), 24, "{ts}");
        DateTime::parse_from_rfc3339(&ts).unwrap();
    }

    #[test]
    fn ack_swaps_route_and_keeps_session() {
        let original = Envelope::builder(DATA, "agent-a", "hub")
            .session_id("s-1")
            .sequence_number(7)
            .requires_ack(true)
            .build();
        let ack = original.ack();
        assert_eq!(ack.msg_type(), ACK);
        assert_eq!(ack.origin(), "hub");
        assert_eq!(ack.destination(), "agent-a");
        assert_eq!(ack.in_reply_to(), Some(original.message_id()));
        assert_eq!(ack.session_id(), Some("s-1"));
        assert_eq!(ack.sequence_number(), None);
        assert!(!ack.requires_ack());
        assert_ne!(ack.message_id(), original.message_id());
    }

    #[test]
    fn absent_optionals_are_not_serialized() {
        let json = Envelope::new(INIT, "a", "b").to_json().unwrap();
        assert!(!json.contains("in_reply_to"));
        assert!(!json.contains("session_id"));
        assert!(!json.contains("sequence_number"));
        assert!(json.contains("\"payload\":{}"));
        assert!(json.contains("\"requires_ack\":false"));
    }

    #[test]
    fn zero_and_empty_are_kept_distinct_from_absent() {
        let env = Envelope::builder(DATA, "a", "b")
            .session_id("")
            .sequence_number(0)
            .build();
        let back = Envelope::parse(env.to_json().unwrap()).unwrap();
        assert_eq!(back.session_id(), Some(""));
        assert_eq!(back.sequence_number(), Some(0));
    }
}
