//! Inventory message types
//!
//! Messages arrive as a loose envelope (`source`, `type`, `entity`) and are
//! decoded once into a closed [`LifecycleEvent`] before any handling.

use crate::error::{Error, Result};
use crate::storage::layout::validate_segment;
use crate::storage::TradingSystem;
use bytes::Bytes;
use serde::{Deserialize, Serialize};

/// Source tag used by the inventory for trading system changes
pub const SOURCE_TRADING_SYSTEM: &str = "trading-system";

pub const TYPE_CREATE: &str = "create";
pub const TYPE_DELETE: &str = "delete";

/// A message as delivered by the broker
#[derive(Debug, Clone, PartialEq)]
pub struct Message {
    pub source: String,
    pub kind: String,
    /// Encoded entity payload, decoded only once the source is recognized
    pub entity: Bytes,
}

impl Message {
    pub fn new(source: impl Into<String>, kind: impl Into<String>, entity: impl Into<Bytes>) -> Self {
        Self {
            source: source.into(),
            kind: kind.into(),
            entity: entity.into(),
        }
    }
}

/// JSON wire form of a message
///
/// `entity` is normally the JSON payload itself. A JSON string is taken as
/// already-encoded payload text.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Envelope {
    pub source: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub entity: serde_json::Value,
}

impl From<Envelope> for Message {
    fn from(envelope: Envelope) -> Self {
        let entity = match envelope.entity {
            serde_json::Value::String(text) => Bytes::from(text),
            other => Bytes::from(other.to_string()),
        };
        Self {
            source: envelope.source,
            kind: envelope.kind,
            entity,
        }
    }
}

/// Payload of trading system messages
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TradingSystemMessage {
    pub trading_system: TradingSystem,
}

/// Decoded lifecycle event
#[derive(Debug, Clone, PartialEq)]
pub enum LifecycleEvent {
    Create(TradingSystem),
    Delete { owner: String, id: u64 },
    Unrecognized { source: String, kind: String },
}

impl LifecycleEvent {
    /// Decode a message.
    ///
    /// Messages from other sources are `Unrecognized` without looking at the
    /// payload. A trading system payload that does not decode, or whose
    /// owner is not a usable name, is `MalformedInput`.
    pub fn decode(message: &Message) -> Result<Self> {
        if message.source != SOURCE_TRADING_SYSTEM {
            return Ok(Self::unrecognized(message));
        }

        let payload: TradingSystemMessage = serde_json::from_slice(&message.entity)
            .map_err(|e| Error::MalformedInput(format!("bad trading system payload: {}", e)))?;
        let ts = payload.trading_system;
        validate_segment("owner", &ts.username)?;

        Ok(match message.kind.as_str() {
            TYPE_CREATE => Self::Create(ts),
            TYPE_DELETE => Self::Delete {
                owner: ts.username,
                id: ts.id,
            },
            _ => Self::unrecognized(message),
        })
    }

    fn unrecognized(message: &Message) -> Self {
        Self::Unrecognized {
            source: message.source.clone(),
            kind: message.kind.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ts_payload(id: u64, username: &str) -> String {
        serde_json::json!({
            "tradingSystem": { "id": id, "username": username, "name": "Breakout" }
        })
        .to_string()
    }

    #[test]
    fn test_decode_create() {
        let msg = Message::new(SOURCE_TRADING_SYSTEM, TYPE_CREATE, ts_payload(42, "alice"));
        match LifecycleEvent::decode(&msg).unwrap() {
            LifecycleEvent::Create(ts) => {
                assert_eq!(ts.id, 42);
                assert_eq!(ts.username, "alice");
                assert_eq!(ts.name, "Breakout");
            }
            other => panic!("unexpected event: {:?}", other),
        }
    }

    #[test]
    fn test_decode_delete() {
        let msg = Message::new(SOURCE_TRADING_SYSTEM, TYPE_DELETE, ts_payload(42, "alice"));
        assert_eq!(
            LifecycleEvent::decode(&msg).unwrap(),
            LifecycleEvent::Delete {
                owner: "alice".to_string(),
                id: 42
            }
        );
    }

    #[test]
    fn test_decode_unknown_source_ignores_payload() {
        let msg = Message::new("portfolio", TYPE_CREATE, "garbage");
        assert_eq!(
            LifecycleEvent::decode(&msg).unwrap(),
            LifecycleEvent::Unrecognized {
                source: "portfolio".to_string(),
                kind: TYPE_CREATE.to_string()
            }
        );
    }

    #[test]
    fn test_decode_unknown_type() {
        let msg = Message::new(SOURCE_TRADING_SYSTEM, "update", ts_payload(1, "bob"));
        assert!(matches!(
            LifecycleEvent::decode(&msg).unwrap(),
            LifecycleEvent::Unrecognized { .. }
        ));
    }

    #[test]
    fn test_decode_malformed_payload() {
        for payload in ["{not json", r#"{"tradingSystem":{"id":"x"}}"#, r#"{"id":1}"#] {
            let msg = Message::new(SOURCE_TRADING_SYSTEM, TYPE_CREATE, payload);
            let err = LifecycleEvent::decode(&msg).unwrap_err();
            assert!(matches!(err, Error::MalformedInput(_)), "{}", payload);
        }
    }

    #[test]
    fn test_decode_rejects_traversing_owner() {
        let msg = Message::new(SOURCE_TRADING_SYSTEM, TYPE_DELETE, ts_payload(1, "../root"));
        assert!(matches!(
            LifecycleEvent::decode(&msg).unwrap_err(),
            Error::MalformedInput(_)
        ));
    }

    #[test]
    fn test_envelope_into_message() {
        let envelope: Envelope = serde_json::from_str(
            r#"{"source":"trading-system","type":"create","entity":{"tradingSystem":{"id":3,"username":"carol"}}}"#,
        )
        .unwrap();
        let msg = Message::from(envelope);
        assert_eq!(msg.kind, TYPE_CREATE);
        assert!(matches!(
            LifecycleEvent::decode(&msg).unwrap(),
            LifecycleEvent::Create(ts) if ts.id == 3
        ));

        let raw: Envelope =
            serde_json::from_str(r#"{"source":"trading-system","type":"create","entity":"%%%"}"#)
                .unwrap();
        assert_eq!(Message::from(raw).entity, Bytes::from_static(b"%%%"));
    }
}
