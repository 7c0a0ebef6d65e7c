//! Records persisted by the artifact store

use serde::{Deserialize, Serialize};

/// Trading system metadata, stored as `info.json`.
///
/// Attributes this service does not interpret are kept in `extra` so the
/// record round-trips whatever the inventory sends.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TradingSystem {
    pub id: u64,
    pub username: String,
    #[serde(default)]
    pub name: String,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

impl TradingSystem {
    pub fn new(id: u64, username: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id,
            username: username.into(),
            name: name.into(),
            extra: serde_json::Map::new(),
        }
    }
}
