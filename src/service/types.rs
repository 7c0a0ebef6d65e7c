//! Service response types

use serde::{Deserialize, Serialize};

/// Documentation of a trading system together with its identity
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DocumentationResponse {
    pub id: u64,
    pub name: String,
    pub documentation: String,
}
