//! Reading data model.
//!
//! One observed access point (or any other sampled entity) captured during a
//! round. Field names on the wire follow the structured export layout.

use serde::{Deserialize, Serialize};

/// A single observation captured during one round. Immutable once captured.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Reading {
    #[serde(rename = "BSSID")]
    pub identifier: String,
    #[serde(rename = "SSID")]
    pub label: String,
    pub frequency: u32,
    #[serde(rename = "level")]
    pub signal_level: i32,
    pub capabilities: String,
}

impl Reading {
    pub fn new(
        identifier: impl Into<String>,
        label: impl Into<String>,
        frequency: u32,
        signal_level: i32,
        capabilities: impl Into<String>,
    ) -> Self {
        Self {
            identifier: identifier.into(),
            label: label.into(),
            frequency,
            signal_level,
            capabilities: capabilities.into(),
        }
    }
}
