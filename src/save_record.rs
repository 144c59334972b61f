//! Save record definitions.
//!
//! A [`SaveRecord`] is the unit of persisted truth: a versioned, timestamped,
//! checksum-protected snapshot of the whole game state. It serializes to a
//! JSON object and that same text is what export/import exchange.
//!
//! ```rust
//! use idle_save_core::save_record::SaveRecord;
//! use serde_json::json;
//!
//! let text = r#"{
//!     "version": "1.0.0",
//!     "timestamp": 1700000000000,
//!     "gameState": {"resources": {"primary": 42}},
//!     "statistics": {"clicks": 7},
//!     "checksum": "abc"
//! }"#;
//! let record: SaveRecord = serde_json::from_str(text)?;
//! assert_eq!(record.payload["resources"], json!({"primary": 42}));
//! assert_eq!(record.statistics["clicks"], 7.0);
//! # Ok::<(), serde_json::Error>(())
//! ```
//!
//! # Field constraints
//!
//! - `version` must be non-empty.
//! - `timestamp` is Unix milliseconds, positive and not in the future when
//!   the record is loaded.
//! - `gameState` (alias `payload`) must be an object. Its contents are opaque
//!   to this crate apart from optional schema validation.
//! - `statistics` holds finite numeric counters only. Integral counters are
//!   written as JSON integers (`7`, not `7.0`).

use std::collections::BTreeMap;

use serde::ser::SerializeMap;
use serde::{Deserialize, Serialize, Serializer};
use serde_json::{Map, Value};

use crate::sanitize::number_value;

/// Numeric counters stored alongside the payload.
pub type Statistics = BTreeMap<String, f64>;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SaveRecord {
    /// Save-format revision that wrote this record.
    pub version: String,

    /// Unix milliseconds at write time.
    pub timestamp: i64,

    /// Full game state.
    #[serde(rename = "gameState", alias = "payload")]
    pub payload: Map<String, Value>,

    #[serde(default, serialize_with = "serialize_statistics")]
    pub statistics: Statistics,

    /// Digest of `payload` and `statistics`, see
    /// [`compute_checksum`](crate::checksum::compute_checksum).
    #[serde(default)]
    pub checksum: String,
}

impl SaveRecord {
    /// Compact JSON, the form written to storage.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    /// Indented JSON, the form handed out by export.
    pub fn to_pretty_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }
}

/// Statistics as a JSON object, integral counters as integers.
pub fn statistics_object(statistics: &Statistics) -> Map<String, Value> {
    statistics
        .iter()
        .map(|(name, value)| (name.clone(), number_value(*value)))
        .collect()
}

fn serialize_statistics<S: Serializer>(statistics: &Statistics, serializer: S) -> Result<S::Ok, S::Error> {
    let mut map = serializer.serialize_map(Some(statistics.len()))?;
    for (name, value) in statistics {
        map.serialize_entry(name, &number_value(*value))?;
    }
    map.end()
}

/// Summary of the save slot without exposing the payload.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SaveInfo {
    pub exists: bool,
    pub timestamp: Option<i64>,
    pub version: Option<String>,
    /// Length of the stored text, after any encoding.
    pub size: Option<usize>,
}

/// Condition of the single save slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SlotState {
    Empty,
    Valid,
    Corrupted,
}
