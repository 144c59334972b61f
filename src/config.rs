use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_with::serde_as;

use crate::app_response::AppResponse;

pub const DEFAULT_SAVE_VERSION: &str = "1.0.0";

/// Options for the save store and auto-save scheduler.
///
/// Every field has a default, so a host only has to spell out what it
/// changes:
///
/// ```rust
/// use idle_save_core::config::SaveConfig;
///
/// let config = SaveConfig::from_json(r#"{"offline_cap_hours": 8}"#).unwrap();
/// assert_eq!(config.offline_cap_hours, 8.0);
/// assert_eq!(config.save_key, "game-save");
/// ```
#[serde_as]
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct SaveConfig {
    /// Namespace prepended to every storage key.
    pub key_prefix: String,

    /// Key of the single save slot.
    pub save_key: String,

    /// Version stamped on new saves and migrated loads.
    pub current_version: String,

    /// Recompute and compare the checksum on load and import.
    pub validate_checksum: bool,

    pub auto_save: bool,

    #[serde_as(as = "serde_with::DurationMilliSeconds<u64>")]
    pub auto_save_interval: Duration,

    /// Upper bound on credited offline time.
    pub offline_cap_hours: f64,

    /// Reject saves older than this on load. Unlimited when unset.
    #[serde_as(as = "Option<serde_with::DurationMilliSeconds<u64>>")]
    pub max_save_age: Option<Duration>,

    /// LZ4-compress stored saves, see [`TextCodec`](crate::codec::TextCodec).
    pub compress: bool,

    /// XOR-obfuscate stored saves.
    pub obfuscate: bool,
}

impl Default for SaveConfig {
    fn default() -> Self {
        Self {
            key_prefix: "idle-game".to_string(),
            save_key: "game-save".to_string(),
            current_version: DEFAULT_SAVE_VERSION.to_string(),
            validate_checksum: true,
            auto_save: true,
            auto_save_interval: Duration::from_secs(60),
            offline_cap_hours: 4.0,
            max_save_age: None,
            compress: false,
            obfuscate: false,
        }
    }
}

impl SaveConfig {
    pub fn from_json(text: &str) -> Result<Self, AppResponse> {
        let config: Self = serde_json::from_str(text)?;
        config.validated()
    }

    fn validated(self) -> Result<Self, AppResponse> {
        if self.save_key.is_empty() {
            return Err(AppResponse::BadRequest("save_key must not be empty".to_string()));
        }
        if self.current_version.is_empty() {
            return Err(AppResponse::BadRequest(
                "current_version must not be empty".to_string(),
            ));
        }
        if !self.offline_cap_hours.is_finite() || self.offline_cap_hours < 0.0 {
            return Err(AppResponse::BadRequest(format!(
                "offline_cap_hours must be a non-negative number, got {}",
                self.offline_cap_hours
            )));
        }
        if self.auto_save_interval.is_zero() {
            return Err(AppResponse::BadRequest(
                "auto_save_interval must be positive".to_string(),
            ));
        }
        Ok(self)
    }

    pub fn storage_key(&self) -> String {
        crate::storage::build_key(&self.key_prefix, &self.save_key)
    }
}
