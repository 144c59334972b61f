//! Versioned save slot on top of a [`StorageBackend`].
//!
//! The store keeps no record in memory. Every operation is a fresh round
//! trip through the storage collaborator, which is the only owner of durable
//! state. Every public operation returns a value; storage failures, parse
//! errors and integrity violations all come back as [`AppResponse`].
//!
//! Loading runs these checks, in order, before anything is handed back:
//!
//! 1. the text parses as a JSON object,
//! 2. `version` is a non-empty string,
//! 3. `timestamp` is a positive integer not later than now (and not older
//!    than `max_save_age` when configured),
//! 4. `gameState` is an object and `statistics` holds only numbers,
//! 5. the checksum matches, when `validate_checksum` is on.
//!
//! A record that passes is migrated (optional [`PayloadMigration`] hook, then
//! the version stamp is rewritten) and, if a schema is attached, sanitized.
//! A rejected record is never modified or removed.

use log::{debug, info, warn};
use serde_json::{Map, Value};

use crate::app_response::AppResponse;
use crate::checksum::{checksum_of, compute_checksum};
use crate::codec::TextCodec;
use crate::clock::Clock;
use crate::config::SaveConfig;
use crate::offline::{self, OfflineProgressResult};
use crate::save_record::{SaveInfo, SaveRecord, SlotState, Statistics};
use crate::schema::{self, type_name, ValidationSchema};
use crate::storage::{self, StorageBackend, StorageUsage};

/// Field-level migration of an older payload.
///
/// Runs on load when the stored version differs from the current one,
/// before the version stamp is rewritten and before schema validation.
pub trait PayloadMigration {
    fn migrate(&self, from_version: &str, payload: &mut Map<String, Value>) -> Result<(), String>;
}

impl<F> PayloadMigration for F
where
    F: Fn(&str, &mut Map<String, Value>) -> Result<(), String>,
{
    fn migrate(&self, from_version: &str, payload: &mut Map<String, Value>) -> Result<(), String> {
        self(from_version, payload)
    }
}

pub struct SaveStore<S: StorageBackend, C: Clock> {
    storage: S,
    clock: C,
    config: SaveConfig,
    key: String,
    codec: TextCodec,
    migration: Option<Box<dyn PayloadMigration>>,
    schema: Option<ValidationSchema>,
}

impl<S: StorageBackend, C: Clock> SaveStore<S, C> {
    pub fn new(storage: S, clock: C) -> Self {
        Self::with_config(storage, clock, SaveConfig::default())
    }

    pub fn with_config(storage: S, clock: C, config: SaveConfig) -> Self {
        let key = config.storage_key();
        let codec = TextCodec::from_config(&config);
        Self {
            storage,
            clock,
            config,
            key,
            codec,
            migration: None,
            schema: None,
        }
    }

    pub fn with_migration(mut self, migration: impl PayloadMigration + 'static) -> Self {
        self.migration = Some(Box::new(migration));
        self
    }

    /// Validate and auto-correct loaded payloads against `schema`.
    pub fn with_schema(mut self, schema: ValidationSchema) -> Self {
        self.schema = Some(schema);
        self
    }

    pub fn storage(&self) -> &S {
        &self.storage
    }

    pub fn clock(&self) -> &C {
        &self.clock
    }

    pub fn config(&self) -> &SaveConfig {
        &self.config
    }

    pub fn storage_key(&self) -> &str {
        &self.key
    }

    /// Write a fresh record for `payload` and `statistics`.
    ///
    /// Non-finite statistics are dropped since the text format cannot hold
    /// them. On failure the previously stored record is left as it was.
    pub fn save(&self, payload: &Value, statistics: &Statistics) -> Result<SaveRecord, AppResponse> {
        let Some(payload) = payload.as_object() else {
            return Err(AppResponse::BadRequest(format!(
                "game state must be an object, got {}",
                type_name(payload)
            )));
        };

        let timestamp = self.clock.now_ms();
        if timestamp <= 0 {
            return Err(AppResponse::BadRequest(format!(
                "clock reported a non-positive time: {timestamp}"
            )));
        }

        let statistics: Statistics = statistics
            .iter()
            .filter(|(name, value)| {
                let finite = value.is_finite();
                if !finite {
                    warn!("Dropping non-finite statistic '{name}'");
                }
                finite
            })
            .map(|(name, value)| (name.clone(), *value))
            .collect();

        let record = SaveRecord {
            version: self.config.current_version.clone(),
            timestamp,
            checksum: compute_checksum(payload, &statistics),
            payload: payload.clone(),
            statistics,
        };

        self.write(&record)?;
        info!("Game saved ({} top-level fields) at {timestamp}", payload.len());
        Ok(record)
    }

    /// Read, verify and migrate the stored record. `Ok(None)` when the slot
    /// is empty.
    pub fn load(&self) -> Result<Option<SaveRecord>, AppResponse> {
        let Some(text) = self.storage.get(&self.key)? else {
            debug!("No save found under '{}'", self.key);
            return Ok(None);
        };

        let record = self.read_stored(&text).map_err(|e| {
            warn!("Rejected stored save: {e}");
            e
        })?;
        let record = self.migrate(record)?;
        info!("Game loaded (saved at {})", record.timestamp);
        Ok(Some(record))
    }

    /// Remove the save. Removing an empty slot succeeds.
    pub fn delete_save(&self) -> Result<(), AppResponse> {
        self.storage.remove(&self.key)?;
        info!("Save '{}' deleted", self.key);
        Ok(())
    }

    /// The loaded record as indented JSON, or `None` when there is nothing
    /// valid to export.
    pub fn export_save(&self) -> Option<String> {
        match self.load() {
            Ok(Some(record)) => match record.to_pretty_json() {
                Ok(text) => Some(text),
                Err(e) => {
                    warn!("Export failed: {e}");
                    None
                }
            },
            Ok(None) => None,
            Err(e) => {
                warn!("Export failed: {e}");
                None
            }
        }
    }

    /// Verify `text` exactly as [`load`](Self::load) would, then store it.
    /// Encoded text (as found in storage) is accepted as well as plain JSON.
    pub fn import_save(&self, text: &str) -> Result<SaveRecord, AppResponse> {
        let record = self.read_stored(text).map_err(|e| {
            warn!("Import rejected: {e}");
            e
        })?;
        self.write(&record)?;
        info!("Save imported (version {}, saved at {})", record.version, record.timestamp);
        Ok(record)
    }

    /// Existence, timestamp, stored version and size of the save slot.
    pub fn get_save_info(&self) -> SaveInfo {
        let text = match self.storage.get(&self.key) {
            Ok(Some(text)) => text,
            Ok(None) => return SaveInfo::default(),
            Err(e) => {
                warn!("Could not read save info: {e}");
                return SaveInfo::default();
            }
        };

        match self.read_stored(&text) {
            Ok(record) => SaveInfo {
                exists: true,
                timestamp: Some(record.timestamp),
                version: Some(record.version),
                size: Some(text.len()),
            },
            Err(_) => SaveInfo {
                exists: true,
                ..SaveInfo::default()
            },
        }
    }

    pub fn slot_state(&self) -> Result<SlotState, AppResponse> {
        Ok(match self.storage.get(&self.key)? {
            None => SlotState::Empty,
            Some(text) => match self.read_stored(&text) {
                Ok(_) => SlotState::Valid,
                Err(_) => SlotState::Corrupted,
            },
        })
    }

    /// Offline gain since the stored save was written. Zero when there is no
    /// valid save.
    pub fn calculate_offline_progress(&self, resources_per_second: f64) -> OfflineProgressResult {
        let Some(timestamp) = self.get_save_info().timestamp else {
            return OfflineProgressResult::default();
        };
        let elapsed = self.clock.now_ms().saturating_sub(timestamp);
        offline::calculate(elapsed, resources_per_second, self.config.offline_cap_hours)
    }

    /// Whether anything is stored under the save key, valid or not.
    pub fn has_save(&self) -> Result<bool, AppResponse> {
        Ok(self.storage.exists(&self.key)?)
    }

    /// Remove every key under this store's prefix, including saves written
    /// by other slots of the same game. Returns how many keys were removed.
    pub fn clear_all(&self) -> Result<usize, AppResponse> {
        if self.config.key_prefix.is_empty() {
            let existed = self.has_save()?;
            self.delete_save()?;
            return Ok(usize::from(existed));
        }
        let removed = storage::clear_prefix(&self.storage, &self.config.key_prefix)?;
        info!("Cleared {removed} keys under '{}'", self.config.key_prefix);
        Ok(removed)
    }

    pub fn storage_usage(&self) -> Result<StorageUsage, AppResponse> {
        Ok(storage::usage_info(&self.storage)?)
    }

    fn write(&self, record: &SaveRecord) -> Result<(), AppResponse> {
        let text = self.codec.encode(&record.to_json()?);
        self.storage.set(&self.key, &text).map_err(|e| {
            warn!("Save write failed: {e}");
            AppResponse::from(e)
        })
    }

    fn read_stored(&self, text: &str) -> Result<SaveRecord, AppResponse> {
        let json = self.codec.decode(text)?;
        self.verify(&json)
    }

    fn verify(&self, text: &str) -> Result<SaveRecord, AppResponse> {
        let raw: Value = serde_json::from_str(text)
            .map_err(|e| AppResponse::SerializationError(format!("save is not valid JSON: {e}")))?;
        let Some(fields) = raw.as_object() else {
            return Err(AppResponse::ValidationError(format!(
                "save record must be an object, got {}",
                type_name(&raw)
            )));
        };

        let has_version = fields
            .get("version")
            .and_then(Value::as_str)
            .is_some_and(|v| !v.is_empty());
        if !has_version {
            return Err(AppResponse::ValidationError("missing version information".to_string()));
        }

        let Some(timestamp) = fields.get("timestamp").and_then(Value::as_i64) else {
            return Err(AppResponse::ValidationError("invalid timestamp".to_string()));
        };
        if timestamp <= 0 {
            return Err(AppResponse::ValidationError(format!("invalid timestamp: {timestamp}")));
        }
        let now = self.clock.now_ms();
        if timestamp > now {
            return Err(AppResponse::ValidationError(format!(
                "timestamp {timestamp} is in the future (now {now})"
            )));
        }
        if let Some(max_age) = self.config.max_save_age {
            let max_age_ms = i64::try_from(max_age.as_millis()).unwrap_or(i64::MAX);
            if now - timestamp > max_age_ms {
                return Err(AppResponse::ValidationError(format!(
                    "save is older than {max_age_ms} ms"
                )));
            }
        }

        let game_state = match (fields.get("gameState"), fields.get("payload")) {
            (Some(_), Some(_)) => {
                return Err(AppResponse::ValidationError(
                    "save has both gameState and payload fields".to_string(),
                ))
            }
            (Some(state), None) | (None, Some(state)) => state.as_object(),
            (None, None) => None,
        };
        let Some(game_state) = game_state else {
            return Err(AppResponse::ValidationError("invalid game state".to_string()));
        };

        let empty = Map::new();
        let statistics = match fields.get("statistics") {
            None | Some(Value::Null) => &empty,
            Some(Value::Object(stats)) if stats.values().all(Value::is_number) => stats,
            Some(_) => {
                return Err(AppResponse::ValidationError(
                    "statistics must map names to numbers".to_string(),
                ))
            }
        };

        if self.config.validate_checksum {
            let stored = fields.get("checksum").and_then(Value::as_str).unwrap_or_default();
            if checksum_of(game_state, statistics) != stored {
                return Err(AppResponse::IntegrityError(
                    "save data corrupted (checksum mismatch)".to_string(),
                ));
            }
        }

        let mut raw = raw;
        if let Some(fields) = raw.as_object_mut() {
            if fields.get("statistics").is_some_and(Value::is_null) {
                fields.remove("statistics");
            }
        }
        let mut record: SaveRecord = serde_json::from_value(raw)?;
        // Re-stamp in the form this crate writes, so the record verifies
        // again after it is re-serialized.
        record.checksum = compute_checksum(&record.payload, &record.statistics);

        Ok(record)
    }

    fn migrate(&self, mut record: SaveRecord) -> Result<SaveRecord, AppResponse> {
        let mut payload_changed = false;

        if record.version != self.config.current_version {
            info!(
                "Migrating save from version {} to {}",
                record.version, self.config.current_version
            );
            if let Some(migration) = &self.migration {
                migration
                    .migrate(&record.version, &mut record.payload)
                    .map_err(|e| {
                        AppResponse::ValidationError(format!(
                            "migration from version {} failed: {e}",
                            record.version
                        ))
                    })?;
                payload_changed = true;
            }
            record.version = self.config.current_version.clone();
        }

        if let Some(schema) = &self.schema {
            let result = schema::validate(&Value::Object(record.payload.clone()), schema);
            if !result.is_valid {
                return Err(AppResponse::ValidationError(result.errors.join("; ")));
            }
            if !result.corrections.is_empty() {
                if let Value::Object(sanitized) = result.sanitized {
                    overlay(&mut record.payload, sanitized);
                    payload_changed = true;
                }
            }
        }

        if payload_changed {
            record.checksum = compute_checksum(&record.payload, &record.statistics);
        }
        Ok(record)
    }
}

/// Deep-merge `patch` into `base`; fields outside the schema survive.
fn overlay(base: &mut Map<String, Value>, patch: Map<String, Value>) {
    for (key, value) in patch {
        match value {
            Value::Object(nested) => match base.get_mut(&key) {
                Some(Value::Object(existing)) => overlay(existing, nested),
                _ => {
                    base.insert(key, Value::Object(nested));
                }
            },
            other => {
                base.insert(key, other);
            }
        }
    }
}
