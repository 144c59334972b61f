//! Key/value storage boundary.
//!
//! The save store never talks to a concrete persistence layer. It reads and
//! writes text through a [`StorageBackend`], which owns all durable state.
//! Three backends ship with the crate:
//!
//! - [`MemoryStorage`]: in-process map, used by tests and headless hosts. It
//!   can simulate a full quota or a failing device.
//! - [`LmdbStorage`](crate::lmdb_storage::LmdbStorage): durable LMDB
//!   environment on native targets.
//! - [`LocalStorage`]: the browser's `window.localStorage` on `wasm32`.

use std::cell::{Cell, RefCell};
use std::collections::BTreeMap;

use log::{debug, warn};
use serde::Serialize;

/// Failure reported by a storage backend.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StorageError {
    #[error("storage quota exceeded ({needed} bytes needed, {available} available)")]
    QuotaExceeded { needed: usize, available: usize },

    #[error("storage unavailable: {0}")]
    Unavailable(String),

    #[error("stored value is not valid UTF-8")]
    Encoding,

    #[error("backend error: {0}")]
    Backend(String),
}

/// The storage collaborator.
///
/// Implementations must tolerate lookups of keys that were never written
/// (`Ok(None)`) and removal of absent keys (`Ok(())`).
pub trait StorageBackend {
    fn get(&self, key: &str) -> Result<Option<String>, StorageError>;
    fn set(&self, key: &str, value: &str) -> Result<(), StorageError>;
    fn remove(&self, key: &str) -> Result<(), StorageError>;

    /// Every key currently stored, in no particular order.
    fn keys(&self) -> Result<Vec<String>, StorageError>;

    fn exists(&self, key: &str) -> Result<bool, StorageError> {
        Ok(self.get(key)?.is_some())
    }
}

impl<S: StorageBackend + ?Sized> StorageBackend for &S {
    fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        (**self).get(key)
    }

    fn set(&self, key: &str, value: &str) -> Result<(), StorageError> {
        (**self).set(key, value)
    }

    fn remove(&self, key: &str) -> Result<(), StorageError> {
        (**self).remove(key)
    }

    fn keys(&self) -> Result<Vec<String>, StorageError> {
        (**self).keys()
    }
}

/// Builds the full storage key, `"{prefix}-{key}"`.
pub fn build_key(prefix: &str, key: &str) -> String {
    if prefix.is_empty() {
        key.to_string()
    } else {
        format!("{prefix}-{key}")
    }
}

/// Rough per-origin `localStorage` budget used for usage estimates.
pub const ESTIMATED_QUOTA_BYTES: usize = 5 * 1024 * 1024;

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct StorageUsage {
    /// Bytes taken by keys and values.
    pub used: usize,
    pub available: usize,
    /// `used` as a share of [`ESTIMATED_QUOTA_BYTES`], capped at 100.
    pub percentage: f64,
}

/// Estimate how much of the storage budget is in use.
pub fn usage_info<S: StorageBackend + ?Sized>(storage: &S) -> Result<StorageUsage, StorageError> {
    let mut used = 0;
    for key in storage.keys()? {
        let value_len = storage.get(&key)?.map_or(0, |v| v.len());
        used += key.len() + value_len;
    }
    Ok(StorageUsage {
        used,
        available: ESTIMATED_QUOTA_BYTES.saturating_sub(used),
        percentage: (used as f64 / ESTIMATED_QUOTA_BYTES as f64 * 100.0).min(100.0),
    })
}

/// Remove every key of the form `"{prefix}-..."`. Returns how many were
/// removed. An empty prefix removes nothing.
pub fn clear_prefix<S: StorageBackend + ?Sized>(storage: &S, prefix: &str) -> Result<usize, StorageError> {
    if prefix.is_empty() {
        warn!("Refusing to clear storage with an empty prefix");
        return Ok(0);
    }
    let namespace = format!("{prefix}-");
    let doomed: Vec<String> = storage
        .keys()?
        .into_iter()
        .filter(|key| key.starts_with(&namespace))
        .collect();
    for key in &doomed {
        storage.remove(key)?;
        debug!("Removed '{key}'");
    }
    Ok(doomed.len())
}

/// In-memory storage with optional quota and failure injection.
#[derive(Debug, Default)]
pub struct MemoryStorage {
    entries: RefCell<BTreeMap<String, String>>,
    quota_bytes: Option<usize>,
    fail_writes: Cell<bool>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    /// Storage that rejects writes once keys plus values exceed `bytes`,
    /// like a browser's per-origin quota.
    pub fn with_quota(bytes: usize) -> Self {
        Self {
            quota_bytes: Some(bytes),
            ..Self::default()
        }
    }

    /// Make every subsequent `set`/`remove` fail with [`StorageError::Unavailable`].
    pub fn set_fail_writes(&self, fail: bool) {
        self.fail_writes.set(fail);
    }

    /// Bytes used by keys and values.
    pub fn used_bytes(&self) -> usize {
        self.entries
            .borrow()
            .iter()
            .map(|(k, v)| k.len() + v.len())
            .sum()
    }

    pub fn len(&self) -> usize {
        self.entries.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.borrow().is_empty()
    }

    /// Direct read of the raw stored text, bypassing failure injection.
    pub fn raw(&self, key: &str) -> Option<String> {
        self.entries.borrow().get(key).cloned()
    }

    /// Overwrite raw stored text, bypassing quota and failure injection.
    pub fn put_raw(&self, key: &str, value: impl Into<String>) {
        self.entries.borrow_mut().insert(key.to_string(), value.into());
    }
}

impl StorageBackend for MemoryStorage {
    fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        Ok(self.entries.borrow().get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> Result<(), StorageError> {
        if self.fail_writes.get() {
            return Err(StorageError::Unavailable("writes disabled".to_string()));
        }

        if let Some(quota) = self.quota_bytes {
            let replaced = self
                .entries
                .borrow()
                .get(key)
                .map(|old| key.len() + old.len())
                .unwrap_or(0);
            let available = quota.saturating_sub(self.used_bytes() - replaced);
            let needed = key.len() + value.len();
            if needed > available {
                warn!("Storage quota exceeded writing '{key}': {needed} > {available}");
                return Err(StorageError::QuotaExceeded { needed, available });
            }
        }

        self.entries
            .borrow_mut()
            .insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<(), StorageError> {
        if self.fail_writes.get() {
            return Err(StorageError::Unavailable("writes disabled".to_string()));
        }
        self.entries.borrow_mut().remove(key);
        Ok(())
    }

    fn keys(&self) -> Result<Vec<String>, StorageError> {
        Ok(self.entries.borrow().keys().cloned().collect())
    }
}

#[cfg(target_arch = "wasm32")]
pub use web::LocalStorage;

#[cfg(target_arch = "wasm32")]
mod web {
    use super::{StorageBackend, StorageError};

    /// `window.localStorage`.
    pub struct LocalStorage {
        storage: web_sys::Storage,
    }

    impl LocalStorage {
        /// Fails when there is no window or the browser denies access
        /// (private mode, disabled storage).
        pub fn open() -> Result<Self, StorageError> {
            let window = web_sys::window()
                .ok_or_else(|| StorageError::Unavailable("no window".to_string()))?;
            let storage = window
                .local_storage()
                .map_err(|e| StorageError::Unavailable(format!("{e:?}")))?
                .ok_or_else(|| StorageError::Unavailable("localStorage disabled".to_string()))?;
            Ok(Self { storage })
        }
    }

    impl StorageBackend for LocalStorage {
        fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
            self.storage
                .get_item(key)
                .map_err(|e| StorageError::Backend(format!("{e:?}")))
        }

        fn set(&self, key: &str, value: &str) -> Result<(), StorageError> {
            // setItem throws QuotaExceededError when the origin is full.
            self.storage.set_item(key, value).map_err(|e| {
                log::warn!("localStorage.setItem failed for '{key}': {e:?}");
                StorageError::QuotaExceeded {
                    needed: key.len() + value.len(),
                    available: 0,
                }
            })
        }

        fn remove(&self, key: &str) -> Result<(), StorageError> {
            self.storage
                .remove_item(key)
                .map_err(|e| StorageError::Backend(format!("{e:?}")))
        }

        fn keys(&self) -> Result<Vec<String>, StorageError> {
            let length = self
                .storage
                .length()
                .map_err(|e| StorageError::Backend(format!("{e:?}")))?;
            let mut keys = Vec::with_capacity(length as usize);
            for index in 0..length {
                if let Some(key) = self
                    .storage
                    .key(index)
                    .map_err(|e| StorageError::Backend(format!("{e:?}")))?
                {
                    keys.push(key);
                }
            }
            Ok(keys)
        }
    }
}
