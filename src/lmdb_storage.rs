use std::fs;
use std::path::{Path, PathBuf};

use lmdb::{Cursor, Database, DatabaseFlags, Environment, Transaction, WriteFlags};
use log::{debug, info, warn};

use crate::storage::{StorageBackend, StorageError};

const DB_NAME: &str = "saves";
const DEFAULT_MAP_SIZE: usize = 16 * 1024 * 1024;

/// Durable [`StorageBackend`] on top of an LMDB environment.
///
/// The environment lives in a directory named `{name}.lmdb`. Each `set` or
/// `remove` is its own committed write transaction, so a crash between two
/// saves never leaves a half-written record behind.
pub struct LmdbStorage {
    env: Environment,
    db: Database,
    path: PathBuf,
}

impl LmdbStorage {
    pub fn open(name: impl AsRef<Path>) -> Result<Self, StorageError> {
        Self::open_with_map_size(name, DEFAULT_MAP_SIZE)
    }

    /// Open with an explicit map size. Writes past it fail with
    /// [`StorageError::QuotaExceeded`].
    pub fn open_with_map_size(name: impl AsRef<Path>, map_size: usize) -> Result<Self, StorageError> {
        let path = lmdb_dir(name.as_ref());
        fs::create_dir_all(&path).map_err(|e| StorageError::Unavailable(e.to_string()))?;

        let env = Environment::new()
            .set_max_dbs(1)
            .set_map_size(map_size)
            .open(&path)
            .map_err(|e| {
                warn!("Failed to open LMDB environment at {}: {e}", path.display());
                StorageError::Unavailable(e.to_string())
            })?;
        let db = env
            .create_db(Some(DB_NAME), DatabaseFlags::empty())
            .map_err(backend_error)?;

        info!("LMDB storage opened at {}", path.display());
        Ok(Self { env, db, path })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl StorageBackend for LmdbStorage {
    fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        let txn = self.env.begin_ro_txn().map_err(backend_error)?;
        let value = match txn.get(self.db, &key) {
            Ok(bytes) => Some(
                std::str::from_utf8(bytes)
                    .map_err(|_| StorageError::Encoding)?
                    .to_string(),
            ),
            Err(lmdb::Error::NotFound) => None,
            Err(e) => return Err(backend_error(e)),
        };
        txn.abort();
        Ok(value)
    }

    fn set(&self, key: &str, value: &str) -> Result<(), StorageError> {
        let mut txn = self.env.begin_rw_txn().map_err(backend_error)?;
        if let Err(e) = txn.put(self.db, &key, &value, WriteFlags::empty()) {
            txn.abort();
            return Err(match e {
                lmdb::Error::MapFull => StorageError::QuotaExceeded {
                    needed: key.len() + value.len(),
                    available: 0,
                },
                other => backend_error(other),
            });
        }
        txn.commit().map_err(backend_error)?;
        debug!("LMDB wrote {} bytes under '{key}'", value.len());
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<(), StorageError> {
        let mut txn = self.env.begin_rw_txn().map_err(backend_error)?;
        match txn.del(self.db, &key, None) {
            Ok(()) => {}
            Err(lmdb::Error::NotFound) => {
                txn.abort();
                return Ok(());
            }
            Err(e) => {
                txn.abort();
                return Err(backend_error(e));
            }
        }
        txn.commit().map_err(backend_error)
    }

    fn keys(&self) -> Result<Vec<String>, StorageError> {
        let txn = self.env.begin_ro_txn().map_err(backend_error)?;
        let keys = {
            let mut cursor = txn.open_ro_cursor(self.db).map_err(backend_error)?;
            let mut keys = Vec::new();
            for (key, _) in cursor.iter_start() {
                let key = std::str::from_utf8(key).map_err(|_| StorageError::Encoding)?;
                keys.push(key.to_string());
            }
            keys
        };
        txn.abort();
        Ok(keys)
    }
}

fn lmdb_dir(name: &Path) -> PathBuf {
    let mut dir = name.as_os_str().to_owned();
    dir.push(".lmdb");
    PathBuf::from(dir)
}

fn backend_error(err: lmdb::Error) -> StorageError {
    StorageError::Backend(err.to_string())
}
