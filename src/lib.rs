//! # Idle Save Core
//!
//! Persistence and offline-progress core for browser idle games. The crate
//! owns the save-data model and its integrity checks; the rest of the game
//! (rendering, input, the upgrade tree) supplies a generation rate and
//! receives validated, migrated save records.
//!
//! ## Features
//!
//! - **Checksummed save records**: versioned JSON records whose checksum is
//!   verified on every load and import
//! - **Schema validation**: declarative rules that report structural
//!   corruption and silently repair numeric or enum drift
//! - **Offline progress**: capped, deterministic gain for time spent away
//! - **Session accounting**: play time across pause/resume cycles
//! - **Pluggable storage**: in-memory, LMDB on native targets, and
//!   `localStorage` on `wasm32`, with optional LZ4 compression of stored saves
//! - **No panics at the boundary**: every operation returns a value
//!
//! ## Quick Start
//!
//! ```rust
//! use idle_save_core::{ManualClock, MemoryStorage, SaveStore, Statistics};
//! use serde_json::json;
//!
//! let clock = ManualClock::new(1_700_000_000_000);
//! let store = SaveStore::new(MemoryStorage::new(), clock.clone());
//!
//! store.save(&json!({"resources": {"primary": 250}}), &Statistics::new())?;
//!
//! // Two hours later the player comes back.
//! clock.advance(2 * 60 * 60 * 1000);
//! let progress = store.calculate_offline_progress(5.0);
//! assert_eq!(progress.resources_gained, 36_000);
//!
//! let record = store.load()?.expect("save present");
//! assert_eq!(record.payload["resources"]["primary"], json!(250));
//! # Ok::<(), idle_save_core::AppResponse>(())
//! ```
//!
//! ## Modules
//!
//! - [`save_store`] - save/load/delete/import/export and offline progress
//! - [`schema`] - validation schema and auto-correction
//! - [`sanitize`] - numeric and string sanitizing helpers
//! - [`checksum`] - integrity digest
//! - [`codec`] - optional compression and obfuscation of stored text
//! - [`offline`] - offline-progress calculator
//! - [`session`] - session time tracker
//! - [`auto_save`] - auto-save cadence with an in-flight guard
//! - [`events`] - save notifications with listener isolation
//! - [`storage`] / `lmdb_storage` - storage backends
//! - [`clock`] / [`config`] - injected time source and options

pub mod app_response;
pub mod auto_save;
pub mod checksum;
pub mod clock;
pub mod codec;
pub mod config;
pub mod events;
#[cfg(not(target_arch = "wasm32"))]
pub mod lmdb_storage;
pub mod offline;
pub mod sanitize;
pub mod save_record;
pub mod save_store;
pub mod schema;
pub mod session;
pub mod storage;

pub use app_response::AppResponse;
pub use auto_save::{AutoSave, AutoSaveTick};
pub use checksum::{checksum_of, compute_checksum};
pub use clock::{Clock, ManualClock, SystemClock};
pub use codec::TextCodec;
pub use config::SaveConfig;
pub use events::{SaveEvent, SaveEventKind, SaveEvents};
#[cfg(not(target_arch = "wasm32"))]
pub use lmdb_storage::LmdbStorage;
pub use offline::OfflineProgressResult;
pub use save_record::{SaveInfo, SaveRecord, SlotState, Statistics};
pub use save_store::{PayloadMigration, SaveStore};
pub use schema::{validate, ValidationResult, ValidationRule, ValidationSchema, ValueType};
pub use session::{SessionSnapshot, SessionTimeState, SessionTracker};
#[cfg(target_arch = "wasm32")]
pub use storage::LocalStorage;
pub use storage::{MemoryStorage, StorageBackend, StorageError, StorageUsage};
