use std::fmt::{Display, Formatter};

use serde::{Deserialize, Serialize};
use serde_json::Error as SerdeError;

use crate::storage::StorageError;

/// Outcome of a save store operation that did not succeed.
///
/// Every public operation of [`SaveStore`](crate::save_store::SaveStore)
/// reports failure through this enum instead of panicking, so a host can
/// surface the message and keep its current game state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum AppResponse {
    StorageError(String),
    SerializationError(String),
    NotFound(String),
    ValidationError(String),
    IntegrityError(String),
    BadRequest(String),
}

impl Display for AppResponse {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            AppResponse::StorageError(msg) => write!(f, "Storage error: {}", msg),
            AppResponse::SerializationError(msg) => write!(f, "Serialization error: {}", msg),
            AppResponse::NotFound(msg) => write!(f, "Not found: {}", msg),
            AppResponse::ValidationError(msg) => write!(f, "Validation error: {}", msg),
            AppResponse::IntegrityError(msg) => write!(f, "Integrity error: {}", msg),
            AppResponse::BadRequest(msg) => write!(f, "Bad Request: {}", msg),
        }
    }
}

impl std::error::Error for AppResponse {}

impl From<StorageError> for AppResponse {
    fn from(err: StorageError) -> Self {
        AppResponse::StorageError(err.to_string())
    }
}

impl From<SerdeError> for AppResponse {
    fn from(err: SerdeError) -> Self {
        AppResponse::SerializationError(format!("JSON serialization error: {}", err))
    }
}

impl AppResponse {
    /// The bare message without the category prefix.
    pub fn message(&self) -> &str {
        match self {
            AppResponse::StorageError(msg)
            | AppResponse::SerializationError(msg)
            | AppResponse::NotFound(msg)
            | AppResponse::ValidationError(msg)
            | AppResponse::IntegrityError(msg)
            | AppResponse::BadRequest(msg) => msg,
        }
    }

    pub fn is_integrity_error(&self) -> bool {
        matches!(self, AppResponse::IntegrityError(_))
    }
}
