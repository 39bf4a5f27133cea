use atlas_sql::SQLError;
use thiserror::Error;

use crate::value::ValueKind;

/// Property store error type.
///
/// A key without a stored value is not an error: reads return the caller's
/// default instead.
#[derive(Error, Debug)]
pub enum ProfileError {
    /// The stored kind differs from the requested one. Recoverable: callers
    /// may treat it as "no value".
    #[error("type mismatch for '{key}': expected {expected}, found {found}")]
    TypeMismatch {
        key: String,
        expected: ValueKind,
        found: ValueKind,
    },

    /// A database could not be opened, or a read/write against it failed.
    #[error("backend unavailable: {0}")]
    BackendUnavailable(String),

    /// A stored row does not hold a valid encoded value.
    #[error("corrupt value for '{key}': {reason}")]
    Corrupt { key: String, reason: String },

    #[error("config error: {0}")]
    Config(String),

    #[error("global property store is already initialized")]
    AlreadyInitialized,
}

impl From<SQLError> for ProfileError {
    fn from(e: SQLError) -> Self {
        ProfileError::BackendUnavailable(e.to_string())
    }
}

impl ProfileError {
    pub fn is_type_mismatch(&self) -> bool {
        matches!(self, ProfileError::TypeMismatch { .. })
    }
}
