use thiserror::Error;

use crate::operation::Operator;

/// Errors raised by the persistence core.
///
/// Application errors returned from inside an `atomically` block are never
/// wrapped in this type; they come back to the caller exactly as returned.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum OdmError {
    /// The storage collaborator rejected a write. Pending changes stay in memory.
    #[error("write to {target} failed: {message}")]
    StorageWrite { target: String, message: String },

    /// A runtime target scope (or its client handle) was used after the scope exited.
    #[error("target scope used after exit: {0}")]
    ScopeViolation(String),

    /// An atomic operator cannot be applied to the value currently at `path`.
    #[error("invalid {operator} on `{path}`: {reason}")]
    InvalidOperation {
        path: String,
        operator: Operator,
        reason: String,
    },

    /// `close` was called for an entity with no open context.
    #[error("no atomic context open for {0}")]
    NoActiveContext(String),

    /// `save`, `upsert` or `delete` was called while a context is open for the entity.
    #[error("atomic context still open for {0}")]
    ContextOpen(String),

    #[error("unknown client `{0}`")]
    UnknownClient(String),

    #[error("store lock poisoned during {0}")]
    LockPoisoned(&'static str),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("serialization error: {0}")]
    Serde(String),
}

impl OdmError {
    pub(crate) fn invalid(path: &str, operator: Operator, reason: impl Into<String>) -> Self {
        OdmError::InvalidOperation {
            path: path.to_string(),
            operator,
            reason: reason.into(),
        }
    }

    /// Returns true when the error came back from the storage layer.
    pub fn is_storage_failure(&self) -> bool {
        matches!(self, OdmError::StorageWrite { .. })
    }
}

impl From<serde_json::Error> for OdmError {
    fn from(err: serde_json::Error) -> Self {
        OdmError::Serde(err.to_string())
    }
}
