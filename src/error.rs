//! Error types for the filter service.

use std::time::Duration;

/// Top-level error type for the moderation workflow.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Malformed content: {0}")]
    MalformedContent(String),

    #[error("Message {0} already exists")]
    DuplicateId(String),

    #[error("Entity not found: {entity} with id {id}")]
    NotFound { entity: String, id: String },

    #[error("Banned-word service unavailable: {0}")]
    OracleUnavailable(#[from] OracleError),

    #[error("Storage error: {0}")]
    Storage(DatabaseError),
}

impl From<DatabaseError> for Error {
    fn from(err: DatabaseError) -> Self {
        match err {
            DatabaseError::NotFound { entity, id } => Error::NotFound { entity, id },
            DatabaseError::Duplicate { entity, id } if entity == "message" => {
                Error::DuplicateId(id)
            }
            other => Error::Storage(other),
        }
    }
}

/// Configuration-related errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid configuration value for {key}: {message}")]
    InvalidValue { key: String, message: String },
}

/// Storage-related errors.
#[derive(Debug, thiserror::Error)]
pub enum DatabaseError {
    #[error("Connection pool error: {0}")]
    Pool(String),

    #[error("Query failed: {0}")]
    Query(String),

    #[error("Entity not found: {entity} with id {id}")]
    NotFound { entity: String, id: String },

    #[error("Entity already exists: {entity} with id {id}")]
    Duplicate { entity: String, id: String },

    #[error("Migration failed: {0}")]
    Migration(String),

    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl DatabaseError {
    pub(crate) fn not_found(entity: &str, id: &str) -> Self {
        Self::NotFound {
            entity: entity.to_string(),
            id: id.to_string(),
        }
    }

    pub(crate) fn duplicate(entity: &str, id: &str) -> Self {
        Self::Duplicate {
            entity: entity.to_string(),
            id: id.to_string(),
        }
    }
}

/// Banned-word service errors.
#[derive(Debug, thiserror::Error)]
pub enum OracleError {
    #[error("Request to {url} failed: {reason}")]
    RequestFailed { url: String, reason: String },

    #[error("Request to {url} timed out after {timeout:?}")]
    Timeout { url: String, timeout: Duration },

    #[error("HTTP {status} from {url}")]
    Status { url: String, status: u16 },

    #[error("Invalid response from {url}: {reason}")]
    InvalidResponse { url: String, reason: String },
}

/// Content-type probe errors. Never surfaced to callers: a failed probe
/// classifies the link as non-image.
#[derive(Debug, thiserror::Error)]
pub enum ProbeError {
    #[error("Probe of {url} failed: {reason}")]
    RequestFailed { url: String, reason: String },

    #[error("Probe of {url} timed out after {timeout:?}")]
    Timeout { url: String, timeout: Duration },

    #[error("No Content-Type header returned by {url}")]
    MissingContentType { url: String },
}

/// Result type alias for the filter service.
pub type Result<T> = std::result::Result<T, Error>;
