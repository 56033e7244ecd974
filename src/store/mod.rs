//! Persistence layer: storage port plus libSQL and in-memory backends.

pub mod libsql_backend;
pub mod memory;
pub mod migrations;
pub mod traits;

use std::path::Path;
use std::sync::Arc;

use serde::Serialize;
use serde::de::DeserializeOwned;

use crate::config::StorageBackend;
use crate::error::DatabaseError;

pub use libsql_backend::LibSqlStore;
pub use memory::MemoryStore;
pub use traits::Store;

/// Construct the configured backend once at start-up.
pub async fn open(backend: &StorageBackend) -> Result<Arc<dyn Store>, DatabaseError> {
    let store: Arc<dyn Store> = match backend {
        StorageBackend::LibSql { path } => Arc::new(LibSqlStore::new_local(Path::new(path)).await?),
        StorageBackend::Memory => Arc::new(MemoryStore::new()),
    };
    Ok(store)
}

/// Serialize a record into its stored JSON form.
pub(crate) fn encode<T: Serialize>(entity: &str, value: &T) -> Result<String, DatabaseError> {
    serde_json::to_string(value)
        .map_err(|e| DatabaseError::Serialization(format!("encode {entity}: {e}")))
}

/// Decode a stored JSON blob. Schema mismatches fail closed.
pub(crate) fn decode<T: DeserializeOwned>(entity: &str, raw: &str) -> Result<T, DatabaseError> {
    serde_json::from_str(raw)
        .map_err(|e| DatabaseError::Serialization(format!("decode {entity}: {e}")))
}
