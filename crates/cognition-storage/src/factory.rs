use std::sync::Arc;

use cognition_core::{CognitionError, Result};

use crate::backend::StorageBackend;
use crate::memory::MemoryBackend;
use crate::sqlite::SqliteBackend;
use crate::postgres::PostgresBackend;

/// Selects a [`StorageBackend`] implementation. Unknown `kind` values are
/// rejected rather than silently defaulting (§4.1 failure semantics).
#[derive(Debug, Clone)]
pub enum StorageConfig {
    Memory,
    Sqlite { path: String },
    Postgres {
        connection_string: String,
        min_connections: u32,
        max_connections: u32,
    },
}

pub async fn build(config: &StorageConfig) -> Result<Arc<dyn StorageBackend>> {
    let backend: Arc<dyn StorageBackend> = match config {
        StorageConfig::Memory => Arc::new(MemoryBackend::new()),
        StorageConfig::Sqlite { path } => Arc::new(SqliteBackend::open(path).await?),
        StorageConfig::Postgres {
            connection_string,
            min_connections,
            max_connections,
        } => Arc::new(
            PostgresBackend::connect(connection_string, *min_connections, *max_connections)
                .await?,
        ),
    };
    backend.initialize().await?;
    Ok(backend)
}

/// Parses the `kind` discriminant from configuration text, rejecting
/// anything unrecognized instead of defaulting (mirrors
/// `server/app/storage/factory.py`'s behavior).
pub fn parse_kind(kind: &str) -> Result<&'static str> {
    match kind {
        "memory" => Ok("memory"),
        "sqlite" => Ok("sqlite"),
        "postgres" | "postgresql" => Ok("postgres"),
        other => Err(CognitionError::Internal(format!(
            "unknown storage backend kind: {other}"
        ))),
    }
}
