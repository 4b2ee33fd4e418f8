use crate::infrastructure::error::InfraError;
use rusqlite::Connection;
use std::path::Path;
use tracing::debug;

const SCHEMA_SQL: &str = include_str!("../../sql/schema.sql");

/// Opens the countdown database, reporting an unreachable file as `StorageUnavailable`.
pub fn open_database(path: &Path) -> Result<Connection, InfraError> {
    Connection::open(path)
        .map_err(|error| InfraError::StorageUnavailable(format!("{}: {error}", path.display())))
}

/// Applies the schema. Safe to run against an already initialized database.
pub fn initialize_database(path: &Path) -> Result<(), InfraError> {
    let connection = open_database(path)?;
    connection.execute_batch(SCHEMA_SQL)?;
    debug!("[COUNTDOWN] database ready at {}", path.display());
    Ok(())
}
