use thiserror::Error;

#[derive(Debug, Error)]
pub enum InfraError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
    #[error("Invalid config: {0}")]
    InvalidConfig(String),
    #[error("Storage unavailable: {0}")]
    StorageUnavailable(String),
    #[error("Invalid countdown record: {0}")]
    InvalidRecord(String),
    #[error("Unsupported countdown record schema {0}")]
    UnsupportedSchema(u64),
    #[error("Notification scheduling failed: {0}")]
    Scheduling(String),
    #[error("Notification cancellation failed: {0}")]
    Cancellation(String),
}
