use crate::infrastructure::error::InfraError;
use crate::infrastructure::storage::open_database;
use chrono::Utc;
use rusqlite::{params, Connection, OptionalExtension};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

/// Durable named storage for structured values.
///
/// A missing key is `Ok(None)`; `set` replaces the whole value stored under the key.
pub trait KeyValueStore: Send + Sync {
    fn get(&self, key: &str) -> Result<Option<serde_json::Value>, InfraError>;
    fn set(&self, key: &str, value: &serde_json::Value) -> Result<(), InfraError>;
}

#[derive(Debug, Clone)]
pub struct SqliteKeyValueStore {
    db_path: PathBuf,
}

impl SqliteKeyValueStore {
    pub fn new(db_path: impl AsRef<Path>) -> Self {
        Self {
            db_path: db_path.as_ref().to_path_buf(),
        }
    }

    fn connect(&self) -> Result<Connection, InfraError> {
        open_database(&self.db_path)
    }
}

impl KeyValueStore for SqliteKeyValueStore {
    fn get(&self, key: &str) -> Result<Option<serde_json::Value>, InfraError> {
        let connection = self.connect()?;
        let raw: Option<String> = connection
            .query_row(
                "SELECT value FROM kv_store WHERE key = ?1",
                params![key],
                |row| row.get(0),
            )
            .optional()?;

        let Some(raw) = raw else {
            return Ok(None);
        };
        Ok(Some(serde_json::from_str(&raw)?))
    }

    fn set(&self, key: &str, value: &serde_json::Value) -> Result<(), InfraError> {
        let connection = self.connect()?;
        let payload = serde_json::to_string(value)?;
        connection.execute(
            "INSERT INTO kv_store (key, value, updated_at)
             VALUES (?1, ?2, ?3)
             ON CONFLICT(key) DO UPDATE SET
               value = excluded.value,
               updated_at = excluded.updated_at",
            params![key, payload, Utc::now().to_rfc3339()],
        )?;
        Ok(())
    }
}

#[derive(Debug, Default)]
pub struct InMemoryKeyValueStore {
    values: Mutex<HashMap<String, serde_json::Value>>,
}

impl KeyValueStore for InMemoryKeyValueStore {
    fn get(&self, key: &str) -> Result<Option<serde_json::Value>, InfraError> {
        let values = self.values.lock().map_err(|error| {
            InfraError::StorageUnavailable(format!("in-memory store lock poisoned: {error}"))
        })?;
        Ok(values.get(key).cloned())
    }

    fn set(&self, key: &str, value: &serde_json::Value) -> Result<(), InfraError> {
        let mut values = self.values.lock().map_err(|error| {
            InfraError::StorageUnavailable(format!("in-memory store lock poisoned: {error}"))
        })?;
        values.insert(key.to_string(), value.clone());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrastructure::storage::initialize_database;
    use std::fs;
    use std::sync::atomic::{AtomicUsize, Ordering};

    static NEXT_TEMP_ID: AtomicUsize = AtomicUsize::new(0);

    struct TempDatabase {
        dir: PathBuf,
    }

    impl TempDatabase {
        fn new() -> Self {
            let sequence = NEXT_TEMP_ID.fetch_add(1, Ordering::Relaxed);
            let dir = std::env::temp_dir().join(format!(
                "taskly-kv-{}-{}",
                std::process::id(),
                sequence
            ));
            fs::create_dir_all(&dir).expect("create temp directory");
            initialize_database(&dir.join("state.sqlite")).expect("initialize database");
            Self { dir }
        }

        fn path(&self) -> PathBuf {
            self.dir.join("state.sqlite")
        }
    }

    impl Drop for TempDatabase {
        fn drop(&mut self) {
            let _ = fs::remove_dir_all(&self.dir);
        }
    }

    #[test]
    fn sqlite_store_returns_none_for_missing_key() {
        let temp = TempDatabase::new();
        let store = SqliteKeyValueStore::new(temp.path());
        assert_eq!(store.get("missing").expect("get"), None);
    }

    #[test]
    fn sqlite_store_overwrites_whole_value() {
        let temp = TempDatabase::new();
        let store = SqliteKeyValueStore::new(temp.path());
        store
            .set("key", &serde_json::json!({"a": 1, "b": [1, 2]}))
            .expect("first set");
        store.set("key", &serde_json::json!({"c": true})).expect("second set");

        let loaded = store.get("key").expect("get").expect("value exists");
        assert_eq!(loaded, serde_json::json!({"c": true}));
    }

    #[test]
    fn sqlite_store_reports_unreachable_database() {
        let temp = TempDatabase::new();
        let store = SqliteKeyValueStore::new(temp.dir.join("missing-dir").join("state.sqlite"));
        match store.get("key") {
            Err(InfraError::StorageUnavailable(_)) => {}
            other => panic!("expected storage unavailable, got {other:?}"),
        }
    }

    #[test]
    fn in_memory_store_keeps_keys_separate() {
        let store = InMemoryKeyValueStore::default();
        store.set("one", &serde_json::json!(1)).expect("set one");
        store.set("two", &serde_json::json!(2)).expect("set two");
        assert_eq!(store.get("one").expect("get one"), Some(serde_json::json!(1)));
        assert_eq!(store.get("two").expect("get two"), Some(serde_json::json!(2)));
        assert_eq!(store.get("three").expect("get three"), None);
    }
}
