use crate::domain::models::{CountdownRecord, NotificationHandle};
use crate::infrastructure::error::InfraError;
use crate::infrastructure::key_value_store::KeyValueStore;
use chrono::DateTime;
use serde::{Deserialize, Serialize};

pub const COUNTDOWN_STORAGE_KEY: &str = "taskly-countdown";
pub const RECORD_SCHEMA_VERSION: u64 = 1;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct PersistedCountdownState {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub schema: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub current_notification_id: Option<String>,
    #[serde(default)]
    pub completed_at_timestamp: Vec<i64>,
}

pub fn encode_record(record: &CountdownRecord) -> Result<serde_json::Value, InfraError> {
    let persisted = PersistedCountdownState {
        schema: Some(RECORD_SCHEMA_VERSION),
        current_notification_id: record
            .current_notification_id
            .as_ref()
            .map(|handle| handle.as_str().to_string()),
        completed_at_timestamp: record
            .completed_at
            .iter()
            .map(|instant| instant.timestamp_millis())
            .collect(),
    };
    Ok(serde_json::to_value(persisted)?)
}

/// Decodes a stored value. A value without `schema` predates versioning and is read as
/// version 1; any other version is rejected.
pub fn decode_record(value: serde_json::Value) -> Result<CountdownRecord, InfraError> {
    match value.get("schema") {
        None | Some(serde_json::Value::Null) => {}
        Some(raw) => {
            let version = raw.as_u64().ok_or_else(|| {
                InfraError::InvalidRecord(format!("schema must be an unsigned integer, got {raw}"))
            })?;
            if version != RECORD_SCHEMA_VERSION {
                return Err(InfraError::UnsupportedSchema(version));
            }
        }
    }

    let persisted: PersistedCountdownState = serde_json::from_value(value)
        .map_err(|error| InfraError::InvalidRecord(error.to_string()))?;

    let completed_at = persisted
        .completed_at_timestamp
        .iter()
        .map(|millis| {
            DateTime::from_timestamp_millis(*millis).ok_or_else(|| {
                InfraError::InvalidRecord(format!("timestamp {millis} is out of range"))
            })
        })
        .collect::<Result<Vec<_>, _>>()?;

    let record = CountdownRecord {
        current_notification_id: persisted
            .current_notification_id
            .map(|id| id.trim().to_string())
            .filter(|id| !id.is_empty())
            .map(NotificationHandle::new),
        completed_at,
    };
    record.validate().map_err(InfraError::InvalidRecord)?;
    Ok(record)
}

pub fn load_record<S>(store: &S) -> Result<Option<CountdownRecord>, InfraError>
where
    S: KeyValueStore + ?Sized,
{
    store
        .get(COUNTDOWN_STORAGE_KEY)?
        .map(decode_record)
        .transpose()
}

pub fn save_record<S>(store: &S, record: &CountdownRecord) -> Result<(), InfraError>
where
    S: KeyValueStore + ?Sized,
{
    store.set(COUNTDOWN_STORAGE_KEY, &encode_record(record)?)
}
