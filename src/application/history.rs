use crate::infrastructure::error::InfraError;
use crate::infrastructure::key_value_store::KeyValueStore;
use crate::infrastructure::record_codec::load_record;
use chrono::{DateTime, Utc};
use chrono_tz::Tz;
use serde::Serialize;

pub const EMPTY_HISTORY_TEXT: &str = "No history";

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct HistoryEntry {
    pub completed_at: DateTime<Utc>,
    pub formatted: String,
}

#[derive(Debug, Clone, Default, Serialize, PartialEq, Eq)]
pub struct HistorySnapshot {
    pub entries: Vec<HistoryEntry>,
}

impl HistorySnapshot {
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn render(&self) -> String {
        if self.entries.is_empty() {
            return EMPTY_HISTORY_TEXT.to_string();
        }
        self.entries
            .iter()
            .map(|entry| entry.formatted.as_str())
            .collect::<Vec<_>>()
            .join("\n")
    }
}

pub fn format_completion(completed_at: DateTime<Utc>, timezone: Tz, date_format: &str) -> String {
    completed_at
        .with_timezone(&timezone)
        .format(date_format)
        .to_string()
}

/// Reads the countdown record independently of the controller, keeping stored order.
pub fn load_history<S>(store: &S, timezone: Tz, date_format: &str) -> Result<HistorySnapshot, InfraError>
where
    S: KeyValueStore + ?Sized,
{
    let Some(record) = load_record(store)? else {
        return Ok(HistorySnapshot::default());
    };

    Ok(HistorySnapshot {
        entries: record
            .completed_at
            .into_iter()
            .map(|completed_at| HistoryEntry {
                completed_at,
                formatted: format_completion(completed_at, timezone, date_format),
            })
            .collect(),
    })
}
