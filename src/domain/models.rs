use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(transparent)]
pub struct NotificationHandle(String);

impl NotificationHandle {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for NotificationHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// The single persisted unit of countdown state.
///
/// `completed_at` is newest first and only ever grows at the head.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CountdownRecord {
    pub current_notification_id: Option<NotificationHandle>,
    pub completed_at: Vec<DateTime<Utc>>,
}

impl CountdownRecord {
    pub fn last_completed_at(&self) -> Option<DateTime<Utc>> {
        self.completed_at.first().copied()
    }

    /// Builds the record that follows a completion at `completed_at`.
    pub fn after_completion(
        previous: Option<&CountdownRecord>,
        completed_at: DateTime<Utc>,
        notification_id: Option<NotificationHandle>,
    ) -> Self {
        let previous_len = previous.map_or(0, |record| record.completed_at.len());
        let mut history = Vec::with_capacity(previous_len + 1);
        history.push(completed_at);
        if let Some(previous) = previous {
            history.extend(previous.completed_at.iter().copied());
        }
        Self {
            current_notification_id: notification_id,
            completed_at: history,
        }
    }

    pub fn validate(&self) -> Result<(), String> {
        if let Some(handle) = &self.current_notification_id {
            if handle.as_str().trim().is_empty() {
                return Err("record.current_notification_id must not be empty".to_string());
            }
        }
        if self
            .completed_at
            .windows(2)
            .any(|pair| pair[0] < pair[1])
        {
            return Err("record.completed_at must be ordered newest first".to_string());
        }
        Ok(())
    }
}

/// Days/hours/minutes/seconds decomposition of a non-negative duration.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct DurationParts {
    pub days: u64,
    pub hours: u32,
    pub minutes: u32,
    pub seconds: u32,
}

impl DurationParts {
    pub fn total_seconds(&self) -> u64 {
        self.days * 86_400
            + u64::from(self.hours) * 3_600
            + u64::from(self.minutes) * 60
            + u64::from(self.seconds)
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct CountdownStatus {
    pub is_overdue: bool,
    pub distance: DurationParts,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ReminderContent {
    pub title: String,
    pub sound: bool,
}

impl ReminderContent {
    pub fn validate(&self) -> Result<(), String> {
        if self.title.trim().is_empty() {
            return Err("reminder.title must not be empty".to_string());
        }
        Ok(())
    }
}
