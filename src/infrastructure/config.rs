use crate::domain::models::ReminderContent;
use crate::infrastructure::error::InfraError;
use chrono::format::{Item, StrftimeItems};
use chrono_tz::Tz;
use std::fs;
use std::path::Path;

const APP_JSON: &str = "app.json";
const DEFAULT_TASK_LABEL: &str = "Car wash";
const DEFAULT_NOTIFICATION_TITLE: &str = "Time to wash the car! 🚗";
const DEFAULT_FREQUENCY_SECONDS: u64 = 10;
const DEFAULT_TICK_INTERVAL_MS: u64 = 1_000;
const DEFAULT_HISTORY_DATE_FORMAT: &str = "%b %-d %Y, %-I:%M %P";
const MAX_FREQUENCY_SECONDS: u64 = 10 * 366 * 86_400;
const MAX_TICK_INTERVAL_MS: u64 = 86_400_000;

#[derive(Debug, Clone, PartialEq)]
pub struct CountdownConfig {
    pub task_label: String,
    pub frequency_seconds: u64,
    pub tick_interval_ms: u64,
    pub notification_title: String,
    pub notification_sound: bool,
    pub notifications_enabled: bool,
    pub timezone: Tz,
    pub history_date_format: String,
}

impl Default for CountdownConfig {
    fn default() -> Self {
        Self {
            task_label: DEFAULT_TASK_LABEL.to_string(),
            frequency_seconds: DEFAULT_FREQUENCY_SECONDS,
            tick_interval_ms: DEFAULT_TICK_INTERVAL_MS,
            notification_title: DEFAULT_NOTIFICATION_TITLE.to_string(),
            notification_sound: true,
            notifications_enabled: true,
            timezone: Tz::UTC,
            history_date_format: DEFAULT_HISTORY_DATE_FORMAT.to_string(),
        }
    }
}

impl CountdownConfig {
    pub fn frequency_ms(&self) -> u64 {
        self.frequency_seconds.saturating_mul(1_000)
    }

    pub fn reminder_content(&self) -> ReminderContent {
        ReminderContent {
            title: self.notification_title.clone(),
            sound: self.notification_sound,
        }
    }
}

fn default_app_json() -> serde_json::Value {
    serde_json::json!({
        "schema": 1,
        "taskLabel": DEFAULT_TASK_LABEL,
        "frequencySeconds": DEFAULT_FREQUENCY_SECONDS,
        "tickIntervalMs": DEFAULT_TICK_INTERVAL_MS,
        "notificationTitle": DEFAULT_NOTIFICATION_TITLE,
        "notificationSound": true,
        "notificationsEnabled": true,
        "timezone": "UTC",
        "historyDateFormat": DEFAULT_HISTORY_DATE_FORMAT
    })
}

pub fn ensure_default_configs(config_dir: &Path) -> Result<(), InfraError> {
    let path = config_dir.join(APP_JSON);
    if !path.exists() {
        let formatted = serde_json::to_string_pretty(&default_app_json())?;
        fs::write(path, format!("{formatted}\n"))?;
    }
    Ok(())
}

fn read_config(path: &Path) -> Result<serde_json::Value, InfraError> {
    let raw = fs::read_to_string(path)?;
    let parsed: serde_json::Value = serde_json::from_str(&raw)?;
    let schema = parsed
        .get("schema")
        .and_then(serde_json::Value::as_u64)
        .ok_or_else(|| InfraError::InvalidConfig(format!("missing schema in {}", path.display())))?;
    if schema != 1 {
        return Err(InfraError::InvalidConfig(format!(
            "unsupported schema {} in {}",
            schema,
            path.display()
        )));
    }
    Ok(parsed)
}

fn read_string(app: &serde_json::Value, key: &str) -> Option<String> {
    app.get(key)
        .and_then(serde_json::Value::as_str)
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .map(ToOwned::to_owned)
}

fn read_bounded_u64(
    app: &serde_json::Value,
    key: &str,
    max: u64,
    path: &Path,
) -> Result<Option<u64>, InfraError> {
    let Some(raw) = app.get(key) else {
        return Ok(None);
    };
    match raw.as_u64() {
        Some(value) if (1..=max).contains(&value) => Ok(Some(value)),
        _ => Err(InfraError::InvalidConfig(format!(
            "{key} must be an integer between 1 and {max} in {}",
            path.display()
        ))),
    }
}

pub fn load_countdown_config(config_dir: &Path) -> Result<CountdownConfig, InfraError> {
    let path = config_dir.join(APP_JSON);
    let app = read_config(&path)?;
    let defaults = CountdownConfig::default();

    let timezone = match read_string(&app, "timezone") {
        Some(name) => name.parse::<Tz>().map_err(|error| {
            InfraError::InvalidConfig(format!("invalid timezone '{name}' in {}: {error}", path.display()))
        })?,
        None => defaults.timezone,
    };

    let history_date_format =
        read_string(&app, "historyDateFormat").unwrap_or(defaults.history_date_format);
    if StrftimeItems::new(&history_date_format).any(|item| matches!(item, Item::Error)) {
        return Err(InfraError::InvalidConfig(format!(
            "invalid historyDateFormat '{history_date_format}' in {}",
            path.display()
        )));
    }

    Ok(CountdownConfig {
        task_label: read_string(&app, "taskLabel").unwrap_or(defaults.task_label),
        frequency_seconds: read_bounded_u64(&app, "frequencySeconds", MAX_FREQUENCY_SECONDS, &path)?
            .unwrap_or(defaults.frequency_seconds),
        tick_interval_ms: read_bounded_u64(&app, "tickIntervalMs", MAX_TICK_INTERVAL_MS, &path)?
            .unwrap_or(defaults.tick_interval_ms),
        notification_title: read_string(&app, "notificationTitle")
            .unwrap_or(defaults.notification_title),
        notification_sound: app
            .get("notificationSound")
            .and_then(serde_json::Value::as_bool)
            .unwrap_or(defaults.notification_sound),
        notifications_enabled: app
            .get("notificationsEnabled")
            .and_then(serde_json::Value::as_bool)
            .unwrap_or(defaults.notifications_enabled),
        timezone,
        history_date_format,
    })
}

pub fn save_notifications_enabled(config_dir: &Path, enabled: bool) -> Result<(), InfraError> {
    let path = config_dir.join(APP_JSON);
    let mut app = read_config(&path)?;
    let object = app.as_object_mut().ok_or_else(|| {
        InfraError::InvalidConfig(format!("invalid object structure in {}", path.display()))
    })?;
    object.insert(
        "notificationsEnabled".to_string(),
        serde_json::Value::Bool(enabled),
    );

    let formatted = serde_json::to_string_pretty(&app)?;
    fs::write(path, format!("{formatted}\n"))?;
    Ok(())
}
