use crate::application::bootstrap::{bootstrap_workspace, BootstrapResult};
use crate::application::countdown_controller::{CountdownController, CountdownView};
use crate::application::history::{load_history, HistorySnapshot};
use crate::application::ticker::{CountdownTicker, TickerHandle};
use crate::domain::models::{CountdownStatus, ReminderContent};
use crate::infrastructure::config::{load_countdown_config, save_notifications_enabled, CountdownConfig};
use crate::infrastructure::error::InfraError;
use crate::infrastructure::key_value_store::SqliteKeyValueStore;
use crate::infrastructure::notification_gateway::{
    DeliverFn, NotificationGateway, TokioNotificationGateway,
};
use chrono::Utc;
use serde::Serialize;
use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use tokio::time::Duration as TokioDuration;

pub type AppController<N> = CountdownController<SqliteKeyValueStore, N>;

pub struct AppState<N = TokioNotificationGateway>
where
    N: NotificationGateway,
{
    config_dir: PathBuf,
    logs_dir: PathBuf,
    config: CountdownConfig,
    store: Arc<SqliteKeyValueStore>,
    controller: Arc<AppController<N>>,
    log_guard: Mutex<()>,
}

impl AppState<TokioNotificationGateway> {
    pub fn new(workspace_root: PathBuf) -> Result<Self, InfraError> {
        let bootstrap = bootstrap_workspace(&workspace_root)?;
        let config = load_countdown_config(&bootstrap.config_dir)?;
        let notifier = Arc::new(TokioNotificationGateway::new(
            config.notifications_enabled,
            terminal_deliver(),
        ));
        Ok(Self::assemble(bootstrap, config, notifier))
    }
}

impl<N> AppState<N>
where
    N: NotificationGateway,
{
    pub fn with_notifier(workspace_root: PathBuf, notifier: Arc<N>) -> Result<Self, InfraError> {
        let bootstrap = bootstrap_workspace(&workspace_root)?;
        let config = load_countdown_config(&bootstrap.config_dir)?;
        Ok(Self::assemble(bootstrap, config, notifier))
    }

    fn assemble(bootstrap: BootstrapResult, config: CountdownConfig, notifier: Arc<N>) -> Self {
        let store = Arc::new(SqliteKeyValueStore::new(&bootstrap.database_path));
        let controller = Arc::new(CountdownController::new(
            Arc::clone(&store),
            notifier,
            config.frequency_ms(),
            config.reminder_content(),
        ));

        Self {
            config_dir: bootstrap.config_dir,
            logs_dir: bootstrap.logs_dir,
            config,
            store,
            controller,
            log_guard: Mutex::new(()),
        }
    }

    pub fn config_dir(&self) -> &Path {
        &self.config_dir
    }

    pub fn config(&self) -> &CountdownConfig {
        &self.config
    }

    pub fn controller(&self) -> &Arc<AppController<N>> {
        &self.controller
    }

    pub fn command_error(&self, command: &str, error: &InfraError) -> String {
        self.log_error(command, &error.to_string());
        error.to_string()
    }

    pub fn log_info(&self, command: &str, message: &str) {
        self.append_log("info", command, message);
    }

    pub fn log_warn(&self, command: &str, message: &str) {
        self.append_log("warn", command, message);
    }

    pub fn log_error(&self, command: &str, message: &str) {
        self.append_log("error", command, message);
    }

    fn append_log(&self, level: &str, command: &str, message: &str) {
        let entry = CommandLogEntry {
            timestamp: Utc::now().to_rfc3339(),
            level,
            command,
            message,
        };
        let Ok(line) = serde_json::to_string(&entry) else {
            return;
        };
        let Ok(_guard) = self.log_guard.lock() else {
            return;
        };
        let path = self.logs_dir.join(COMMAND_LOG_FILE);
        if let Ok(mut file) = OpenOptions::new().create(true).append(true).open(path) {
            let _ = writeln!(file, "{line}");
        }
    }
}

const COMMAND_LOG_FILE: &str = "commands.log";

/// One JSON line in `logs/commands.log`.
#[derive(Serialize)]
struct CommandLogEntry<'a> {
    timestamp: String,
    level: &'a str,
    command: &'a str,
    message: &'a str,
}

fn terminal_deliver() -> DeliverFn {
    Arc::new(|content: &ReminderContent| {
        let bell = if content.sound { "\u{7}" } else { "" };
        println!("{bell}🔔 {}", content.title);
    })
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct CountdownStatusResponse {
    pub phase: String,
    pub headline: Option<String>,
    pub is_overdue: Option<bool>,
    pub days: u64,
    pub hours: u32,
    pub minutes: u32,
    pub seconds: u32,
}

impl CountdownStatusResponse {
    pub fn from_view(view: CountdownView, task_label: &str) -> Self {
        match view {
            CountdownView::Loading => Self {
                phase: "loading".to_string(),
                headline: None,
                is_overdue: None,
                days: 0,
                hours: 0,
                minutes: 0,
                seconds: 0,
            },
            CountdownView::Ready(status) => Self {
                phase: "ready".to_string(),
                headline: Some(headline(&status, task_label)),
                is_overdue: Some(status.is_overdue),
                days: status.distance.days,
                hours: status.distance.hours,
                minutes: status.distance.minutes,
                seconds: status.distance.seconds,
            },
        }
    }
}

pub fn headline(status: &CountdownStatus, task_label: &str) -> String {
    if status.is_overdue {
        format!("{task_label} overdue by")
    } else {
        format!("{task_label} due in ...")
    }
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct CompleteTaskResponse {
    pub completed_at: String,
    pub notification_id: Option<String>,
    pub history_length: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub warning: Option<String>,
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct NotificationSettingResponse {
    pub notifications_enabled: bool,
}

pub fn get_countdown_status_impl<N>(state: &AppState<N>) -> Result<CountdownStatusResponse, InfraError>
where
    N: NotificationGateway,
{
    let controller = state.controller();
    controller.initialize()?;
    let view = controller.tick(controller.now())?;
    Ok(CountdownStatusResponse::from_view(view, &state.config().task_label))
}

pub async fn complete_task_impl<N>(state: &AppState<N>) -> Result<CompleteTaskResponse, InfraError>
where
    N: NotificationGateway,
{
    let controller = state.controller();
    controller.initialize()?;
    let outcome = controller.complete().await?;

    let warning = outcome.reminder.warning().map(ToOwned::to_owned);
    if let Some(message) = &warning {
        state.log_warn("complete_task", message);
    }
    let completed_at = outcome
        .record
        .last_completed_at()
        .map(|instant| instant.to_rfc3339())
        .unwrap_or_default();
    state.log_info(
        "complete_task",
        &format!(
            "recorded completion at={completed_at} history_length={}",
            outcome.record.completed_at.len()
        ),
    );

    Ok(CompleteTaskResponse {
        completed_at,
        notification_id: outcome
            .record
            .current_notification_id
            .as_ref()
            .map(|handle| handle.as_str().to_string()),
        history_length: outcome.record.completed_at.len(),
        warning,
    })
}

pub fn get_history_impl<N>(state: &AppState<N>) -> Result<HistorySnapshot, InfraError>
where
    N: NotificationGateway,
{
    let config = state.config();
    load_history(state.store.as_ref(), config.timezone, &config.history_date_format)
}

pub fn set_notifications_enabled_impl<N>(
    state: &AppState<N>,
    enabled: bool,
) -> Result<NotificationSettingResponse, InfraError>
where
    N: NotificationGateway,
{
    save_notifications_enabled(state.config_dir(), enabled)?;
    state.log_info(
        "set_notifications_enabled",
        &format!("notifications_enabled={enabled}"),
    );
    Ok(NotificationSettingResponse {
        notifications_enabled: enabled,
    })
}

pub fn start_ticker_impl<N>(state: &AppState<N>) -> Result<TickerHandle, InfraError>
where
    N: NotificationGateway + 'static,
{
    state.controller().initialize()?;
    Ok(CountdownTicker::spawn(
        Arc::clone(state.controller()),
        TokioDuration::from_millis(state.config().tick_interval_ms),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrastructure::notification_gateway::{InMemoryNotificationGateway, PermissionStatus};
    use std::fs;
    use std::sync::atomic::{AtomicUsize, Ordering};

    static NEXT_TEMP_WORKSPACE: AtomicUsize = AtomicUsize::new(0);

    struct TempWorkspace {
        path: PathBuf,
    }

    impl TempWorkspace {
        fn new() -> Self {
            let sequence = NEXT_TEMP_WORKSPACE.fetch_add(1, Ordering::Relaxed);
            let path = std::env::temp_dir().join(format!(
                "taskly-command-tests-{}-{}",
                std::process::id(),
                sequence
            ));
            fs::create_dir_all(&path).expect("create temp workspace");
            Self { path }
        }

        fn app_state(&self, notifier: Arc<InMemoryNotificationGateway>) -> AppState<InMemoryNotificationGateway> {
            AppState::with_notifier(self.path.clone(), notifier).expect("initialize app state")
        }

        fn command_log(&self) -> String {
            fs::read_to_string(self.path.join("logs").join("commands.log")).unwrap_or_default()
        }
    }

    impl Drop for TempWorkspace {
        fn drop(&mut self) {
            let _ = fs::remove_dir_all(&self.path);
        }
    }

    #[test]
    fn fresh_workspace_reports_loading() {
        let workspace = TempWorkspace::new();
        let state = workspace.app_state(Arc::new(InMemoryNotificationGateway::default()));
        let status = get_countdown_status_impl(&state).expect("status");
        assert_eq!(status.phase, "loading");
        assert_eq!(status.headline, None);

        let history = get_history_impl(&state).expect("history");
        assert_eq!(history.render(), "No history");
    }

    #[tokio::test]
    async fn complete_then_status_and_history_flow() {
        let workspace = TempWorkspace::new();
        let notifier = Arc::new(InMemoryNotificationGateway::default());
        let state = workspace.app_state(Arc::clone(&notifier));

        let completed = complete_task_impl(&state).await.expect("complete");
        assert_eq!(completed.history_length, 1);
        assert_eq!(completed.notification_id, Some("h1".to_string()));
        assert_eq!(completed.warning, None);
        assert_eq!(notifier.scheduled()[0].after_ms, 10_000);
        assert_eq!(notifier.scheduled()[0].content.title, "Time to wash the car! 🚗");

        let status = get_countdown_status_impl(&state).expect("status");
        assert_eq!(status.phase, "ready");
        assert_eq!(status.is_overdue, Some(false));
        assert_eq!(status.headline, Some("Car wash due in ...".to_string()));

        let second = complete_task_impl(&state).await.expect("second complete");
        assert_eq!(second.history_length, 2);
        assert_eq!(notifier.cancelled().len(), 1);

        let history = get_history_impl(&state).expect("history");
        assert_eq!(history.entries.len(), 2);
        assert!(history.entries[0].completed_at >= history.entries[1].completed_at);
        assert!(workspace.command_log().contains("\"command\":\"complete_task\""));
    }

    #[tokio::test]
    async fn record_survives_new_app_state() {
        let workspace = TempWorkspace::new();
        {
            let state = workspace.app_state(Arc::new(InMemoryNotificationGateway::default()));
            complete_task_impl(&state).await.expect("complete");
        }

        let reopened = workspace.app_state(Arc::new(InMemoryNotificationGateway::default()));
        let status = get_countdown_status_impl(&reopened).expect("status");
        assert_eq!(status.phase, "ready");
        let record = reopened.controller().record().expect("record").expect("persisted");
        assert_eq!(record.completed_at.len(), 1);
    }

    #[tokio::test]
    async fn denied_permission_reports_warning() {
        let workspace = TempWorkspace::new();
        let state = workspace.app_state(Arc::new(InMemoryNotificationGateway::with_permission(
            PermissionStatus::Denied,
        )));

        let completed = complete_task_impl(&state).await.expect("complete");
        assert_eq!(completed.notification_id, None);
        assert!(completed.warning.is_some());
        assert!(workspace.command_log().contains("\"level\":\"warn\""));
    }

    #[tokio::test]
    async fn terminal_state_follows_loaded_notification_setting() {
        let workspace = TempWorkspace::new();
        let config_dir = workspace.path.join("config");
        fs::create_dir_all(&config_dir).expect("create config dir");
        fs::write(
            config_dir.join("app.json"),
            serde_json::json!({"schema": 1, "notificationsEnabled": false, "taskLabel": "Oil change"})
                .to_string(),
        )
        .expect("write app.json");

        let state = AppState::new(workspace.path.clone()).expect("initialize terminal state");
        assert_eq!(state.config().task_label, "Oil change");
        let completed = complete_task_impl(&state).await.expect("complete");
        assert_eq!(completed.notification_id, None);
        assert!(completed.warning.is_some());
    }

    #[test]
    fn overdue_status_uses_overdue_headline() {
        let status = CountdownStatus {
            is_overdue: true,
            distance: Default::default(),
        };
        assert_eq!(headline(&status, "Car wash"), "Car wash overdue by");
    }

    #[test]
    fn command_error_is_written_to_log() {
        let workspace = TempWorkspace::new();
        let state = workspace.app_state(Arc::new(InMemoryNotificationGateway::default()));
        let message = state.command_error(
            "get_history",
            &InfraError::StorageUnavailable("locked".to_string()),
        );
        assert!(message.contains("locked"));
        assert!(workspace.command_log().contains("\"level\":\"error\""));
    }

    #[test]
    fn notifications_setting_is_persisted() {
        let workspace = TempWorkspace::new();
        let state = workspace.app_state(Arc::new(InMemoryNotificationGateway::default()));
        let response = set_notifications_enabled_impl(&state, false).expect("disable");
        assert!(!response.notifications_enabled);
        let config = load_countdown_config(state.config_dir()).expect("reload config");
        assert!(!config.notifications_enabled);
    }
}
