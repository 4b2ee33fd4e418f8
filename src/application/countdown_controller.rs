use crate::domain::countdown::{countdown_status, due_at};
use crate::domain::models::{CountdownRecord, CountdownStatus, NotificationHandle, ReminderContent};
use crate::infrastructure::error::InfraError;
use crate::infrastructure::key_value_store::KeyValueStore;
use crate::infrastructure::notification_gateway::{NotificationGateway, PermissionStatus};
use crate::infrastructure::record_codec::{load_record, save_record};
use chrono::{DateTime, Duration, Utc};
use serde::Serialize;
use std::sync::{Arc, Mutex, MutexGuard};
use tracing::{debug, info, warn};

type NowProvider = Arc<dyn Fn() -> DateTime<Utc> + Send + Sync>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "phase", rename_all = "snake_case")]
pub enum ControllerPhase {
    Uninitialized,
    Loading,
    Ready { is_overdue: bool },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum CountdownView {
    Loading,
    Ready(CountdownStatus),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", content = "detail", rename_all = "snake_case")]
pub enum ReminderOutcome {
    Scheduled(NotificationHandle),
    PermissionDenied,
    SchedulingFailed(String),
}

impl ReminderOutcome {
    /// Host-facing warning for completions recorded without a reminder.
    pub fn warning(&self) -> Option<&'static str> {
        match self {
            Self::Scheduled(_) => None,
            Self::PermissionDenied => {
                Some("Unable to schedule notification. Enable the notification permission for schedule")
            }
            Self::SchedulingFailed(_) => Some("Unable to schedule notification"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompletionOutcome {
    pub record: CountdownRecord,
    pub reminder: ReminderOutcome,
}

#[derive(Debug)]
struct ControllerState {
    phase: ControllerPhase,
    record: Option<CountdownRecord>,
}

pub struct CountdownController<S, N>
where
    S: KeyValueStore,
    N: NotificationGateway,
{
    store: Arc<S>,
    notifier: Arc<N>,
    frequency_ms: u64,
    reminder: ReminderContent,
    state: Mutex<ControllerState>,
    now_provider: NowProvider,
}

impl<S, N> CountdownController<S, N>
where
    S: KeyValueStore,
    N: NotificationGateway,
{
    pub fn new(store: Arc<S>, notifier: Arc<N>, frequency_ms: u64, reminder: ReminderContent) -> Self {
        Self {
            store,
            notifier,
            frequency_ms,
            reminder,
            state: Mutex::new(ControllerState {
                phase: ControllerPhase::Uninitialized,
                record: None,
            }),
            now_provider: Arc::new(Utc::now),
        }
    }

    pub fn with_now_provider(mut self, now_provider: NowProvider) -> Self {
        self.now_provider = now_provider;
        self
    }

    pub fn now(&self) -> DateTime<Utc> {
        (self.now_provider)()
    }

    pub fn frequency(&self) -> Duration {
        i64::try_from(self.frequency_ms)
            .ok()
            .and_then(Duration::try_milliseconds)
            .unwrap_or(Duration::MAX)
    }

    pub fn phase(&self) -> Result<ControllerPhase, InfraError> {
        Ok(self.lock_state()?.phase)
    }

    pub fn record(&self) -> Result<Option<CountdownRecord>, InfraError> {
        Ok(self.lock_state()?.record.clone())
    }

    /// Loads the persisted record once. Later calls only report the current view.
    pub fn initialize(&self) -> Result<CountdownView, InfraError> {
        {
            let mut state = self.lock_state()?;
            if state.phase != ControllerPhase::Uninitialized {
                drop(state);
                return self.tick(self.now());
            }
            state.phase = ControllerPhase::Loading;
        }

        let loaded = match load_record(self.store.as_ref()) {
            Ok(record) => record,
            Err(error) => {
                self.lock_state()?.phase = ControllerPhase::Uninitialized;
                warn!("[COUNTDOWN] failed to load countdown record: {error}");
                return Err(error);
            }
        };
        debug!(
            "[COUNTDOWN] loaded record with {} completions",
            loaded.as_ref().map_or(0, |record| record.completed_at.len())
        );

        self.lock_state()?.record = loaded;
        self.tick(self.now())
    }

    /// Recomputes the countdown for `now`.
    ///
    /// The controller leaves `Loading` only once a completion instant is known, so a
    /// record without completions keeps reporting `Loading`.
    pub fn tick(&self, now: DateTime<Utc>) -> Result<CountdownView, InfraError> {
        let mut state = self.lock_state()?;
        if state.phase == ControllerPhase::Uninitialized {
            return Ok(CountdownView::Loading);
        }

        let Some(last_completed_at) = state
            .record
            .as_ref()
            .and_then(CountdownRecord::last_completed_at)
        else {
            return Ok(CountdownView::Loading);
        };

        let status = countdown_status(now, due_at(Some(last_completed_at), self.frequency(), now));
        state.phase = ControllerPhase::Ready {
            is_overdue: status.is_overdue,
        };
        Ok(CountdownView::Ready(status))
    }

    /// Records a completion. An uninitialized controller loads the persisted record first
    /// so earlier history is kept.
    pub async fn complete(&self) -> Result<CompletionOutcome, InfraError> {
        if self.phase()? == ControllerPhase::Uninitialized {
            self.initialize()?;
        }
        let now = self.now();
        let previous = self.lock_state()?.record.clone();

        let reminder = self.schedule_reminder().await;
        let new_handle = match &reminder {
            ReminderOutcome::Scheduled(handle) => Some(handle.clone()),
            ReminderOutcome::PermissionDenied | ReminderOutcome::SchedulingFailed(_) => None,
        };

        if let Some(old_handle) = previous
            .as_ref()
            .and_then(|record| record.current_notification_id.as_ref())
        {
            if let Err(error) = self.notifier.cancel(old_handle).await {
                warn!("[NOTIFY] failed to cancel reminder {old_handle}: {error}");
            }
        }

        let completed_at = match previous.as_ref().and_then(CountdownRecord::last_completed_at) {
            Some(last) if last > now => {
                warn!("[COUNTDOWN] clock is behind last completion; recording at {last}");
                last
            }
            _ => now,
        };
        let record = CountdownRecord::after_completion(previous.as_ref(), completed_at, new_handle.clone());

        if let Err(error) = save_record(self.store.as_ref(), &record) {
            warn!("[COUNTDOWN] failed to persist completion: {error}");
            if let Some(handle) = &new_handle {
                if let Err(cancel_error) = self.notifier.cancel(handle).await {
                    warn!("[NOTIFY] failed to withdraw unsaved reminder {handle}: {cancel_error}");
                }
            }
            return Err(error);
        }

        {
            let mut state = self.lock_state()?;
            let status = countdown_status(now, due_at(Some(completed_at), self.frequency(), now));
            state.record = Some(record.clone());
            state.phase = ControllerPhase::Ready {
                is_overdue: status.is_overdue,
            };
        }

        info!(
            "[COUNTDOWN] completion recorded at {} ({} total)",
            completed_at.to_rfc3339(),
            record.completed_at.len()
        );
        Ok(CompletionOutcome { record, reminder })
    }

    async fn schedule_reminder(&self) -> ReminderOutcome {
        match self.notifier.request_permission().await {
            Ok(PermissionStatus::Granted) => {}
            Ok(PermissionStatus::Denied) => {
                warn!("[NOTIFY] notification permission denied; completion recorded without reminder");
                return ReminderOutcome::PermissionDenied;
            }
            Err(error) => {
                warn!("[NOTIFY] permission request failed: {error}");
                return ReminderOutcome::PermissionDenied;
            }
        }

        match self
            .notifier
            .schedule_one_shot(self.frequency_ms, &self.reminder)
            .await
        {
            Ok(handle) => ReminderOutcome::Scheduled(handle),
            Err(error) => {
                warn!("[NOTIFY] failed to schedule reminder: {error}");
                ReminderOutcome::SchedulingFailed(error.to_string())
            }
        }
    }

    fn lock_state(&self) -> Result<MutexGuard<'_, ControllerState>, InfraError> {
        self.state
            .lock()
            .map_err(|error| InfraError::StorageUnavailable(format!("controller state lock poisoned: {error}")))
    }
}
