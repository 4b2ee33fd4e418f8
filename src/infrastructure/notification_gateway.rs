use crate::domain::models::{NotificationHandle, ReminderContent};
use crate::infrastructure::error::InfraError;
use async_trait::async_trait;
use chrono::Utc;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tokio::task::AbortHandle;
use tokio::time::{sleep, Duration as TokioDuration};
use tracing::{debug, info};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PermissionStatus {
    Granted,
    Denied,
}

#[async_trait]
pub trait NotificationGateway: Send + Sync {
    async fn request_permission(&self) -> Result<PermissionStatus, InfraError>;

    async fn schedule_one_shot(
        &self,
        after_ms: u64,
        content: &ReminderContent,
    ) -> Result<NotificationHandle, InfraError>;

    async fn cancel(&self, handle: &NotificationHandle) -> Result<(), InfraError>;
}

pub type DeliverFn = Arc<dyn Fn(&ReminderContent) + Send + Sync>;

static NEXT_NOTIFICATION_ID: AtomicU64 = AtomicU64::new(1);

fn next_handle() -> NotificationHandle {
    let sequence = NEXT_NOTIFICATION_ID.fetch_add(1, Ordering::Relaxed);
    NotificationHandle::new(format!(
        "notification-{}-{sequence}",
        Utc::now().timestamp_micros()
    ))
}

/// One-shot reminders driven by timers on the current tokio runtime.
///
/// Pending reminders live only as long as the runtime; a handle that already fired
/// or belongs to an earlier process cannot be cancelled.
pub struct TokioNotificationGateway {
    permission_granted: bool,
    pending: Arc<Mutex<HashMap<NotificationHandle, AbortHandle>>>,
    deliver: DeliverFn,
}

impl TokioNotificationGateway {
    pub fn new(permission_granted: bool, deliver: DeliverFn) -> Self {
        Self {
            permission_granted,
            pending: Arc::new(Mutex::new(HashMap::new())),
            deliver,
        }
    }

    pub fn pending_count(&self) -> usize {
        self.pending.lock().map(|pending| pending.len()).unwrap_or(0)
    }
}

#[async_trait]
impl NotificationGateway for TokioNotificationGateway {
    async fn request_permission(&self) -> Result<PermissionStatus, InfraError> {
        if self.permission_granted {
            Ok(PermissionStatus::Granted)
        } else {
            Ok(PermissionStatus::Denied)
        }
    }

    async fn schedule_one_shot(
        &self,
        after_ms: u64,
        content: &ReminderContent,
    ) -> Result<NotificationHandle, InfraError> {
        content.validate().map_err(InfraError::Scheduling)?;
        let runtime = tokio::runtime::Handle::try_current()
            .map_err(|error| InfraError::Scheduling(format!("no timer runtime: {error}")))?;

        let handle = next_handle();
        let mut pending = self
            .pending
            .lock()
            .map_err(|error| InfraError::Scheduling(format!("pending lock poisoned: {error}")))?;

        let task_handle = handle.clone();
        let task_pending = Arc::clone(&self.pending);
        let task_content = content.clone();
        let deliver = Arc::clone(&self.deliver);
        let task = runtime.spawn(async move {
            sleep(TokioDuration::from_millis(after_ms)).await;
            if let Ok(mut pending) = task_pending.lock() {
                pending.remove(&task_handle);
            }
            info!("[NOTIFY] delivering reminder {task_handle}");
            deliver(&task_content);
        });
        pending.insert(handle.clone(), task.abort_handle());
        debug!("[NOTIFY] scheduled reminder {handle} in {after_ms}ms");
        Ok(handle)
    }

    async fn cancel(&self, handle: &NotificationHandle) -> Result<(), InfraError> {
        let removed = self
            .pending
            .lock()
            .map_err(|error| InfraError::Cancellation(format!("pending lock poisoned: {error}")))?
            .remove(handle);
        match removed {
            Some(task) => {
                task.abort();
                debug!("[NOTIFY] cancelled reminder {handle}");
                Ok(())
            }
            None => Err(InfraError::Cancellation(format!(
                "no pending reminder with id {handle}"
            ))),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScheduledReminder {
    pub handle: NotificationHandle,
    pub after_ms: u64,
    pub content: ReminderContent,
}

/// One call observed by [`InMemoryNotificationGateway`], in arrival order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GatewayCall {
    RequestPermission,
    Schedule(NotificationHandle),
    Cancel(NotificationHandle),
}

/// Deterministic gateway that records every call. Handles are issued as `h1`, `h2`, ...
#[derive(Debug)]
pub struct InMemoryNotificationGateway {
    permission: PermissionStatus,
    fail_scheduling: Mutex<Option<String>>,
    fail_cancellation: Mutex<Option<String>>,
    scheduled: Mutex<Vec<ScheduledReminder>>,
    calls: Mutex<Vec<GatewayCall>>,
    next_sequence: AtomicUsize,
}

impl Default for InMemoryNotificationGateway {
    fn default() -> Self {
        Self::with_permission(PermissionStatus::Granted)
    }
}

impl InMemoryNotificationGateway {
    pub fn with_permission(permission: PermissionStatus) -> Self {
        Self {
            permission,
            fail_scheduling: Mutex::new(None),
            fail_cancellation: Mutex::new(None),
            scheduled: Mutex::new(Vec::new()),
            calls: Mutex::new(Vec::new()),
            next_sequence: AtomicUsize::new(1),
        }
    }

    pub fn fail_scheduling_with(&self, message: Option<String>) {
        if let Ok(mut guard) = self.fail_scheduling.lock() {
            *guard = message;
        }
    }

    pub fn fail_cancellation_with(&self, message: Option<String>) {
        if let Ok(mut guard) = self.fail_cancellation.lock() {
            *guard = message;
        }
    }

    pub fn scheduled(&self) -> Vec<ScheduledReminder> {
        self.scheduled
            .lock()
            .map(|scheduled| scheduled.clone())
            .unwrap_or_default()
    }

    pub fn calls(&self) -> Vec<GatewayCall> {
        self.calls.lock().map(|calls| calls.clone()).unwrap_or_default()
    }

    pub fn cancelled(&self) -> Vec<NotificationHandle> {
        self.calls()
            .into_iter()
            .filter_map(|call| match call {
                GatewayCall::Cancel(handle) => Some(handle),
                GatewayCall::RequestPermission | GatewayCall::Schedule(_) => None,
            })
            .collect()
    }

    fn record_call(&self, call: GatewayCall) -> Result<(), InfraError> {
        self.calls
            .lock()
            .map_err(|error| InfraError::Scheduling(format!("call log lock poisoned: {error}")))?
            .push(call);
        Ok(())
    }
}

#[async_trait]
impl NotificationGateway for InMemoryNotificationGateway {
    async fn request_permission(&self) -> Result<PermissionStatus, InfraError> {
        self.record_call(GatewayCall::RequestPermission)?;
        Ok(self.permission)
    }

    async fn schedule_one_shot(
        &self,
        after_ms: u64,
        content: &ReminderContent,
    ) -> Result<NotificationHandle, InfraError> {
        if let Some(message) = self
            .fail_scheduling
            .lock()
            .map_err(|error| InfraError::Scheduling(format!("failure lock poisoned: {error}")))?
            .clone()
        {
            return Err(InfraError::Scheduling(message));
        }

        let sequence = self.next_sequence.fetch_add(1, Ordering::SeqCst);
        let handle = NotificationHandle::new(format!("h{sequence}"));
        self.scheduled
            .lock()
            .map_err(|error| InfraError::Scheduling(format!("scheduled lock poisoned: {error}")))?
            .push(ScheduledReminder {
                handle: handle.clone(),
                after_ms,
                content: content.clone(),
            });
        self.record_call(GatewayCall::Schedule(handle.clone()))?;
        Ok(handle)
    }

    async fn cancel(&self, handle: &NotificationHandle) -> Result<(), InfraError> {
        self.record_call(GatewayCall::Cancel(handle.clone()))?;
        if let Some(message) = self
            .fail_cancellation
            .lock()
            .map_err(|error| InfraError::Cancellation(format!("failure lock poisoned: {error}")))?
            .clone()
        {
            return Err(InfraError::Cancellation(message));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_content() -> ReminderContent {
        ReminderContent {
            title: "Time to wash the car!".to_string(),
            sound: true,
        }
    }

    fn counting_deliver() -> (DeliverFn, Arc<AtomicUsize>) {
        let delivered = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&delivered);
        let deliver: DeliverFn = Arc::new(move |_content: &ReminderContent| {
            counter.fetch_add(1, Ordering::SeqCst);
        });
        (deliver, delivered)
    }

    #[tokio::test]
    async fn tokio_gateway_reports_configured_permission() {
        let (deliver, _) = counting_deliver();
        let granted = TokioNotificationGateway::new(true, Arc::clone(&deliver));
        let denied = TokioNotificationGateway::new(false, deliver);
        assert_eq!(
            granted.request_permission().await.expect("permission"),
            PermissionStatus::Granted
        );
        assert_eq!(
            denied.request_permission().await.expect("permission"),
            PermissionStatus::Denied
        );
    }

    #[tokio::test(start_paused = true)]
    async fn tokio_gateway_delivers_once_after_delay() {
        let (deliver, delivered) = counting_deliver();
        let gateway = TokioNotificationGateway::new(true, deliver);
        let handle = gateway
            .schedule_one_shot(10_000, &sample_content())
            .await
            .expect("schedule");
        assert_eq!(gateway.pending_count(), 1);

        sleep(TokioDuration::from_millis(9_000)).await;
        assert_eq!(delivered.load(Ordering::SeqCst), 0);

        sleep(TokioDuration::from_millis(2_000)).await;
        assert_eq!(delivered.load(Ordering::SeqCst), 1);
        assert_eq!(gateway.pending_count(), 0);
        assert!(gateway.cancel(&handle).await.is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn tokio_gateway_cancel_prevents_delivery() {
        let (deliver, delivered) = counting_deliver();
        let gateway = TokioNotificationGateway::new(true, deliver);
        let handle = gateway
            .schedule_one_shot(5_000, &sample_content())
            .await
            .expect("schedule");
        gateway.cancel(&handle).await.expect("cancel pending reminder");

        sleep(TokioDuration::from_millis(10_000)).await;
        assert_eq!(delivered.load(Ordering::SeqCst), 0);
        assert_eq!(gateway.pending_count(), 0);
    }

    #[tokio::test]
    async fn tokio_gateway_rejects_unknown_handle() {
        let (deliver, _) = counting_deliver();
        let gateway = TokioNotificationGateway::new(true, deliver);
        let result = gateway.cancel(&NotificationHandle::new("from-previous-run")).await;
        assert!(matches!(result, Err(InfraError::Cancellation(_))));
    }

    #[tokio::test]
    async fn in_memory_gateway_issues_sequential_handles() {
        let gateway = InMemoryNotificationGateway::default();
        let first = gateway
            .schedule_one_shot(1_000, &sample_content())
            .await
            .expect("first");
        let second = gateway
            .schedule_one_shot(1_000, &sample_content())
            .await
            .expect("second");
        assert_eq!(first, NotificationHandle::new("h1"));
        assert_eq!(second, NotificationHandle::new("h2"));
        assert_eq!(gateway.scheduled().len(), 2);
    }

    #[tokio::test]
    async fn in_memory_gateway_records_failed_cancellation() {
        let gateway = InMemoryNotificationGateway::default();
        gateway.fail_cancellation_with(Some("gone".to_string()));
        let result = gateway.cancel(&NotificationHandle::new("h9")).await;
        assert!(result.is_err());
        assert_eq!(gateway.cancelled(), vec![NotificationHandle::new("h9")]);
    }

    #[tokio::test]
    async fn in_memory_gateway_logs_calls_in_arrival_order() {
        let gateway = InMemoryNotificationGateway::with_permission(PermissionStatus::Denied);
        assert_eq!(
            gateway.request_permission().await.expect("permission"),
            PermissionStatus::Denied
        );
        let handle = gateway
            .schedule_one_shot(1_000, &sample_content())
            .await
            .expect("schedule");
        gateway.cancel(&handle).await.expect("cancel");
        assert_eq!(
            gateway.calls(),
            vec![
                GatewayCall::RequestPermission,
                GatewayCall::Schedule(NotificationHandle::new("h1")),
                GatewayCall::Cancel(NotificationHandle::new("h1")),
            ]
        );
    }
}
