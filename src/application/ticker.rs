use crate::application::countdown_controller::{CountdownController, CountdownView};
use crate::infrastructure::key_value_store::KeyValueStore;
use crate::infrastructure::notification_gateway::NotificationGateway;
use std::sync::Arc;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{sleep, Duration as TokioDuration};
use tracing::{debug, warn};

/// Owns the periodic recomputation task. Dropping the handle stops the task.
pub struct TickerHandle {
    task: JoinHandle<()>,
    updates: watch::Receiver<CountdownView>,
}

impl TickerHandle {
    pub fn subscribe(&self) -> watch::Receiver<CountdownView> {
        self.updates.clone()
    }

    pub fn latest(&self) -> CountdownView {
        *self.updates.borrow()
    }

    pub fn stop(self) {
        self.task.abort();
    }
}

impl Drop for TickerHandle {
    fn drop(&mut self) {
        self.task.abort();
        debug!("[TICK] ticker stopped");
    }
}

pub struct CountdownTicker;

impl CountdownTicker {
    /// Publishes a fresh view immediately and then after every `period`.
    /// Each wait starts after the previous tick finished, so the cadence drifts with tick cost.
    pub fn spawn<S, N>(controller: Arc<CountdownController<S, N>>, period: TokioDuration) -> TickerHandle
    where
        S: KeyValueStore + 'static,
        N: NotificationGateway + 'static,
    {
        let initial = controller
            .tick(controller.now())
            .unwrap_or(CountdownView::Loading);
        let (sender, updates) = watch::channel(initial);

        let task = tokio::spawn(async move {
            loop {
                sleep(period).await;
                match controller.tick(controller.now()) {
                    Ok(view) => {
                        sender.send_replace(view);
                    }
                    Err(error) => warn!("[TICK] failed to recompute countdown: {error}"),
                }
            }
        });

        TickerHandle { task, updates }
    }
}
