//! Task controller — the per-process face of the distributed coordinator.
//!
//! Wraps the store's lease primitives with this process's identity and
//! runs the keepalive refresh loop that keeps our leases defensible.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tracing::{debug, warn};

use cadence_core::TaskType;
use cadence_store::{Store, StoreResult};

use crate::error::{SchedulerError, SchedulerResult};

/// Queue/unqueue facade bound to one process identity.
pub struct TaskController {
    store: Arc<dyn Store>,
    process_id: String,
}

impl TaskController {
    pub fn new(store: Arc<dyn Store>, process_id: impl Into<String>) -> Self {
        Self {
            store,
            process_id: process_id.into(),
        }
    }

    pub fn process_id(&self) -> &str {
        &self.process_id
    }

    pub fn store(&self) -> &Arc<dyn Store> {
        &self.store
    }

    /// Try to claim a task lease for this process.
    pub async fn queue(&self, task_type: TaskType, unique_id: &str) -> StoreResult<bool> {
        let granted = self
            .store
            .queue_task(task_type, unique_id, &self.process_id)
            .await?;
        debug!(task = %task_type, unique_id, granted, "task queue decision");
        Ok(granted)
    }

    /// Release a task lease after the handler has finished.
    pub async fn unqueue(&self, task_type: TaskType, unique_id: &str) -> StoreResult<()> {
        self.store.unqueue_task(task_type, unique_id).await?;
        debug!(task = %task_type, unique_id, "task unqueued");
        Ok(())
    }

    /// Refresh this process's keepalive record until shutdown.
    ///
    /// The refresh interval must be shorter than the TTL, otherwise the
    /// record can expire between refreshes and other processes would take
    /// over leases we still hold.
    pub async fn keepalive_loop(
        &self,
        ttl: Duration,
        refresh: Duration,
        mut shutdown: watch::Receiver<bool>,
    ) -> SchedulerResult<()> {
        if refresh >= ttl {
            return Err(SchedulerError::KeepaliveInterval {
                ttl_secs: ttl.as_secs(),
                refresh_secs: refresh.as_secs(),
            });
        }

        self.refresh_keepalive(ttl).await;
        let mut ticker = tokio::time::interval(refresh);
        ticker.tick().await;
        loop {
            tokio::select! {
                _ = ticker.tick() => self.refresh_keepalive(ttl).await,
                _ = shutdown.changed() => {
                    debug!(process_id = %self.process_id, "keepalive loop stopped");
                    return Ok(());
                }
            }
        }
    }

    async fn refresh_keepalive(&self, ttl: Duration) {
        match self.store.set_keepalive(&self.process_id, ttl).await {
            Ok(created) => {
                debug!(process_id = %self.process_id, created, "keepalive refreshed");
            }
            Err(e) => {
                warn!(process_id = %self.process_id, error = %e, "keepalive refresh failed");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cadence_store::LocalStore;

    fn controller() -> TaskController {
        TaskController::new(Arc::new(LocalStore::new()), "cadence-test")
    }

    #[tokio::test]
    async fn queue_then_unqueue_round_trip() {
        let c = controller();
        assert!(c.queue(TaskType::PullProject, "group/app").await.unwrap());
        assert!(!c.queue(TaskType::PullProject, "group/app").await.unwrap());
        c.unqueue(TaskType::PullProject, "group/app").await.unwrap();
        assert!(c.queue(TaskType::PullProject, "group/app").await.unwrap());
    }

    #[tokio::test]
    async fn keepalive_loop_rejects_refresh_not_shorter_than_ttl() {
        let c = controller();
        let (_tx, rx) = watch::channel(false);
        let result = c
            .keepalive_loop(Duration::from_secs(10), Duration::from_secs(10), rx)
            .await;
        assert!(matches!(
            result,
            Err(SchedulerError::KeepaliveInterval { .. })
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn keepalive_loop_stops_on_shutdown() {
        let c = Arc::new(controller());
        let (tx, rx) = watch::channel(false);
        let handle = tokio::spawn({
            let c = c.clone();
            async move {
                c.keepalive_loop(Duration::from_secs(30), Duration::from_secs(10), rx)
                    .await
            }
        });

        tokio::time::advance(Duration::from_secs(25)).await;
        tx.send(true).unwrap();
        let result = handle.await.unwrap();
        assert!(result.is_ok());
    }
}
