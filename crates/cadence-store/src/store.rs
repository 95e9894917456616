//! The `Store` trait — entity storage plus task coordination.
//!
//! Four entity kinds (Project, Environment, Ref, Metric) each expose the
//! same method family: set / delete / get / exists / list / count. Lookups
//! return `Option` when the key is absent; list methods return an owned
//! snapshot map that callers may mutate freely.
//!
//! The task coordination surface lives on the same trait because the
//! distributed implementation shares the backend connection: lease keys,
//! the executed-task counter, and per-process keepalive records all live
//! in the same store.

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;

use cadence_core::{Environment, Metric, Project, Ref, TaskType};

use crate::error::StoreResult;

/// Entity store and task coordinator contract, implemented by
/// [`LocalStore`](crate::LocalStore) (single process) and
/// [`RedisStore`](crate::RedisStore) (shared across processes).
#[async_trait]
pub trait Store: Send + Sync {
    // ── Projects ───────────────────────────────────────────────────

    /// Upsert a project by its computed key. Idempotent.
    async fn set_project(&self, project: &Project) -> StoreResult<()>;
    /// Delete by key. No-op if absent.
    async fn del_project(&self, key: &str) -> StoreResult<()>;
    async fn get_project(&self, key: &str) -> StoreResult<Option<Project>>;
    async fn project_exists(&self, key: &str) -> StoreResult<bool>;
    /// Full snapshot copy, never a live view.
    async fn projects(&self) -> StoreResult<HashMap<String, Project>>;
    async fn projects_count(&self) -> StoreResult<i64>;

    // ── Environments ───────────────────────────────────────────────

    async fn set_environment(&self, environment: &Environment) -> StoreResult<()>;
    async fn del_environment(&self, key: &str) -> StoreResult<()>;
    async fn get_environment(&self, key: &str) -> StoreResult<Option<Environment>>;
    async fn environment_exists(&self, key: &str) -> StoreResult<bool>;
    async fn environments(&self) -> StoreResult<HashMap<String, Environment>>;
    async fn environments_count(&self) -> StoreResult<i64>;

    // ── Refs ───────────────────────────────────────────────────────

    async fn set_ref(&self, r: &Ref) -> StoreResult<()>;
    async fn del_ref(&self, key: &str) -> StoreResult<()>;
    async fn get_ref(&self, key: &str) -> StoreResult<Option<Ref>>;
    async fn ref_exists(&self, key: &str) -> StoreResult<bool>;
    async fn refs(&self) -> StoreResult<HashMap<String, Ref>>;
    async fn refs_count(&self) -> StoreResult<i64>;

    // ── Metrics ────────────────────────────────────────────────────

    async fn set_metric(&self, metric: &Metric) -> StoreResult<()>;
    async fn del_metric(&self, key: &str) -> StoreResult<()>;
    async fn get_metric(&self, key: &str) -> StoreResult<Option<Metric>>;
    async fn metric_exists(&self, key: &str) -> StoreResult<bool>;
    async fn metrics(&self) -> StoreResult<HashMap<String, Metric>>;
    async fn metrics_count(&self) -> StoreResult<i64>;

    // ── Task coordination ──────────────────────────────────────────

    /// Try to claim the `(task_type, unique_id)` lease for `owner_id`.
    ///
    /// Returns `true` when this process may execute the task now. A lease
    /// held by a dead owner (expired keepalive) is taken over.
    async fn queue_task(
        &self,
        task_type: TaskType,
        unique_id: &str,
        owner_id: &str,
    ) -> StoreResult<bool>;

    /// Release a lease. Idempotent; the executed-task counter is only
    /// incremented when a lease was actually removed.
    async fn unqueue_task(&self, task_type: TaskType, unique_id: &str) -> StoreResult<()>;

    /// Outstanding lease count across all task types.
    async fn currently_queued_tasks_count(&self) -> StoreResult<u64>;

    /// Monotonically increasing count of completed tasks.
    async fn executed_tasks_count(&self) -> StoreResult<u64>;

    /// Upsert a TTL'd liveness record for `owner_id`, resetting the TTL
    /// on every call. Returns `true` when the record was newly created.
    async fn set_keepalive(&self, owner_id: &str, ttl: Duration) -> StoreResult<bool>;

    /// Whether `owner_id` currently has a live keepalive record.
    async fn keepalive_exists(&self, owner_id: &str) -> StoreResult<bool>;
}
