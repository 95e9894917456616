//! Single-process store backend.
//!
//! One independent reader/writer lock per entity kind, so a long Metrics
//! scan never blocks a Project write. Task leases are an in-memory set:
//! a task is granted iff it is not already queued, and the single process
//! is always its own live owner, so keepalive checks are trivially true.

use std::collections::{HashMap, HashSet};
use std::sync::RwLock;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use async_trait::async_trait;

use cadence_core::{Environment, Metric, Project, Ref, TaskType};

use crate::error::{StoreError, StoreResult};
use crate::store::Store;

/// In-process backend for single-instance deployments and tests.
#[derive(Debug, Default)]
pub struct LocalStore {
    projects: RwLock<HashMap<String, Project>>,
    environments: RwLock<HashMap<String, Environment>>,
    refs: RwLock<HashMap<String, Ref>>,
    metrics: RwLock<HashMap<String, Metric>>,
    tasks: RwLock<HashSet<(TaskType, String)>>,
    executed: AtomicU64,
}

impl LocalStore {
    pub fn new() -> Self {
        Self::default()
    }
}

/// Map a poisoned-lock error; poisoning only happens if another thread
/// panicked while holding the guard.
macro_rules! rlock {
    ($lock:expr) => {
        $lock.read().map_err(|_| StoreError::Lock)?
    };
}

macro_rules! wlock {
    ($lock:expr) => {
        $lock.write().map_err(|_| StoreError::Lock)?
    };
}

#[async_trait]
impl Store for LocalStore {
    // ── Projects ───────────────────────────────────────────────────

    async fn set_project(&self, project: &Project) -> StoreResult<()> {
        wlock!(self.projects).insert(project.key(), project.clone());
        Ok(())
    }

    async fn del_project(&self, key: &str) -> StoreResult<()> {
        wlock!(self.projects).remove(key);
        Ok(())
    }

    async fn get_project(&self, key: &str) -> StoreResult<Option<Project>> {
        Ok(rlock!(self.projects).get(key).cloned())
    }

    async fn project_exists(&self, key: &str) -> StoreResult<bool> {
        Ok(rlock!(self.projects).contains_key(key))
    }

    async fn projects(&self) -> StoreResult<HashMap<String, Project>> {
        Ok(rlock!(self.projects).clone())
    }

    async fn projects_count(&self) -> StoreResult<i64> {
        Ok(rlock!(self.projects).len() as i64)
    }

    // ── Environments ───────────────────────────────────────────────

    async fn set_environment(&self, environment: &Environment) -> StoreResult<()> {
        wlock!(self.environments).insert(environment.key(), environment.clone());
        Ok(())
    }

    async fn del_environment(&self, key: &str) -> StoreResult<()> {
        wlock!(self.environments).remove(key);
        Ok(())
    }

    async fn get_environment(&self, key: &str) -> StoreResult<Option<Environment>> {
        Ok(rlock!(self.environments).get(key).cloned())
    }

    async fn environment_exists(&self, key: &str) -> StoreResult<bool> {
        Ok(rlock!(self.environments).contains_key(key))
    }

    async fn environments(&self) -> StoreResult<HashMap<String, Environment>> {
        Ok(rlock!(self.environments).clone())
    }

    async fn environments_count(&self) -> StoreResult<i64> {
        Ok(rlock!(self.environments).len() as i64)
    }

    // ── Refs ───────────────────────────────────────────────────────

    async fn set_ref(&self, r: &Ref) -> StoreResult<()> {
        wlock!(self.refs).insert(r.key(), r.clone());
        Ok(())
    }

    async fn del_ref(&self, key: &str) -> StoreResult<()> {
        wlock!(self.refs).remove(key);
        Ok(())
    }

    async fn get_ref(&self, key: &str) -> StoreResult<Option<Ref>> {
        Ok(rlock!(self.refs).get(key).cloned())
    }

    async fn ref_exists(&self, key: &str) -> StoreResult<bool> {
        Ok(rlock!(self.refs).contains_key(key))
    }

    async fn refs(&self) -> StoreResult<HashMap<String, Ref>> {
        Ok(rlock!(self.refs).clone())
    }

    async fn refs_count(&self) -> StoreResult<i64> {
        Ok(rlock!(self.refs).len() as i64)
    }

    // ── Metrics ────────────────────────────────────────────────────

    async fn set_metric(&self, metric: &Metric) -> StoreResult<()> {
        wlock!(self.metrics).insert(metric.key(), metric.clone());
        Ok(())
    }

    async fn del_metric(&self, key: &str) -> StoreResult<()> {
        wlock!(self.metrics).remove(key);
        Ok(())
    }

    async fn get_metric(&self, key: &str) -> StoreResult<Option<Metric>> {
        Ok(rlock!(self.metrics).get(key).cloned())
    }

    async fn metric_exists(&self, key: &str) -> StoreResult<bool> {
        Ok(rlock!(self.metrics).contains_key(key))
    }

    async fn metrics(&self) -> StoreResult<HashMap<String, Metric>> {
        Ok(rlock!(self.metrics).clone())
    }

    async fn metrics_count(&self) -> StoreResult<i64> {
        Ok(rlock!(self.metrics).len() as i64)
    }

    // ── Task coordination ──────────────────────────────────────────

    async fn queue_task(
        &self,
        task_type: TaskType,
        unique_id: &str,
        _owner_id: &str,
    ) -> StoreResult<bool> {
        Ok(wlock!(self.tasks).insert((task_type, unique_id.to_string())))
    }

    async fn unqueue_task(&self, task_type: TaskType, unique_id: &str) -> StoreResult<()> {
        let removed = wlock!(self.tasks).remove(&(task_type, unique_id.to_string()));
        if removed {
            self.executed.fetch_add(1, Ordering::Relaxed);
        }
        Ok(())
    }

    async fn currently_queued_tasks_count(&self) -> StoreResult<u64> {
        Ok(rlock!(self.tasks).len() as u64)
    }

    async fn executed_tasks_count(&self) -> StoreResult<u64> {
        Ok(self.executed.load(Ordering::Relaxed))
    }

    async fn set_keepalive(&self, _owner_id: &str, _ttl: Duration) -> StoreResult<bool> {
        // A single process is always its own live owner.
        Ok(true)
    }

    async fn keepalive_exists(&self, _owner_id: &str) -> StoreResult<bool> {
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cadence_core::{MetricKind, RefKind};
    use std::collections::BTreeMap;

    fn status_metric(status: &str, value: f64) -> Metric {
        let mut labels = BTreeMap::new();
        labels.insert("project".to_string(), "group/app".to_string());
        labels.insert("ref".to_string(), "main".to_string());
        labels.insert("kind".to_string(), "branch".to_string());
        labels.insert("status".to_string(), status.to_string());
        Metric::new(MetricKind::Status, labels, value)
    }

    #[tokio::test]
    async fn project_round_trip() {
        let store = LocalStore::new();
        let project = Project::new("group/app");

        store.set_project(&project).await.unwrap();
        assert_eq!(
            store.get_project(&project.key()).await.unwrap(),
            Some(project.clone())
        );
        assert!(store.project_exists(&project.key()).await.unwrap());
        assert_eq!(store.projects_count().await.unwrap(), 1);

        store.del_project(&project.key()).await.unwrap();
        assert!(!store.project_exists(&project.key()).await.unwrap());
        assert!(store.get_project(&project.key()).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn set_is_idempotent_upsert() {
        let store = LocalStore::new();
        let mut project = Project::new("group/app");
        store.set_project(&project).await.unwrap();

        project.topics = vec!["rust".to_string()];
        store.set_project(&project).await.unwrap();

        assert_eq!(store.projects_count().await.unwrap(), 1);
        let stored = store.get_project(&project.key()).await.unwrap().unwrap();
        assert_eq!(stored.topics, vec!["rust".to_string()]);
    }

    #[tokio::test]
    async fn delete_absent_is_noop() {
        let store = LocalStore::new();
        store.del_project("12345").await.unwrap();
        store.del_ref("12345").await.unwrap();
        assert_eq!(store.projects_count().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn list_is_a_snapshot() {
        let store = LocalStore::new();
        let project = Project::new("group/app");
        store.set_project(&project).await.unwrap();

        let mut listed = store.projects().await.unwrap();
        listed.clear();

        assert_eq!(store.projects_count().await.unwrap(), 1);
        assert!(store.get_project(&project.key()).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn entity_kinds_are_independent() {
        let store = LocalStore::new();
        let project = Project::new("group/app");
        let environment = Environment::new(&project, 7, "production");
        let r = Ref::new(RefKind::Branch, &project, "main");

        store.set_project(&project).await.unwrap();
        store.set_environment(&environment).await.unwrap();
        store.set_ref(&r).await.unwrap();
        store.set_metric(&status_metric("running", 1.0)).await.unwrap();

        assert_eq!(store.projects_count().await.unwrap(), 1);
        assert_eq!(store.environments_count().await.unwrap(), 1);
        assert_eq!(store.refs_count().await.unwrap(), 1);
        assert_eq!(store.metrics_count().await.unwrap(), 1);

        store.del_project(&project.key()).await.unwrap();
        assert_eq!(store.environments_count().await.unwrap(), 1);
        assert_eq!(store.refs_count().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn queue_grants_once_until_unqueued() {
        let store = LocalStore::new();
        let tt = TaskType::PullRefsFromProjects;

        assert!(store.queue_task(tt, "x", "me").await.unwrap());
        assert!(!store.queue_task(tt, "x", "me").await.unwrap());
        // Different unique id is an independent lease.
        assert!(store.queue_task(tt, "y", "me").await.unwrap());
        assert_eq!(store.currently_queued_tasks_count().await.unwrap(), 2);

        store.unqueue_task(tt, "x").await.unwrap();
        assert!(store.queue_task(tt, "x", "me").await.unwrap());
    }

    #[tokio::test]
    async fn unqueue_is_idempotent_and_counts_executions() {
        let store = LocalStore::new();
        let tt = TaskType::GarbageCollectMetrics;

        // Unqueueing an absent lease does not bump the counter.
        store.unqueue_task(tt, "x").await.unwrap();
        assert_eq!(store.executed_tasks_count().await.unwrap(), 0);

        store.queue_task(tt, "x", "me").await.unwrap();
        store.unqueue_task(tt, "x").await.unwrap();
        assert_eq!(store.executed_tasks_count().await.unwrap(), 1);

        store.unqueue_task(tt, "x").await.unwrap();
        assert_eq!(store.executed_tasks_count().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn keepalive_is_always_alive() {
        let store = LocalStore::new();
        assert!(
            store
                .set_keepalive("me", Duration::from_secs(1))
                .await
                .unwrap()
        );
        assert!(store.keepalive_exists("anyone").await.unwrap());
    }
}
