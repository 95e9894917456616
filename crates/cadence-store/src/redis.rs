//! Shared store backend for horizontally-scaled deployments.
//!
//! Key layout (stable, shared with existing deployments):
//!
//! | purpose              | key                       | structure                    |
//! |----------------------|---------------------------|------------------------------|
//! | projects             | `projects`                | hash: entity key → JSON      |
//! | environments         | `environments`            | hash: entity key → JSON      |
//! | refs                 | `refs`                    | hash: entity key → JSON      |
//! | metrics              | `metrics`                 | hash: entity key → JSON      |
//! | task lease           | `task:<type>:<id>`        | string: owning process id    |
//! | executed counter     | `tasksExecutedCount`      | integer, INCR on unqueue     |
//! | keepalive            | `keepalive:<process id>`  | empty string, TTL            |
//!
//! All cross-process mutation goes through atomic primitives (SET NX,
//! INCR, TTL'd SET). The one deliberate read-modify-write is the lease
//! takeover: it is gated on the previous owner's keepalive having
//! expired, and a rare double-grant under that race is accepted
//! (handlers are at-least-once).

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use ::redis::AsyncCommands;
use ::redis::aio::ConnectionManager;
use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::debug;

use cadence_core::{Environment, Metric, Project, Ref, TaskType};

use crate::error::{StoreError, StoreResult};
use crate::store::Store;

const PROJECTS_KEY: &str = "projects";
const ENVIRONMENTS_KEY: &str = "environments";
const REFS_KEY: &str = "refs";
const METRICS_KEY: &str = "metrics";
const TASKS_EXECUTED_KEY: &str = "tasksExecutedCount";

fn task_key(task_type: TaskType, unique_id: &str) -> String {
    format!("task:{task_type}:{unique_id}")
}

fn keepalive_key(owner_id: &str) -> String {
    format!("keepalive:{owner_id}")
}

/// Unconditional TTL'd SET for the keepalive record: a refresh while the
/// record is alive must extend the TTL, otherwise the record lapses once
/// per TTL window and live processes look dead to their peers. The GET
/// option reports whether a record already existed.
fn keepalive_set_cmd(owner_id: &str, ttl: Duration) -> ::redis::Cmd {
    let mut cmd = redis::cmd("SET");
    cmd.arg(keepalive_key(owner_id))
        .arg("")
        .arg("EX")
        .arg(ttl.as_secs().max(1))
        .arg("GET");
    cmd
}

/// What to do with a lease that could not be created atomically.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum LeaseDecision {
    /// The lease vanished between the create attempt and the owner read;
    /// claim it.
    Claim,
    /// We already hold this lease; do not run the task twice.
    AlreadyOurs,
    /// Another live process holds the lease.
    HeldByLiveOwner,
    /// The owner's keepalive expired; take the lease over.
    TakeOver,
}

/// Pure decision function for the lease acquisition path, factored out of
/// the connection handling so the truth table is testable without a
/// server.
pub(crate) fn takeover_decision(
    current_owner: Option<&str>,
    requester: &str,
    owner_alive: bool,
) -> LeaseDecision {
    match current_owner {
        None => LeaseDecision::Claim,
        Some(owner) if owner == requester => LeaseDecision::AlreadyOurs,
        Some(_) if owner_alive => LeaseDecision::HeldByLiveOwner,
        Some(_) => LeaseDecision::TakeOver,
    }
}

/// Store backend over a shared Redis instance.
#[derive(Clone)]
pub struct RedisStore {
    con: ConnectionManager,
}

impl RedisStore {
    /// Connect to the backend. Connectivity failure here is meant to be
    /// fatal at process startup.
    pub async fn connect(url: &str) -> StoreResult<Self> {
        let client =
            redis::Client::open(url).map_err(|e| StoreError::Connection(e.to_string()))?;
        let con = client
            .get_connection_manager()
            .await
            .map_err(|e| StoreError::Connection(e.to_string()))?;
        Ok(Self { con })
    }

    async fn hash_set<T: Serialize>(&self, hash: &str, key: &str, value: &T) -> StoreResult<()> {
        let bytes = serde_json::to_vec(value).map_err(|e| StoreError::Serialize(e.to_string()))?;
        let mut con = self.con.clone();
        let _: () = con
            .hset(hash, key, bytes)
            .await
            .map_err(|e| StoreError::Write(e.to_string()))?;
        Ok(())
    }

    async fn hash_del(&self, hash: &str, key: &str) -> StoreResult<()> {
        let mut con = self.con.clone();
        let _: () = con
            .hdel(hash, key)
            .await
            .map_err(|e| StoreError::Write(e.to_string()))?;
        Ok(())
    }

    async fn hash_get<T: DeserializeOwned>(&self, hash: &str, key: &str) -> StoreResult<Option<T>> {
        let mut con = self.con.clone();
        let raw: Option<Vec<u8>> = con
            .hget(hash, key)
            .await
            .map_err(|e| StoreError::Read(e.to_string()))?;
        match raw {
            Some(bytes) => {
                let value = serde_json::from_slice(&bytes)
                    .map_err(|e| StoreError::Deserialize(e.to_string()))?;
                Ok(Some(value))
            }
            None => Ok(None),
        }
    }

    async fn hash_exists(&self, hash: &str, key: &str) -> StoreResult<bool> {
        let mut con = self.con.clone();
        con.hexists(hash, key)
            .await
            .map_err(|e| StoreError::Read(e.to_string()))
    }

    /// Fetch the whole hash and deserialize every value. O(n), acceptable
    /// for the target cardinalities (thousands).
    async fn hash_all<T: DeserializeOwned>(&self, hash: &str) -> StoreResult<HashMap<String, T>> {
        let mut con = self.con.clone();
        let raw: HashMap<String, Vec<u8>> = con
            .hgetall(hash)
            .await
            .map_err(|e| StoreError::Read(e.to_string()))?;
        let mut out = HashMap::with_capacity(raw.len());
        for (key, bytes) in raw {
            let value = serde_json::from_slice(&bytes)
                .map_err(|e| StoreError::Deserialize(e.to_string()))?;
            out.insert(key, value);
        }
        Ok(out)
    }

    async fn hash_len(&self, hash: &str) -> StoreResult<i64> {
        let mut con = self.con.clone();
        con.hlen(hash)
            .await
            .map_err(|e| StoreError::Read(e.to_string()))
    }
}

#[async_trait]
impl Store for RedisStore {
    // ── Projects ───────────────────────────────────────────────────

    async fn set_project(&self, project: &Project) -> StoreResult<()> {
        self.hash_set(PROJECTS_KEY, &project.key(), project).await
    }

    async fn del_project(&self, key: &str) -> StoreResult<()> {
        self.hash_del(PROJECTS_KEY, key).await
    }

    async fn get_project(&self, key: &str) -> StoreResult<Option<Project>> {
        self.hash_get(PROJECTS_KEY, key).await
    }

    async fn project_exists(&self, key: &str) -> StoreResult<bool> {
        self.hash_exists(PROJECTS_KEY, key).await
    }

    async fn projects(&self) -> StoreResult<HashMap<String, Project>> {
        self.hash_all(PROJECTS_KEY).await
    }

    async fn projects_count(&self) -> StoreResult<i64> {
        self.hash_len(PROJECTS_KEY).await
    }

    // ── Environments ───────────────────────────────────────────────

    async fn set_environment(&self, environment: &Environment) -> StoreResult<()> {
        self.hash_set(ENVIRONMENTS_KEY, &environment.key(), environment)
            .await
    }

    async fn del_environment(&self, key: &str) -> StoreResult<()> {
        self.hash_del(ENVIRONMENTS_KEY, key).await
    }

    async fn get_environment(&self, key: &str) -> StoreResult<Option<Environment>> {
        self.hash_get(ENVIRONMENTS_KEY, key).await
    }

    async fn environment_exists(&self, key: &str) -> StoreResult<bool> {
        self.hash_exists(ENVIRONMENTS_KEY, key).await
    }

    async fn environments(&self) -> StoreResult<HashMap<String, Environment>> {
        self.hash_all(ENVIRONMENTS_KEY).await
    }

    async fn environments_count(&self) -> StoreResult<i64> {
        self.hash_len(ENVIRONMENTS_KEY).await
    }

    // ── Refs ───────────────────────────────────────────────────────

    async fn set_ref(&self, r: &Ref) -> StoreResult<()> {
        self.hash_set(REFS_KEY, &r.key(), r).await
    }

    async fn del_ref(&self, key: &str) -> StoreResult<()> {
        self.hash_del(REFS_KEY, key).await
    }

    async fn get_ref(&self, key: &str) -> StoreResult<Option<Ref>> {
        self.hash_get(REFS_KEY, key).await
    }

    async fn ref_exists(&self, key: &str) -> StoreResult<bool> {
        self.hash_exists(REFS_KEY, key).await
    }

    async fn refs(&self) -> StoreResult<HashMap<String, Ref>> {
        self.hash_all(REFS_KEY).await
    }

    async fn refs_count(&self) -> StoreResult<i64> {
        self.hash_len(REFS_KEY).await
    }

    // ── Metrics ────────────────────────────────────────────────────

    async fn set_metric(&self, metric: &Metric) -> StoreResult<()> {
        self.hash_set(METRICS_KEY, &metric.key(), metric).await
    }

    async fn del_metric(&self, key: &str) -> StoreResult<()> {
        self.hash_del(METRICS_KEY, key).await
    }

    async fn get_metric(&self, key: &str) -> StoreResult<Option<Metric>> {
        self.hash_get(METRICS_KEY, key).await
    }

    async fn metric_exists(&self, key: &str) -> StoreResult<bool> {
        self.hash_exists(METRICS_KEY, key).await
    }

    async fn metrics(&self) -> StoreResult<HashMap<String, Metric>> {
        self.hash_all(METRICS_KEY).await
    }

    async fn metrics_count(&self) -> StoreResult<i64> {
        self.hash_len(METRICS_KEY).await
    }

    // ── Task coordination ──────────────────────────────────────────

    async fn queue_task(
        &self,
        task_type: TaskType,
        unique_id: &str,
        owner_id: &str,
    ) -> StoreResult<bool> {
        let key = task_key(task_type, unique_id);
        let mut con = self.con.clone();

        let acquired: bool = con
            .set_nx(&key, owner_id)
            .await
            .map_err(|e| StoreError::Write(e.to_string()))?;
        if acquired {
            return Ok(true);
        }

        let current_owner: Option<String> = con
            .get(&key)
            .await
            .map_err(|e| StoreError::Read(e.to_string()))?;
        let owner_alive = match current_owner.as_deref() {
            Some(owner) if owner != owner_id => self.keepalive_exists(owner).await?,
            _ => false,
        };

        match takeover_decision(current_owner.as_deref(), owner_id, owner_alive) {
            LeaseDecision::AlreadyOurs | LeaseDecision::HeldByLiveOwner => Ok(false),
            LeaseDecision::Claim => {
                let _: () = con
                    .set(&key, owner_id)
                    .await
                    .map_err(|e| StoreError::Write(e.to_string()))?;
                Ok(true)
            }
            LeaseDecision::TakeOver => {
                debug!(task = %task_type, unique_id, owner_id, "taking over lease from dead owner");
                let _: () = con
                    .set(&key, owner_id)
                    .await
                    .map_err(|e| StoreError::Write(e.to_string()))?;
                Ok(true)
            }
        }
    }

    async fn unqueue_task(&self, task_type: TaskType, unique_id: &str) -> StoreResult<()> {
        let key = task_key(task_type, unique_id);
        let mut con = self.con.clone();
        let removed: u64 = con
            .del(&key)
            .await
            .map_err(|e| StoreError::Write(e.to_string()))?;
        if removed > 0 {
            let _: u64 = con
                .incr(TASKS_EXECUTED_KEY, 1u64)
                .await
                .map_err(|e| StoreError::Write(e.to_string()))?;
        }
        Ok(())
    }

    async fn currently_queued_tasks_count(&self) -> StoreResult<u64> {
        let mut con = self.con.clone();
        let mut cursor: u64 = 0;
        let mut count: u64 = 0;
        loop {
            let (next, keys): (u64, Vec<String>) = redis::cmd("SCAN")
                .arg(cursor)
                .arg("MATCH")
                .arg("task:*")
                .arg("COUNT")
                .arg(100)
                .query_async(&mut con)
                .await
                .map_err(|e| StoreError::Read(e.to_string()))?;
            count += keys.len() as u64;
            cursor = next;
            if cursor == 0 {
                break;
            }
        }
        Ok(count)
    }

    async fn executed_tasks_count(&self) -> StoreResult<u64> {
        let mut con = self.con.clone();
        let count: Option<u64> = con
            .get(TASKS_EXECUTED_KEY)
            .await
            .map_err(|e| StoreError::Read(e.to_string()))?;
        Ok(count.unwrap_or(0))
    }

    async fn set_keepalive(&self, owner_id: &str, ttl: Duration) -> StoreResult<bool> {
        let mut con = self.con.clone();
        let previous: Option<String> = keepalive_set_cmd(owner_id, ttl)
            .query_async(&mut con)
            .await
            .map_err(|e| StoreError::Write(e.to_string()))?;
        Ok(previous.is_none())
    }

    async fn keepalive_exists(&self, owner_id: &str) -> StoreResult<bool> {
        let mut con = self.con.clone();
        con.exists(keepalive_key(owner_id))
            .await
            .map_err(|e| StoreError::Read(e.to_string()))
    }
}
