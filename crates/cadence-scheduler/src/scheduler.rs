//! Interval scheduler — drives task types on init and on a timer.
//!
//! The scheduler only decides *when* a task type should be considered;
//! whether this process actually runs it is the task controller's call
//! (lease dedup across processes), and *what* it does is the registered
//! handler's. One independent timer per scheduled task type; a single
//! watch signal stops them all. In-flight handlers are not aborted.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use serde::Deserialize;
use tokio::sync::watch;
use tracing::{debug, error, info};

use cadence_core::TaskType;

use crate::controller::TaskController;
use crate::registry::TaskRegistry;

/// When and how often one task type runs.
#[derive(Debug, Clone, Copy, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct TaskSchedule {
    pub run_on_init: bool,
    pub run_on_schedule: bool,
    pub interval_seconds: u64,
}

impl Default for TaskSchedule {
    fn default() -> Self {
        Self {
            run_on_init: false,
            run_on_schedule: false,
            interval_seconds: 0,
        }
    }
}

/// Per-task-type schedule table.
#[derive(Debug, Clone, Default)]
pub struct SchedulerConfig {
    tasks: HashMap<TaskType, TaskSchedule>,
}

impl SchedulerConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_map(tasks: HashMap<TaskType, TaskSchedule>) -> Self {
        Self { tasks }
    }

    pub fn set(&mut self, task_type: TaskType, schedule: TaskSchedule) {
        self.tasks.insert(task_type, schedule);
    }

    /// Builder-style [`set`](Self::set).
    pub fn with_task(mut self, task_type: TaskType, schedule: TaskSchedule) -> Self {
        self.set(task_type, schedule);
        self
    }

    pub fn get(&self, task_type: TaskType) -> Option<TaskSchedule> {
        self.tasks.get(&task_type).copied()
    }

    pub fn iter(&self) -> impl Iterator<Item = (TaskType, TaskSchedule)> + '_ {
        self.tasks.iter().map(|(t, s)| (*t, *s))
    }
}

/// Drives task triggering according to a [`SchedulerConfig`].
pub struct Scheduler {
    controller: Arc<TaskController>,
    registry: Arc<TaskRegistry>,
    config: SchedulerConfig,
}

impl Scheduler {
    pub fn new(
        controller: Arc<TaskController>,
        registry: Arc<TaskRegistry>,
        config: SchedulerConfig,
    ) -> Self {
        Self {
            controller,
            registry,
            config,
        }
    }

    /// Run on-init triggers, then the periodic timers, until shutdown.
    ///
    /// Returns once all timers have stopped. Handlers spawned before
    /// shutdown run to completion on the runtime.
    pub async fn run(&self, shutdown: watch::Receiver<bool>) {
        let mut handles = Vec::new();

        for (task_type, schedule) in self.config.iter() {
            if schedule.run_on_init {
                Self::trigger(self.controller.clone(), self.registry.clone(), task_type).await;
            }

            if !schedule.run_on_schedule {
                continue;
            }
            if schedule.interval_seconds == 0 {
                // A zero interval would busy-loop; leave the task type off
                // for the process lifetime instead.
                error!(
                    task = %task_type,
                    "scheduling enabled with a zero interval, task type disabled"
                );
                continue;
            }

            let controller = self.controller.clone();
            let registry = self.registry.clone();
            let mut shutdown = shutdown.clone();
            let interval = Duration::from_secs(schedule.interval_seconds);
            handles.push(tokio::spawn(async move {
                let mut ticker = tokio::time::interval(interval);
                // The first tick of a tokio interval is immediate; consume
                // it so scheduled tasks first fire after one full interval.
                ticker.tick().await;
                loop {
                    tokio::select! {
                        _ = ticker.tick() => {
                            Self::trigger(controller.clone(), registry.clone(), task_type).await;
                        }
                        _ = shutdown.changed() => {
                            debug!(task = %task_type, "scheduler timer stopped");
                            break;
                        }
                    }
                }
            }));
        }

        info!(timers = handles.len(), "scheduler started");

        let mut shutdown = shutdown;
        let _ = shutdown.changed().await;
        for handle in handles {
            let _ = handle.await;
        }
        info!("scheduler stopped");
    }

    /// Queue one task type and, if this process is granted the lease,
    /// spawn its handler. The lease is released when the handler returns.
    async fn trigger(
        controller: Arc<TaskController>,
        registry: Arc<TaskRegistry>,
        task_type: TaskType,
    ) {
        let Some(handler) = registry.get(task_type) else {
            registry.warn_unregistered(task_type);
            return;
        };

        let unique_id = task_type.to_string();
        match controller.queue(task_type, &unique_id).await {
            Ok(true) => {
                tokio::spawn(async move {
                    if let Err(e) = handler().await {
                        error!(task = %task_type, error = %e, "task handler failed");
                    }
                    if let Err(e) = controller.unqueue(task_type, &unique_id).await {
                        error!(task = %task_type, error = %e, "failed to unqueue task");
                    }
                });
            }
            Ok(false) => {
                debug!(task = %task_type, "task already owned, not triggering");
            }
            Err(e) => {
                error!(task = %task_type, error = %e, "failed to queue task");
            }
        }
    }
}
