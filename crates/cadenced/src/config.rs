//! Daemon configuration, loaded from a TOML file.
//!
//! Absent sections fall back to defaults, so a minimal deployment needs
//! nothing but a `[[projects]]` entry. Per-task schedule overrides merge
//! over the built-in schedules rather than replacing the whole table.

use std::collections::HashMap;
use std::path::Path;

use anyhow::Context;
use serde::Deserialize;

use cadence_core::{ProjectSettings, TaskType, Wildcard};
use cadence_scheduler::{SchedulerConfig, TaskSchedule};

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct Config {
    /// Shared backend URL. Absent means single-process in-memory state.
    pub redis_url: Option<String>,
    pub keepalive: KeepaliveConfig,
    /// Settings applied to projects that carry no overrides of their own.
    pub defaults: ProjectSettings,
    pub projects: Vec<ProjectConfig>,
    pub wildcards: Vec<Wildcard>,
    /// `[schedule.<task_type>]` blocks overriding the built-in schedules.
    pub schedule: HashMap<TaskType, TaskSchedule>,
}

#[derive(Debug, Clone, Copy, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct KeepaliveConfig {
    pub ttl_secs: u64,
    pub refresh_secs: u64,
}

impl Default for KeepaliveConfig {
    fn default() -> Self {
        Self {
            ttl_secs: 30,
            refresh_secs: 5,
        }
    }
}

/// One explicitly configured project.
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct ProjectConfig {
    pub name: String,
    pub settings: Option<ProjectSettings>,
}

impl ProjectConfig {
    pub fn resolved_settings(&self, defaults: &ProjectSettings) -> ProjectSettings {
        self.settings.clone().unwrap_or_else(|| defaults.clone())
    }
}

impl Config {
    pub fn from_file(path: &Path) -> anyhow::Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("reading config file {}", path.display()))?;
        let config: Self = toml::from_str(&raw)
            .with_context(|| format!("parsing config file {}", path.display()))?;
        Ok(config)
    }

    pub fn project_names(&self) -> Vec<String> {
        self.projects.iter().map(|p| p.name.clone()).collect()
    }

    /// Built-in schedules with the file's overrides merged on top.
    pub fn scheduler_config(&self) -> SchedulerConfig {
        let mut config = SchedulerConfig::new();
        for (task_type, schedule) in default_schedules() {
            config.set(task_type, schedule);
        }
        for (task_type, schedule) in &self.schedule {
            config.set(*task_type, *schedule);
        }
        config
    }
}

fn schedule(run_on_init: bool, interval_seconds: u64) -> TaskSchedule {
    TaskSchedule {
        run_on_init,
        run_on_schedule: interval_seconds > 0,
        interval_seconds,
    }
}

/// Built-in per-task schedules. `PullProject` has no timer of its own:
/// it is queued per project by the wildcard discovery task.
fn default_schedules() -> [(TaskType, TaskSchedule); 10] {
    [
        (TaskType::PullProject, TaskSchedule::default()),
        (TaskType::PullProjectsFromWildcards, schedule(true, 1800)),
        (TaskType::PullEnvironmentsFromProjects, schedule(true, 1800)),
        (TaskType::PullRefsFromProjects, schedule(true, 300)),
        (TaskType::PullRefMetrics, schedule(true, 30)),
        (TaskType::PullEnvironmentMetrics, schedule(true, 30)),
        (TaskType::GarbageCollectProjects, schedule(false, 14400)),
        (TaskType::GarbageCollectEnvironments, schedule(false, 14400)),
        (TaskType::GarbageCollectRefs, schedule(false, 1800)),
        (TaskType::GarbageCollectMetrics, schedule(false, 600)),
    ]
}
