//! Per-project pull/output settings.
//!
//! These are configured globally (defaults), per wildcard, or per project,
//! and denormalised onto stored Environments and Refs at discovery time so
//! that pollers and the garbage collector never need a join against the
//! parent project at read time.

use serde::{Deserialize, Serialize};

/// Full per-project configuration block.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(default)]
pub struct ProjectSettings {
    pub pull: PullSettings,
    pub output: OutputSettings,
}

/// What to pull from the upstream API for a project.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(default)]
pub struct PullSettings {
    pub environments: EnvironmentsPullSettings,
    pub refs: RefsPullSettings,
    pub pipeline: PipelinePullSettings,
}

/// Environment discovery settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct EnvironmentsPullSettings {
    pub enabled: bool,
    /// Only environments whose name matches are kept.
    pub name_regexp: String,
}

impl Default for EnvironmentsPullSettings {
    fn default() -> Self {
        Self {
            enabled: false,
            name_regexp: ".*".to_string(),
        }
    }
}

/// Ref discovery settings, one block per ref kind.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(default)]
pub struct RefsPullSettings {
    pub branches: BranchesPullSettings,
    pub tags: TagsPullSettings,
    pub merge_requests: MergeRequestsPullSettings,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct BranchesPullSettings {
    pub enabled: bool,
    pub regexp: String,
}

impl Default for BranchesPullSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            regexp: "^(?:main|master)$".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct TagsPullSettings {
    pub enabled: bool,
    pub regexp: String,
}

impl Default for TagsPullSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            regexp: ".*".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(default)]
pub struct MergeRequestsPullSettings {
    pub enabled: bool,
}

/// Pipeline detail settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(default)]
pub struct PipelinePullSettings {
    pub jobs: PipelineJobsSettings,
    pub variables: PipelineVariablesSettings,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(default)]
pub struct PipelineJobsSettings {
    pub enabled: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct PipelineVariablesSettings {
    pub enabled: bool,
    pub regexp: String,
}

impl Default for PipelineVariablesSettings {
    fn default() -> Self {
        Self {
            enabled: false,
            regexp: ".*".to_string(),
        }
    }
}

/// Metric emission settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(default)]
pub struct OutputSettings {
    /// Keep only the status record carrying the active value 1, deleting
    /// the records for every other status.
    pub sparse_status_metrics: bool,
}
