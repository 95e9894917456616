//! Stored entity types: projects, environments, and refs.
//!
//! All types are serde-serializable for storage in the shared backend's
//! hash values. Identity fields feed the entity key; everything else is
//! mutable poll state.

use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::checksum;
use crate::settings::ProjectSettings;

// ── Project ────────────────────────────────────────────────────────

/// A CI project discovered through explicit configuration or wildcard
/// search. Identity: the namespace path (`name`).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct Project {
    pub name: String,
    /// Upstream topics, refreshed on every re-discovery.
    #[serde(default)]
    pub topics: Vec<String>,
    #[serde(default)]
    pub settings: ProjectSettings,
}

impl Project {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    /// Deterministic entity key.
    pub fn key(&self) -> String {
        checksum(&self.name)
    }
}

// ── Environment ────────────────────────────────────────────────────

/// A project environment and its latest deployment snapshot.
/// Identity: (project name, environment id).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct Environment {
    pub project_name: String,
    pub id: u64,
    pub name: String,
    #[serde(default)]
    pub external_url: String,
    #[serde(default)]
    pub available: bool,
    #[serde(default)]
    pub latest_deployment: Option<Deployment>,
    /// Denormalised from the parent project at discovery time; resynced
    /// by the garbage collector when the project's setting drifts.
    #[serde(default)]
    pub output_sparse_status_metrics: bool,
}

impl Environment {
    /// Create an environment record with identity fields and the flags
    /// denormalised from its parent project.
    pub fn new(project: &Project, id: u64, name: impl Into<String>) -> Self {
        Self {
            project_name: project.name.clone(),
            id,
            name: name.into(),
            output_sparse_status_metrics: project.settings.output.sparse_status_metrics,
            ..Self::default()
        }
    }

    /// Deterministic entity key.
    pub fn key(&self) -> String {
        checksum(&format!("{}{}", self.project_name, self.id))
    }
}

/// Latest deployment seen on an environment.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct Deployment {
    pub job_id: u64,
    pub ref_kind: RefKind,
    pub ref_name: String,
    pub author_email: String,
    pub timestamp: f64,
    pub duration_secs: f64,
    pub status: String,
    pub commit_short_id: String,
}

// ── Ref ────────────────────────────────────────────────────────────

/// The kind of a ref. Discriminator strings are part of the entity key
/// and of metric label values, so they are stable wire names.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, Default)]
#[serde(rename_all = "kebab-case")]
pub enum RefKind {
    #[default]
    Branch,
    Tag,
    MergeRequest,
}

impl RefKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Branch => "branch",
            Self::Tag => "tag",
            Self::MergeRequest => "merge-request",
        }
    }
}

impl fmt::Display for RefKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RefKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "branch" => Ok(Self::Branch),
            "tag" => Ok(Self::Tag),
            "merge-request" => Ok(Self::MergeRequest),
            other => Err(format!("unknown ref kind: {other}")),
        }
    }
}

/// A branch, tag, or merge request under a project, with its latest
/// pipeline and per-job snapshots. Identity: (kind, project name, name).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct Ref {
    pub kind: RefKind,
    pub project_name: String,
    pub name: String,
    #[serde(default)]
    pub latest_pipeline: Option<Pipeline>,
    /// Latest observed snapshot per job name.
    #[serde(default)]
    pub latest_jobs: HashMap<String, Job>,
    // Flags denormalised from the parent project at discovery time.
    // Resynced by the garbage collector when the project config drifts.
    #[serde(default)]
    pub pipeline_jobs_enabled: bool,
    #[serde(default)]
    pub pipeline_variables_enabled: bool,
    #[serde(default)]
    pub pipeline_variables_regexp: String,
    #[serde(default)]
    pub output_sparse_status_metrics: bool,
}

impl Ref {
    /// Create a ref record with identity fields and the flags denormalised
    /// from its parent project.
    pub fn new(kind: RefKind, project: &Project, name: impl Into<String>) -> Self {
        Self {
            kind,
            project_name: project.name.clone(),
            name: name.into(),
            pipeline_jobs_enabled: project.settings.pull.pipeline.jobs.enabled,
            pipeline_variables_enabled: project.settings.pull.pipeline.variables.enabled,
            pipeline_variables_regexp: project.settings.pull.pipeline.variables.regexp.clone(),
            output_sparse_status_metrics: project.settings.output.sparse_status_metrics,
            ..Self::default()
        }
    }

    /// Deterministic entity key.
    pub fn key(&self) -> String {
        Self::key_for(self.kind, &self.project_name, &self.name)
    }

    /// Key computation shared with callers that only hold the identity
    /// fields (the metrics garbage collector reconstructs ref keys from
    /// metric labels).
    pub fn key_for(kind: RefKind, project_name: &str, name: &str) -> String {
        checksum(&format!("{}{}{}", kind.as_str(), project_name, name))
    }
}

/// Latest pipeline snapshot on a ref.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct Pipeline {
    pub id: u64,
    pub coverage: f64,
    pub timestamp: f64,
    pub duration_secs: f64,
    pub queued_duration_secs: f64,
    pub source: String,
    pub status: String,
    #[serde(default)]
    pub variables: String,
}

/// Latest snapshot of a single pipeline job.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct Job {
    pub id: u64,
    pub name: String,
    pub stage: String,
    pub timestamp: f64,
    pub duration_secs: f64,
    pub queued_duration_secs: f64,
    pub status: String,
    pub artifact_size_bytes: u64,
    #[serde(default)]
    pub failure_reason: String,
    #[serde(default)]
    pub runner_description: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn project_key_depends_only_on_name() {
        let mut a = Project::new("group/app");
        let b = Project::new("group/app");
        a.topics = vec!["rust".to_string()];
        a.settings.output.sparse_status_metrics = true;
        assert_eq!(a.key(), b.key());
    }

    #[test]
    fn environment_key_includes_project_and_id() {
        let project = Project::new("group/app");
        let a = Environment::new(&project, 1, "production");
        let b = Environment::new(&project, 2, "production");
        let c = Environment::new(&Project::new("group/other"), 1, "production");
        assert_ne!(a.key(), b.key());
        assert_ne!(a.key(), c.key());
    }

    #[test]
    fn ref_key_distinguishes_kinds() {
        let project = Project::new("group/app");
        let branch = Ref::new(RefKind::Branch, &project, "main");
        let tag = Ref::new(RefKind::Tag, &project, "main");
        assert_ne!(branch.key(), tag.key());
        assert_eq!(branch.key(), Ref::key_for(RefKind::Branch, "group/app", "main"));
    }

    #[test]
    fn ref_denormalises_project_flags() {
        let mut project = Project::new("group/app");
        project.settings.pull.pipeline.jobs.enabled = true;
        project.settings.pull.pipeline.variables.enabled = true;
        project.settings.pull.pipeline.variables.regexp = "^CI_".to_string();
        project.settings.output.sparse_status_metrics = true;

        let r = Ref::new(RefKind::Branch, &project, "main");
        assert!(r.pipeline_jobs_enabled);
        assert!(r.pipeline_variables_enabled);
        assert_eq!(r.pipeline_variables_regexp, "^CI_");
        assert!(r.output_sparse_status_metrics);
    }

    #[test]
    fn ref_kind_round_trips_through_str() {
        for kind in [RefKind::Branch, RefKind::Tag, RefKind::MergeRequest] {
            assert_eq!(kind.as_str().parse::<RefKind>().unwrap(), kind);
        }
        assert!("pipeline".parse::<RefKind>().is_err());
    }
}
