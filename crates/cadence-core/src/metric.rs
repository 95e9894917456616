//! Point-in-time metric records and their key derivation.
//!
//! A metric's identity is its kind plus a kind-dependent label subset:
//! project/ref/kind for pipeline-level kinds, additionally stage and
//! job name for job-level kinds, project/environment for environment-level
//! kinds. Status kinds fold the status label value into the key as well,
//! so one record exists per status value.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::checksum;

/// Closed enumeration of exported metric kinds.
///
/// The numeric discriminators are part of the metric key and must stay
/// stable across releases.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
#[repr(u8)]
pub enum MetricKind {
    Coverage = 1,
    Duration = 2,
    Id = 3,
    QueuedDuration = 4,
    RunCount = 5,
    Status = 6,
    Timestamp = 7,
    JobArtifactSize = 8,
    JobDuration = 9,
    JobId = 10,
    JobQueuedDuration = 11,
    JobRunCount = 12,
    JobStatus = 13,
    JobTimestamp = 14,
    EnvironmentDeploymentCount = 15,
    EnvironmentDeploymentDuration = 16,
    EnvironmentDeploymentJobId = 17,
    EnvironmentDeploymentStatus = 18,
    EnvironmentDeploymentTimestamp = 19,
    EnvironmentInformation = 20,
}

impl MetricKind {
    /// Stable numeric discriminator folded into the metric key.
    pub fn discriminator(self) -> u8 {
        self as u8
    }

    /// Job-scoped kinds carry stage and job-name labels and are subject
    /// to the per-ref jobs feature flag.
    pub fn is_job_level(self) -> bool {
        matches!(
            self,
            Self::JobArtifactSize
                | Self::JobDuration
                | Self::JobId
                | Self::JobQueuedDuration
                | Self::JobRunCount
                | Self::JobStatus
                | Self::JobTimestamp
        )
    }

    /// Environment-scoped kinds are owned by an Environment rather than
    /// a Ref.
    pub fn is_environment_level(self) -> bool {
        matches!(
            self,
            Self::EnvironmentDeploymentCount
                | Self::EnvironmentDeploymentDuration
                | Self::EnvironmentDeploymentJobId
                | Self::EnvironmentDeploymentStatus
                | Self::EnvironmentDeploymentTimestamp
                | Self::EnvironmentInformation
        )
    }

    /// Status kinds emit one record per status value and participate in
    /// sparse-status retention.
    pub fn is_status(self) -> bool {
        matches!(
            self,
            Self::Status | Self::JobStatus | Self::EnvironmentDeploymentStatus
        )
    }
}

/// A single exported gauge value with its label set.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Metric {
    pub kind: MetricKind,
    /// Label name → value. A BTreeMap keeps serialized output stable.
    pub labels: BTreeMap<String, String>,
    pub value: f64,
}

impl Metric {
    pub fn new(kind: MetricKind, labels: BTreeMap<String, String>, value: f64) -> Self {
        Self {
            kind,
            labels,
            value,
        }
    }

    /// Deterministic entity key: discriminator plus the identifying label
    /// subset for this kind, in fixed field order.
    pub fn key(&self) -> String {
        let mut identity = self.kind.discriminator().to_string();

        let fields: &[&str] = if self.kind.is_environment_level() {
            &["project", "environment"]
        } else if self.kind.is_job_level() {
            &["project", "ref", "kind", "stage", "job_name"]
        } else {
            &["project", "ref", "kind"]
        };
        for field in fields {
            if let Some(value) = self.labels.get(*field) {
                identity.push_str(value);
            }
        }

        if self.kind.is_status() {
            if let Some(status) = self.labels.get("status") {
                identity.push_str(status);
            }
        }

        checksum(&identity)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn labels(pairs: &[(&str, &str)]) -> BTreeMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    fn pipeline_labels() -> BTreeMap<String, String> {
        labels(&[("project", "group/app"), ("ref", "main"), ("kind", "branch")])
    }

    #[test]
    fn key_ignores_value() {
        let a = Metric::new(MetricKind::Coverage, pipeline_labels(), 10.0);
        let b = Metric::new(MetricKind::Coverage, pipeline_labels(), 99.9);
        assert_eq!(a.key(), b.key());
    }

    #[test]
    fn key_distinguishes_kinds_with_same_labels() {
        let a = Metric::new(MetricKind::Coverage, pipeline_labels(), 1.0);
        let b = Metric::new(MetricKind::Duration, pipeline_labels(), 1.0);
        assert_ne!(a.key(), b.key());
    }

    #[test]
    fn status_kinds_key_per_status_value() {
        let mut running = pipeline_labels();
        running.insert("status".to_string(), "running".to_string());
        let mut failed = pipeline_labels();
        failed.insert("status".to_string(), "failed".to_string());

        let a = Metric::new(MetricKind::Status, running, 1.0);
        let b = Metric::new(MetricKind::Status, failed, 0.0);
        assert_ne!(a.key(), b.key());
    }

    #[test]
    fn non_status_kinds_ignore_status_label() {
        let mut with_status = pipeline_labels();
        with_status.insert("status".to_string(), "running".to_string());

        let a = Metric::new(MetricKind::Duration, pipeline_labels(), 1.0);
        let b = Metric::new(MetricKind::Duration, with_status, 1.0);
        assert_eq!(a.key(), b.key());
    }

    #[test]
    fn job_kinds_fold_in_stage_and_job_name() {
        let base = labels(&[
            ("project", "group/app"),
            ("ref", "main"),
            ("kind", "branch"),
            ("stage", "test"),
            ("job_name", "unit"),
        ]);
        let mut other = base.clone();
        other.insert("job_name".to_string(), "lint".to_string());

        let a = Metric::new(MetricKind::JobDuration, base, 1.0);
        let b = Metric::new(MetricKind::JobDuration, other, 1.0);
        assert_ne!(a.key(), b.key());
    }

    #[test]
    fn environment_kinds_use_project_and_environment() {
        let a = Metric::new(
            MetricKind::EnvironmentDeploymentDuration,
            labels(&[("project", "group/app"), ("environment", "production")]),
            1.0,
        );
        let b = Metric::new(
            MetricKind::EnvironmentDeploymentDuration,
            labels(&[("project", "group/app"), ("environment", "staging")]),
            1.0,
        );
        assert_ne!(a.key(), b.key());
    }

    #[test]
    fn discriminators_are_stable() {
        assert_eq!(MetricKind::Coverage.discriminator(), 1);
        assert_eq!(MetricKind::Status.discriminator(), 6);
        assert_eq!(MetricKind::JobStatus.discriminator(), 13);
        assert_eq!(MetricKind::EnvironmentInformation.discriminator(), 20);
    }

    #[test]
    fn level_predicates_partition_kinds() {
        assert!(MetricKind::JobStatus.is_job_level());
        assert!(!MetricKind::JobStatus.is_environment_level());
        assert!(MetricKind::EnvironmentDeploymentStatus.is_environment_level());
        assert!(!MetricKind::Coverage.is_job_level());
        assert!(MetricKind::Status.is_status());
        assert!(!MetricKind::Duration.is_status());
    }
}
