//! Upstream CI API collaborator interface.
//!
//! The real client (pagination, rate limiting, authentication) lives
//! outside this engine. The garbage collector and the pollers consume it
//! through this trait; tests plug in an in-memory stub.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::types::{Project, RefKind};

/// A wildcard project search, e.g. every project under an owner whose
/// path matches a search expression.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(default)]
pub struct Wildcard {
    /// Owning group/user, empty for instance-wide searches.
    pub owner: String,
    pub search: String,
    /// Settings applied to projects discovered through this wildcard.
    pub settings: crate::settings::ProjectSettings,
}

/// Listing operations against the upstream CI platform.
///
/// All listings reflect live upstream state and honour the relevant
/// per-project filters: environment listings apply the environment name
/// filter, ref listings apply each ref kind's enablement flag and regexp.
#[async_trait]
pub trait UpstreamClient: Send + Sync {
    /// Projects currently discoverable through a wildcard search.
    async fn list_wildcard_projects(&self, wildcard: &Wildcard) -> anyhow::Result<Vec<Project>>;

    /// Names of the environments currently present on a project.
    async fn list_project_environment_names(
        &self,
        project: &Project,
    ) -> anyhow::Result<Vec<String>>;

    /// Refs currently present on a project, per enabled ref kind.
    async fn list_project_ref_names(
        &self,
        project: &Project,
    ) -> anyhow::Result<Vec<(RefKind, String)>>;
}
