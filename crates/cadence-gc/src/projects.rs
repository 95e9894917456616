//! Projects pass — drop stored projects that are no longer desired.
//!
//! Desired state is the union of the explicitly configured project names
//! and everything currently discoverable through the configured wildcard
//! searches. Wildcard listings happen before any deletion, so an upstream
//! failure aborts the pass with the store untouched.

use std::collections::HashSet;

use tracing::{debug, info};

use cadence_core::{UpstreamClient, Wildcard};
use cadence_store::Store;

use crate::error::{GcError, GcResult};
use crate::reason;
use crate::report::GcReport;

/// Desired-state input for the projects pass.
#[derive(Debug, Clone, Default)]
pub struct GcConfig {
    /// Explicitly configured project names.
    pub project_names: Vec<String>,
    /// Wildcard searches whose current results are also desired.
    pub wildcards: Vec<Wildcard>,
}

pub async fn collect_projects(
    store: &dyn Store,
    upstream: &dyn UpstreamClient,
    config: &GcConfig,
) -> GcResult<GcReport> {
    let stored = store.projects().await?;

    let mut desired: HashSet<String> = config.project_names.iter().cloned().collect();
    for wildcard in &config.wildcards {
        let discovered = upstream
            .list_wildcard_projects(wildcard)
            .await
            .map_err(GcError::Upstream)?;
        desired.extend(discovered.into_iter().map(|p| p.name));
    }

    let mut report = GcReport::default();
    for (key, project) in stored {
        if desired.contains(&project.name) {
            continue;
        }
        store.del_project(&key).await?;
        info!(
            project = %project.name,
            reason = reason::PROJECT_NOT_CONFIGURED,
            "garbage collected project"
        );
        report.record_deleted(reason::PROJECT_NOT_CONFIGURED);
    }

    debug!(deleted = report.total_deleted(), "projects pass finished");
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::StubUpstream;
    use cadence_core::Project;
    use cadence_store::LocalStore;

    #[tokio::test]
    async fn keeps_configured_and_wildcard_projects_drops_the_rest() {
        let store = LocalStore::new();
        for name in ["group/a", "group/b", "group/c"] {
            store.set_project(&Project::new(name)).await.unwrap();
        }

        let mut upstream = StubUpstream::default();
        upstream
            .wildcard_projects
            .insert("group".to_string(), vec![Project::new("group/c")]);

        let config = GcConfig {
            project_names: vec!["group/a".to_string()],
            wildcards: vec![Wildcard {
                search: "group".to_string(),
                ..Wildcard::default()
            }],
        };

        let report = collect_projects(&store, &upstream, &config).await.unwrap();

        assert_eq!(report.deleted[reason::PROJECT_NOT_CONFIGURED], 1);
        assert!(
            store
                .project_exists(&Project::new("group/a").key())
                .await
                .unwrap()
        );
        assert!(
            !store
                .project_exists(&Project::new("group/b").key())
                .await
                .unwrap()
        );
        assert!(
            store
                .project_exists(&Project::new("group/c").key())
                .await
                .unwrap()
        );
    }

    #[tokio::test]
    async fn upstream_failure_aborts_without_deleting() {
        let store = LocalStore::new();
        store.set_project(&Project::new("group/a")).await.unwrap();

        let upstream = StubUpstream {
            fail: true,
            ..StubUpstream::default()
        };
        let config = GcConfig {
            project_names: Vec::new(),
            wildcards: vec![Wildcard::default()],
        };

        let result = collect_projects(&store, &upstream, &config).await;
        assert!(matches!(result, Err(GcError::Upstream(_))));
        assert_eq!(store.projects_count().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn no_wildcards_means_no_upstream_calls() {
        let store = LocalStore::new();
        store.set_project(&Project::new("group/a")).await.unwrap();

        // A failing upstream is never consulted when only explicit
        // project names are configured.
        let upstream = StubUpstream {
            fail: true,
            ..StubUpstream::default()
        };
        let config = GcConfig {
            project_names: vec!["group/a".to_string()],
            wildcards: Vec::new(),
        };

        let report = collect_projects(&store, &upstream, &config).await.unwrap();
        assert_eq!(report.total_deleted(), 0);
    }
}
