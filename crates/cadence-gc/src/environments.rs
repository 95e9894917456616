//! Environments pass — reconcile stored environments against their
//! parent project's configuration, then against upstream.
//!
//! Local checks run first: an environment whose project is gone, or whose
//! name no longer matches the project's environment name filter, is
//! deleted without touching upstream. Survivors get their denormalised
//! sparse-status flag resynced if the project's setting drifted, and are
//! then reconfirmed against the project's live environment listing. All
//! upstream listings complete before the first upstream-driven deletion,
//! so a listing failure aborts the pass with the store as it stands.

use std::collections::{HashMap, HashSet};

use regex::Regex;
use tracing::{debug, info};

use cadence_core::{Environment, Project, UpstreamClient};
use cadence_store::Store;

use crate::compiled_regexp;
use crate::error::{GcError, GcResult};
use crate::reason;
use crate::report::GcReport;

pub async fn collect_environments(
    store: &dyn Store,
    upstream: &dyn UpstreamClient,
) -> GcResult<GcReport> {
    let stored = store.environments().await?;

    let mut report = GcReport::default();
    let mut regexps: HashMap<String, Regex> = HashMap::new();
    let mut kept: HashMap<String, Vec<(String, Environment)>> = HashMap::new();

    for (key, environment) in stored {
        let project_key = Project::new(&environment.project_name).key();
        let Some(project) = store.get_project(&project_key).await? else {
            store.del_environment(&key).await?;
            info!(
                project = %environment.project_name,
                environment = %environment.name,
                reason = reason::NON_EXISTENT_PROJECT,
                "garbage collected environment"
            );
            report.record_deleted(reason::NON_EXISTENT_PROJECT);
            continue;
        };

        let regexp = compiled_regexp(&mut regexps, &project.settings.pull.environments.name_regexp)?;
        if !regexp.is_match(&environment.name) {
            store.del_environment(&key).await?;
            info!(
                project = %environment.project_name,
                environment = %environment.name,
                reason = reason::ENVIRONMENT_NOT_IN_REGEXP,
                "garbage collected environment"
            );
            report.record_deleted(reason::ENVIRONMENT_NOT_IN_REGEXP);
            continue;
        }

        let sparse = project.settings.output.sparse_status_metrics;
        let environment = if environment.output_sparse_status_metrics != sparse {
            let mut resynced = environment;
            resynced.output_sparse_status_metrics = sparse;
            store.set_environment(&resynced).await?;
            debug!(
                project = %resynced.project_name,
                environment = %resynced.name,
                "resynced environment flags from project settings"
            );
            report.resynced += 1;
            resynced
        } else {
            environment
        };

        kept.entry(environment.project_name.clone())
            .or_default()
            .push((key, environment));
    }

    let mut live: HashMap<String, HashSet<String>> = HashMap::new();
    for project_name in kept.keys() {
        let Some(project) = store.get_project(&Project::new(project_name).key()).await? else {
            continue;
        };
        let names = upstream
            .list_project_environment_names(&project)
            .await
            .map_err(GcError::Upstream)?;
        live.insert(project_name.clone(), names.into_iter().collect());
    }

    for (project_name, environments) in kept {
        let Some(names) = live.get(&project_name) else {
            continue;
        };
        for (key, environment) in environments {
            if names.contains(&environment.name) {
                continue;
            }
            store.del_environment(&key).await?;
            info!(
                project = %environment.project_name,
                environment = %environment.name,
                reason = reason::NON_EXISTENT_ENVIRONMENT,
                "garbage collected environment"
            );
            report.record_deleted(reason::NON_EXISTENT_ENVIRONMENT);
        }
    }

    debug!(
        deleted = report.total_deleted(),
        resynced = report.resynced,
        "environments pass finished"
    );
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::StubUpstream;
    use cadence_store::LocalStore;

    async fn seed_project(store: &LocalStore, name: &str) -> Project {
        let mut project = Project::new(name);
        project.settings.pull.environments.enabled = true;
        store.set_project(&project).await.unwrap();
        project
    }

    fn upstream_with(project: &str, names: &[&str]) -> StubUpstream {
        let mut upstream = StubUpstream::default();
        upstream.environment_names.insert(
            project.to_string(),
            names.iter().map(|n| n.to_string()).collect(),
        );
        upstream
    }

    #[tokio::test]
    async fn deletes_environment_of_missing_project() {
        let store = LocalStore::new();
        let orphan = Environment::new(&Project::new("group/gone"), 1, "production");
        store.set_environment(&orphan).await.unwrap();

        let report = collect_environments(&store, &StubUpstream::default())
            .await
            .unwrap();

        assert_eq!(report.deleted[reason::NON_EXISTENT_PROJECT], 1);
        assert_eq!(store.environments_count().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn deletes_environment_excluded_by_name_filter() {
        let store = LocalStore::new();
        let mut project = Project::new("group/app");
        project.settings.pull.environments.name_regexp = "^production$".to_string();
        store.set_project(&project).await.unwrap();

        store
            .set_environment(&Environment::new(&project, 1, "production"))
            .await
            .unwrap();
        store
            .set_environment(&Environment::new(&project, 2, "review/feature-x"))
            .await
            .unwrap();

        let upstream = upstream_with("group/app", &["production", "review/feature-x"]);
        let report = collect_environments(&store, &upstream).await.unwrap();

        assert_eq!(report.deleted[reason::ENVIRONMENT_NOT_IN_REGEXP], 1);
        assert_eq!(store.environments_count().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn resyncs_drifted_sparse_flag() {
        let store = LocalStore::new();
        let project = seed_project(&store, "group/app").await;
        let environment = Environment::new(&project, 1, "production");
        store.set_environment(&environment).await.unwrap();

        // The project turns sparse status metrics on after discovery.
        let mut updated = project.clone();
        updated.settings.output.sparse_status_metrics = true;
        store.set_project(&updated).await.unwrap();

        let upstream = upstream_with("group/app", &["production"]);
        let report = collect_environments(&store, &upstream).await.unwrap();

        assert_eq!(report.resynced, 1);
        assert_eq!(report.total_deleted(), 0);
        let stored = store
            .get_environment(&environment.key())
            .await
            .unwrap()
            .unwrap();
        assert!(stored.output_sparse_status_metrics);
    }

    #[tokio::test]
    async fn deletes_environment_gone_upstream() {
        let store = LocalStore::new();
        let project = seed_project(&store, "group/app").await;
        store
            .set_environment(&Environment::new(&project, 1, "production"))
            .await
            .unwrap();
        store
            .set_environment(&Environment::new(&project, 2, "staging"))
            .await
            .unwrap();

        let upstream = upstream_with("group/app", &["production"]);
        let report = collect_environments(&store, &upstream).await.unwrap();

        assert_eq!(report.deleted[reason::NON_EXISTENT_ENVIRONMENT], 1);
        assert_eq!(store.environments_count().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn upstream_failure_aborts_before_upstream_deletions() {
        let store = LocalStore::new();
        let project = seed_project(&store, "group/app").await;
        store
            .set_environment(&Environment::new(&project, 1, "production"))
            .await
            .unwrap();

        let upstream = StubUpstream {
            fail: true,
            ..StubUpstream::default()
        };
        let result = collect_environments(&store, &upstream).await;

        assert!(matches!(result, Err(GcError::Upstream(_))));
        assert_eq!(store.environments_count().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn invalid_filter_regexp_is_an_error() {
        let store = LocalStore::new();
        let mut project = Project::new("group/app");
        project.settings.pull.environments.name_regexp = "[".to_string();
        store.set_project(&project).await.unwrap();
        store
            .set_environment(&Environment::new(&project, 1, "production"))
            .await
            .unwrap();

        let result = collect_environments(&store, &StubUpstream::default()).await;
        assert!(matches!(result, Err(GcError::InvalidRegexp { .. })));
    }
}
