//! Refs pass — reconcile stored refs against their parent project's
//! configuration, then against upstream.
//!
//! Branches and tags are checked against their kind's name filter; merge
//! requests are selected upstream by state, not by name, so they skip the
//! filter check. Survivors get the four denormalised pipeline flags
//! resynced on drift and are then reconfirmed against the project's live
//! ref listing, which already honours each kind's enablement flag. As in
//! the environments pass, every listing completes before the first
//! upstream-driven deletion.

use std::collections::{HashMap, HashSet};

use regex::Regex;
use tracing::{debug, info};

use cadence_core::{Project, Ref, RefKind, UpstreamClient};
use cadence_store::Store;

use crate::compiled_regexp;
use crate::error::{GcError, GcResult};
use crate::reason;
use crate::report::GcReport;

pub async fn collect_refs(store: &dyn Store, upstream: &dyn UpstreamClient) -> GcResult<GcReport> {
    let stored = store.refs().await?;

    let mut report = GcReport::default();
    let mut regexps: HashMap<String, Regex> = HashMap::new();
    let mut kept: HashMap<String, Vec<(String, Ref)>> = HashMap::new();

    for (key, r) in stored {
        let project_key = Project::new(&r.project_name).key();
        let Some(project) = store.get_project(&project_key).await? else {
            store.del_ref(&key).await?;
            info!(
                project = %r.project_name,
                ref_kind = %r.kind,
                ref_name = %r.name,
                reason = reason::NON_EXISTENT_PROJECT,
                "garbage collected ref"
            );
            report.record_deleted(reason::NON_EXISTENT_PROJECT);
            continue;
        };

        let pattern = match r.kind {
            RefKind::Branch => Some(&project.settings.pull.refs.branches.regexp),
            RefKind::Tag => Some(&project.settings.pull.refs.tags.regexp),
            RefKind::MergeRequest => None,
        };
        if let Some(pattern) = pattern {
            let regexp = compiled_regexp(&mut regexps, pattern)?;
            if !regexp.is_match(&r.name) {
                store.del_ref(&key).await?;
                info!(
                    project = %r.project_name,
                    ref_kind = %r.kind,
                    ref_name = %r.name,
                    reason = reason::REF_NOT_IN_REGEXP,
                    "garbage collected ref"
                );
                report.record_deleted(reason::REF_NOT_IN_REGEXP);
                continue;
            }
        }

        let jobs = project.settings.pull.pipeline.jobs.enabled;
        let variables = project.settings.pull.pipeline.variables.enabled;
        let variables_regexp = &project.settings.pull.pipeline.variables.regexp;
        let sparse = project.settings.output.sparse_status_metrics;
        let drifted = r.pipeline_jobs_enabled != jobs
            || r.pipeline_variables_enabled != variables
            || r.pipeline_variables_regexp != *variables_regexp
            || r.output_sparse_status_metrics != sparse;
        let r = if drifted {
            let mut resynced = r;
            resynced.pipeline_jobs_enabled = jobs;
            resynced.pipeline_variables_enabled = variables;
            resynced.pipeline_variables_regexp = variables_regexp.clone();
            resynced.output_sparse_status_metrics = sparse;
            store.set_ref(&resynced).await?;
            debug!(
                project = %resynced.project_name,
                ref_kind = %resynced.kind,
                ref_name = %resynced.name,
                "resynced ref flags from project settings"
            );
            report.resynced += 1;
            resynced
        } else {
            r
        };

        kept.entry(r.project_name.clone()).or_default().push((key, r));
    }

    let mut live: HashMap<String, HashSet<(RefKind, String)>> = HashMap::new();
    for project_name in kept.keys() {
        let Some(project) = store.get_project(&Project::new(project_name).key()).await? else {
            continue;
        };
        let names = upstream
            .list_project_ref_names(&project)
            .await
            .map_err(GcError::Upstream)?;
        live.insert(project_name.clone(), names.into_iter().collect());
    }

    for (project_name, refs) in kept {
        let Some(names) = live.get(&project_name) else {
            continue;
        };
        for (key, r) in refs {
            if names.contains(&(r.kind, r.name.clone())) {
                continue;
            }
            store.del_ref(&key).await?;
            info!(
                project = %r.project_name,
                ref_kind = %r.kind,
                ref_name = %r.name,
                reason = reason::NON_EXISTENT_REF,
                "garbage collected ref"
            );
            report.record_deleted(reason::NON_EXISTENT_REF);
        }
    }

    debug!(
        deleted = report.total_deleted(),
        resynced = report.resynced,
        "refs pass finished"
    );
    Ok(report)
}
