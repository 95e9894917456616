//! Metrics pass — drop metrics whose owner entity is gone or whose
//! retention rules no longer allow them.
//!
//! Ownership is reconstructed from labels: environment-level kinds are
//! owned by the (project, environment) they name, everything else by the
//! (kind, project, ref) triple. Environments are addressed by name in
//! metric labels but keyed by id in the store, so the pass builds a
//! name index from one environments snapshot up front. This pass never
//! talks to upstream.

use std::collections::HashMap;

use tracing::{debug, info};

use cadence_core::{Environment, Metric, Ref, RefKind};
use cadence_store::Store;

use crate::error::GcResult;
use crate::reason;
use crate::report::GcReport;

pub async fn collect_metrics(store: &dyn Store) -> GcResult<GcReport> {
    let stored = store.metrics().await?;

    let environments_by_name: HashMap<(String, String), Environment> = store
        .environments()
        .await?
        .into_values()
        .map(|e| ((e.project_name.clone(), e.name.clone()), e))
        .collect();

    let mut report = GcReport::default();
    for (key, metric) in stored {
        let Some(project_name) = metric.labels.get("project") else {
            drop_metric(store, &key, &metric, reason::METRIC_MISSING_OWNER_LABELS, &mut report)
                .await?;
            continue;
        };

        if metric.kind.is_environment_level() {
            let Some(environment_name) = metric.labels.get("environment") else {
                drop_metric(store, &key, &metric, reason::METRIC_MISSING_OWNER_LABELS, &mut report)
                    .await?;
                continue;
            };
            let owner_id = (project_name.clone(), environment_name.clone());
            let Some(environment) = environments_by_name.get(&owner_id) else {
                drop_metric(store, &key, &metric, reason::NON_EXISTENT_ENVIRONMENT, &mut report)
                    .await?;
                continue;
            };
            if environment.output_sparse_status_metrics
                && metric.kind.is_status()
                && metric.value != 1.0
            {
                drop_metric(
                    store,
                    &key,
                    &metric,
                    reason::SPARSE_METRICS_ENABLED_ON_ENVIRONMENT,
                    &mut report,
                )
                .await?;
            }
        } else {
            let (Some(ref_name), Some(kind_label)) =
                (metric.labels.get("ref"), metric.labels.get("kind"))
            else {
                drop_metric(store, &key, &metric, reason::METRIC_MISSING_OWNER_LABELS, &mut report)
                    .await?;
                continue;
            };
            let Ok(ref_kind) = kind_label.parse::<RefKind>() else {
                drop_metric(store, &key, &metric, reason::METRIC_MISSING_OWNER_LABELS, &mut report)
                    .await?;
                continue;
            };

            let ref_key = Ref::key_for(ref_kind, project_name, ref_name);
            let Some(owner) = store.get_ref(&ref_key).await? else {
                drop_metric(store, &key, &metric, reason::NON_EXISTENT_REF, &mut report).await?;
                continue;
            };

            if metric.kind.is_job_level() && !owner.pipeline_jobs_enabled {
                drop_metric(
                    store,
                    &key,
                    &metric,
                    reason::JOBS_METRICS_DISABLED_ON_REF,
                    &mut report,
                )
                .await?;
                continue;
            }
            if owner.output_sparse_status_metrics
                && metric.kind.is_status()
                && metric.value != 1.0
            {
                drop_metric(
                    store,
                    &key,
                    &metric,
                    reason::SPARSE_METRICS_ENABLED_ON_REF,
                    &mut report,
                )
                .await?;
            }
        }
    }

    debug!(deleted = report.total_deleted(), "metrics pass finished");
    Ok(report)
}

async fn drop_metric(
    store: &dyn Store,
    key: &str,
    metric: &Metric,
    reason: &str,
    report: &mut GcReport,
) -> GcResult<()> {
    store.del_metric(key).await?;
    info!(
        kind = ?metric.kind,
        labels = ?metric.labels,
        reason,
        "garbage collected metric"
    );
    report.record_deleted(reason);
    Ok(())
}
