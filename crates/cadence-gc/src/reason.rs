//! Machine-readable deletion reason codes.
//!
//! Every garbage collection deletion is logged with exactly one of these
//! codes and tallied per code in the pass report, so operators can chart
//! what the collector is doing without parsing log text. The strings are
//! a stable interface; never rename one.

/// The owning project is no longer present in the store.
pub const NON_EXISTENT_PROJECT: &str = "non-existent-project";

/// The project is neither explicitly configured nor discoverable through
/// any configured wildcard.
pub const PROJECT_NOT_CONFIGURED: &str = "project-not-configured";

/// The environment no longer exists upstream, or the metric's owning
/// environment is no longer stored.
pub const NON_EXISTENT_ENVIRONMENT: &str = "non-existent-environment";

/// The environment name no longer matches the project's environment
/// name filter.
pub const ENVIRONMENT_NOT_IN_REGEXP: &str = "environment-not-in-regexp";

/// The ref no longer exists upstream, or the metric's owning ref is no
/// longer stored.
pub const NON_EXISTENT_REF: &str = "non-existent-ref";

/// The ref name no longer matches the project's filter for its kind.
pub const REF_NOT_IN_REGEXP: &str = "ref-not-in-regexp";

/// A job-level metric whose owning ref has job collection disabled.
pub const JOBS_METRICS_DISABLED_ON_REF: &str = "jobs-metrics-disabled-on-ref";

/// The metric's labels do not identify an owner entity.
pub const METRIC_MISSING_OWNER_LABELS: &str = "metric-missing-owner-labels";

/// An inactive status metric (value not exactly 1) on a ref with sparse
/// status metrics on.
pub const SPARSE_METRICS_ENABLED_ON_REF: &str = "output-sparse-metrics-enabled-on-ref";

/// An inactive status metric (value not exactly 1) on an environment with
/// sparse status metrics on.
pub const SPARSE_METRICS_ENABLED_ON_ENVIRONMENT: &str =
    "output-sparse-metrics-enabled-on-environment";
