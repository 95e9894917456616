//! cadence-gc — reconciliation passes over stored exporter state.
//!
//! Four independent passes, one per entity kind, each runnable on its own
//! schedule:
//!
//! - [`collect_projects`] — stored vs configured/wildcard-discovered.
//! - [`collect_environments`] — parent project config, flag resync, then
//!   upstream confirmation.
//! - [`collect_refs`] — same shape as environments, per ref kind.
//! - [`collect_metrics`] — owner lookup from labels plus retention rules,
//!   store-only.
//!
//! Every deletion carries a stable reason code from [`reason`] and is
//! tallied in the returned [`GcReport`]. Passes are idempotent; a pass
//! aborted by an upstream error is simply retried on its next run.

use std::collections::HashMap;

use regex::Regex;

pub mod environments;
pub mod error;
pub mod metrics;
pub mod projects;
pub mod reason;
pub mod refs;
pub mod report;

pub use environments::collect_environments;
pub use error::{GcError, GcResult};
pub use metrics::collect_metrics;
pub use projects::{GcConfig, collect_projects};
pub use refs::collect_refs;
pub use report::GcReport;

/// Compile-once regexp lookup for the filter patterns a pass encounters.
/// Patterns come from project settings, so an invalid one is a
/// configuration error, not something to skip over silently.
pub(crate) fn compiled_regexp<'a>(
    cache: &'a mut HashMap<String, Regex>,
    pattern: &str,
) -> GcResult<&'a Regex> {
    if !cache.contains_key(pattern) {
        let regexp = Regex::new(pattern).map_err(|source| GcError::InvalidRegexp {
            pattern: pattern.to_string(),
            source,
        })?;
        cache.insert(pattern.to_string(), regexp);
    }
    Ok(&cache[pattern])
}
