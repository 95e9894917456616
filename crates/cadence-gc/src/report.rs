//! Per-pass outcome summary.

use std::collections::BTreeMap;

/// What one garbage collection pass did: deletions tallied per reason
/// code, plus the number of entities rewritten to resync drifted flags.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GcReport {
    pub deleted: BTreeMap<String, u64>,
    pub resynced: u64,
}

impl GcReport {
    pub(crate) fn record_deleted(&mut self, reason: &str) {
        *self.deleted.entry(reason.to_string()).or_insert(0) += 1;
    }

    pub fn total_deleted(&self) -> u64 {
        self.deleted.values().sum()
    }
}
