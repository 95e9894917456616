//! The closed set of schedulable task types.
//!
//! Task types are not persisted as entities; they namespace the lease keys
//! used by the task coordinator (`task:<type>:<id>`), so the `Display`
//! names are stable wire names.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Every operation the scheduler can trigger.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum TaskType {
    PullProject,
    PullProjectsFromWildcards,
    PullEnvironmentsFromProjects,
    PullRefsFromProjects,
    PullRefMetrics,
    PullEnvironmentMetrics,
    GarbageCollectProjects,
    GarbageCollectEnvironments,
    GarbageCollectRefs,
    GarbageCollectMetrics,
}

impl TaskType {
    /// All task types, for iteration over schedule configuration.
    pub fn all() -> [TaskType; 10] {
        [
            Self::PullProject,
            Self::PullProjectsFromWildcards,
            Self::PullEnvironmentsFromProjects,
            Self::PullRefsFromProjects,
            Self::PullRefMetrics,
            Self::PullEnvironmentMetrics,
            Self::GarbageCollectProjects,
            Self::GarbageCollectEnvironments,
            Self::GarbageCollectRefs,
            Self::GarbageCollectMetrics,
        ]
    }

    /// Stable wire name used in lease keys.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::PullProject => "PullProject",
            Self::PullProjectsFromWildcards => "PullProjectsFromWildcards",
            Self::PullEnvironmentsFromProjects => "PullEnvironmentsFromProjects",
            Self::PullRefsFromProjects => "PullRefsFromProjects",
            Self::PullRefMetrics => "PullRefMetrics",
            Self::PullEnvironmentMetrics => "PullEnvironmentMetrics",
            Self::GarbageCollectProjects => "GarbageCollectProjects",
            Self::GarbageCollectEnvironments => "GarbageCollectEnvironments",
            Self::GarbageCollectRefs => "GarbageCollectRefs",
            Self::GarbageCollectMetrics => "GarbageCollectMetrics",
        }
    }
}

impl fmt::Display for TaskType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn all_lists_every_variant_once() {
        let all = TaskType::all();
        let unique: std::collections::HashSet<_> = all.iter().collect();
        assert_eq!(unique.len(), all.len());
    }

    #[test]
    fn wire_names_are_unique() {
        let names: std::collections::HashSet<_> =
            TaskType::all().iter().map(|t| t.as_str()).collect();
        assert_eq!(names.len(), TaskType::all().len());
    }
}
