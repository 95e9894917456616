//! cadence-core — domain types for the Cadence exporter state engine.
//!
//! Defines the four stored entity kinds (Project, Environment, Ref, Metric),
//! their deterministic entity keys, the closed set of schedulable task types,
//! and the upstream CI API collaborator trait.
//!
//! # Entity keys
//!
//! Every entity is addressed by a stable 32-bit checksum of its identifying
//! fields, rendered as a decimal string. Keys are opaque to callers and are
//! never reused across entity kinds (the identifying fields differ per kind).

pub mod metric;
pub mod settings;
pub mod task;
pub mod types;
pub mod upstream;

pub use metric::{Metric, MetricKind};
pub use settings::*;
pub use task::TaskType;
pub use types::*;
pub use upstream::{UpstreamClient, Wildcard};

use sha2::{Digest, Sha256};

/// Compute the 32-bit entity checksum for a concatenated identity string.
///
/// First four bytes of a SHA-256 digest, big-endian, rendered as decimal.
/// Stable across processes and compiler releases, which `DefaultHasher`
/// is not.
pub fn checksum(input: &str) -> String {
    let digest = Sha256::digest(input.as_bytes());
    u32::from_be_bytes([digest[0], digest[1], digest[2], digest[3]]).to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn checksum_is_deterministic() {
        assert_eq!(checksum("group/app"), checksum("group/app"));
        assert_ne!(checksum("group/app"), checksum("group/other"));
    }

    #[test]
    fn checksum_renders_decimal() {
        let key = checksum("group/app");
        assert!(key.chars().all(|c| c.is_ascii_digit()));
        assert!(key.parse::<u32>().is_ok());
    }
}
