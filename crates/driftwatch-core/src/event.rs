use std::cmp::Ordering;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A detected change: `artifact` at `source_url` now has `version`.
///
/// Pollers and webhook normalizers both produce this shape; the dispatcher
/// routes it by `event_name` and never cares where it came from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChangeEvent {
    pub event_name: String,
    pub source_url: String,
    pub artifact: String,
    pub version: String,
}

impl ChangeEvent {
    pub fn new(
        event_name: impl Into<String>,
        source_url: impl Into<String>,
        artifact: impl Into<String>,
        version: impl Into<String>,
    ) -> Self {
        Self {
            event_name: event_name.into(),
            source_url: source_url.into(),
            artifact: artifact.into(),
            version: version.into(),
        }
    }
}

impl std::fmt::Display for ChangeEvent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{} ({})", self.artifact, self.version, self.event_name)
    }
}

/// One version as listed by a registry, with the time it was published when
/// the registry reports one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VersionCandidate {
    pub version: String,
    pub timestamp: Option<DateTime<Utc>>,
}

impl VersionCandidate {
    pub fn new(version: impl Into<String>, timestamp: Option<DateTime<Utc>>) -> Self {
        Self {
            version: version.into(),
            timestamp,
        }
    }
}

/// Pick the most recent candidate.
///
/// Ordering: newest timestamp first; candidates without a timestamp rank below
/// every timestamped one; equal timestamps fall back to the lexically greatest
/// version string. The result therefore never depends on input order.
/// Candidates with an empty version are ignored.
pub fn select_latest(candidates: &[VersionCandidate]) -> Option<&VersionCandidate> {
    candidates
        .iter()
        .filter(|c| !c.version.is_empty())
        .max_by(|a, b| compare_recency(a, b))
}

fn compare_recency(a: &VersionCandidate, b: &VersionCandidate) -> Ordering {
    // Option<T> orders None below Some, which is the rule we want.
    a.timestamp
        .cmp(&b.timestamp)
        .then_with(|| a.version.cmp(&b.version))
}
