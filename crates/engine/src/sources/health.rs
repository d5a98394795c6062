use std::collections::{BTreeMap, HashMap};
use std::sync::Mutex;
use std::time::Instant;

use serde::Serialize;

use prospect_common::types::SourceId;

/// Observed health of one source, reported on /health.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceStatus {
    Ok,
    Throttled,
    Unavailable,
}

impl SourceStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Ok => "ok",
            Self::Throttled => "throttled",
            Self::Unavailable => "unavailable",
        }
    }
}

struct SourceState {
    status: SourceStatus,
    since: Instant,
}

/// Rolling per-source status fed by adapter outcomes. Observation only;
/// it never gates a call.
///
/// Uses std::sync::Mutex because the lock is never held across an await.
pub struct SourceHealthRegistry {
    states: Mutex<HashMap<SourceId, SourceState>>,
}

impl SourceHealthRegistry {
    pub fn new() -> Self {
        Self {
            states: Mutex::new(HashMap::new()),
        }
    }

    pub fn record_success(&self, source: SourceId) {
        self.set(source, SourceStatus::Ok);
    }

    pub fn record_throttled(&self, source: SourceId) {
        self.set(source, SourceStatus::Throttled);
    }

    pub fn record_unavailable(&self, source: SourceId) {
        self.set(source, SourceStatus::Unavailable);
    }

    fn set(&self, source: SourceId, status: SourceStatus) {
        let mut states = self.states.lock().unwrap();
        let entry = states.entry(source).or_insert(SourceState {
            status: SourceStatus::Ok,
            since: Instant::now(),
        });
        if entry.status != status {
            tracing::info!(
                source = source.as_str(),
                from = entry.status.as_str(),
                to = status.as_str(),
                held_for_s = entry.since.elapsed().as_secs(),
                "Source status changed"
            );
            entry.status = status;
            entry.since = Instant::now();
        }
        let gauge = match status {
            SourceStatus::Ok => 0.0,
            SourceStatus::Throttled => 0.5,
            SourceStatus::Unavailable => 1.0,
        };
        metrics::gauge!("source.health", "source" => source.as_str()).set(gauge);
    }

    pub fn status(&self, source: SourceId) -> SourceStatus {
        self.states
            .lock()
            .unwrap()
            .get(&source)
            .map(|s| s.status)
            .unwrap_or(SourceStatus::Ok)
    }

    /// Snapshot for the health endpoint. Sources never seen report Ok.
    pub fn snapshot(&self, sources: &[SourceId]) -> BTreeMap<SourceId, SourceStatus> {
        sources.iter().map(|s| (*s, self.status(*s))).collect()
    }

    /// "ok" when every listed source is Ok, else "degraded".
    pub fn overall(&self, sources: &[SourceId]) -> &'static str {
        if sources
            .iter()
            .all(|s| self.status(*s) == SourceStatus::Ok)
        {
            "ok"
        } else {
            "degraded"
        }
    }
}

impl Default for SourceHealthRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_transitions() {
        let registry = SourceHealthRegistry::new();
        assert_eq!(registry.status(SourceId::Profiles), SourceStatus::Ok);

        registry.record_throttled(SourceId::Profiles);
        assert_eq!(registry.status(SourceId::Profiles), SourceStatus::Throttled);

        registry.record_success(SourceId::Profiles);
        assert_eq!(registry.status(SourceId::Profiles), SourceStatus::Ok);

        registry.record_unavailable(SourceId::Website);
        assert_eq!(
            registry.overall(&[SourceId::Profiles, SourceId::Website]),
            "degraded"
        );
    }
}
