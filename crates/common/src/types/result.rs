use std::cmp::Ordering;
use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::candidate::{Candidate, SourceId};
use super::job::Dimension;

/// Stable machine-readable reasons recorded in `partial_failures`.
pub mod failure_reason {
    pub const TRANSPORT: &str = "transport";
    pub const THROTTLED: &str = "throttled";
    pub const TIMEOUT: &str = "timeout";
    pub const UNPARSEABLE: &str = "unparseable";
    pub const CANCELLED: &str = "cancelled";
    pub const CREDENTIAL: &str = "credential";
    pub const UPSTREAM_5XX: &str = "upstream_5xx";
}

/// A non-fatal error from one component, recorded in the result rather
/// than raised.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PartialFailure {
    pub source: SourceId,
    pub reason: String,
}

impl PartialFailure {
    pub fn new(source: SourceId, reason: impl Into<String>) -> Self {
        Self {
            source,
            reason: reason.into(),
        }
    }
}

/// A candidate with rubric scoring attached.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ScoredCandidate {
    #[serde(flatten)]
    pub candidate: Candidate,
    /// Weighted rubric score in [0, 10].
    pub fit_score: f64,
    /// Raw per-dimension scores, pre-weighting, each in [0, 10].
    pub breakdown: BTreeMap<Dimension, f64>,
    /// completeness × coverage, in [0, 1].
    pub confidence: f64,
    /// Short templated strings, at most 6.
    pub insights: Vec<String>,
}

impl ScoredCandidate {
    /// Deterministic ranking order: fit_score desc, then confidence desc,
    /// completeness desc, identity_key asc.
    pub fn ranking_cmp(&self, other: &Self) -> Ordering {
        other
            .fit_score
            .total_cmp(&self.fit_score)
            .then_with(|| other.confidence.total_cmp(&self.confidence))
            .then_with(|| {
                other
                    .candidate
                    .completeness
                    .total_cmp(&self.candidate.completeness)
            })
            .then_with(|| self.candidate.identity_key.cmp(&other.candidate.identity_key))
    }
}

/// How an outreach message body was produced.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OutreachMethod {
    Ai,
    Template,
}

/// A personalized outreach message for one candidate.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct OutreachMessage {
    /// The candidate's identity_key.
    pub candidate_ref: String,
    pub body: String,
    pub method: OutreachMethod,
    pub generated_at: DateTime<Utc>,
    pub char_count: usize,
}

/// The outcome of one sourcing job.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct JobResult {
    pub job_id: String,
    /// Distinct candidates after merging, before truncation.
    pub candidates_found: usize,
    pub top_candidates: Vec<ScoredCandidate>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub messages: Option<Vec<OutreachMessage>>,
    pub processing_time_ms: u64,
    #[serde(default)]
    pub partial_failures: Vec<PartialFailure>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeSet;

    fn scored(key: &str, fit: f64, confidence: f64, completeness: f64) -> ScoredCandidate {
        ScoredCandidate {
            candidate: Candidate {
                identity_key: key.into(),
                name: key.into(),
                headline: String::new(),
                location: String::new(),
                primary_profile_url: None,
                experience: vec![],
                education: vec![],
                skills: BTreeSet::new(),
                sources: BTreeMap::new(),
                completeness,
            },
            fit_score: fit,
            breakdown: BTreeMap::new(),
            confidence,
            insights: vec![],
        }
    }

    /// Scenario: scores {7.2, 7.2, 9.0} with tie-breakers
    /// (0.8, 0.9, "a"), (0.8, 0.9, "b"), (1.0, 1.0, "c") rank c, a, b.
    #[test]
    fn test_ranking_order_with_tie_breakers() {
        let mut list = vec![
            scored("a", 7.2, 0.8, 0.9),
            scored("b", 7.2, 0.8, 0.9),
            scored("c", 9.0, 1.0, 1.0),
        ];
        list.sort_by(|x, y| x.ranking_cmp(y));
        let keys: Vec<&str> = list.iter().map(|s| s.candidate.identity_key.as_str()).collect();
        assert_eq!(keys, vec!["c", "a", "b"]);
    }

    #[test]
    fn test_ranking_prefers_confidence_then_completeness() {
        let mut list = vec![
            scored("x", 7.0, 0.5, 0.9),
            scored("y", 7.0, 0.9, 0.2),
            scored("z", 7.0, 0.9, 0.8),
        ];
        list.sort_by(|a, b| a.ranking_cmp(b));
        let keys: Vec<&str> = list.iter().map(|s| s.candidate.identity_key.as_str()).collect();
        assert_eq!(keys, vec!["z", "y", "x"]);
    }
}
