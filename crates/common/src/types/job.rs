use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::EngineError;

/// Seniority bands recognized in job specs and title parsing.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SeniorityHint {
    Intern,
    Junior,
    Mid,
    Senior,
    Staff,
    Principal,
    Lead,
    Manager,
    Director,
    Vp,
    CLevel,
    #[default]
    Unknown,
}

/// Rubric dimensions used by the fit scorer.
#[derive(
    Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum Dimension {
    Education,
    Trajectory,
    CompanyRelevance,
    ExperienceMatch,
    LocationMatch,
    Tenure,
}

impl Dimension {
    pub const ALL: [Dimension; 6] = [
        Dimension::Education,
        Dimension::Trajectory,
        Dimension::CompanyRelevance,
        Dimension::ExperienceMatch,
        Dimension::LocationMatch,
        Dimension::Tenure,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Dimension::Education => "education",
            Dimension::Trajectory => "trajectory",
            Dimension::CompanyRelevance => "company_relevance",
            Dimension::ExperienceMatch => "experience_match",
            Dimension::LocationMatch => "location_match",
            Dimension::Tenure => "tenure",
        }
    }

    /// Default rubric weights. Sum to 1.0.
    pub fn default_weights() -> BTreeMap<Dimension, f64> {
        BTreeMap::from([
            (Dimension::Education, 0.20),
            (Dimension::Trajectory, 0.20),
            (Dimension::CompanyRelevance, 0.15),
            (Dimension::ExperienceMatch, 0.25),
            (Dimension::LocationMatch, 0.10),
            (Dimension::Tenure, 0.10),
        ])
    }
}

/// Tolerance for the weight-sum invariant.
pub const WEIGHT_SUM_EPSILON: f64 = 1e-6;

/// The structured query describing the role and search parameters.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct JobSpec {
    /// Opaque caller-supplied identifier, unique per call.
    #[serde(default)]
    pub id: String,
    /// Role title being hired for (used in outreach context).
    pub title: String,
    /// Hiring company (used in outreach context).
    pub company: String,
    #[serde(default)]
    pub description: String,
    /// Optional selling points woven into outreach messages.
    #[serde(default)]
    pub highlights: Vec<String>,
    #[serde(default)]
    pub required_skills: Vec<String>,
    #[serde(default)]
    pub preferred_skills: Vec<String>,
    /// Ordered geographic preferences (city, metro, "remote").
    #[serde(default)]
    pub location_preferences: Vec<String>,
    #[serde(default)]
    pub seniority_hint: SeniorityHint,
    /// Per-job rubric weight overrides. None falls back to the
    /// configured (or default) weights.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rubric_weights: Option<BTreeMap<Dimension, f64>>,
    #[serde(default = "default_max_candidates")]
    pub max_candidates: usize,
    #[serde(default)]
    pub include_outreach: bool,
}

fn default_max_candidates() -> usize {
    10
}

impl JobSpec {
    /// Validate the invariants of the spec. Invalid specs are rejected
    /// before the job starts.
    pub fn validate(&self) -> Result<(), EngineError> {
        if self.id.trim().is_empty() {
            return Err(EngineError::Validation("job id must not be empty".into()));
        }
        if self.max_candidates == 0 {
            return Err(EngineError::Validation(
                "max_candidates must be >= 1".into(),
            ));
        }
        if let Some(weights) = &self.rubric_weights {
            let mut sum = 0.0;
            for (dim, w) in weights {
                if *w < 0.0 || !w.is_finite() {
                    return Err(EngineError::Validation(format!(
                        "rubric weight for {} must be a non-negative number",
                        dim.as_str()
                    )));
                }
                sum += w;
            }
            if (sum - 1.0).abs() > WEIGHT_SUM_EPSILON {
                return Err(EngineError::Validation(format!(
                    "rubric weights must sum to 1.0 (got {sum})"
                )));
            }
        }
        Ok(())
    }

    /// Stable fingerprint over the search-relevant fields, used to build
    /// cache keys. Two specs asking the same question share a fingerprint
    /// even when ids differ.
    pub fn fingerprint(&self) -> String {
        let mut terms: Vec<String> = self
            .required_skills
            .iter()
            .chain(self.preferred_skills.iter())
            .map(|s| s.trim().to_lowercase())
            .filter(|s| !s.is_empty())
            .collect();
        terms.sort();
        terms.dedup();

        let mut locations: Vec<String> = self
            .location_preferences
            .iter()
            .map(|l| l.trim().to_lowercase())
            .collect();
        locations.sort();

        let material = format!(
            "{}|{}|{:?}|{}|{}",
            self.title.trim().to_lowercase(),
            terms.join(","),
            self.seniority_hint,
            locations.join(","),
            self.description.trim().to_lowercase(),
        );
        Uuid::new_v5(&Uuid::NAMESPACE_OID, material.as_bytes()).to_string()
    }
}

/// Job lifecycle phases driven by the orchestrator.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobPhase {
    Pending,
    Discovering,
    Normalizing,
    Merging,
    Scoring,
    Ranking,
    Generating,
    /// Terminal. A job also completes with `partial_failures` populated.
    Completed,
}

impl JobPhase {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Discovering => "discovering",
            Self::Normalizing => "normalizing",
            Self::Merging => "merging",
            Self::Scoring => "scoring",
            Self::Ranking => "ranking",
            Self::Generating => "generating",
            Self::Completed => "completed",
        }
    }
}
