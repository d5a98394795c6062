pub mod dimensions;
pub mod seniority;

use std::collections::BTreeMap;

use prospect_common::config::ScoringConfig;
use prospect_common::types::{Candidate, Dimension, JobSpec, ScoredCandidate};

use crate::normalize::tokenize_skills;

/// Score assigned when a dimension's inputs are missing. Such
/// dimensions do not count toward coverage.
pub const NEUTRAL_SCORE: f64 = 5.0;

const MAX_INSIGHTS: usize = 6;

/// Applies the weighted rubric to a candidate against a job spec.
pub struct FitScorer {
    config: ScoringConfig,
}

impl FitScorer {
    pub fn new(config: ScoringConfig) -> Self {
        Self { config }
    }

    /// fit_score = Σ wᵢ · sᵢ with per-job weight overrides honored.
    /// confidence = completeness × coverage, where coverage is the
    /// fraction of dimensions whose inputs were present.
    pub fn score(&self, candidate: &Candidate, spec: &JobSpec) -> ScoredCandidate {
        let required = tokenize_skills(
            &self.config.skill_vocabulary,
            spec.required_skills.iter().cloned(),
        );
        let preferred = tokenize_skills(
            &self.config.skill_vocabulary,
            spec.preferred_skills.iter().cloned(),
        );

        let raw: [(Dimension, Option<f64>); 6] = [
            (
                Dimension::Education,
                dimensions::education(candidate, &self.config),
            ),
            (Dimension::Trajectory, dimensions::trajectory(candidate)),
            (
                Dimension::CompanyRelevance,
                dimensions::company_relevance(candidate, &required, &self.config),
            ),
            (
                Dimension::ExperienceMatch,
                dimensions::experience_match(candidate, &required, &preferred),
            ),
            (
                Dimension::LocationMatch,
                dimensions::location_match(candidate, spec),
            ),
            (Dimension::Tenure, dimensions::tenure(candidate)),
        ];

        let weights = spec
            .rubric_weights
            .as_ref()
            .unwrap_or(&self.config.rubric_weights);

        let mut breakdown = BTreeMap::new();
        let mut fit_score = 0.0;
        let mut present = 0usize;

        for (dimension, score) in raw {
            let value = match score {
                Some(s) => {
                    present += 1;
                    s.clamp(0.0, 10.0)
                }
                None => NEUTRAL_SCORE,
            };
            fit_score += weights.get(&dimension).copied().unwrap_or(0.0) * value;
            breakdown.insert(dimension, value);
        }

        let coverage = present as f64 / Dimension::ALL.len() as f64;
        let confidence = (candidate.completeness * coverage).clamp(0.0, 1.0);

        ScoredCandidate {
            candidate: candidate.clone(),
            fit_score,
            breakdown: breakdown.clone(),
            confidence,
            insights: build_insights(&breakdown),
        }
    }
}

/// Short templated strings emitted when dimensions cross thresholds.
fn build_insights(breakdown: &BTreeMap<Dimension, f64>) -> Vec<String> {
    let over = |dimension: Dimension, threshold: f64| {
        breakdown.get(&dimension).copied().unwrap_or(0.0) >= threshold
    };

    let mut insights = Vec::new();
    if over(Dimension::ExperienceMatch, 9.0) {
        insights.push("strong skill match".to_string());
    }
    if over(Dimension::Trajectory, 8.0) {
        insights.push("rapid career progression".to_string());
    }
    if over(Dimension::CompanyRelevance, 9.0) {
        insights.push("top-tier company experience".to_string());
    }
    if over(Dimension::Education, 9.0) {
        insights.push("elite education".to_string());
    }
    if over(Dimension::Tenure, 9.0) {
        insights.push("healthy tenure history".to_string());
    }
    if over(Dimension::LocationMatch, 10.0) {
        insights.push("location aligned".to_string());
    }
    insights.truncate(MAX_INSIGHTS);
    insights
}

#[cfg(test)]
mod tests {
    use super::*;
    use prospect_common::types::{RawRecord, SeniorityHint, SourceId};

    use crate::normalize::Normalizer;
    use crate::sources::demo_records;

    fn spec() -> JobSpec {
        JobSpec {
            id: "job-1".into(),
            title: "ML Research Engineer".into(),
            company: "Acme AI".into(),
            description: String::new(),
            highlights: vec![],
            required_skills: vec!["PyTorch".into(), "Python".into()],
            preferred_skills: vec!["CUDA".into()],
            location_preferences: vec!["San Francisco".into(), "remote".into()],
            seniority_hint: SeniorityHint::Senior,
            rubric_weights: None,
            max_candidates: 10,
            include_outreach: false,
        }
    }

    fn demo_candidates(spec: &JobSpec) -> Vec<Candidate> {
        let normalizer = Normalizer::new(ScoringConfig::default().skill_vocabulary);
        demo_records(SourceId::Profiles, spec)
            .iter()
            .map(|record: &RawRecord| normalizer.normalize(record).unwrap())
            .collect()
    }

    #[test]
    fn test_score_bounds_hold() {
        let scorer = FitScorer::new(ScoringConfig::default());
        let spec = spec();
        for candidate in demo_candidates(&spec) {
            let scored = scorer.score(&candidate, &spec);
            assert!((0.0..=10.0).contains(&scored.fit_score), "{}", scored.fit_score);
            assert!((0.0..=1.0).contains(&scored.confidence));
            assert!((0.0..=1.0).contains(&scored.candidate.completeness));
            assert_eq!(scored.breakdown.len(), 6);
            for value in scored.breakdown.values() {
                assert!((0.0..=10.0).contains(value));
            }
            assert!(scored.insights.len() <= 6);
        }
    }

    #[test]
    fn test_weight_scaling_scales_fit_score() {
        let scorer = FitScorer::new(ScoringConfig::default());
        let mut spec = spec();
        let candidate = demo_candidates(&spec).remove(0);

        let base = scorer.score(&candidate, &spec).fit_score;

        let halved: BTreeMap<Dimension, f64> = Dimension::default_weights()
            .into_iter()
            .map(|(d, w)| (d, w * 0.5))
            .collect();
        spec.rubric_weights = Some(halved);
        let scaled = scorer.score(&candidate, &spec).fit_score;

        assert!((scaled - base * 0.5).abs() < 1e-9);
    }

    #[test]
    fn test_missing_inputs_score_neutral_and_drop_confidence() {
        let scorer = FitScorer::new(ScoringConfig::default());
        let spec = spec();

        let bare = Candidate {
            identity_key: "k".into(),
            name: "Mystery Person".into(),
            headline: String::new(),
            location: String::new(),
            primary_profile_url: None,
            experience: vec![],
            education: vec![],
            skills: Default::default(),
            sources: Default::default(),
            completeness: 0.2,
        };
        let scored = scorer.score(&bare, &spec);

        // Every dimension lacked inputs: all neutral, coverage 0.
        for value in scored.breakdown.values() {
            assert_eq!(*value, NEUTRAL_SCORE);
        }
        assert_eq!(scored.confidence, 0.0);
        assert!((scored.fit_score - NEUTRAL_SCORE).abs() < 1e-9);
    }

    #[test]
    fn test_strong_match_emits_insights() {
        let scorer = FitScorer::new(ScoringConfig::default());
        let spec = spec();
        let candidates = demo_candidates(&spec);
        let sarah = candidates
            .iter()
            .find(|c| c.name == "Sarah Chen")
            .expect("roster candidate");

        let scored = scorer.score(sarah, &spec);
        assert!(scored
            .insights
            .iter()
            .any(|i| i == "strong skill match"));
        assert!(scored.insights.iter().any(|i| i == "elite education"));
    }
}
