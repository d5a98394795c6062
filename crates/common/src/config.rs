use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::types::Dimension;

/// Top-level engine configuration, deserialized from engine.toml.
///
/// Every field has a default so an empty file is valid: demo mode on
/// every source, in-memory cache, no AI backend credential.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub sources: SourcesConfig,
    pub ai: AiConfig,
    pub cache: CacheSettings,
    pub scoring: ScoringConfig,
    pub orchestrator: OrchestratorConfig,
}

/// Per-provider acquisition settings.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SourcesConfig {
    pub profiles: SourceConfig,
    pub code_host: SourceConfig,
    pub microblog: SourceConfig,
    pub website: SourceConfig,
}

/// Settings for a single source adapter.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct SourceConfig {
    pub enabled: bool,
    /// Upstream API base URL. Ignored in demo mode.
    pub base_url: String,
    /// Name of the environment variable holding the API credential.
    /// Secrets never live in the config file itself.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub credential: Option<String>,
    /// Token-bucket rate: `requests_per_window` requests per
    /// `window_seconds` seconds.
    pub requests_per_window: u32,
    pub window_seconds: u64,
    /// Max concurrent external calls against this source.
    pub max_in_flight: u32,
    /// Produce deterministic synthetic records instead of calling out.
    pub demo_mode: bool,
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            base_url: String::new(),
            credential: None,
            requests_per_window: 30,
            window_seconds: 60,
            max_in_flight: 4,
            demo_mode: true,
        }
    }
}

/// Outreach AI backend settings.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct AiConfig {
    /// Provider name ("anthropic" or "openai").
    pub provider: String,
    pub model: String,
    /// Name of the environment variable holding the API key. Defaults to
    /// the provider's standard env var when unset.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub credential: Option<String>,
    /// Wall-clock budget for one generation call.
    pub timeout_ms: u64,
    /// Responses longer than this are truncated at a word boundary.
    pub max_output_chars: usize,
}

impl Default for AiConfig {
    fn default() -> Self {
        Self {
            provider: "anthropic".into(),
            model: "claude-sonnet-4-20250514".into(),
            credential: None,
            timeout_ms: 15_000,
            max_output_chars: 1_200,
        }
    }
}

/// Which backing store the cache uses.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CacheKind {
    #[default]
    Memory,
    /// Redis, addressed by the REDIS_URL environment variable.
    External,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheSettings {
    pub kind: CacheKind,
    pub default_ttl_s: u64,
    /// Max entries in the memory backing. Ignored for external.
    pub capacity: usize,
}

impl Default for CacheSettings {
    fn default() -> Self {
        Self {
            kind: CacheKind::Memory,
            default_ttl_s: 3_600,
            capacity: 4_096,
        }
    }
}

/// Rubric reference sets and weights.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct ScoringConfig {
    /// Dimension → weight. Must sum to 1.0. Per-job overrides in the
    /// JobSpec take precedence.
    pub rubric_weights: BTreeMap<Dimension, f64>,
    pub elite_schools: Vec<String>,
    pub top_tier_companies: Vec<String>,
    /// Skill alias → canonical token ("js" → "javascript").
    pub skill_vocabulary: BTreeMap<String, String>,
}

impl Default for ScoringConfig {
    fn default() -> Self {
        Self {
            rubric_weights: Dimension::default_weights(),
            elite_schools: [
                "MIT",
                "Stanford University",
                "Carnegie Mellon University",
                "UC Berkeley",
                "Harvard University",
                "Princeton University",
                "University of Oxford",
                "University of Cambridge",
                "ETH Zurich",
                "Caltech",
            ]
            .map(String::from)
            .to_vec(),
            top_tier_companies: [
                "Google",
                "Meta",
                "Apple",
                "Amazon",
                "Microsoft",
                "Netflix",
                "OpenAI",
                "Anthropic",
                "DeepMind",
                "Stripe",
                "Databricks",
            ]
            .map(String::from)
            .to_vec(),
            skill_vocabulary: [
                ("js", "javascript"),
                ("ts", "typescript"),
                ("py", "python"),
                ("golang", "go"),
                ("k8s", "kubernetes"),
                ("tf", "tensorflow"),
                ("postgres", "postgresql"),
                ("ml", "machine learning"),
            ]
            .into_iter()
            .map(|(a, c)| (a.to_string(), c.to_string()))
            .collect(),
        }
    }
}

/// Job-level pacing and concurrency.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct OrchestratorConfig {
    /// Overall wall-clock budget for one job.
    pub job_timeout_s: u64,
    /// Cap on in-flight external calls process-wide; also bounds how
    /// many jobs are admitted concurrently.
    pub global_max_in_flight: usize,
    /// Outreach generation fan-out per job.
    pub outreach_concurrency: usize,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            job_timeout_s: 120,
            global_max_in_flight: 20,
            outreach_concurrency: 4,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::WEIGHT_SUM_EPSILON;

    #[test]
    fn test_empty_toml_is_valid() {
        let config: EngineConfig = toml_like_default();
        assert!(config.sources.profiles.demo_mode);
        assert_eq!(config.cache.kind, CacheKind::Memory);
        assert_eq!(config.orchestrator.global_max_in_flight, 20);
    }

    fn toml_like_default() -> EngineConfig {
        serde_json::from_str("{}").unwrap()
    }

    #[test]
    fn test_default_rubric_weights_sum_to_one() {
        let config = EngineConfig::default();
        let sum: f64 = config.scoring.rubric_weights.values().sum();
        assert!((sum - 1.0).abs() < WEIGHT_SUM_EPSILON);
    }

    #[test]
    fn test_source_overrides_deserialize() {
        let json = r#"{
            "sources": {
                "profiles": {"demo_mode": false, "base_url": "https://api.example.com", "requests_per_window": 2, "window_seconds": 60}
            }
        }"#;
        let config: EngineConfig = serde_json::from_str(json).unwrap();
        assert!(!config.sources.profiles.demo_mode);
        assert_eq!(config.sources.profiles.requests_per_window, 2);
        // Untouched sources keep defaults.
        assert!(config.sources.microblog.demo_mode);
    }
}
