use prospect_common::config::{EngineConfig, SourceConfig};
use prospect_common::types::WEIGHT_SUM_EPSILON;

use super::loader::ConfigError;

/// Validate the complete engine configuration. Errors accumulate so a
/// broken file reports everything wrong with it at once.
pub fn validate(config: &EngineConfig) -> Result<(), ConfigError> {
    let mut errors: Vec<String> = Vec::new();

    validate_sources(config, &mut errors);
    validate_ai(config, &mut errors);
    validate_cache(config, &mut errors);
    validate_scoring(config, &mut errors);
    validate_orchestrator(config, &mut errors);

    if errors.is_empty() {
        Ok(())
    } else {
        Err(ConfigError::Validation(errors.join("; ")))
    }
}

fn validate_sources(config: &EngineConfig, errors: &mut Vec<String>) {
    let sources = [
        ("profiles", &config.sources.profiles),
        ("code_host", &config.sources.code_host),
        ("microblog", &config.sources.microblog),
        ("website", &config.sources.website),
    ];

    for (name, source) in sources {
        validate_source(name, source, errors);
    }
}

fn validate_source(name: &str, source: &SourceConfig, errors: &mut Vec<String>) {
    if !source.enabled {
        return;
    }
    if source.requests_per_window == 0 {
        errors.push(format!("sources.{name}.requests_per_window must be > 0"));
    }
    if source.window_seconds == 0 {
        errors.push(format!("sources.{name}.window_seconds must be > 0"));
    }
    if source.max_in_flight == 0 {
        errors.push(format!("sources.{name}.max_in_flight must be > 0"));
    }
    if !source.demo_mode && source.base_url.trim().is_empty() {
        errors.push(format!(
            "sources.{name}.base_url is required when demo_mode is off"
        ));
    }
}

fn validate_ai(config: &EngineConfig, errors: &mut Vec<String>) {
    let ai = &config.ai;
    if ai.provider != "anthropic" && ai.provider != "openai" {
        errors.push(format!(
            "ai.provider must be \"anthropic\" or \"openai\" (got \"{}\")",
            ai.provider
        ));
    }
    if ai.model.is_empty() {
        errors.push("ai.model must not be empty".into());
    }
    if ai.timeout_ms == 0 {
        errors.push("ai.timeout_ms must be > 0".into());
    }
    if ai.max_output_chars == 0 {
        errors.push("ai.max_output_chars must be > 0".into());
    }
}

fn validate_cache(config: &EngineConfig, errors: &mut Vec<String>) {
    if config.cache.default_ttl_s == 0 {
        errors.push("cache.default_ttl_s must be > 0".into());
    }
    if config.cache.capacity == 0 {
        errors.push("cache.capacity must be > 0".into());
    }
}

fn validate_scoring(config: &EngineConfig, errors: &mut Vec<String>) {
    let weights = &config.scoring.rubric_weights;
    if weights.is_empty() {
        errors.push("scoring.rubric_weights must not be empty".into());
        return;
    }
    let mut sum = 0.0;
    for (dimension, weight) in weights {
        if *weight < 0.0 || !weight.is_finite() {
            errors.push(format!(
                "scoring.rubric_weights.{} must be a non-negative number",
                dimension.as_str()
            ));
        }
        sum += weight;
    }
    if (sum - 1.0).abs() > WEIGHT_SUM_EPSILON {
        errors.push(format!(
            "scoring.rubric_weights must sum to 1.0 (got {sum})"
        ));
    }
}

fn validate_orchestrator(config: &EngineConfig, errors: &mut Vec<String>) {
    let orchestrator = &config.orchestrator;
    if orchestrator.job_timeout_s == 0 {
        errors.push("orchestrator.job_timeout_s must be > 0".into());
    }
    if orchestrator.global_max_in_flight == 0 {
        errors.push("orchestrator.global_max_in_flight must be > 0".into());
    }
    if orchestrator.outreach_concurrency == 0 {
        errors.push("orchestrator.outreach_concurrency must be > 0".into());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use prospect_common::types::Dimension;

    #[test]
    fn test_defaults_validate() {
        assert!(validate(&EngineConfig::default()).is_ok());
    }

    #[test]
    fn test_bad_weights_rejected() {
        let mut config = EngineConfig::default();
        config
            .scoring
            .rubric_weights
            .insert(Dimension::Education, 0.9);
        let err = validate(&config).unwrap_err();
        assert!(err.to_string().contains("sum to 1.0"));
    }

    #[test]
    fn test_live_source_requires_base_url() {
        let mut config = EngineConfig::default();
        config.sources.profiles.demo_mode = false;
        let err = validate(&config).unwrap_err();
        assert!(err.to_string().contains("base_url"));
    }

    #[test]
    fn test_disabled_source_skips_checks() {
        let mut config = EngineConfig::default();
        config.sources.website.enabled = false;
        config.sources.website.requests_per_window = 0;
        assert!(validate(&config).is_ok());
    }
}
