use std::path::{Path, PathBuf};

use prospect_common::config::EngineConfig;

use super::validation;

/// Load engine configuration from a TOML file.
///
/// A missing path yields the built-in defaults (demo mode on every
/// source, in-memory cache). Anything present is validated and the
/// engine refuses to start on failure.
pub fn load_config(path: Option<&Path>) -> Result<EngineConfig, ConfigError> {
    let config = match path {
        Some(path) => {
            tracing::info!(path = %path.display(), "Loading configuration");
            let content = std::fs::read_to_string(path).map_err(|e| ConfigError::FileRead {
                path: path.to_path_buf(),
                source: e,
            })?;
            toml::from_str(&content).map_err(|e| ConfigError::Parse {
                path: path.to_path_buf(),
                detail: e.to_string(),
            })?
        }
        None => {
            tracing::info!("No configuration file, using defaults");
            EngineConfig::default()
        }
    };

    validation::validate(&config)?;
    Ok(config)
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read {path}: {source}")]
    FileRead {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to parse {path}: {detail}")]
    Parse { path: PathBuf, detail: String },

    #[error("Validation failed: {0}")]
    Validation(String),
}

impl From<ConfigError> for prospect_common::EngineError {
    fn from(e: ConfigError) -> Self {
        prospect_common::EngineError::Config(e.to_string())
    }
}
