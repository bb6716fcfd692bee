//! Application configuration
//!
//! Layered, lowest precedence first: built-in defaults, an optional JSON
//! file, environment variables, then command-line flags (applied by the
//! binary). The API key is only ever injected; there is no built-in value.

use crate::assist::SuggestionFailurePolicy;
use crate::gateway::gemini::{DEFAULT_API_BASE, DEFAULT_MODEL};
use crate::gateway::RetryPolicy;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

pub const ENV_API_KEY: &str = "GEMINI_API_KEY";
pub const ENV_MODEL: &str = "DECISION_LOG_MODEL";
pub const ENV_API_BASE: &str = "DECISION_LOG_API_BASE";
pub const ENV_EXPORT_DIR: &str = "DECISION_LOG_EXPORT_DIR";
pub const ENV_ON_SUGGESTION_FAILURE: &str = "DECISION_LOG_ON_SUGGESTION_FAILURE";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Credential for the text-generation endpoint
    #[serde(skip_serializing)]
    pub api_key: Option<String>,

    pub api_base: String,

    pub model: String,

    pub retry: RetryPolicy,

    pub on_suggestion_failure: SuggestionFailurePolicy,

    /// Where CSV exports go (default: current directory)
    pub export_dir: Option<PathBuf>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            api_base: DEFAULT_API_BASE.to_string(),
            model: DEFAULT_MODEL.to_string(),
            retry: RetryPolicy::default(),
            on_suggestion_failure: SuggestionFailurePolicy::default(),
            export_dir: None,
        }
    }
}

impl AppConfig {
    /// Defaults, then the config file, then the process environment.
    ///
    /// An explicit `path` must exist; the default location is optional.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut config = match path {
            Some(path) => Self::from_file(path)?,
            None => match default_config_path() {
                Some(default) if default.exists() => Self::from_file(&default)?,
                _ => Self::default(),
            },
        };

        config.apply_env(|key| std::env::var(key).ok())?;
        Ok(config)
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config from {:?}", path))?;
        let config: AppConfig = serde_json::from_str(&content)
            .with_context(|| format!("Invalid config file {:?}", path))?;
        tracing::debug!(path = %path.display(), "Config file loaded");
        Ok(config)
    }

    /// Override fields from environment lookups; blank values are ignored
    pub fn apply_env<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(key) = get(ENV_API_KEY) {
            self.api_key = Some(key);
        }
        if let Some(model) = get(ENV_MODEL) {
            self.model = model;
        }
        if let Some(base) = get(ENV_API_BASE) {
            self.api_base = base;
        }
        if let Some(dir) = get(ENV_EXPORT_DIR) {
            self.export_dir = Some(PathBuf::from(dir));
        }
        if let Some(policy) = get(ENV_ON_SUGGESTION_FAILURE) {
            self.on_suggestion_failure = policy
                .parse()
                .with_context(|| format!("Invalid {}", ENV_ON_SUGGESTION_FAILURE))?;
        }
        Ok(())
    }

    pub fn has_api_key(&self) -> bool {
        self.api_key.as_deref().is_some_and(|k| !k.is_empty())
    }

    /// Export directory, falling back to the working directory
    pub fn export_dir(&self) -> PathBuf {
        self.export_dir
            .clone()
            .unwrap_or_else(|| PathBuf::from("."))
    }
}

/// `<config dir>/decision-log/config.json`
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|base| base.join("decision-log").join("config.json"))
}
