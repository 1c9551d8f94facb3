use serde::{Deserialize, Serialize};
use std::num::NonZeroUsize;
use std::path::Path;

use crate::error::{ModlocError, Result};

/// Top-level configuration, read from `modloc.toml`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub translator: TranslatorConfig,
    #[serde(default)]
    pub run: RunConfig,
}

/// Translation provider settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TranslatorConfig {
    #[serde(default = "default_base_url")]
    pub base_url: String,
    #[serde(default)]
    pub api_key: String,
    #[serde(default = "default_model")]
    pub model: String,
    #[serde(default = "default_target_language")]
    pub target_language: String,
    /// Game named in the translation prompt.
    #[serde(default = "default_game")]
    pub game: String,
    /// Per-request HTTP timeout in seconds (default: 60).
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for TranslatorConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            api_key: String::new(),
            model: default_model(),
            target_language: default_target_language(),
            game: default_game(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

impl TranslatorConfig {
    /// Applies `MODLOC_API_KEY` / `TOKEN`, `MODLOC_BASE_URL` / `BASE_URL` and
    /// `MODLOC_MODEL` from the process environment.
    pub fn apply_env(&mut self) {
        self.apply_env_from(|name| std::env::var(name).ok());
    }

    pub fn apply_env_from<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let first = |names: &[&str]| {
            names
                .iter()
                .find_map(|name| lookup(name).filter(|v| !v.trim().is_empty()))
        };
        if let Some(key) = first(&["MODLOC_API_KEY", "TOKEN"]) {
            self.api_key = key;
        }
        if let Some(url) = first(&["MODLOC_BASE_URL", "BASE_URL"]) {
            self.base_url = url;
        }
        if let Some(model) = first(&["MODLOC_MODEL"]) {
            self.model = model;
        }
    }
}

/// Settings for one translation run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunConfig {
    /// Maximum number of translation calls in flight (default: 5).
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,
    /// Source file name looked for in each mod folder.
    #[serde(default = "default_source_file")]
    pub source_file: String,
    /// Result file name written next to the source.
    #[serde(default = "default_result_file")]
    pub result_file: String,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            concurrency: default_concurrency(),
            source_file: default_source_file(),
            result_file: default_result_file(),
        }
    }
}

impl RunConfig {
    pub fn concurrency_limit(&self) -> Result<NonZeroUsize> {
        NonZeroUsize::new(self.concurrency)
            .ok_or_else(|| ModlocError::Config("concurrency must be at least 1".to_string()))
    }
}

fn default_base_url() -> String {
    "https://api.openai.com/v1".to_string()
}
fn default_model() -> String {
    "gpt-4o".to_string()
}
fn default_target_language() -> String {
    "Simplified Chinese".to_string()
}
fn default_game() -> String {
    "Stardew Valley".to_string()
}
fn default_timeout_secs() -> u64 {
    60
}
fn default_concurrency() -> usize {
    5
}
fn default_source_file() -> String {
    "default.json".to_string()
}
fn default_result_file() -> String {
    "zh.json".to_string()
}

/// Load configuration from a TOML file. A missing file yields defaults.
pub fn load(path: &Path) -> Result<Config> {
    if !path.exists() {
        tracing::info!("Config file not found at {}, using defaults", path.display());
        return Ok(Config::default());
    }

    let content = std::fs::read_to_string(path)
        .map_err(|e| ModlocError::Config(format!("failed to read {}: {}", path.display(), e)))?;

    let config: Config = toml::from_str(&content)
        .map_err(|e| ModlocError::Config(format!("failed to parse config: {}", e)))?;

    config.run.concurrency_limit()?;
    Ok(config)
}
