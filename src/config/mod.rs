// src/config/mod.rs
//! Application configuration.
//!
//! Lookup order:
//! 1) $SCORECARD_CONFIG_PATH
//! 2) config/scorecard.toml
//! 3) config/scorecard.json
//! 4) built-in defaults
//!
//! Environment overrides are applied on top of whichever source was used.

pub mod github;
pub mod registry;

use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use anyhow::{anyhow, Context, Result};
use serde::{Deserialize, Serialize};
use tracing::warn;

pub use github::GithubConfig;
pub use registry::RegistryConfig;

const ENV_PATH: &str = "SCORECARD_CONFIG_PATH";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub registry: RegistryConfig,
    pub github: GithubConfig,
    pub output_dir: PathBuf,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            registry: RegistryConfig::default(),
            github: GithubConfig::default(),
            output_dir: PathBuf::from("output"),
        }
    }
}

impl AppConfig {
    /// Load from an explicit path (TOML or JSON by extension), then apply env overrides.
    pub fn load_from(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("reading config from {}", path.display()))?;
        let ext = path
            .extension()
            .and_then(|s| s.to_str())
            .unwrap_or_default()
            .to_ascii_lowercase();
        let mut cfg = parse_config(&content, &ext)
            .with_context(|| format!("parsing config {}", path.display()))?;
        cfg.apply_env_overrides();
        Ok(cfg)
    }

    pub fn load_default() -> Result<Self> {
        if let Ok(p) = std::env::var(ENV_PATH) {
            let pb = PathBuf::from(p);
            if pb.exists() {
                return Self::load_from(&pb);
            }
            return Err(anyhow!("{ENV_PATH} points to non-existent path"));
        }
        for candidate in ["config/scorecard.toml", "config/scorecard.json"] {
            let pb = PathBuf::from(candidate);
            if pb.exists() {
                return Self::load_from(&pb);
            }
        }
        let mut cfg = Self::default();
        cfg.apply_env_overrides();
        Ok(cfg)
    }

    pub fn apply_env_overrides(&mut self) {
        if let Ok(token) = std::env::var("GITHUB_TOKEN") {
            self.github.token = Some(token);
        }
        if let Ok(base) = std::env::var("GITHUB_API_BASE") {
            self.github.api_base = base;
        }
        if let Some(k) = env_parse("ENRICH_CONCURRENCY") {
            self.github.concurrency = k;
        }
        if let Some(buffer) = env_parse("ENRICH_RATE_BUFFER") {
            self.github.rate_limit_buffer = buffer;
        }
        if let Some(days) = env_parse("ENRICH_CACHE_MAX_AGE_DAYS") {
            self.github.cache_max_age_days = days;
        }
        if let Ok(path) = std::env::var("ENRICH_CACHE_FILE") {
            self.github.cache_file = PathBuf::from(path);
        }
        if let Ok(base) = std::env::var("REGISTRY_BASE_URL") {
            self.registry.base_url = base;
        }
        self.github.sanitize();
    }
}

fn parse_config(s: &str, hint_ext: &str) -> Result<AppConfig> {
    match hint_ext {
        "toml" => Ok(toml::from_str(s)?),
        "json" => Ok(serde_json::from_str(s)?),
        _ => toml::from_str(s)
            .map_err(anyhow::Error::from)
            .or_else(|_| serde_json::from_str(s).map_err(anyhow::Error::from))
            .map_err(|_| anyhow!("unsupported config format")),
    }
}

fn env_parse<T: FromStr>(key: &str) -> Option<T> {
    let raw = std::env::var(key).ok()?;
    match raw.trim().parse() {
        Ok(v) => Some(v),
        Err(_) => {
            warn!(key, value = %raw, "ignoring unparsable env override");
            None
        }
    }
}
