// src/config/github.rs
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::enrich::client::GITHUB_API_BASE;

pub const DEFAULT_CONCURRENCY: usize = 10;
pub const DEFAULT_RATE_LIMIT_BUFFER: u32 = 100;
pub const DEFAULT_CACHE_MAX_AGE_DAYS: u32 = 7;
pub const DEFAULT_CACHE_FILE: &str = "data/github_cache.json";

/// GitHub enrichment settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct GithubConfig {
    pub api_base: String,
    /// Bearer token; normally taken from `GITHUB_TOKEN`.
    #[serde(skip_serializing)]
    pub token: Option<String>,
    /// Workers per batch (K).
    pub concurrency: usize,
    /// Requests held back below the provider's hard limit.
    pub rate_limit_buffer: u32,
    pub cache_file: PathBuf,
    /// Entries older than this are re-fetched.
    pub cache_max_age_days: u32,
    pub request_timeout_secs: u64,
    /// Wait before the single retry of a 202 participation response.
    pub participation_retry_delay_ms: u64,
}

impl Default for GithubConfig {
    fn default() -> Self {
        Self {
            api_base: GITHUB_API_BASE.to_string(),
            token: None,
            concurrency: DEFAULT_CONCURRENCY,
            rate_limit_buffer: DEFAULT_RATE_LIMIT_BUFFER,
            cache_file: PathBuf::from(DEFAULT_CACHE_FILE),
            cache_max_age_days: DEFAULT_CACHE_MAX_AGE_DAYS,
            request_timeout_secs: 30,
            participation_retry_delay_ms: 2_000,
        }
    }
}

impl GithubConfig {
    pub(crate) fn sanitize(&mut self) {
        if self.concurrency == 0 {
            self.concurrency = 1;
        }
        if self.request_timeout_secs == 0 {
            self.request_timeout_secs = GithubConfig::default().request_timeout_secs;
        }
        self.token = self
            .token
            .take()
            .map(|t| t.trim().to_string())
            .filter(|t| !t.is_empty());
        if self.api_base.trim().is_empty() {
            self.api_base = GITHUB_API_BASE.to_string();
        }
    }
}
