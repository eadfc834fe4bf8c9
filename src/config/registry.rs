// src/config/registry.rs
use serde::{Deserialize, Serialize};

pub const REGISTRY_BASE_URL: &str = "https://registry.modelcontextprotocol.io";

/// MCP registry collector settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RegistryConfig {
    pub base_url: String,
    /// `limit` query parameter per page.
    pub page_limit: u32,
    pub request_timeout_secs: u64,
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            base_url: REGISTRY_BASE_URL.to_string(),
            page_limit: 100,
            request_timeout_secs: 30,
        }
    }
}
