// src/registry/mod.rs
//! MCP registry collector.
//!
//! Paginates `/v0/servers` and returns normalized [`ServerEntry`] records,
//! keeping only entries marked `isLatest`.

pub mod types;

use std::time::Duration;

use anyhow::{Context, Result};
use tracing::{info, warn};

use crate::config::RegistryConfig;
use crate::registry::types::{Page, RawEntry};

pub use types::{EnvVar, ServerEntry};

pub struct RegistryClient {
    http: reqwest::Client,
    base_url: String,
    page_limit: u32,
}

impl RegistryClient {
    pub fn new(cfg: &RegistryConfig) -> Result<Self> {
        let http = reqwest::Client::builder()
            .user_agent(concat!("mcp-scorecard/", env!("CARGO_PKG_VERSION")))
            .timeout(Duration::from_secs(cfg.request_timeout_secs.max(1)))
            .build()
            .context("building registry http client")?;
        Ok(Self {
            http,
            base_url: cfg.base_url.trim_end_matches('/').to_string(),
            page_limit: cfg.page_limit.max(1),
        })
    }

    /// Fetch every page. Any HTTP or decode error aborts the collection.
    pub async fn collect(&self) -> Result<Vec<ServerEntry>> {
        let url = format!("{}/v0/servers", self.base_url);
        let mut entries = Vec::new();
        let mut cursor: Option<String> = None;
        let mut page_no = 0usize;

        loop {
            page_no += 1;
            let mut req = self
                .http
                .get(&url)
                .query(&[("limit", self.page_limit.to_string())]);
            if let Some(c) = &cursor {
                req = req.query(&[("cursor", c.as_str())]);
            }

            let page: Page = req
                .send()
                .await
                .with_context(|| format!("registry GET page {page_no}"))?
                .error_for_status()
                .with_context(|| format!("registry page {page_no} status"))?
                .json()
                .await
                .with_context(|| format!("decoding registry page {page_no}"))?;

            let raw = page.servers.unwrap_or_default();
            let raw_count = raw.len();
            let before = entries.len();
            for value in raw {
                match serde_json::from_value::<RawEntry>(value) {
                    Ok(e) if e.is_latest() => entries.push(e.normalize()),
                    Ok(_) => {}
                    Err(e) => warn!(target: "registry", page = page_no, error = %e, "skipping malformed registry entry"),
                }
            }

            info!(
                target: "registry",
                page = page_no,
                raw = raw_count,
                latest = entries.len() - before,
                total = entries.len(),
                "collected registry page"
            );

            cursor = page
                .metadata
                .and_then(|m| m.next_cursor)
                .filter(|c| !c.is_empty());
            if cursor.is_none() || raw_count == 0 {
                break;
            }
        }

        info!(target: "registry", servers = entries.len(), "registry collection complete");
        Ok(entries)
    }
}
