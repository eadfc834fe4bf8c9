// src/enrich/client.rs
//! Transport seam for the GitHub REST API.
//!
//! The worker and orchestrator only see [`GithubApi`], so tests can script
//! responses without a network. [`HttpGithubClient`] is the reqwest-backed
//! production implementation.

use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT};
use serde_json::Value;

use crate::config::GithubConfig;

pub const GITHUB_API_BASE: &str = "https://api.github.com";

const RATE_REMAINING_HEADER: &str = "x-ratelimit-remaining";
const API_VERSION: &str = "2022-11-28";

/// What the engine keeps from one HTTP exchange.
#[derive(Debug, Clone, PartialEq)]
pub struct ApiResponse {
    pub status: u16,
    /// Parsed `X-RateLimit-Remaining`, when present.
    pub remaining: Option<u32>,
    /// JSON body, only read for 200 responses.
    pub body: Option<Value>,
}

impl ApiResponse {
    pub fn new(status: u16) -> Self {
        Self {
            status,
            remaining: None,
            body: None,
        }
    }

    pub fn ok(body: Value) -> Self {
        Self::new(200).with_body(body)
    }

    pub fn with_body(mut self, body: Value) -> Self {
        self.body = Some(body);
        self
    }

    pub fn with_remaining(mut self, remaining: u32) -> Self {
        self.remaining = Some(remaining);
        self
    }

    pub fn is_ok(&self) -> bool {
        self.status == 200
    }

    /// GitHub is still computing statistics for the repo.
    pub fn is_pending(&self) -> bool {
        self.status == 202
    }

    pub fn is_throttled(&self) -> bool {
        matches!(self.status, 403 | 429)
    }

    /// Body of a 200 response; anything else is treated as no data.
    pub fn into_ok_body(self) -> Option<Value> {
        if self.is_ok() {
            self.body
        } else {
            None
        }
    }
}

#[async_trait]
pub trait GithubApi: Send + Sync {
    /// GET an API path such as `/repos/{owner}/{repo}`.
    ///
    /// `Err` means a transport failure (timeout, connection error); any HTTP
    /// status, including errors, comes back as `Ok`.
    async fn get(&self, path: &str) -> Result<ApiResponse>;
}

pub struct HttpGithubClient {
    http: reqwest::Client,
    base: String,
}

impl HttpGithubClient {
    pub fn new(base: &str, token: Option<&str>, timeout: Duration) -> Result<Self> {
        let mut headers = HeaderMap::new();
        headers.insert(
            ACCEPT,
            HeaderValue::from_static("application/vnd.github+json"),
        );
        headers.insert("x-github-api-version", HeaderValue::from_static(API_VERSION));
        if let Some(token) = token.map(str::trim).filter(|t| !t.is_empty()) {
            let mut auth = HeaderValue::from_str(&format!("Bearer {token}"))
                .context("GITHUB_TOKEN is not a valid header value")?;
            auth.set_sensitive(true);
            headers.insert(reqwest::header::AUTHORIZATION, auth);
        }

        let http = reqwest::Client::builder()
            .user_agent(concat!("mcp-scorecard/", env!("CARGO_PKG_VERSION")))
            .default_headers(headers)
            .timeout(timeout)
            .build()
            .context("building github http client")?;

        Ok(Self {
            http,
            base: base.trim_end_matches('/').to_string(),
        })
    }

    pub fn from_config(cfg: &GithubConfig) -> Result<Self> {
        Self::new(
            &cfg.api_base,
            cfg.token.as_deref(),
            Duration::from_secs(cfg.request_timeout_secs),
        )
    }
}

#[async_trait]
impl GithubApi for HttpGithubClient {
    async fn get(&self, path: &str) -> Result<ApiResponse> {
        let url = format!("{}{}", self.base, path);
        let resp = self
            .http
            .get(&url)
            .send()
            .await
            .with_context(|| format!("GET {url}"))?;

        let status = resp.status().as_u16();
        let remaining = resp
            .headers()
            .get(RATE_REMAINING_HEADER)
            .and_then(|v| v.to_str().ok())
            .and_then(|s| s.trim().parse::<u32>().ok());

        // Only 200 bodies are ever used; a body that fails to decode is no data.
        let body = if status == 200 {
            resp.json::<Value>().await.ok()
        } else {
            None
        };

        Ok(ApiResponse {
            status,
            remaining,
            body,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn only_200_bodies_are_used() {
        assert_eq!(
            ApiResponse::ok(json!({"a": 1})).into_ok_body(),
            Some(json!({"a": 1}))
        );
        assert_eq!(
            ApiResponse::new(404).with_body(json!({})).into_ok_body(),
            None
        );
        assert_eq!(ApiResponse::new(202).into_ok_body(), None);
    }

    #[test]
    fn status_classes() {
        assert!(ApiResponse::new(202).is_pending());
        assert!(ApiResponse::new(403).is_throttled());
        assert!(ApiResponse::new(429).is_throttled());
        assert!(!ApiResponse::new(500).is_throttled());
    }

    #[test]
    fn blank_token_means_no_auth() {
        assert!(HttpGithubClient::new(GITHUB_API_BASE, Some("   "), Duration::from_secs(5)).is_ok());
    }
}
