// tests/common/mod.rs
// Shared scripted GitHub API for engine tests.
#![allow(dead_code)]

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use anyhow::anyhow;
use async_trait::async_trait;
use mcp_scorecard::enrich::{ApiResponse, CatalogEntry, GithubApi};
use serde_json::{json, Value};

#[derive(Debug, Clone)]
pub enum Reply {
    Respond(ApiResponse),
    /// Transport failure (connection reset).
    Fail,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    Start(String),
    End(String),
}

/// Scripted replies per path. Queued replies are consumed in order and the
/// last one repeats; unscripted paths get a healthy default response.
pub struct ScriptedApi {
    routes: Mutex<HashMap<String, VecDeque<Reply>>>,
    delay: Duration,
    // remaining-quota countdown: every call gets `start - n`
    quota_start: Option<u32>,
    calls: Mutex<Vec<String>>,
    events: Mutex<Vec<Event>>,
    in_flight: AtomicUsize,
    peak: AtomicUsize,
}

impl ScriptedApi {
    pub fn new() -> Self {
        Self {
            routes: Mutex::new(HashMap::new()),
            delay: Duration::ZERO,
            quota_start: None,
            calls: Mutex::new(Vec::new()),
            events: Mutex::new(Vec::new()),
            in_flight: AtomicUsize::new(0),
            peak: AtomicUsize::new(0),
        }
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn with_quota_countdown(mut self, start: u32) -> Self {
        self.quota_start = Some(start);
        self
    }

    pub fn route(self, path: &str, reply: Reply) -> Self {
        self.routes
            .lock()
            .unwrap()
            .entry(path.to_string())
            .or_default()
            .push_back(reply);
        self
    }

    pub fn respond(self, path: &str, resp: ApiResponse) -> Self {
        self.route(path, Reply::Respond(resp))
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }

    pub fn count(&self, path: &str) -> usize {
        self.calls.lock().unwrap().iter().filter(|p| *p == path).count()
    }

    pub fn events(&self) -> Vec<Event> {
        self.events.lock().unwrap().clone()
    }

    pub fn peak_in_flight(&self) -> usize {
        self.peak.load(Ordering::SeqCst)
    }

    fn next_reply(&self, path: &str) -> Reply {
        let mut routes = self.routes.lock().unwrap();
        match routes.get_mut(path) {
            Some(q) if q.len() > 1 => q.pop_front().unwrap(),
            Some(q) if q.len() == 1 => q[0].clone(),
            _ => Reply::Respond(default_reply(path)),
        }
    }
}

#[async_trait]
impl GithubApi for ScriptedApi {
    async fn get(&self, path: &str) -> anyhow::Result<ApiResponse> {
        let n = {
            let mut calls = self.calls.lock().unwrap();
            calls.push(path.to_string());
            calls.len() as u32
        };
        self.events.lock().unwrap().push(Event::Start(path.to_string()));
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(now, Ordering::SeqCst);

        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        let reply = self.next_reply(path);

        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        self.events.lock().unwrap().push(Event::End(path.to_string()));

        match reply {
            Reply::Respond(mut resp) => {
                if let Some(start) = self.quota_start {
                    resp.remaining = Some(start.saturating_sub(n));
                }
                Ok(resp)
            }
            Reply::Fail => Err(anyhow!("connection reset by peer")),
        }
    }
}

pub fn meta_body() -> Value {
    json!({
        "stargazers_count": 42,
        "forks_count": 7,
        "subscribers_count": 3,
        "archived": false,
        "license": {"spdx_id": "Apache-2.0"},
        "created_at": "2024-03-01T12:00:00Z",
        "pushed_at": "2025-09-20T08:30:00Z"
    })
}

pub fn community_body() -> Value {
    json!({
        "health_percentage": 71,
        "files": {
            "security": {"url": "https://example.invalid/SECURITY.md"},
            "code_of_conduct": null
        }
    })
}

/// 52 weeks; 10 active weeks, the owner committed alone in 2 of them.
pub fn participation_body() -> Value {
    let mut all = vec![0u32; 52];
    let mut owner = vec![0u32; 52];
    for i in 0..10 {
        all[i] = 3;
        owner[i] = if i < 2 { 3 } else { 1 };
    }
    json!({"all": all, "owner": owner})
}

pub fn rate_limit_body(remaining: u32) -> Value {
    json!({"resources": {"core": {"limit": 5000, "remaining": remaining}}})
}

pub fn default_reply(path: &str) -> ApiResponse {
    if path == "/rate_limit" {
        ApiResponse::ok(rate_limit_body(4_900))
    } else if path.ends_with("/community/profile") {
        ApiResponse::ok(community_body())
    } else if path.ends_with("/stats/participation") {
        ApiResponse::ok(participation_body())
    } else if path.starts_with("/repos/") {
        ApiResponse::ok(meta_body())
    } else {
        ApiResponse::new(404)
    }
}

/// `srv-00 .. srv-{n-1}` pointing at `github.com/acme/repo00 ..`.
pub fn entries(n: usize) -> Vec<CatalogEntry> {
    (0..n)
        .map(|i| {
            CatalogEntry::new(
                format!("srv-{i:02}"),
                Some(&format!("https://github.com/acme/repo{i:02}")),
            )
        })
        .collect()
}

/// Wave index of a call path for `repoNN`, given batch size `k`.
pub fn wave_of(path: &str, k: usize) -> Option<usize> {
    let idx = path.split("/acme/repo").nth(1)?.get(0..2)?.parse::<usize>().ok()?;
    Some(idx / k)
}
