// src/enrich/orchestrator.rs
//! Enrichment orchestrator: builds the work list, probes the rate limit,
//! and runs fetch workers in sequential fixed-size batches.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use metrics::counter;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use tokio::task::JoinSet;
use tracing::{info, warn};

use crate::config::GithubConfig;
use crate::enrich::budget::RateBudget;
use crate::enrich::client::GithubApi;
use crate::enrich::types::{CacheMap, EnrichedMap, SourceEntry, SourceLocator, WorkItem};
use crate::enrich::worker::FetchWorker;

static GITHUB_REPO_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^https?://github\.com/(?P<owner>[^/]+)/(?P<repo>[^/.]+?)(?:\.git)?/?$")
        .expect("static regex")
});

/// `https://github.com/{owner}/{repo}` (optional `.git`, optional trailing
/// slash) to a locator. Anything else is `None`.
pub fn parse_repo_url(url: &str) -> Option<SourceLocator> {
    let caps = GITHUB_REPO_RE.captures(url.trim())?;
    Some(SourceLocator {
        owner: caps["owner"].to_string(),
        repo: caps["repo"].to_string(),
    })
}

/// Counters describing one run; logged and returned to the caller.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunStats {
    /// Entries with no parseable GitHub URL.
    pub unresolved: usize,
    /// Entries skipped because their cache entry is fresh.
    pub skipped_fresh: usize,
    /// Work items queued for fetching.
    pub queued: usize,
    /// Work items that produced a payload.
    pub enriched: usize,
    /// Work items whose worker came back empty (left uncached).
    pub no_data: usize,
    /// Size of each batch actually run, in order.
    pub waves: Vec<usize>,
    /// Stopped before the work list was drained because of the rate budget.
    pub halted_early: bool,
    /// Last remaining-quota reading.
    pub rate_remaining: Option<u32>,
    /// Cache entries created by this run (set by `enrich`).
    pub cache_new: usize,
    /// Cache size after merging (set by `enrich`).
    pub cache_total: usize,
}

#[derive(Debug, Clone, Default)]
pub struct RunOutcome {
    pub fresh: EnrichedMap,
    pub stats: RunStats,
}

pub struct Orchestrator {
    api: Arc<dyn GithubApi>,
    concurrency: usize,
    rate_limit_buffer: u32,
    cache_max_age_days: u32,
    retry_delay: Duration,
}

impl Orchestrator {
    pub fn new(api: Arc<dyn GithubApi>, cfg: &GithubConfig) -> Self {
        Self {
            api,
            concurrency: cfg.concurrency.max(1),
            rate_limit_buffer: cfg.rate_limit_buffer,
            cache_max_age_days: cfg.cache_max_age_days,
            retry_delay: Duration::from_millis(cfg.participation_retry_delay_ms),
        }
    }

    /// Cache misses and stale entries with a resolvable locator, in input
    /// order. Duplicate identifiers are queued once.
    pub fn build_work_list<E: SourceEntry>(
        &self,
        entries: &[E],
        cache: &CacheMap,
        now: f64,
        stats: &mut RunStats,
    ) -> Vec<WorkItem> {
        let mut seen = HashSet::new();
        let mut work = Vec::new();
        for entry in entries {
            let Some(locator) = entry.repo_url().and_then(parse_repo_url) else {
                stats.unresolved += 1;
                continue;
            };
            let id = entry.identifier();
            let fresh = cache
                .get(id)
                .is_some_and(|e| !e.is_stale(self.cache_max_age_days, now));
            if fresh {
                stats.skipped_fresh += 1;
                continue;
            }
            if seen.insert(id.to_string()) {
                work.push(WorkItem {
                    id: id.to_string(),
                    locator,
                });
            }
        }
        stats.queued = work.len();
        work
    }

    /// Fetch everything the cache can't answer. Returns only fresh results.
    pub async fn run<E: SourceEntry>(&self, entries: &[E], cache: &CacheMap, now: f64) -> RunOutcome {
        let mut stats = RunStats::default();
        let work = self.build_work_list(entries, cache, now, &mut stats);
        counter!("enrich_cache_fresh_total").increment(stats.skipped_fresh as u64);

        if stats.skipped_fresh > 0 {
            info!(target: "enrich", skipped = stats.skipped_fresh, "skipping servers with fresh cache entries");
        }
        if work.is_empty() {
            info!(target: "enrich", "no servers need enrichment (all cached)");
            return RunOutcome {
                fresh: EnrichedMap::new(),
                stats,
            };
        }

        let budget = Arc::new(RateBudget::new(self.rate_limit_buffer));
        self.probe(&budget).await;
        stats.rate_remaining = budget.remaining();

        if budget.is_exhausted() {
            info!(
                target: "enrich",
                remaining = ?stats.rate_remaining,
                "rate limit already exhausted; skipping github enrichment"
            );
            stats.halted_early = true;
            return RunOutcome {
                fresh: EnrichedMap::new(),
                stats,
            };
        }

        info!(
            target: "enrich",
            servers = work.len(),
            remaining = ?stats.rate_remaining,
            "enriching servers with github repos"
        );

        let worker = FetchWorker::new(Arc::clone(&self.api), Arc::clone(&budget), self.retry_delay);
        let mut fresh = EnrichedMap::new();
        let mut done = 0usize;

        for batch in work.chunks(self.concurrency) {
            // an exhausted budget never re-probes; the probe is a request too
            if !budget.is_exhausted() && budget.take_throttled() {
                self.probe(&budget).await;
            }
            if budget.is_exhausted() {
                info!(
                    target: "enrich",
                    enriched = fresh.len(),
                    pending = work.len() - done,
                    "rate limit buffer reached; stopping github enrichment"
                );
                stats.halted_early = true;
                break;
            }

            let mut tasks = JoinSet::new();
            for item in batch {
                let worker = worker.clone();
                let WorkItem { id, locator } = item.clone();
                tasks.spawn(async move {
                    let payload = worker.enrich_one(&locator).await;
                    (id, payload)
                });
            }

            // barrier: the next batch starts only after every worker here resolved
            while let Some(joined) = tasks.join_next().await {
                match joined {
                    Ok((id, payload)) if payload.is_empty() => {
                        stats.no_data += 1;
                        tracing::debug!(target: "enrich", id = %id, "no data; leaving uncached");
                    }
                    Ok((id, payload)) => {
                        fresh.insert(id, payload);
                    }
                    Err(e) => {
                        stats.no_data += 1;
                        warn!(target: "enrich", error = %e, "fetch worker task failed");
                    }
                }
            }

            done += batch.len();
            stats.waves.push(batch.len());
            counter!("enrich_batches_total").increment(1);
            info!(
                target: "enrich",
                done,
                total = work.len(),
                remaining = ?budget.remaining(),
                "github enrichment progress"
            );
        }

        stats.enriched = fresh.len();
        stats.rate_remaining = budget.remaining();
        counter!("enrich_servers_enriched_total").increment(stats.enriched as u64);
        counter!("enrich_servers_no_data_total").increment(stats.no_data as u64);
        info!(target: "enrich", enriched = stats.enriched, no_data = stats.no_data, "github enrichment complete");

        RunOutcome { fresh, stats }
    }

    /// Seed the budget from `/rate_limit`. A failed probe leaves the
    /// remaining count unknown and the budget open.
    async fn probe(&self, budget: &RateBudget) {
        counter!("enrich_requests_total").increment(1);
        let resp = match self.api.get("/rate_limit").await {
            Ok(resp) => resp,
            Err(e) => {
                warn!(target: "enrich", error = %e, "rate limit probe failed; remaining unknown");
                return;
            }
        };

        if let Some(remaining) = resp.remaining {
            budget.observe(remaining);
        }
        let core_remaining = resp
            .into_ok_body()
            .and_then(|body| body.pointer("/resources/core/remaining").and_then(|v| v.as_u64()))
            .map(|r| u32::try_from(r).unwrap_or(u32::MAX));
        if let Some(remaining) = core_remaining {
            budget.observe(remaining);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::enrich::cache::CacheStore;
    use crate::enrich::types::{CatalogEntry, EnrichmentPayload, Signal};

    #[test]
    fn parses_github_urls() {
        let loc = parse_repo_url("https://github.com/acme/widget").unwrap();
        assert_eq!(loc.owner, "acme");
        assert_eq!(loc.repo, "widget");
        assert_eq!(loc.api_path(), "/repos/acme/widget");

        assert!(parse_repo_url(" http://github.com/acme/widget.git/ ").is_some());
        assert_eq!(
            parse_repo_url("https://github.com/acme/widget/").unwrap().repo,
            "widget"
        );
    }

    #[test]
    fn rejects_non_repo_urls() {
        assert!(parse_repo_url("https://gitlab.com/acme/widget").is_none());
        assert!(parse_repo_url("https://github.com/acme").is_none());
        assert!(parse_repo_url("https://github.com/acme/widget/tree/main").is_none());
        assert!(parse_repo_url("https://github.com/acme/my.repo").is_none());
        assert!(parse_repo_url("").is_none());
    }

    struct NoNetwork;

    #[async_trait::async_trait]
    impl GithubApi for NoNetwork {
        async fn get(&self, path: &str) -> anyhow::Result<crate::enrich::client::ApiResponse> {
            panic!("unexpected request to {path}");
        }
    }

    fn orchestrator(max_age_days: u32) -> Orchestrator {
        let cfg = GithubConfig {
            cache_max_age_days: max_age_days,
            ..GithubConfig::default()
        };
        Orchestrator::new(Arc::new(NoNetwork), &cfg)
    }

    #[test]
    fn work_list_skips_unresolved_and_fresh_and_keeps_stale() {
        let now = 1_700_000_000.0;
        let day = 86_400.0;
        let p = EnrichmentPayload {
            stars: Signal::Known(1),
            ..Default::default()
        };
        let cache = CacheStore::merge(
            CacheMap::new(),
            EnrichedMap::from([("fresh".to_string(), p.clone())]),
            now - 6.0 * day,
        );
        let cache = CacheStore::merge(
            cache,
            EnrichedMap::from([("stale".to_string(), p)]),
            now - 8.0 * day,
        );

        let entries = vec![
            CatalogEntry::new("fresh", Some("https://github.com/a/fresh")),
            CatalogEntry::new("stale", Some("https://github.com/a/stale")),
            CatalogEntry::new("new", Some("https://github.com/a/new")),
            CatalogEntry::new("new", Some("https://github.com/a/new")),
            CatalogEntry::new("nourl", None),
            CatalogEntry::new("gitlab", Some("https://gitlab.com/a/b")),
        ];

        let mut stats = RunStats::default();
        let work = orchestrator(7).build_work_list(&entries, &cache, now, &mut stats);
        let ids: Vec<&str> = work.iter().map(|w| w.id.as_str()).collect();
        assert_eq!(ids, vec!["stale", "new"]);
        assert_eq!(stats.skipped_fresh, 1);
        assert_eq!(stats.unresolved, 2);
        assert_eq!(stats.queued, 2);
    }

    #[tokio::test]
    async fn empty_work_list_never_touches_network() {
        let entries = vec![CatalogEntry::new("nourl", None)];
        let out = orchestrator(7).run(&entries, &CacheMap::new(), 0.0).await;
        assert!(out.fresh.is_empty());
        assert!(out.stats.waves.is_empty());
        assert!(!out.stats.halted_early);
    }
}
