// src/enrich/mod.rs
//! GitHub enrichment engine.
//!
//! Loads the on-disk cache, fetches only new or stale servers within the
//! GitHub rate budget, merges, saves, and returns the union of cached and
//! fresh data. Nothing in here fails the run: quota exhaustion and network
//! errors only shrink the fresh part of the result.

pub mod budget;
pub mod cache;
pub mod client;
pub mod orchestrator;
pub mod types;
pub mod worker;

use std::sync::Arc;

use anyhow::Result;
use metrics::{describe_counter, describe_gauge};
use once_cell::sync::OnceCell;
use tracing::{info, warn};

use crate::config::GithubConfig;

pub use budget::{Exhausted, RateBudget};
pub use cache::{now_epoch, CacheStore};
pub use client::{ApiResponse, GithubApi, HttpGithubClient};
pub use orchestrator::{parse_repo_url, Orchestrator, RunOutcome, RunStats};
pub use types::{
    CacheEntry, CacheMap, CatalogEntry, EnrichedMap, EnrichmentPayload, Signal, SourceEntry,
    SourceLocator, WorkItem,
};
pub use worker::{estimate_contributors, FetchWorker};

/// One-time metrics registration (so series show up on /metrics).
fn ensure_metrics_described() {
    static ONCE: OnceCell<()> = OnceCell::new();
    ONCE.get_or_init(|| {
        describe_counter!("enrich_requests_total", "GitHub API requests issued.");
        describe_counter!(
            "enrich_request_errors_total",
            "GitHub sub-fetches that failed (transport or non-success status)."
        );
        describe_counter!(
            "enrich_cache_fresh_total",
            "Servers skipped because their cache entry was fresh."
        );
        describe_counter!(
            "enrich_servers_enriched_total",
            "Servers that produced a fresh payload."
        );
        describe_counter!(
            "enrich_servers_no_data_total",
            "Servers whose fetch produced nothing (left uncached)."
        );
        describe_counter!("enrich_batches_total", "Fetch batches executed.");
        describe_gauge!(
            "enrich_rate_remaining",
            "Last observed GitHub X-RateLimit-Remaining."
        );
    });
}

/// Merged enrichment view plus run counters.
#[derive(Debug, Clone, Default)]
pub struct EnrichOutcome {
    /// Cache ∪ fresh, keyed by entry identifier.
    pub data: EnrichedMap,
    pub stats: RunStats,
}

/// Engine entry point: load cache → fetch → merge → persist → return.
pub async fn enrich<E: SourceEntry>(
    entries: &[E],
    store: &CacheStore,
    orchestrator: &Orchestrator,
) -> EnrichOutcome {
    ensure_metrics_described();

    let cache = store.load();
    let cached_before = cache.len();

    let now = now_epoch();
    let RunOutcome { fresh, mut stats } = orchestrator.run(entries, &cache, now).await;

    let merged = CacheStore::merge(cache, fresh, now_epoch());
    if let Err(e) = store.save(&merged) {
        warn!(target: "enrich", error = ?e, "failed to persist enrichment cache; results kept in memory");
    }

    stats.cache_total = merged.len();
    stats.cache_new = merged.len().saturating_sub(cached_before);
    info!(
        target: "enrich",
        new = stats.cache_new,
        total = stats.cache_total,
        previous = cached_before,
        "enrichment cache updated"
    );

    let data = merged
        .into_iter()
        .map(|(id, entry)| (id, entry.payload))
        .collect();
    EnrichOutcome { data, stats }
}

/// Build the HTTP client and cache store from config and run [`enrich`].
///
/// Only client construction can fail; the run itself always completes.
pub async fn enrich_with_config<E: SourceEntry>(
    entries: &[E],
    cfg: &GithubConfig,
) -> Result<EnrichOutcome> {
    if cfg.token.is_none() {
        warn!(target: "enrich", "GITHUB_TOKEN not set; unauthenticated rate limits apply");
    }
    let api: Arc<dyn GithubApi> = Arc::new(HttpGithubClient::from_config(cfg)?);
    let orchestrator = Orchestrator::new(api, cfg);
    let store = CacheStore::new(&cfg.cache_file);
    Ok(enrich(entries, &store, &orchestrator).await)
}

/// Cached data only, without touching the network.
pub fn cached_view(store: &CacheStore) -> EnrichedMap {
    store
        .load()
        .into_iter()
        .map(|(id, entry)| (id, entry.payload))
        .collect()
}
