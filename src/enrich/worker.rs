// src/enrich/worker.rs
//! Fetch worker: enriches one repository with up to three concurrent
//! sub-fetches (metadata, community profile, participation stats).
//!
//! A failed sub-fetch only blanks its own fields. Hitting the exhausted rate
//! budget at any point blanks the whole payload.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use metrics::counter;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::Value;
use tracing::debug;

use crate::enrich::budget::{Exhausted, RateBudget};
use crate::enrich::client::{ApiResponse, GithubApi};
use crate::enrich::types::{EnrichmentPayload, Signal, SourceLocator};

#[derive(Debug, Deserialize)]
struct RepoMeta {
    stargazers_count: Option<u64>,
    forks_count: Option<u64>,
    subscribers_count: Option<u64>,
    archived: Option<bool>,
    license: Option<LicenseInfo>,
    created_at: Option<String>,
    pushed_at: Option<String>,
}

#[derive(Debug, Deserialize)]
struct LicenseInfo {
    spdx_id: Option<String>,
}

#[derive(Debug, Deserialize)]
struct CommunityProfile {
    health_percentage: Option<u32>,
    files: Option<CommunityFiles>,
}

#[derive(Debug, Default, Deserialize)]
struct CommunityFiles {
    security: Option<Value>,
    code_of_conduct: Option<Value>,
}

#[derive(Debug, Deserialize)]
struct Participation {
    all: Option<Vec<u32>>,
    owner: Option<Vec<u32>>,
}

/// Cheap to clone; one clone is moved into each spawned task.
#[derive(Clone)]
pub struct FetchWorker {
    api: Arc<dyn GithubApi>,
    budget: Arc<RateBudget>,
    retry_delay: Duration,
}

impl FetchWorker {
    /// `retry_delay` is the single wait before re-asking for participation
    /// stats that GitHub reported as still being computed (HTTP 202).
    pub fn new(api: Arc<dyn GithubApi>, budget: Arc<RateBudget>, retry_delay: Duration) -> Self {
        Self {
            api,
            budget,
            retry_delay,
        }
    }

    pub async fn enrich_one(&self, locator: &SourceLocator) -> EnrichmentPayload {
        if self.budget.check_open().is_err() {
            return EnrichmentPayload::default();
        }

        let base = locator.api_path();
        let community_path = format!("{base}/community/profile");
        let participation_path = format!("{base}/stats/participation");

        let (meta, community, participation) = tokio::join!(
            self.fetch::<RepoMeta>(&base),
            self.fetch::<CommunityProfile>(&community_path),
            self.fetch_participation(&participation_path),
        );

        let (Ok(meta), Ok(community), Ok(participation)) = (meta, community, participation) else {
            debug!(target: "enrich", repo = %base, "rate budget exhausted mid-fetch; dropping payload");
            return EnrichmentPayload::default();
        };

        let mut payload = EnrichmentPayload::default();
        if let Some(meta) = meta {
            apply_metadata(&mut payload, meta, &locator.owner);
        }
        if let Some(community) = community {
            apply_community(&mut payload, community);
        }
        if let Some(participation) = participation {
            apply_participation(&mut payload, participation);
        }
        payload
    }

    /// One guarded request. `Ok(None)` is a transport failure.
    async fn request(&self, path: &str) -> Result<Option<ApiResponse>, Exhausted> {
        self.budget.check_open()?;
        counter!("enrich_requests_total").increment(1);

        match self.api.get(path).await {
            Ok(resp) => {
                if let Some(remaining) = resp.remaining {
                    self.budget.observe(remaining);
                }
                if resp.is_throttled() {
                    self.budget.mark_throttled();
                }
                if !resp.is_ok() && !resp.is_pending() {
                    counter!("enrich_request_errors_total").increment(1);
                    debug!(target: "enrich", path, status = resp.status, "sub-fetch non-success status");
                }
                Ok(Some(resp))
            }
            Err(e) => {
                counter!("enrich_request_errors_total").increment(1);
                debug!(target: "enrich", path, error = %e, "sub-fetch transport error");
                Ok(None)
            }
        }
    }

    async fn fetch<T: DeserializeOwned>(&self, path: &str) -> Result<Option<T>, Exhausted> {
        let resp = self.request(path).await?;
        Ok(resp.and_then(|r| decode(path, r)))
    }

    /// Participation stats get exactly one retry after a 202.
    async fn fetch_participation(&self, path: &str) -> Result<Option<Participation>, Exhausted> {
        let Some(first) = self.request(path).await? else {
            return Ok(None);
        };
        if !first.is_pending() {
            return Ok(decode(path, first));
        }

        debug!(target: "enrich", path, delay_ms = self.retry_delay.as_millis() as u64, "stats pending; retrying once");
        tokio::time::sleep(self.retry_delay).await;
        let retry = self.request(path).await?;
        Ok(retry.and_then(|r| decode(path, r)))
    }
}

fn decode<T: DeserializeOwned>(path: &str, resp: ApiResponse) -> Option<T> {
    let body = resp.into_ok_body()?;
    match serde_json::from_value(body) {
        Ok(v) => Some(v),
        Err(e) => {
            debug!(target: "enrich", path, error = %e, "unexpected response shape");
            None
        }
    }
}

fn parse_ts(raw: Option<String>) -> Signal<DateTime<Utc>> {
    Signal::from_option(
        raw.and_then(|s| DateTime::parse_from_rfc3339(&s).ok())
            .map(|dt| dt.with_timezone(&Utc)),
    )
}

fn apply_metadata(p: &mut EnrichmentPayload, meta: RepoMeta, owner: &str) {
    p.stars = Signal::from_option(meta.stargazers_count);
    p.forks = Signal::from_option(meta.forks_count);
    p.watchers = Signal::from_option(meta.subscribers_count);
    p.archived = Signal::from_option(meta.archived);
    p.license = Signal::from_option(meta.license.and_then(|l| l.spdx_id));
    p.created_at = parse_ts(meta.created_at);
    p.pushed_at = parse_ts(meta.pushed_at);
    p.owner = Signal::Known(owner.to_string());
}

fn apply_community(p: &mut EnrichmentPayload, profile: CommunityProfile) {
    let files = profile.files.unwrap_or_default();
    p.has_security_md = Signal::Known(files.security.is_some());
    p.has_code_of_conduct = Signal::Known(files.code_of_conduct.is_some());
    p.health_percentage = Signal::from_option(profile.health_percentage);
}

fn apply_participation(p: &mut EnrichmentPayload, stats: Participation) {
    let all = stats.all.unwrap_or_default();
    if all.is_empty() {
        p.commit_weeks_active = Signal::Missing;
        p.contributors = Signal::Missing;
        return;
    }
    let owner = stats.owner.unwrap_or_default();
    p.commit_weeks_active = Signal::Known(active_weeks(&all));
    p.contributors = Signal::from_option(estimate_contributors(&all, &owner));
}

/// Weeks with at least one commit.
pub fn active_weeks(all: &[u32]) -> u32 {
    all.iter().filter(|&&w| w > 0).count() as u32
}

/// Rough contributor estimate from the participation series.
///
/// `all` is total commits per week, `owner` is the repo owner's commits per
/// week. A week where `all > owner` means someone else committed; the number
/// of such weeks is mapped through fixed tiers. This is a lower-bound guess,
/// the real count needs the paginated contributors endpoint.
pub fn estimate_contributors(all: &[u32], owner: &[u32]) -> Option<u32> {
    let active = active_weeks(all);
    if active == 0 {
        return None;
    }

    if owner.is_empty() || owner.len() != all.len() {
        return Some((active / 10).max(1));
    }

    let other_weeks = all.iter().zip(owner).filter(|(a, o)| a > o).count();
    let estimate = match other_weeks {
        0 => 1,
        n if n >= 40 => 10,
        n if n >= 25 => 7,
        n if n >= 15 => 5,
        n if n >= 8 => 3,
        _ => 2,
    };
    Some(estimate)
}
