// src/enrich/types.rs
//! Data model shared by the cache store, the fetch worker and the orchestrator.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// Persisted cache, keyed by entry identifier.
pub type CacheMap = BTreeMap<String, CacheEntry>;

/// Enrichment results keyed by entry identifier (no capture timestamps).
pub type EnrichedMap = BTreeMap<String, EnrichmentPayload>;

/// A single enrichment field.
///
/// - `Known(v)`: the provider answered with a value.
/// - `Missing`: the provider answered, but had no value (JSON `null`).
/// - `Unfetched`: the sub-fetch that owns this field failed or never ran
///   (the key is omitted from JSON).
///
/// Scoring code can therefore tell "known zero" from "not fetched".
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum Signal<T> {
    Known(T),
    Missing,
    #[default]
    Unfetched,
}

impl<T> Signal<T> {
    /// `None` maps to `Missing`: the provider was reached but had no value.
    pub fn from_option(v: Option<T>) -> Self {
        match v {
            Some(v) => Signal::Known(v),
            None => Signal::Missing,
        }
    }

    pub fn known(&self) -> Option<&T> {
        match self {
            Signal::Known(v) => Some(v),
            _ => None,
        }
    }

    pub fn is_known(&self) -> bool {
        matches!(self, Signal::Known(_))
    }

    pub fn is_unfetched(&self) -> bool {
        matches!(self, Signal::Unfetched)
    }
}

impl<T: Serialize> Serialize for Signal<T> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Signal::Known(v) => serializer.serialize_some(v),
            Signal::Missing | Signal::Unfetched => serializer.serialize_none(),
        }
    }
}

impl<'de, T: Deserialize<'de>> Deserialize<'de> for Signal<T> {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        Option::<T>::deserialize(deserializer).map(Signal::from_option)
    }
}

/// Sparse GitHub metadata for one catalog entry.
///
/// Every field is independent: a failed sub-fetch leaves only its own
/// fields `Unfetched`. JSON keys keep the `github_` prefix used by the
/// on-disk cache.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct EnrichmentPayload {
    // repo metadata
    #[serde(rename = "github_stars", default, skip_serializing_if = "Signal::is_unfetched")]
    pub stars: Signal<u64>,
    #[serde(rename = "github_forks", default, skip_serializing_if = "Signal::is_unfetched")]
    pub forks: Signal<u64>,
    #[serde(rename = "github_watchers", default, skip_serializing_if = "Signal::is_unfetched")]
    pub watchers: Signal<u64>,
    #[serde(rename = "github_archived", default, skip_serializing_if = "Signal::is_unfetched")]
    pub archived: Signal<bool>,
    /// SPDX identifier, e.g. `MIT`.
    #[serde(rename = "github_license", default, skip_serializing_if = "Signal::is_unfetched")]
    pub license: Signal<String>,
    #[serde(rename = "github_created_at", default, skip_serializing_if = "Signal::is_unfetched")]
    pub created_at: Signal<DateTime<Utc>>,
    #[serde(rename = "github_pushed_at", default, skip_serializing_if = "Signal::is_unfetched")]
    pub pushed_at: Signal<DateTime<Utc>>,
    #[serde(rename = "github_owner", default, skip_serializing_if = "Signal::is_unfetched")]
    pub owner: Signal<String>,

    // participation stats
    /// Heuristic estimate derived from weekly participation series, not an
    /// exact contributor count. See `worker::estimate_contributors`.
    #[serde(rename = "github_contributors", default, skip_serializing_if = "Signal::is_unfetched")]
    pub contributors: Signal<u32>,
    #[serde(
        rename = "github_commit_weeks_active",
        default,
        skip_serializing_if = "Signal::is_unfetched"
    )]
    pub commit_weeks_active: Signal<u32>,

    // community profile
    #[serde(rename = "github_has_security_md", default, skip_serializing_if = "Signal::is_unfetched")]
    pub has_security_md: Signal<bool>,
    #[serde(
        rename = "github_has_code_of_conduct",
        default,
        skip_serializing_if = "Signal::is_unfetched"
    )]
    pub has_code_of_conduct: Signal<bool>,
    #[serde(
        rename = "github_health_percentage",
        default,
        skip_serializing_if = "Signal::is_unfetched"
    )]
    pub health_percentage: Signal<u32>,
}

impl EnrichmentPayload {
    /// True when no sub-fetch contributed anything.
    pub fn is_empty(&self) -> bool {
        self.stars.is_unfetched()
            && self.forks.is_unfetched()
            && self.watchers.is_unfetched()
            && self.archived.is_unfetched()
            && self.license.is_unfetched()
            && self.created_at.is_unfetched()
            && self.pushed_at.is_unfetched()
            && self.owner.is_unfetched()
            && self.contributors.is_unfetched()
            && self.commit_weeks_active.is_unfetched()
            && self.has_security_md.is_unfetched()
            && self.has_code_of_conduct.is_unfetched()
            && self.health_percentage.is_unfetched()
    }
}

/// Persisted payload plus the epoch-seconds instant it was captured.
///
/// The capture time is only ever stamped by `CacheStore::merge`; entries
/// read from disk without one are treated as stale.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheEntry {
    #[serde(flatten)]
    pub payload: EnrichmentPayload,
    #[serde(rename = "_cached_at", default, skip_serializing_if = "Option::is_none")]
    captured_at: Option<f64>,
}

impl CacheEntry {
    pub(crate) fn stamped(payload: EnrichmentPayload, now: f64) -> Self {
        Self {
            payload,
            captured_at: Some(now),
        }
    }

    pub fn captured_at(&self) -> Option<f64> {
        self.captured_at
    }

    /// Stale when there is no capture time or it is older than `max_age_days`.
    pub fn is_stale(&self, max_age_days: u32, now: f64) -> bool {
        match self.captured_at {
            None => true,
            Some(at) => (now - at) / 86_400.0 > f64::from(max_age_days),
        }
    }
}

/// `(owner, repo)` resolved from an entry's repository URL.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SourceLocator {
    pub owner: String,
    pub repo: String,
}

impl SourceLocator {
    /// `/repos/{owner}/{repo}`
    pub fn api_path(&self) -> String {
        format!("/repos/{}/{}", self.owner, self.repo)
    }
}

/// One identifier queued for fetching (cache miss or stale entry).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkItem {
    pub id: String,
    pub locator: SourceLocator,
}

/// What the engine needs from a catalog entry.
pub trait SourceEntry {
    fn identifier(&self) -> &str;
    fn repo_url(&self) -> Option<&str>;
}

/// Minimal catalog entry for callers that don't carry a full registry record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CatalogEntry {
    pub name: String,
    pub repo_url: Option<String>,
}

impl CatalogEntry {
    pub fn new(name: impl Into<String>, repo_url: Option<&str>) -> Self {
        Self {
            name: name.into(),
            repo_url: repo_url.map(str::to_string),
        }
    }
}

impl SourceEntry for CatalogEntry {
    fn identifier(&self) -> &str {
        &self.name
    }

    fn repo_url(&self) -> Option<&str> {
        self.repo_url.as_deref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tri_state_fields_serialize_as_value_null_or_absent() {
        let p = EnrichmentPayload {
            stars: Signal::Known(12),
            license: Signal::Missing,
            ..Default::default()
        };
        let v = serde_json::to_value(&p).unwrap();
        assert_eq!(v["github_stars"], 12);
        assert!(v["github_license"].is_null());
        assert!(v.get("github_license").is_some());
        assert!(v.get("github_forks").is_none());
    }

    #[test]
    fn tri_state_fields_deserialize_back() {
        let raw = r#"{"github_stars": 3, "github_license": null}"#;
        let p: EnrichmentPayload = serde_json::from_str(raw).unwrap();
        assert_eq!(p.stars, Signal::Known(3));
        assert_eq!(p.license, Signal::Missing);
        assert_eq!(p.forks, Signal::Unfetched);
    }

    #[test]
    fn empty_payload_is_empty_but_missing_field_is_not() {
        assert!(EnrichmentPayload::default().is_empty());
        let p = EnrichmentPayload {
            commit_weeks_active: Signal::Missing,
            ..Default::default()
        };
        assert!(!p.is_empty());
    }

    #[test]
    fn cache_entry_keeps_private_timestamp_key() {
        let e = CacheEntry::stamped(
            EnrichmentPayload {
                archived: Signal::Known(false),
                ..Default::default()
            },
            1_700_000_000.5,
        );
        let v = serde_json::to_value(&e).unwrap();
        assert_eq!(v["_cached_at"], 1_700_000_000.5);
        assert_eq!(v["github_archived"], false);

        let back: CacheEntry = serde_json::from_value(v).unwrap();
        assert_eq!(back, e);
    }

    #[test]
    fn entry_without_timestamp_is_always_stale() {
        let e: CacheEntry = serde_json::from_str(r#"{"github_stars": 1}"#).unwrap();
        assert_eq!(e.captured_at(), None);
        assert!(e.is_stale(7, 0.0));
    }

    #[test]
    fn staleness_threshold_in_days() {
        let now = 1_700_000_000.0;
        let day = 86_400.0;
        let old = CacheEntry::stamped(EnrichmentPayload::default(), now - 8.0 * day);
        let recent = CacheEntry::stamped(EnrichmentPayload::default(), now - 6.0 * day);
        assert!(old.is_stale(7, now));
        assert!(!recent.is_stale(7, now));
    }
}
