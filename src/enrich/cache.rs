// src/enrich/cache.rs
//! On-disk enrichment cache (`data/github_cache.json` by default).
//!
//! A JSON object keyed by entry identifier. Each value holds the payload
//! fields plus a private `_cached_at` epoch-seconds float. A missing or
//! corrupt file loads as an empty cache; a single malformed entry is dropped
//! on its own.

use std::collections::BTreeMap;
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde_json::Value;
use tracing::{debug, warn};

use crate::enrich::types::{CacheEntry, CacheMap, EnrichedMap};

#[derive(Debug, Clone)]
pub struct CacheStore {
    path: PathBuf,
}

impl CacheStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read the persisted cache. Never fails: unreadable or malformed
    /// content is a cold start.
    pub fn load(&self) -> CacheMap {
        let raw = match fs::read_to_string(&self.path) {
            Ok(s) => s,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                debug!(target: "enrich", path = %self.path.display(), "no cache file; starting cold");
                return CacheMap::new();
            }
            Err(e) => {
                warn!(target: "enrich", path = %self.path.display(), error = %e, "cache unreadable; starting cold");
                return CacheMap::new();
            }
        };

        let entries = match serde_json::from_str::<BTreeMap<String, Value>>(&raw) {
            Ok(entries) => entries,
            Err(e) => {
                warn!(target: "enrich", path = %self.path.display(), error = %e, "cache corrupt; starting cold");
                return CacheMap::new();
            }
        };

        // A bad entry is dropped alone (and re-fetched); the rest survive.
        entries
            .into_iter()
            .filter_map(|(id, value)| match serde_json::from_value::<CacheEntry>(value) {
                Ok(entry) => Some((id, entry)),
                Err(e) => {
                    warn!(target: "enrich", id = %id, error = %e, "dropping malformed cache entry");
                    None
                }
            })
            .collect()
    }

    /// Persist the full mapping via write-to-temp + rename, so a reader sees
    /// either the old file or the new one.
    pub fn save(&self, cache: &CacheMap) -> Result<()> {
        let json = serde_json::to_vec(cache).context("serializing enrichment cache")?;
        write_atomic(&self.path, &json)
            .with_context(|| format!("writing enrichment cache to {}", self.path.display()))
    }

    /// Fresh entries replace existing ones with the same key; all are stamped
    /// with the same `now`. Everything else passes through unchanged.
    pub fn merge(mut existing: CacheMap, fresh: EnrichedMap, now: f64) -> CacheMap {
        for (id, payload) in fresh {
            existing.insert(id, CacheEntry::stamped(payload, now));
        }
        existing
    }
}

/// Current time as epoch seconds with sub-second precision.
pub fn now_epoch() -> f64 {
    chrono::Utc::now().timestamp_millis() as f64 / 1_000.0
}

pub(crate) fn write_atomic(path: &Path, bytes: &[u8]) -> io::Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }
    let mut tmp_name = path.as_os_str().to_owned();
    tmp_name.push(".tmp");
    let tmp = PathBuf::from(tmp_name);

    let mut f = fs::File::create(&tmp)?;
    f.write_all(bytes)?;
    f.sync_all()?;
    drop(f);
    fs::rename(&tmp, path)
}
