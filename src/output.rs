// src/output.rs
//! Writes the merged enrichment view (and optional metrics dump) to the output dir.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::Serialize;

use crate::enrich::cache::write_atomic;
use crate::enrich::types::EnrichedMap;
use crate::enrich::RunStats;

pub const ENRICHMENT_FILE: &str = "enrichment.json";
pub const METRICS_FILE: &str = "metrics.prom";

#[derive(Serialize)]
struct EnrichmentReport<'a> {
    version: &'static str,
    generated_at: chrono::DateTime<chrono::Utc>,
    server_count: usize,
    stats: &'a RunStats,
    servers: &'a EnrichedMap,
}

/// `<dir>/enrichment.json`, pretty-printed, written via temp file + rename.
pub fn write_enrichment(dir: &Path, data: &EnrichedMap, stats: &RunStats) -> Result<PathBuf> {
    let report = EnrichmentReport {
        version: env!("CARGO_PKG_VERSION"),
        generated_at: chrono::Utc::now(),
        server_count: data.len(),
        stats,
        servers: data,
    };
    let json = serde_json::to_vec_pretty(&report).context("serializing enrichment report")?;
    let path = dir.join(ENRICHMENT_FILE);
    write_atomic(&path, &json).with_context(|| format!("writing {}", path.display()))?;
    Ok(path)
}

pub fn write_metrics(dir: &Path, rendered: &str) -> Result<PathBuf> {
    let path = dir.join(METRICS_FILE);
    write_atomic(&path, rendered.as_bytes()).with_context(|| format!("writing {}", path.display()))?;
    Ok(path)
}
