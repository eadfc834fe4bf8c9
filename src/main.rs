//! mcp-scorecard binary entrypoint.
//! Collects the MCP registry, enriches servers with GitHub data (cached,
//! rate-limited) and writes the merged view to the output directory.

use std::path::PathBuf;
use std::time::Instant;

use anyhow::{Context, Result};
use clap::Parser;
use metrics_exporter_prometheus::PrometheusBuilder;
use tracing::info;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use mcp_scorecard::enrich::{cached_view, CacheStore, RunStats};
use mcp_scorecard::output::{write_enrichment, write_metrics};
use mcp_scorecard::{enrich_with_config, AppConfig, RegistryClient};

#[derive(Debug, Parser)]
#[command(name = "mcp-scorecard", version, about = "Trust scoring index for MCP servers")]
struct Cli {
    /// Output directory (default: ./output or `output_dir` from config)
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Config file (TOML or JSON); overrides $SCORECARD_CONFIG_PATH lookup
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// GitHub enrichment cache file
    #[arg(long)]
    cache: Option<PathBuf>,

    /// Concurrent GitHub workers per batch
    #[arg(long)]
    concurrency: Option<usize>,

    /// Use cached GitHub data only; make no GitHub requests
    #[arg(long)]
    skip_enrich: bool,

    /// Also write Prometheus metrics to <output>/metrics.prom
    #[arg(long)]
    metrics: bool,
}

/// Compact logs, `info` unless RUST_LOG says otherwise.
fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().compact())
        .init();
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env in local/dev; no-op when absent.
    let _ = dotenvy::dotenv();
    init_tracing();
    let cli = Cli::parse();

    let metrics_handle = if cli.metrics {
        Some(
            PrometheusBuilder::new()
                .install_recorder()
                .context("installing prometheus recorder")?,
        )
    } else {
        None
    };

    let mut cfg = match &cli.config {
        Some(p) => AppConfig::load_from(p)?,
        None => AppConfig::load_default()?,
    };
    if let Some(cache) = cli.cache {
        cfg.github.cache_file = cache;
    }
    if let Some(k) = cli.concurrency {
        cfg.github.concurrency = k.max(1);
    }
    let output_dir = cli.output.unwrap_or_else(|| cfg.output_dir.clone());

    let t0 = Instant::now();

    info!("stage 1: collect");
    let servers = RegistryClient::new(&cfg.registry)?.collect().await?;
    info!(servers = servers.len(), "collected servers");

    info!("stage 2: enrich");
    let (data, stats) = if cli.skip_enrich {
        let data = cached_view(&CacheStore::new(&cfg.github.cache_file));
        info!(cached = data.len(), "enrichment skipped; using cache only");
        (data, RunStats::default())
    } else {
        let outcome = enrich_with_config(&servers, &cfg.github).await?;
        (outcome.data, outcome.stats)
    };
    info!(
        enriched = data.len(),
        fresh = stats.enriched,
        halted_early = stats.halted_early,
        "enriched servers with github data"
    );

    info!("stage 3: publish");
    let path = write_enrichment(&output_dir, &data, &stats)?;
    info!(path = %path.display(), "wrote enrichment report");

    if let Some(handle) = metrics_handle {
        let path = write_metrics(&output_dir, &handle.render())?;
        info!(path = %path.display(), "wrote metrics");
    }

    info!(elapsed_s = t0.elapsed().as_secs_f64(), "pipeline complete");
    Ok(())
}
