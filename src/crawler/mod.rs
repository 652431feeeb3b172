//! Crawler module for recipe discovery and extraction
//!
//! This module contains the core crawling logic, including:
//! - HTTP fetching with politeness delay, caching and retries
//! - The per-site crawl cursor (flat, paginated, category-paginated)
//! - Concurrent multi-site runs with run tracking

mod engine;
mod fetcher;
mod runner;

pub use engine::{CrawlEngine, CrawlItem, SkipReason};
pub use fetcher::{
    build_http_client, FetchError, HttpFetcher, PageFetcher, PolitenessDelay, DEFAULT_CACHE_CAPACITY,
};
pub use runner::{crawl_site, crawl_sites, run_counts, SiteReport};

use crate::config::Config;
use crate::site::SiteAdapter;
use crate::storage::{RunCounts, RunStatus, SqliteRecipeStore};
use crate::HarvestError;
use std::sync::Arc;

/// Runs a complete crawl operation
///
/// This is the main entry point for starting a crawl. It will:
/// 1. Record a new run in the database
/// 2. Crawl every given site, storing extracted recipes
/// 3. Mark the run completed (or failed) with its totals
///
/// # Arguments
///
/// * `config` - The crawler configuration
/// * `config_hash` - Hash of the configuration file, recorded with the run
/// * `sites` - The sites to crawl
/// * `store` - The recipe database
///
/// # Returns
///
/// * `Ok(Vec<SiteReport>)` - Crawl completed, one report per site
/// * `Err(HarvestError)` - Crawl failed
pub async fn crawl(
    config: &Config,
    config_hash: &str,
    sites: Vec<SiteAdapter>,
    store: Arc<SqliteRecipeStore>,
) -> Result<Vec<SiteReport>, HarvestError> {
    let extractor = config.extraction.build_extractor()?;
    let run_id = store.create_run(config_hash)?;
    tracing::info!("Starting crawl run {} over {} sites", run_id, sites.len());

    let result = crawl_sites(
        &config.crawler,
        &config.user_agent,
        extractor,
        sites,
        Arc::clone(&store),
    )
    .await;

    match result {
        Ok(reports) => {
            store.finish_run(run_id, RunStatus::Completed, run_counts(&reports))?;
            Ok(reports)
        }
        Err(e) => {
            if let Err(finish_err) = store.finish_run(run_id, RunStatus::Failed, RunCounts::default()) {
                tracing::error!("Failed to record run {} as failed: {}", run_id, finish_err);
            }
            Err(e)
        }
    }
}
