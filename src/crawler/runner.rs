//! Drives crawl engines to completion and stores what they yield
//!
//! Sites are crawled concurrently, one tokio task per site, bounded by a
//! semaphore. Each task owns its fetcher (so each site keeps its own delay
//! and cache) and shares the sink.

use crate::config::{CrawlerConfig, UserAgentConfig};
use crate::crawler::{CrawlEngine, CrawlItem, HttpFetcher, PageFetcher, SkipReason};
use crate::extract::RecipeExtractor;
use crate::site::SiteAdapter;
use crate::storage::{RecipeSink, RunCounts};
use crate::HarvestError;
use std::sync::Arc;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;

/// Outcome counts for one site
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SiteReport {
    pub site: String,
    pub stored: u64,
    pub already_stored: u64,
    pub no_recipe: u64,
    pub insufficient_data: u64,
    pub not_found: u64,
    pub fetch_failed: u64,
    pub listing_pages: u32,
}

impl SiteReport {
    pub fn new(site: impl Into<String>) -> Self {
        Self {
            site: site.into(),
            ..Self::default()
        }
    }

    /// Links that were skipped on purpose: stored already or not a usable recipe
    pub fn skipped(&self) -> u64 {
        self.already_stored + self.no_recipe + self.insufficient_data
    }

    /// Links whose page could not be fetched
    pub fn failed(&self) -> u64 {
        self.not_found + self.fetch_failed
    }

    fn record_skip(&mut self, reason: &SkipReason) {
        match reason {
            SkipReason::AlreadyStored => self.already_stored += 1,
            SkipReason::NoRecipe => self.no_recipe += 1,
            SkipReason::InsufficientData(_) => self.insufficient_data += 1,
            SkipReason::NotFound => self.not_found += 1,
            SkipReason::FetchFailed(_) => self.fetch_failed += 1,
        }
    }
}

/// Sums site reports into the totals recorded for a run
pub fn run_counts(reports: &[SiteReport]) -> RunCounts {
    reports.iter().fold(RunCounts::default(), |mut counts, report| {
        counts.stored += report.stored;
        counts.skipped += report.skipped();
        counts.failed += report.failed();
        counts
    })
}

/// Crawls one site to exhaustion, storing every extracted recipe
///
/// # Arguments
///
/// * `site` - The site to crawl
/// * `fetcher` - Page source for this site
/// * `sink` - Where recipes are stored
/// * `extractor` - The recipe extractor
/// * `download_images` - Whether to fetch image payloads
///
/// # Returns
///
/// * `Ok(SiteReport)` - The crawl ran to the end of the site's listings
/// * `Err(HarvestError)` - The sink failed
pub async fn crawl_site<F, S>(
    site: &SiteAdapter,
    fetcher: &F,
    sink: &S,
    extractor: &RecipeExtractor,
    download_images: bool,
) -> Result<SiteReport, HarvestError>
where
    F: PageFetcher + ?Sized,
    S: RecipeSink + ?Sized,
{
    let mut engine =
        CrawlEngine::new(site, fetcher, sink, extractor).with_image_download(download_images);
    let mut report = SiteReport::new(site.name());

    while let Some(item) = engine.next().await? {
        match item {
            CrawlItem::Recipe(recipe) => {
                if sink.add_if_absent(&recipe)? {
                    tracing::info!("Stored recipe '{}' from {}", recipe.name, recipe.url());
                    report.stored += 1;
                } else {
                    tracing::debug!("Recipe {} was stored concurrently", recipe.url());
                    report.already_stored += 1;
                }
            }
            CrawlItem::Skipped { url, reason } => {
                tracing::debug!("Skipped {}: {}", url, reason);
                report.record_skip(&reason);
            }
        }
    }

    report.listing_pages = engine.listing_pages();
    tracing::info!(
        "Finished site {}: {} stored, {} skipped, {} failed",
        report.site,
        report.stored,
        report.skipped(),
        report.failed()
    );

    Ok(report)
}

/// Crawls several sites concurrently into one sink
///
/// At most `max-concurrent-sites` sites run at once. Reports come back in the
/// order the sites were given. The first failing site aborts the others, and
/// nothing writes to the sink once this returns.
pub async fn crawl_sites<S>(
    crawler: &CrawlerConfig,
    user_agent: &UserAgentConfig,
    extractor: RecipeExtractor,
    sites: Vec<SiteAdapter>,
    sink: Arc<S>,
) -> Result<Vec<SiteReport>, HarvestError>
where
    S: RecipeSink + 'static,
{
    let fetchers = sites
        .iter()
        .map(|_| HttpFetcher::new(crawler, user_agent))
        .collect::<Result<Vec<_>, _>>()?;

    let semaphore = Arc::new(Semaphore::new(crawler.max_concurrent_sites.max(1) as usize));
    let extractor = Arc::new(extractor);
    let download_images = crawler.download_images;
    let site_count = sites.len();
    let mut tasks = JoinSet::new();

    for (index, (site, fetcher)) in sites.into_iter().zip(fetchers).enumerate() {
        let semaphore = Arc::clone(&semaphore);
        let extractor = Arc::clone(&extractor);
        let sink = Arc::clone(&sink);

        tasks.spawn(async move {
            let _permit = semaphore
                .acquire_owned()
                .await
                .map_err(|e| HarvestError::Worker(e.to_string()))?;

            tracing::info!("Starting site {}", site.name());
            crawl_site(&site, &fetcher, sink.as_ref(), &extractor, download_images)
                .await
                .map(|report| (index, report))
        });
    }

    let mut reports: Vec<Option<SiteReport>> = (0..site_count).map(|_| None).collect();
    while let Some(joined) = tasks.join_next().await {
        let outcome = joined
            .map_err(|e| HarvestError::Worker(e.to_string()))
            .and_then(|result| result);

        match outcome {
            Ok((index, report)) => reports[index] = Some(report),
            Err(e) => {
                tracing::error!("Site crawl failed, stopping the remaining sites: {}", e);
                tasks.abort_all();
                while tasks.join_next().await.is_some() {}
                return Err(e);
            }
        }
    }

    Ok(reports.into_iter().flatten().collect())
}
