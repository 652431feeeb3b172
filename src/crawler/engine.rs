//! The crawl cursor
//!
//! `CrawlEngine` walks one site's listings and yields one item per recipe
//! link, on demand. Its only suspension points are fetcher calls, so a
//! consumer that stops pulling stops the crawl.
//!
//! Listing pages are walked until one of:
//! - the fetcher reports `NotFound` (the usual end of pagination)
//! - a page is served but carries no recipe links
//! - the listing page cannot be fetched at all
//!
//! A link already in the sink still counts as a link found, so a page made
//! entirely of stored recipes does not end pagination.

use crate::crawler::{FetchError, PageFetcher};
use crate::extract::{Document, ExtractError, RecipeExtractor};
use crate::model::Recipe;
use crate::site::{SiteAdapter, Traversal};
use crate::storage::RecipeSink;
use crate::HarvestError;
use std::collections::{HashSet, VecDeque};
use std::fmt;
use url::Url;

/// One step of a crawl
#[derive(Debug, Clone, PartialEq)]
pub enum CrawlItem {
    /// A freshly extracted recipe, not yet stored
    Recipe(Recipe),

    /// A recipe link that produced no record
    Skipped { url: String, reason: SkipReason },
}

/// Why a recipe link produced no record
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SkipReason {
    /// The sink already holds this URL; the page was not fetched
    AlreadyStored,

    /// The page has no schema.org Recipe container
    NoRecipe,

    /// The recipe lacks a required field
    InsufficientData(&'static str),

    /// The recipe page returned 404
    NotFound,

    /// The recipe page could not be fetched
    FetchFailed(String),
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SkipReason::AlreadyStored => write!(f, "already stored"),
            SkipReason::NoRecipe => write!(f, "no recipe markup"),
            SkipReason::InsufficientData(field) => write!(f, "missing {}", field),
            SkipReason::NotFound => write!(f, "not found"),
            SkipReason::FetchFailed(error) => write!(f, "fetch failed: {}", error),
        }
    }
}

/// A paginated listing being walked
#[derive(Debug)]
struct Listing {
    url: String,
    page: u32,
}

/// Pull-based crawl over one site
pub struct CrawlEngine<'a, F: PageFetcher + ?Sized, S: RecipeSink + ?Sized> {
    site: &'a SiteAdapter,
    fetcher: &'a F,
    sink: &'a S,
    extractor: &'a RecipeExtractor,
    download_images: bool,

    started: bool,
    finished: bool,
    categories: VecDeque<String>,
    listing: Option<Listing>,
    pending: VecDeque<String>,
    seen: HashSet<String>,
    listing_pages: u32,
}

impl<'a, F: PageFetcher + ?Sized, S: RecipeSink + ?Sized> CrawlEngine<'a, F, S> {
    pub fn new(
        site: &'a SiteAdapter,
        fetcher: &'a F,
        sink: &'a S,
        extractor: &'a RecipeExtractor,
    ) -> Self {
        Self {
            site,
            fetcher,
            sink,
            extractor,
            download_images: false,
            started: false,
            finished: false,
            categories: VecDeque::new(),
            listing: None,
            pending: VecDeque::new(),
            seen: HashSet::new(),
            listing_pages: 0,
        }
    }

    /// Fetch each recipe's image into `Recipe::image_data`
    pub fn with_image_download(mut self, enabled: bool) -> Self {
        self.download_images = enabled;
        self
    }

    /// Listing pages fetched successfully so far
    pub fn listing_pages(&self) -> u32 {
        self.listing_pages
    }

    /// Produces the next item, or `None` once the traversal is exhausted
    ///
    /// Per-page problems become `CrawlItem::Skipped`; only a failing sink is
    /// returned as an error.
    pub async fn next(&mut self) -> Result<Option<CrawlItem>, HarvestError> {
        loop {
            if let Some(url) = self.pending.pop_front() {
                return self.process_link(url).await.map(Some);
            }

            if !self.advance().await {
                return Ok(None);
            }
        }
    }

    /// Queues the links of the next listing page; false when nothing is left
    async fn advance(&mut self) -> bool {
        if self.finished {
            return false;
        }

        if !self.started {
            self.started = true;
            let index = self.site.recipe_index_url().to_string();

            match self.site.traversal() {
                Traversal::Flat => {
                    self.finished = true;
                    if let Some(links) = self.fetch_listing(&index).await {
                        self.queue(links);
                    }
                    return true;
                }
                Traversal::Paginated => {
                    self.listing = Some(Listing {
                        url: index,
                        page: 1,
                    });
                }
                Traversal::CategoryPaginated => {
                    let categories = self.fetch_categories(&index).await;
                    tracing::info!(
                        "Site {}: {} categories found",
                        self.site.name(),
                        categories.len()
                    );
                    self.categories = categories.into();
                }
            }
        }

        loop {
            if self.listing.is_none() {
                match self.categories.pop_front() {
                    Some(category) => {
                        tracing::info!("Site {}: crawling category {}", self.site.name(), category);
                        self.listing = Some(Listing {
                            url: category,
                            page: 1,
                        });
                    }
                    None => {
                        self.finished = true;
                        return false;
                    }
                }
            }

            if self.next_page().await {
                return true;
            }
        }
    }

    /// Fetches the next page of the active listing; false once it is exhausted
    async fn next_page(&mut self) -> bool {
        let (listing_url, page) = match &self.listing {
            Some(listing) => (listing.url.clone(), listing.page),
            None => return false,
        };

        let url = match self.site.page_url(&listing_url, page) {
            Ok(url) => url,
            Err(e) => {
                tracing::error!("Site {}: {}", self.site.name(), e);
                self.listing = None;
                return false;
            }
        };

        match self.fetch_listing(&url).await {
            Some(links) if !links.is_empty() => {
                if let Some(listing) = self.listing.as_mut() {
                    listing.page += 1;
                }
                self.queue(links);
                true
            }
            Some(_) => {
                tracing::info!("No recipe links on {}, end of listing", url);
                self.listing = None;
                false
            }
            None => {
                self.listing = None;
                false
            }
        }
    }

    /// Recipe links on a listing page; `None` when the page is unavailable
    async fn fetch_listing(&mut self, url: &str) -> Option<Vec<String>> {
        match self.fetcher.fetch_text(url).await {
            Ok(body) => {
                self.listing_pages += 1;
                let links = listing_links(self.site, &body);
                tracing::info!("Found {} recipe links on {}", links.len(), url);
                Some(links)
            }
            Err(FetchError::NotFound { .. }) => {
                tracing::info!("Listing page {} not found, end of listing", url);
                None
            }
            Err(e) => {
                tracing::error!("Failed to fetch listing page: {}", e);
                None
            }
        }
    }

    async fn fetch_categories(&mut self, url: &str) -> Vec<String> {
        match self.fetcher.fetch_text(url).await {
            Ok(body) => {
                self.listing_pages += 1;
                category_links(self.site, &body)
            }
            Err(e) => {
                tracing::error!("Failed to fetch category index: {}", e);
                Vec::new()
            }
        }
    }

    /// Queues links not yet seen in this crawl, keeping page order
    fn queue(&mut self, links: Vec<String>) {
        for link in links {
            if self.seen.insert(link.clone()) {
                self.pending.push_back(link);
            } else {
                tracing::debug!("Link {} already queued in this crawl", link);
            }
        }
    }

    async fn process_link(&mut self, url: String) -> Result<CrawlItem, HarvestError> {
        if self.sink.exists(&url)? {
            tracing::debug!("Already stored, skipping {}", url);
            return Ok(skipped(url, SkipReason::AlreadyStored));
        }

        let body = match self.fetcher.fetch_text(&url).await {
            Ok(body) => body,
            Err(FetchError::NotFound { .. }) => {
                tracing::warn!("Recipe page not found: {}", url);
                return Ok(skipped(url, SkipReason::NotFound));
            }
            Err(e) => {
                tracing::error!("Failed to fetch recipe page: {}", e);
                let reason = SkipReason::FetchFailed(e.to_string());
                return Ok(skipped(url, reason));
            }
        };

        let mut recipe = match extract_recipe(self.site, self.extractor, &body, &url) {
            Ok(recipe) => recipe,
            Err(e) => {
                tracing::warn!("{}", e);
                let reason = match e {
                    ExtractError::NoRecipeFound { .. } => SkipReason::NoRecipe,
                    ExtractError::InsufficientData { field, .. } => {
                        SkipReason::InsufficientData(field)
                    }
                };
                return Ok(skipped(url, reason));
            }
        };

        if self.download_images {
            if let Some(image_url) = recipe.image.as_deref().and_then(|image| image_source(&url, image)) {
                recipe.image_data = self.fetch_image(&image_url).await;
            }
        }

        Ok(CrawlItem::Recipe(recipe))
    }

    async fn fetch_image(&self, image_url: &str) -> Option<Vec<u8>> {
        match self.fetcher.fetch_bytes(image_url).await {
            Ok(bytes) => Some(bytes),
            Err(e) => {
                tracing::warn!("Image download failed, keeping recipe without it: {}", e);
                None
            }
        }
    }
}

fn skipped(url: String, reason: SkipReason) -> CrawlItem {
    CrawlItem::Skipped { url, reason }
}

fn listing_links(site: &SiteAdapter, body: &str) -> Vec<String> {
    site.discover_links(&Document::parse(body))
}

fn category_links(site: &SiteAdapter, body: &str) -> Vec<String> {
    site.discover_categories(&Document::parse(body))
}

fn extract_recipe(
    site: &SiteAdapter,
    extractor: &RecipeExtractor,
    body: &str,
    url: &str,
) -> Result<Recipe, ExtractError> {
    let mut document = Document::parse(body);
    site.fixup(&mut document);
    extractor.extract(&document, url)
}

/// Absolute URL of an image reference; a `srcset` value yields its first candidate
fn image_source(page_url: &str, image: &str) -> Option<String> {
    let candidate = image.split(',').next()?.split_whitespace().next()?;
    let base = Url::parse(page_url).ok()?;
    base.join(candidate).ok().map(|url| url.to_string())
}
