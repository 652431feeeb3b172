//! Recipe Harvest: a polite recipe crawler
//!
//! This crate walks the recipe listings of a set of publishing sites, follows
//! every discovered recipe link, and extracts schema.org `Recipe` microdata
//! into typed records stored in SQLite.
//!
//! The moving parts are:
//! - [`site::SiteAdapter`]: per-site link discovery, page URLs and fixups
//! - [`extract::RecipeExtractor`]: microdata to [`model::Recipe`]
//! - [`crawler::CrawlEngine`]: the flat / paginated / category traversal cursor
//! - [`storage::RecipeSink`]: deduplicating persistence boundary

pub mod config;
pub mod crawler;
pub mod extract;
pub mod model;
pub mod output;
pub mod site;
pub mod storage;

use thiserror::Error;

/// Main error type for Recipe Harvest operations
///
/// Per-page problems (missing recipe markup, 404s, bad durations) are recovered
/// inside the crawl and never show up here; these are the process-level failures.
#[derive(Debug, Error)]
pub enum HarvestError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Storage error: {0}")]
    Storage(#[from] storage::StorageError),

    #[error("HTTP client error: {0}")]
    HttpClient(#[from] reqwest::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Crawl worker failed: {0}")]
    Worker(String),
}

/// Configuration-specific errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Invalid URL in config: {0}")]
    InvalidUrl(String),

    #[error("Invalid site '{site}': {source}")]
    Site {
        site: String,
        source: site::SiteError,
    },

    #[error("Invalid author property pattern '{pattern}': {source}")]
    Pattern {
        pattern: String,
        source: regex::Error,
    },
}

// Re-export commonly used types
pub use config::Config;
pub use crawler::{CrawlEngine, CrawlItem, PageFetcher, SkipReason};
pub use extract::{Document, ExtractError, RecipeExtractor};
pub use model::Recipe;
pub use site::SiteAdapter;
pub use storage::RecipeSink;
