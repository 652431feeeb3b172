use crate::site::{Fixup, LinkSelector, PageScheme, Traversal};
use serde::Deserialize;

/// Main configuration structure for Recipe Harvest
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub crawler: CrawlerConfig,

    #[serde(rename = "user-agent")]
    pub user_agent: UserAgentConfig,

    pub output: OutputConfig,

    #[serde(default)]
    pub extraction: ExtractionConfig,

    #[serde(default, rename = "site")]
    pub sites: Vec<SiteEntry>,
}

/// Crawler behavior configuration
#[derive(Debug, Clone, Deserialize)]
pub struct CrawlerConfig {
    /// Lower bound of the randomized wait before each uncached request (milliseconds)
    #[serde(rename = "min-delay-ms", default = "default_min_delay_ms")]
    pub min_delay_ms: u64,

    /// Upper bound of the randomized wait (milliseconds)
    #[serde(rename = "max-delay-ms", default = "default_max_delay_ms")]
    pub max_delay_ms: u64,

    /// Retries for server errors and timeouts
    #[serde(rename = "max-retries", default = "default_max_retries")]
    pub max_retries: u32,

    /// Whole-request HTTP timeout (seconds)
    #[serde(rename = "timeout-secs", default = "default_timeout_secs")]
    pub timeout_secs: u64,

    /// Number of sites crawled at the same time
    #[serde(rename = "max-concurrent-sites", default = "default_max_concurrent_sites")]
    pub max_concurrent_sites: u32,

    /// Fetch recipe images into the database
    #[serde(rename = "download-images", default)]
    pub download_images: bool,
}

fn default_min_delay_ms() -> u64 {
    2000
}

fn default_max_delay_ms() -> u64 {
    5000
}

fn default_max_retries() -> u32 {
    2
}

fn default_timeout_secs() -> u64 {
    30
}

fn default_max_concurrent_sites() -> u32 {
    2
}

impl Default for CrawlerConfig {
    fn default() -> Self {
        Self {
            min_delay_ms: default_min_delay_ms(),
            max_delay_ms: default_max_delay_ms(),
            max_retries: default_max_retries(),
            timeout_secs: default_timeout_secs(),
            max_concurrent_sites: default_max_concurrent_sites(),
            download_images: false,
        }
    }
}

/// User agent identification configuration
#[derive(Debug, Clone, Deserialize)]
pub struct UserAgentConfig {
    /// Name of the crawler
    #[serde(rename = "crawler-name")]
    pub crawler_name: String,

    /// Version of the crawler
    #[serde(rename = "crawler-version")]
    pub crawler_version: String,

    /// URL with information about the crawler
    #[serde(rename = "contact-url")]
    pub contact_url: String,

    /// Email address for crawler-related contact
    #[serde(rename = "contact-email")]
    pub contact_email: String,
}

/// Output configuration
#[derive(Debug, Clone, Deserialize)]
pub struct OutputConfig {
    /// Path to the SQLite database file
    #[serde(rename = "database-path")]
    pub database_path: String,
}

/// Extraction policy configuration
#[derive(Debug, Clone, Deserialize)]
pub struct ExtractionConfig {
    /// Reject recipes with no author from any source
    #[serde(rename = "require-author", default = "default_true")]
    pub require_author: bool,

    /// Reject recipes without a yield
    #[serde(rename = "require-yield", default)]
    pub require_yield: bool,

    /// Regex patterns for page-level `property` attributes tried, in order,
    /// when the recipe itself names no author
    #[serde(rename = "author-properties", default = "default_author_properties")]
    pub author_properties: Vec<String>,
}

fn default_true() -> bool {
    true
}

fn default_author_properties() -> Vec<String> {
    vec!["author$".to_string(), "site_name$".to_string()]
}

impl Default for ExtractionConfig {
    fn default() -> Self {
        Self {
            require_author: true,
            require_yield: false,
            author_properties: default_author_properties(),
        }
    }
}

/// One `[[site]]` entry: either a built-in preset or a full description
#[derive(Debug, Clone, Deserialize)]
pub struct SiteEntry {
    /// Name of a built-in site adapter
    #[serde(default)]
    pub preset: Option<String>,

    #[serde(default)]
    pub name: Option<String>,

    #[serde(rename = "root-url", default)]
    pub root_url: Option<String>,

    #[serde(rename = "recipe-index-url", default)]
    pub recipe_index_url: Option<String>,

    #[serde(default)]
    pub strategy: Option<Traversal>,

    #[serde(default)]
    pub pagination: Option<PageScheme>,

    #[serde(default)]
    pub links: Option<LinkSelector>,

    #[serde(default)]
    pub categories: Option<LinkSelector>,

    /// Applied after any preset fixups
    #[serde(default)]
    pub fixups: Vec<Fixup>,
}
