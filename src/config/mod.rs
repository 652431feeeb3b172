//! Configuration module for Recipe Harvest
//!
//! This module handles loading, parsing, and validating TOML configuration files,
//! and turning `[[site]]` entries into site adapters.
//!
//! # Example
//!
//! ```no_run
//! use recipe_harvest::config::load_config;
//! use std::path::Path;
//!
//! let config = load_config(Path::new("harvest.toml")).unwrap();
//! println!("Politeness delay: {}-{}ms", config.crawler.min_delay_ms, config.crawler.max_delay_ms);
//! ```

mod parser;
mod sites;
mod types;
mod validation;

// Re-export types
pub use types::{
    Config, CrawlerConfig, ExtractionConfig, OutputConfig, SiteEntry, UserAgentConfig,
};

// Re-export parser functions
pub use parser::{compute_config_hash, load_config, load_config_with_hash, parse_config};
