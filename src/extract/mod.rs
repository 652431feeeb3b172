//! Recipe extraction from schema.org microdata
//!
//! This module turns one fetched recipe page into a [`Recipe`](crate::model::Recipe):
//! - `Document`: the parsed page plus any properties injected by site fixups
//! - `RecipeExtractor`: the single extraction algorithm applied to every site
//! - `FieldSource`: ordered fallback chains for author, category and cuisine

mod document;
mod extractor;

pub use document::Document;
pub use extractor::{ExtractPolicy, FieldSource, RecipeExtractor};

use thiserror::Error;

/// Reasons a page yields no recipe
///
/// Both variants are recovered by the crawl: the page is logged and skipped.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ExtractError {
    #[error("No recipe found at: {url}")]
    NoRecipeFound { url: String },

    #[error("Recipe at {url} is missing {field} field")]
    InsufficientData { url: String, field: &'static str },
}
