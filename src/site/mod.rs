//! Per-site crawl configuration
//!
//! Sites differ in three ways only, and each is plain data here:
//! - where recipe links (and category links) live on listing pages
//! - how the URL of listing page N is formed
//! - which fixups normalize their markup before extraction
//!
//! A `SiteAdapter` holds no crawl state; the cursor lives in the engine.

mod links;
mod presets;

pub use presets::{preset, PRESET_NAMES};

use crate::extract::Document;
use scraper::Selector;
use serde::Deserialize;
use thiserror::Error;
use url::Url;

/// Errors building or using a site adapter
#[derive(Debug, Error)]
pub enum SiteError {
    #[error("Invalid URL '{url}': {source}")]
    InvalidUrl {
        url: String,
        source: url::ParseError,
    },

    #[error("Only http and https URLs can be crawled: {0}")]
    UnsupportedScheme(String),

    #[error("Invalid selector: {0}")]
    InvalidSelector(String),

    #[error("Unknown site preset: {0}")]
    UnknownPreset(String),

    #[error("Site '{0}' uses category-paginated traversal but has no category selector")]
    MissingCategories(String),

    #[error("Query pagination for site '{0}' needs a parameter name")]
    MissingPageParameter(String),
}

/// How listing pages are walked
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Traversal {
    /// A single listing page, the recipe index itself
    Flat,

    /// Numbered listing pages until a 404 or an empty page
    #[default]
    Paginated,

    /// Category links from the recipe index, each walked as a paginated listing
    CategoryPaginated,
}

/// How the URL of listing page N is formed
#[derive(Debug, Clone, PartialEq, Eq, Default, Deserialize)]
#[serde(tag = "scheme", rename_all = "kebab-case")]
pub enum PageScheme {
    /// `<listing>/page/N`
    #[default]
    Path,

    /// `<listing>?param=N`
    Query { param: String },
}

/// Structural selector for listing containers: a tag name plus an optional
/// attribute filter
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct LinkSelector {
    pub tag: String,

    #[serde(default)]
    pub attribute: Option<String>,

    #[serde(default)]
    pub value: Option<String>,
}

impl LinkSelector {
    /// Matches every element with the given tag
    pub fn tag(tag: impl Into<String>) -> Self {
        Self {
            tag: tag.into(),
            attribute: None,
            value: None,
        }
    }

    /// Matches elements carrying `class` among their class tokens
    pub fn with_class(tag: impl Into<String>, class: impl Into<String>) -> Self {
        Self::with_attribute(tag, "class", class)
    }

    pub fn with_attribute(
        tag: impl Into<String>,
        attribute: impl Into<String>,
        value: impl Into<String>,
    ) -> Self {
        Self {
            tag: tag.into(),
            attribute: Some(attribute.into()),
            value: Some(value.into()),
        }
    }

    /// CSS form of the selector
    ///
    /// A `class` filter matches one class token, as a listing container usually
    /// carries several classes; any other attribute must match exactly.
    pub fn to_css(&self) -> String {
        match (&self.attribute, &self.value) {
            (Some(attribute), Some(value)) if attribute == "class" => {
                format!("{}[class~=\"{}\"]", self.tag, escape_quotes(value))
            }
            (Some(attribute), Some(value)) => {
                format!("{}[{}=\"{}\"]", self.tag, attribute, escape_quotes(value))
            }
            (Some(attribute), None) => format!("{}[{}]", self.tag, attribute),
            _ => self.tag.clone(),
        }
    }

    pub fn compile(&self) -> Result<Selector, SiteError> {
        let css = self.to_css();
        Selector::parse(&css).map_err(|e| SiteError::InvalidSelector(format!("{}: {:?}", css, e)))
    }
}

fn escape_quotes(value: &str) -> String {
    value.replace('\\', "\\\\").replace('"', "\\\"")
}

/// A document fixup applied before extraction
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(tag = "kind", rename_all = "kebab-case")]
pub enum Fixup {
    /// Supplies the author when the markup lacks one, or overrides it with `force`
    InsertAuthor {
        author: String,
        #[serde(default)]
        force: bool,
    },

    /// Same as `InsertAuthor` for any item property
    InsertProperty {
        property: String,
        value: String,
        #[serde(default)]
        force: bool,
    },

    /// Designates the recipe container on sites without the `itemtype` marker
    RecipeContainer { selector: String },
}

impl Fixup {
    pub fn apply(&self, document: &mut Document) {
        match self {
            Fixup::InsertAuthor { author, force } => {
                document.insert_property("author", author.as_str(), *force);
            }
            Fixup::InsertProperty {
                property,
                value,
                force,
            } => {
                document.insert_property(property.as_str(), value.as_str(), *force);
            }
            Fixup::RecipeContainer { selector } => {
                document.set_container_selector(selector.as_str());
            }
        }
    }
}

/// Everything the crawl engine needs to know about one site
#[derive(Debug, Clone)]
pub struct SiteAdapter {
    name: String,
    root_url: Url,
    recipe_index_url: String,
    links: LinkSelector,
    categories: Option<LinkSelector>,
    traversal: Traversal,
    pagination: PageScheme,
    fixups: Vec<Fixup>,
}

impl SiteAdapter {
    /// Creates a paginated adapter with path pagination and no fixups
    ///
    /// # Arguments
    ///
    /// * `name` - Short site name used in logs and reports
    /// * `root_url` - Base for resolving relative links
    /// * `recipe_index_url` - The listing crawled first
    /// * `links` - Selector for the containers holding recipe links
    pub fn new(
        name: impl Into<String>,
        root_url: &str,
        recipe_index_url: &str,
        links: LinkSelector,
    ) -> Result<Self, SiteError> {
        let root_url = parse_http_url(root_url)?;
        let recipe_index_url = parse_http_url(recipe_index_url)?;
        links.compile()?;

        Ok(Self {
            name: name.into(),
            root_url,
            // kept as written: pagination appends to it verbatim
            recipe_index_url: recipe_index_url.as_str().to_string(),
            links,
            categories: None,
            traversal: Traversal::Paginated,
            pagination: PageScheme::Path,
            fixups: Vec::new(),
        })
    }

    /// Renames the adapter, e.g. a second copy of a preset
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn with_traversal(mut self, traversal: Traversal) -> Self {
        self.traversal = traversal;
        self
    }

    pub fn with_categories(mut self, categories: LinkSelector) -> Result<Self, SiteError> {
        categories.compile()?;
        self.categories = Some(categories);
        Ok(self)
    }

    pub fn with_pagination(mut self, pagination: PageScheme) -> Self {
        self.pagination = pagination;
        self
    }

    pub fn with_fixup(mut self, fixup: Fixup) -> Result<Self, SiteError> {
        if let Fixup::RecipeContainer { selector } = &fixup {
            Selector::parse(selector)
                .map_err(|e| SiteError::InvalidSelector(format!("{}: {:?}", selector, e)))?;
        }
        self.fixups.push(fixup);
        Ok(self)
    }

    /// Checks that the traversal strategy has what it needs
    pub fn validate(&self) -> Result<(), SiteError> {
        if self.traversal == Traversal::CategoryPaginated && self.categories.is_none() {
            return Err(SiteError::MissingCategories(self.name.clone()));
        }
        if let PageScheme::Query { param } = &self.pagination {
            if param.trim().is_empty() {
                return Err(SiteError::MissingPageParameter(self.name.clone()));
            }
        }
        Ok(())
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn root_url(&self) -> &Url {
        &self.root_url
    }

    pub fn recipe_index_url(&self) -> &str {
        &self.recipe_index_url
    }

    pub fn traversal(&self) -> Traversal {
        self.traversal
    }

    pub fn pagination(&self) -> &PageScheme {
        &self.pagination
    }

    pub fn link_selector(&self) -> &LinkSelector {
        &self.links
    }

    pub fn category_selector(&self) -> Option<&LinkSelector> {
        self.categories.as_ref()
    }

    pub fn fixups(&self) -> &[Fixup] {
        &self.fixups
    }

    /// Recipe links on a listing page, absolute, in page order
    pub fn discover_links(&self, document: &Document) -> Vec<String> {
        self.discover(document, &self.links)
    }

    /// Category links on the recipe index; empty when the site has no
    /// category selector
    pub fn discover_categories(&self, document: &Document) -> Vec<String> {
        match &self.categories {
            Some(selector) => self.discover(document, selector),
            None => Vec::new(),
        }
    }

    fn discover(&self, document: &Document, selector: &LinkSelector) -> Vec<String> {
        match selector.compile() {
            Ok(containers) => links::first_links(document, &containers, &self.root_url),
            Err(e) => {
                tracing::warn!("Site {}: {}", self.name, e);
                Vec::new()
            }
        }
    }

    /// URL of page `page` (1-based) of a listing
    ///
    /// Path pagination appends `page/N` to the path and keeps any query.
    pub fn page_url(&self, listing: &str, page: u32) -> Result<String, SiteError> {
        let mut url = parse_http_url(listing)?;
        match &self.pagination {
            PageScheme::Path => {
                url.path_segments_mut()
                    .map_err(|_| SiteError::UnsupportedScheme(listing.to_string()))?
                    .pop_if_empty()
                    .push("page")
                    .push(&page.to_string());
            }
            PageScheme::Query { param } => {
                url.query_pairs_mut()
                    .append_pair(param, &page.to_string());
            }
        }
        Ok(url.to_string())
    }

    /// Applies the site's fixups in order
    pub fn fixup(&self, document: &mut Document) {
        for fixup in &self.fixups {
            fixup.apply(document);
        }
    }
}

fn parse_http_url(raw: &str) -> Result<Url, SiteError> {
    let url = Url::parse(raw).map_err(|source| SiteError::InvalidUrl {
        url: raw.to_string(),
        source,
    })?;

    if !matches!(url.scheme(), "http" | "https") {
        return Err(SiteError::UnsupportedScheme(raw.to_string()));
    }

    Ok(url)
}
