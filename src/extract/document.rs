//! Parsed page wrapper used by link discovery, fixups and extraction

use scraper::{ElementRef, Html, Selector};

/// An item property supplied by a site fixup rather than by the markup
#[derive(Debug, Clone, PartialEq, Eq)]
struct Injection {
    property: String,
    value: String,
    force: bool,
}

/// A parsed HTML page
///
/// Queries go straight to the underlying `scraper::Html`. Site fixups do not
/// rewrite the tree; they record injected item properties and, when a site
/// lacks the `itemtype` marker, an explicit recipe container selector. The
/// extractor consults both, so every site is read by the same algorithm.
#[derive(Debug, Clone)]
pub struct Document {
    html: Html,
    container_selector: Option<String>,
    injections: Vec<Injection>,
}

impl Document {
    /// Parses a full HTML document
    pub fn parse(markup: &str) -> Self {
        Self {
            html: Html::parse_document(markup),
            container_selector: None,
            injections: Vec::new(),
        }
    }

    /// The underlying parsed tree
    pub fn html(&self) -> &Html {
        &self.html
    }

    /// First element matching a CSS selector; `None` for no match or a bad selector
    pub fn find_first(&self, css: &str) -> Option<ElementRef<'_>> {
        let selector = Selector::parse(css).ok()?;
        self.html.select(&selector).next()
    }

    /// All elements matching a CSS selector, in document order
    pub fn find_all(&self, css: &str) -> Vec<ElementRef<'_>> {
        match Selector::parse(css) {
            Ok(selector) => self.html.select(&selector).collect(),
            Err(_) => Vec::new(),
        }
    }

    /// Locates the schema.org Recipe container
    ///
    /// A container selector set by a fixup wins when it matches; otherwise the
    /// first element whose `itemtype` names a Recipe is used, with or without
    /// `itemscope`.
    pub fn recipe_container(&self) -> Option<ElementRef<'_>> {
        if let Some(css) = &self.container_selector {
            if let Some(element) = self.find_first(css) {
                return Some(element);
            }
        }

        let selector = Selector::parse("[itemtype]").ok()?;
        self.html.select(&selector).find(|element| {
            element
                .value()
                .attr("itemtype")
                .is_some_and(is_recipe_type)
        })
    }

    /// Designates the recipe container by CSS selector
    pub fn set_container_selector(&mut self, css: impl Into<String>) {
        self.container_selector = Some(css.into());
    }

    /// Injects an item property into the recipe container
    ///
    /// When the markup already carries the property, it is kept unless `force`
    /// is set, in which case the injected value replaces it. Injecting the same
    /// property again replaces the previous injection, so fixups are idempotent.
    pub fn insert_property(
        &mut self,
        property: impl Into<String>,
        value: impl Into<String>,
        force: bool,
    ) {
        let injection = Injection {
            property: property.into(),
            value: value.into(),
            force,
        };

        match self
            .injections
            .iter_mut()
            .find(|existing| existing.property == injection.property)
        {
            Some(existing) => *existing = injection,
            None => self.injections.push(injection),
        }
    }

    /// Injected value for a property and whether it overrides the markup
    pub(crate) fn injection(&self, property: &str) -> Option<(&str, bool)> {
        self.injections
            .iter()
            .find(|injection| injection.property == property)
            .map(|injection| (injection.value.as_str(), injection.force))
    }
}

/// Matches `http(s)://schema.org/Recipe` and the legacy data-vocabulary type
fn is_recipe_type(itemtype: &str) -> bool {
    itemtype.split_whitespace().any(|item_type| {
        let item_type = item_type.trim_end_matches('/');
        item_type.ends_with("schema.org/Recipe") || item_type.ends_with("data-vocabulary.org/Recipe")
    })
}
