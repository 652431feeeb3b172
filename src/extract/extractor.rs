//! Microdata recipe extractor
//!
//! Identity fields fail fast: a page without a Recipe container or without a
//! name (and, under the default policy, without any author) yields an error
//! and no record. Every other field is read independently; a missing or
//! malformed value is logged and left empty without affecting the rest.

use crate::extract::{Document, ExtractError};
use crate::model::{Recipe, RecipeDuration};
use regex::Regex;
use scraper::{ElementRef, Selector};

/// Which fields are fatal when absent
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExtractPolicy {
    /// A recipe with no author from any source is rejected
    pub require_author: bool,

    /// A recipe without `recipeYield` is rejected
    pub require_yield: bool,
}

impl Default for ExtractPolicy {
    fn default() -> Self {
        Self {
            require_author: true,
            require_yield: false,
        }
    }
}

/// One step of a field's fallback chain
#[derive(Debug, Clone)]
pub enum FieldSource {
    /// Item property belonging to the recipe container
    ItemProp(String),

    /// Any element in the page whose `property` attribute matches the pattern,
    /// e.g. `<meta property="article:author" content="...">`
    DocumentProperty(Regex),
}

impl FieldSource {
    pub fn item_prop(name: impl Into<String>) -> Self {
        Self::ItemProp(name.into())
    }

    pub fn document_property(pattern: &str) -> Result<Self, regex::Error> {
        Ok(Self::DocumentProperty(Regex::new(pattern)?))
    }
}

/// Default author sources: the recipe's own author, then page-level author
/// metadata, then the site name
const DEFAULT_AUTHOR_PROPERTIES: &[&str] = &["author$", "site_name$"];

/// Extracts `Recipe` records from schema.org microdata
#[derive(Debug, Clone)]
pub struct RecipeExtractor {
    policy: ExtractPolicy,
    author_chain: Vec<FieldSource>,
    category_chain: Vec<FieldSource>,
    cuisine_chain: Vec<FieldSource>,
}

impl Default for RecipeExtractor {
    fn default() -> Self {
        Self::new(ExtractPolicy::default())
    }
}

impl RecipeExtractor {
    /// Creates an extractor with the default fallback chains
    pub fn new(policy: ExtractPolicy) -> Self {
        let mut author_chain = vec![FieldSource::item_prop("author")];
        author_chain.extend(
            DEFAULT_AUTHOR_PROPERTIES
                .iter()
                .filter_map(|pattern| FieldSource::document_property(pattern).ok()),
        );

        Self {
            policy,
            author_chain,
            category_chain: vec![FieldSource::item_prop("recipeCategory")],
            cuisine_chain: vec![FieldSource::item_prop("recipeCuisine")],
        }
    }

    pub fn with_author_chain(mut self, chain: Vec<FieldSource>) -> Self {
        self.author_chain = chain;
        self
    }

    pub fn with_category_chain(mut self, chain: Vec<FieldSource>) -> Self {
        self.category_chain = chain;
        self
    }

    pub fn with_cuisine_chain(mut self, chain: Vec<FieldSource>) -> Self {
        self.cuisine_chain = chain;
        self
    }

    pub fn policy(&self) -> ExtractPolicy {
        self.policy
    }

    /// Extracts a recipe from a (fixed-up) document
    ///
    /// # Errors
    ///
    /// * `NoRecipeFound` - the page has no schema.org Recipe container
    /// * `InsufficientData` - the container lacks a required field
    pub fn extract(&self, document: &Document, url: &str) -> Result<Recipe, ExtractError> {
        tracing::debug!("Extracting recipe from {}", url);

        let container = document
            .recipe_container()
            .ok_or_else(|| ExtractError::NoRecipeFound {
                url: url.to_string(),
            })?;

        let name =
            property_value(document, container, "name").ok_or_else(|| missing(url, "name"))?;
        let mut recipe = Recipe::new(url, name);

        recipe.author = resolve_chain(document, container, &self.author_chain);
        if recipe.author.is_none() {
            if self.policy.require_author {
                return Err(missing(url, "author"));
            }
            tracing::warn!(url, field = "author", "No author found for recipe");
        }

        recipe.recipe_yield = property_value(document, container, "recipeYield");
        if recipe.recipe_yield.is_none() {
            if self.policy.require_yield {
                return Err(missing(url, "recipeYield"));
            }
            tracing::warn!(url, field = "recipeYield", "No yield found for recipe");
        }

        recipe.image = find_image(document, container);
        if recipe.image.is_none() {
            tracing::warn!(url, field = "image", "No image found for recipe");
        }

        recipe.recipe_category = resolve_chain(document, container, &self.category_chain);
        if recipe.recipe_category.is_none() {
            tracing::warn!(url, field = "recipeCategory", "No category found for recipe");
        }

        recipe.recipe_cuisine = resolve_chain(document, container, &self.cuisine_chain);
        if recipe.recipe_cuisine.is_none() {
            tracing::warn!(url, field = "recipeCuisine", "No cuisine found for recipe");
        }

        recipe.cook_time = read_time(document, container, "cookTime", url);
        recipe.prep_time = read_time(document, container, "prepTime", url);
        recipe.total_time = read_time(document, container, "totalTime", url);

        recipe.ingredients = item_texts(container, "ingredients");
        if recipe.ingredients.is_empty() {
            recipe.ingredients = item_texts(container, "recipeIngredient");
        }

        tracing::info!(
            url,
            name = %recipe.name,
            ingredients = recipe.ingredients.len(),
            "Extracted recipe"
        );

        Ok(recipe)
    }
}

fn missing(url: &str, field: &'static str) -> ExtractError {
    ExtractError::InsufficientData {
        url: url.to_string(),
        field,
    }
}

/// Evaluates a fallback chain; first non-empty value wins
fn resolve_chain(
    document: &Document,
    container: ElementRef<'_>,
    chain: &[FieldSource],
) -> Option<String> {
    chain.iter().find_map(|source| match source {
        FieldSource::ItemProp(property) => property_value(document, container, property),
        FieldSource::DocumentProperty(pattern) => document_property(document, pattern),
    })
}

/// Value of an item property, honoring fixup injections
fn property_value(document: &Document, container: ElementRef<'_>, property: &str) -> Option<String> {
    let injected = document.injection(property);
    if let Some((value, true)) = injected {
        return non_empty(value);
    }

    owned_props(container, property)
        .into_iter()
        .find_map(item_value)
        .or_else(|| injected.and_then(|(value, _)| non_empty(value)))
}

/// Page-level metadata such as OpenGraph `og:site_name`
fn document_property(document: &Document, pattern: &Regex) -> Option<String> {
    document
        .find_all("[property]")
        .into_iter()
        .filter(|element| {
            element
                .value()
                .attr("property")
                .is_some_and(|property| pattern.is_match(property))
        })
        .find_map(|element| {
            element
                .value()
                .attr("content")
                .and_then(non_empty)
                .or_else(|| non_empty(&node_text(element)))
        })
}

fn find_image(document: &Document, container: ElementRef<'_>) -> Option<String> {
    let injected = document.injection("image");
    if let Some((value, true)) = injected {
        return non_empty(value);
    }

    if let Some(node) = owned_props(container, "image").into_iter().next() {
        return ["src", "srcset", "content", "href"]
            .iter()
            .find_map(|attr| node.value().attr(attr))
            .map(|value| value.trim().to_string());
    }

    if let Some((value, _)) = injected {
        return non_empty(value);
    }

    wordpress_image(document, container)
}

/// Falls back to a WordPress attachment image (`class="wp-image-123"`) in the
/// enclosing `<article>`, or anywhere in the page when there is none
fn wordpress_image<'a>(document: &'a Document, container: ElementRef<'a>) -> Option<String> {
    let selector = Selector::parse("img[class]").ok()?;

    let article = std::iter::once(container)
        .chain(container.ancestors().filter_map(ElementRef::wrap))
        .find(|element| element.value().name() == "article");

    let images: Vec<ElementRef<'a>> = match article {
        Some(article) => article.select(&selector).collect(),
        None => document.html().select(&selector).collect(),
    };

    images
        .into_iter()
        .filter(|img| img.value().classes().any(is_wordpress_image_class))
        .find_map(|img| img.value().attr("src"))
        .map(str::to_string)
}

fn is_wordpress_image_class(class: &str) -> bool {
    class
        .strip_prefix("wp-image-")
        .is_some_and(|id| !id.is_empty() && id.bytes().all(|b| b.is_ascii_digit()))
}

/// Reads and parses one of the timing properties
fn read_time(
    document: &Document,
    container: ElementRef<'_>,
    property: &'static str,
    url: &str,
) -> Option<RecipeDuration> {
    let Some(raw) = time_value(document, container, property) else {
        tracing::warn!(url, field = property, "No {} found for recipe", property);
        return None;
    };

    match RecipeDuration::parse(&raw) {
        Ok(duration) => Some(duration),
        Err(e) => {
            tracing::warn!(url, field = property, "{}", e);
            None
        }
    }
}

/// Raw timing text: `datetime`, then `content`, then a microformat
/// `value-title` child's `title`, then the element text; blank values are
/// passed over
fn time_value(document: &Document, container: ElementRef<'_>, property: &str) -> Option<String> {
    let injected = document.injection(property);
    if let Some((value, true)) = injected {
        return non_empty(value);
    }

    let from_markup = owned_props(container, property)
        .into_iter()
        .next()
        .and_then(|node| {
            node.value()
                .attr("datetime")
                .and_then(non_empty)
                .or_else(|| node.value().attr("content").and_then(non_empty))
                .or_else(|| value_title(node))
                .or_else(|| non_empty(&node_text(node)))
        });

    from_markup.or_else(|| injected.and_then(|(value, _)| non_empty(value)))
}

fn value_title(node: ElementRef<'_>) -> Option<String> {
    let selector = Selector::parse(".value-title[title]").ok()?;
    node.select(&selector)
        .next()
        .and_then(|element| element.value().attr("title"))
        .and_then(non_empty)
}

/// Non-empty values of every matching property, in document order
fn item_texts(container: ElementRef<'_>, property: &str) -> Vec<String> {
    owned_props(container, property)
        .into_iter()
        .filter_map(item_value)
        .collect()
}

/// Elements carrying `property` whose nearest enclosing item is `container`
///
/// Properties of nested items (the author `Person`, a nutrition block) are
/// excluded so that e.g. the author's `name` is never read as the recipe name.
fn owned_props<'a>(container: ElementRef<'a>, property: &str) -> Vec<ElementRef<'a>> {
    let Ok(selector) = Selector::parse(&format!("[itemprop~=\"{}\"]", property)) else {
        return Vec::new();
    };

    container
        .select(&selector)
        .filter(|element| belongs_to(container, *element))
        .collect()
}

fn belongs_to(container: ElementRef<'_>, element: ElementRef<'_>) -> bool {
    for node in element.ancestors() {
        if node.id() == container.id() {
            return true;
        }
        if let Some(ancestor) = ElementRef::wrap(node) {
            if is_item(ancestor) {
                return false;
            }
        }
    }
    false
}

/// Whether an element starts an item of its own
fn is_item(element: ElementRef<'_>) -> bool {
    let attrs = element.value();
    attrs.attr("itemscope").is_some() || attrs.attr("itemtype").is_some()
}

/// Value of a property element: a nested item's name, the element text, or
/// its `content` attribute
fn item_value(element: ElementRef<'_>) -> Option<String> {
    if is_item(element) {
        if let Some(name) = owned_props(element, "name")
            .into_iter()
            .find_map(|name| non_empty(&node_text(name)))
        {
            return Some(name);
        }
    }

    non_empty(&node_text(element)).or_else(|| element.value().attr("content").and_then(non_empty))
}

/// Element text with whitespace runs collapsed
fn node_text(element: ElementRef<'_>) -> String {
    element
        .text()
        .collect::<String>()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

fn non_empty(value: &str) -> Option<String> {
    let value = value.trim();
    if value.is_empty() {
        None
    } else {
        Some(value.to_string())
    }
}
