//! Built-in adapters for known recipe sites

use super::{LinkSelector, PageScheme, SiteAdapter, SiteError, Traversal};

/// Names accepted by [`preset`]
pub const PRESET_NAMES: &[&str] = &["minimalist-baker", "cookie-and-kate", "pinch-of-yum"];

/// Looks up a built-in site adapter by name
pub fn preset(name: &str) -> Result<SiteAdapter, SiteError> {
    match name {
        "minimalist-baker" => Ok(SiteAdapter::new(
            name,
            "http://minimalistbaker.com",
            "http://minimalistbaker.com/recipes",
            LinkSelector::with_class("div", "entry-content"),
        )?
        .with_traversal(Traversal::Paginated)),

        // every recipe is listed on one index page
        "cookie-and-kate" => Ok(SiteAdapter::new(
            name,
            "http://cookieandkate.com",
            "http://cookieandkate.com/recipes/",
            LinkSelector::with_class("div", "lcp_catlist_item"),
        )?
        .with_traversal(Traversal::Flat)),

        "pinch-of-yum" => Ok(SiteAdapter::new(
            name,
            "http://pinchofyum.com",
            "http://pinchofyum.com/recipes",
            LinkSelector::tag("article"),
        )?
        .with_traversal(Traversal::Paginated)
        .with_pagination(PageScheme::Query {
            param: "fwp_paged".to_string(),
        })),

        other => Err(SiteError::UnknownPreset(other.to_string())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_every_preset_builds() {
        for name in PRESET_NAMES {
            let site = preset(name).unwrap();
            assert_eq!(site.name(), *name);
            site.validate().unwrap();
        }
    }

    #[test]
    fn test_minimalist_baker_pages() {
        let site = preset("minimalist-baker").unwrap();
        assert_eq!(
            site.page_url(site.recipe_index_url(), 2).unwrap(),
            "http://minimalistbaker.com/recipes/page/2"
        );
    }

    #[test]
    fn test_pinch_of_yum_pages() {
        let site = preset("pinch-of-yum").unwrap();
        assert_eq!(
            site.page_url(site.recipe_index_url(), 1).unwrap(),
            "http://pinchofyum.com/recipes?fwp_paged=1"
        );
    }

    #[test]
    fn test_cookie_and_kate_is_flat() {
        assert_eq!(preset("cookie-and-kate").unwrap().traversal(), Traversal::Flat);
    }

    #[test]
    fn test_unknown_preset() {
        assert!(matches!(
            preset("nonexistent"),
            Err(SiteError::UnknownPreset(name)) if name == "nonexistent"
        ));
    }
}
