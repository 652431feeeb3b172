use crate::model::RecipeDuration;
use serde::Serialize;

/// A recipe extracted from a single page
///
/// The source URL is the identity of the record. It is fixed when the record is
/// created and has no setter, so a stored recipe always maps back to exactly the
/// page it came from (compared byte for byte, no normalization).
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Recipe {
    url: String,

    /// Recipe title
    pub name: String,

    /// Author, or the publishing site when no person is credited
    pub author: Option<String>,

    /// Image URL as written in the markup (may be a `srcset` value)
    pub image: Option<String>,

    /// Downloaded image payload, only filled when image download is enabled
    #[serde(skip)]
    pub image_data: Option<Vec<u8>>,

    pub recipe_yield: Option<String>,
    pub recipe_category: Option<String>,
    pub recipe_cuisine: Option<String>,

    pub cook_time: Option<RecipeDuration>,
    pub prep_time: Option<RecipeDuration>,
    pub total_time: Option<RecipeDuration>,

    /// Ingredient lines in markup order
    pub ingredients: Vec<String>,
}

impl Recipe {
    /// Creates a recipe with its identity and name; every other field starts empty
    pub fn new(url: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            name: name.into(),
            author: None,
            image: None,
            image_data: None,
            recipe_yield: None,
            recipe_category: None,
            recipe_cuisine: None,
            cook_time: None,
            prep_time: None,
            total_time: None,
            ingredients: Vec::new(),
        }
    }

    /// The page this recipe was extracted from
    pub fn url(&self) -> &str {
        &self.url
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_recipe_is_empty_apart_from_identity() {
        let recipe = Recipe::new("https://example.com/soup", "Soup");
        assert_eq!(recipe.url(), "https://example.com/soup");
        assert_eq!(recipe.name, "Soup");
        assert!(recipe.author.is_none());
        assert!(recipe.cook_time.is_none());
        assert!(recipe.ingredients.is_empty());
    }

    #[test]
    fn test_serializes_durations_as_iso_strings() {
        let mut recipe = Recipe::new("https://example.com/soup", "Soup");
        recipe.cook_time = Some(RecipeDuration::parse("PT15M").unwrap());
        recipe.image_data = Some(vec![1, 2, 3]);

        let json = serde_json::to_value(&recipe).unwrap();
        assert_eq!(json["url"], "https://example.com/soup");
        assert_eq!(json["cook_time"], "PT15M");
        assert!(json["prep_time"].is_null());
        assert!(json.get("image_data").is_none());
    }
}
