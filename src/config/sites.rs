//! Turning configuration entries into site adapters and an extractor

use crate::config::types::{Config, ExtractionConfig, SiteEntry};
use crate::extract::{ExtractPolicy, FieldSource, RecipeExtractor};
use crate::site::{self, SiteAdapter, SiteError};
use crate::ConfigError;

impl ExtractionConfig {
    pub fn policy(&self) -> ExtractPolicy {
        ExtractPolicy {
            require_author: self.require_author,
            require_yield: self.require_yield,
        }
    }

    /// Builds the extractor: the recipe's own author first, then each
    /// configured page-level property pattern
    pub fn build_extractor(&self) -> Result<RecipeExtractor, ConfigError> {
        let mut author_chain = vec![FieldSource::item_prop("author")];
        for pattern in &self.author_properties {
            let source =
                FieldSource::document_property(pattern).map_err(|source| ConfigError::Pattern {
                    pattern: pattern.clone(),
                    source,
                })?;
            author_chain.push(source);
        }

        Ok(RecipeExtractor::new(self.policy()).with_author_chain(author_chain))
    }
}

impl SiteEntry {
    /// Name used in logs and for `--site` selection
    pub fn name(&self) -> &str {
        self.name
            .as_deref()
            .or(self.preset.as_deref())
            .unwrap_or("<unnamed>")
    }

    pub fn build(&self) -> Result<SiteAdapter, ConfigError> {
        let name = self.name().to_string();
        let wrap = |source: SiteError| ConfigError::Site {
            site: name.clone(),
            source,
        };

        let mut site = match &self.preset {
            Some(preset) => {
                if self.has_custom_fields() {
                    return Err(ConfigError::Validation(format!(
                        "Site '{}' uses preset '{}' and may only set a name and fixups",
                        name, preset
                    )));
                }
                let site = site::preset(preset).map_err(wrap)?;
                match &self.name {
                    Some(name) => site.with_name(name.clone()),
                    None => site,
                }
            }
            None => self.build_custom(&name).map_err(|e| match e {
                BuildError::Missing(field) => ConfigError::Validation(format!(
                    "Site '{}' needs '{}' (or a preset)",
                    name, field
                )),
                BuildError::Site(source) => wrap(source),
            })?,
        };

        for fixup in &self.fixups {
            site = site.with_fixup(fixup.clone()).map_err(wrap)?;
        }

        site.validate().map_err(wrap)?;
        Ok(site)
    }

    fn has_custom_fields(&self) -> bool {
        self.root_url.is_some()
            || self.recipe_index_url.is_some()
            || self.strategy.is_some()
            || self.pagination.is_some()
            || self.links.is_some()
            || self.categories.is_some()
    }

    fn build_custom(&self, name: &str) -> Result<SiteAdapter, BuildError> {
        let root_url = self.root_url.as_deref().ok_or(BuildError::Missing("root-url"))?;
        let index = self
            .recipe_index_url
            .as_deref()
            .ok_or(BuildError::Missing("recipe-index-url"))?;
        let links = self.links.clone().ok_or(BuildError::Missing("links"))?;

        let mut site = SiteAdapter::new(name, root_url, index, links)?
            .with_traversal(self.strategy.unwrap_or_default())
            .with_pagination(self.pagination.clone().unwrap_or_default());

        if let Some(categories) = &self.categories {
            site = site.with_categories(categories.clone())?;
        }

        Ok(site)
    }
}

enum BuildError {
    Missing(&'static str),
    Site(SiteError),
}

impl From<SiteError> for BuildError {
    fn from(e: SiteError) -> Self {
        BuildError::Site(e)
    }
}

impl Config {
    /// Builds every configured site adapter, in file order
    pub fn build_sites(&self) -> Result<Vec<SiteAdapter>, ConfigError> {
        self.sites.iter().map(SiteEntry::build).collect()
    }

    /// Builds the adapters named in `names`, or all of them when `names` is empty
    pub fn select_sites(&self, names: &[String]) -> Result<Vec<SiteAdapter>, ConfigError> {
        if let Some(unknown) = names
            .iter()
            .find(|name| !self.sites.iter().any(|entry| entry.name() == name.as_str()))
        {
            return Err(ConfigError::Validation(format!(
                "No site named '{}' in the configuration",
                unknown
            )));
        }

        self.sites
            .iter()
            .filter(|entry| names.is_empty() || names.iter().any(|name| name == entry.name()))
            .map(SiteEntry::build)
            .collect()
    }
}
