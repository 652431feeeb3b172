//! Storage traits and error types
//!
//! This module defines the `RecipeSink` interface the crawl engine stores
//! into, and the associated error types.

use crate::model::Recipe;
use thiserror::Error;

/// Errors that can occur during storage operations
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Run not found: {0}")]
    RunNotFound(i64),

    #[error("Storage lock poisoned by a panicked writer")]
    Poisoned,

    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
}

/// Result type for storage operations
pub type StorageResult<T> = Result<T, StorageError>;

/// The deduplicating persistence boundary
///
/// A sink is shared by every site crawled in a run, so implementations take
/// `&self` and serialize access internally. Recipe identity is the exact URL
/// string.
pub trait RecipeSink: Send + Sync {
    /// Whether a recipe with this URL is already stored
    fn exists(&self, url: &str) -> StorageResult<bool>;

    /// Stores a recipe, replacing any stored record with the same URL
    fn add(&self, recipe: &Recipe) -> StorageResult<()>;

    /// Stores a recipe unless its URL is already present
    ///
    /// The check and the insert form one critical section, so two workers
    /// racing on the same URL store it once.
    ///
    /// # Returns
    ///
    /// `true` when the recipe was inserted
    fn add_if_absent(&self, recipe: &Recipe) -> StorageResult<bool>;

    /// Number of stored recipes
    fn count(&self) -> StorageResult<u64>;
}
