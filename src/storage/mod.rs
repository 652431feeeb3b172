//! Storage module for persisting extracted recipes
//!
//! This module handles all database operations, including:
//! - SQLite database initialization and schema management
//! - Recipe upserts and atomic check-and-insert for concurrent site crawls
//! - Run tracking for the statistics report
//! - An in-memory sink for tests and throwaway crawls

mod memory;
mod schema;
mod sqlite;
mod traits;

pub use memory::MemorySink;
pub use schema::OPTIONAL_COLUMNS;
pub use sqlite::SqliteRecipeStore;
pub use traits::{RecipeSink, StorageError, StorageResult};

use std::path::Path;

/// Initializes or opens a recipe database
///
/// # Arguments
///
/// * `path` - Path to the SQLite database file
///
/// # Returns
///
/// * `Ok(SqliteRecipeStore)` - Successfully initialized storage
/// * `Err(StorageError)` - Failed to open or initialize the database
pub fn open_storage(path: &Path) -> StorageResult<SqliteRecipeStore> {
    SqliteRecipeStore::new(path)
}

/// Represents a crawl run
#[derive(Debug, Clone)]
pub struct RunRecord {
    pub id: i64,
    pub started_at: String,
    pub finished_at: Option<String>,
    pub config_hash: String,
    pub status: RunStatus,
    pub counts: RunCounts,
}

/// Page outcome totals recorded when a run finishes
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunCounts {
    pub stored: u64,
    pub skipped: u64,
    pub failed: u64,
}

/// Status of a crawl run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunStatus {
    Running,
    Completed,
    Failed,
}

impl RunStatus {
    pub fn to_db_string(&self) -> &'static str {
        match self {
            Self::Running => "running",
            Self::Completed => "completed",
            Self::Failed => "failed",
        }
    }

    pub fn from_db_string(s: &str) -> Option<Self> {
        match s {
            "running" => Some(Self::Running),
            "completed" => Some(Self::Completed),
            "failed" => Some(Self::Failed),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_run_status_roundtrip() {
        for status in &[RunStatus::Running, RunStatus::Completed, RunStatus::Failed] {
            let db_str = status.to_db_string();
            assert_eq!(Some(*status), RunStatus::from_db_string(db_str));
        }
    }

    #[test]
    fn test_run_status_invalid() {
        assert_eq!(RunStatus::from_db_string("interrupted"), None);
    }
}
