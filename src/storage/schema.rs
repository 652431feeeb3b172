//! Database schema definitions
//!
//! This module contains all SQL schema definitions for the recipe database.

/// SQL schema for the database
pub const SCHEMA_SQL: &str = r#"
-- Track crawl runs
CREATE TABLE IF NOT EXISTS runs (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    started_at TEXT NOT NULL,
    finished_at TEXT,
    config_hash TEXT NOT NULL,
    status TEXT NOT NULL,
    recipes_stored INTEGER NOT NULL DEFAULT 0,
    pages_skipped INTEGER NOT NULL DEFAULT 0,
    pages_failed INTEGER NOT NULL DEFAULT 0
);

-- One row per recipe page, keyed by its exact URL
CREATE TABLE IF NOT EXISTS recipes (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    url TEXT NOT NULL UNIQUE,
    name TEXT NOT NULL,
    author TEXT,
    image TEXT,
    image_data BLOB,
    recipe_yield TEXT,
    recipe_category TEXT,
    recipe_cuisine TEXT,
    cook_time TEXT,
    prep_time TEXT,
    total_time TEXT,
    scraped_at TEXT NOT NULL,
    updated_at TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_recipes_url ON recipes(url);

-- Ingredient lines in markup order
CREATE TABLE IF NOT EXISTS ingredients (
    recipe_id INTEGER NOT NULL REFERENCES recipes(id) ON DELETE CASCADE,
    position INTEGER NOT NULL,
    text TEXT NOT NULL,
    PRIMARY KEY (recipe_id, position)
);
"#;

/// Optional recipe columns reported by the statistics output
pub const OPTIONAL_COLUMNS: &[&str] = &[
    "author",
    "image",
    "recipe_yield",
    "recipe_category",
    "recipe_cuisine",
    "cook_time",
    "prep_time",
    "total_time",
];

/// Initializes the database schema
///
/// # Arguments
///
/// * `conn` - The database connection
///
/// # Returns
///
/// * `Ok(())` - Schema initialized successfully
/// * `Err(rusqlite::Error)` - Failed to initialize schema
pub fn initialize_schema(conn: &rusqlite::Connection) -> Result<(), rusqlite::Error> {
    conn.execute_batch(SCHEMA_SQL)?;
    Ok(())
}
