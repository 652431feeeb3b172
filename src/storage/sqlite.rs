//! SQLite storage implementation
//!
//! This module provides a SQLite-based implementation of the `RecipeSink` trait.

use crate::model::{Recipe, RecipeDuration};
use crate::storage::schema::{initialize_schema, OPTIONAL_COLUMNS};
use crate::storage::traits::{RecipeSink, StorageError, StorageResult};
use crate::storage::{RunCounts, RunRecord, RunStatus};
use chrono::Utc;
use rusqlite::{params, Connection, OptionalExtension, Row};
use std::path::Path;
use std::sync::{Mutex, MutexGuard};

const RECIPE_COLUMNS: &str = "id, url, name, author, image, image_data, recipe_yield, \
     recipe_category, recipe_cuisine, cook_time, prep_time, total_time";

/// SQLite storage backend
///
/// The connection sits behind a mutex so one store can be shared by every
/// site worker; each write is a single transaction.
pub struct SqliteRecipeStore {
    conn: Mutex<Connection>,
}

impl SqliteRecipeStore {
    /// Creates a new SqliteRecipeStore instance
    ///
    /// # Arguments
    ///
    /// * `path` - Path to the SQLite database file
    ///
    /// # Returns
    ///
    /// * `Ok(SqliteRecipeStore)` - Successfully opened/created database
    /// * `Err(StorageError)` - Failed to open database
    pub fn new(path: &Path) -> StorageResult<Self> {
        let conn = Connection::open(path)?;

        conn.execute_batch(
            "
            PRAGMA journal_mode = WAL;
            PRAGMA synchronous = NORMAL;
            PRAGMA foreign_keys = ON;
            PRAGMA temp_store = MEMORY;
        ",
        )?;

        initialize_schema(&conn)?;

        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Creates an in-memory database
    pub fn new_in_memory() -> StorageResult<Self> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch("PRAGMA foreign_keys = ON;")?;
        initialize_schema(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn lock(&self) -> StorageResult<MutexGuard<'_, Connection>> {
        self.conn.lock().map_err(|_| StorageError::Poisoned)
    }

    // ===== Recipes =====

    /// Gets a stored recipe by URL
    pub fn get_recipe(&self, url: &str) -> StorageResult<Option<Recipe>> {
        let conn = self.lock()?;
        let sql = format!("SELECT {} FROM recipes WHERE url = ?1", RECIPE_COLUMNS);

        let row = conn
            .query_row(&sql, params![url], |row| Ok((row.get::<_, i64>(0)?, recipe_from_row(row)?)))
            .optional()?;

        match row {
            Some((id, mut recipe)) => {
                recipe.ingredients = load_ingredients(&conn, id)?;
                Ok(Some(recipe))
            }
            None => Ok(None),
        }
    }

    /// Gets every stored recipe, oldest first
    pub fn list_recipes(&self) -> StorageResult<Vec<Recipe>> {
        let conn = self.lock()?;
        let sql = format!("SELECT {} FROM recipes ORDER BY id", RECIPE_COLUMNS);

        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt
            .query_map([], |row| Ok((row.get::<_, i64>(0)?, recipe_from_row(row)?)))?
            .collect::<Result<Vec<_>, _>>()?;

        let mut recipes = Vec::with_capacity(rows.len());
        for (id, mut recipe) in rows {
            recipe.ingredients = load_ingredients(&conn, id)?;
            recipes.push(recipe);
        }

        Ok(recipes)
    }

    /// Gets every stored recipe URL
    pub fn recipe_urls(&self) -> StorageResult<Vec<String>> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare("SELECT url FROM recipes ORDER BY id")?;
        let urls = stmt
            .query_map([], |row| row.get(0))?
            .collect::<Result<Vec<String>, _>>()?;
        Ok(urls)
    }

    /// Counts recipes lacking each optional field
    pub fn count_missing_fields(&self) -> StorageResult<Vec<(&'static str, u64)>> {
        let conn = self.lock()?;
        let mut counts = Vec::with_capacity(OPTIONAL_COLUMNS.len());

        for column in OPTIONAL_COLUMNS {
            let sql = format!("SELECT COUNT(*) FROM recipes WHERE {} IS NULL", column);
            let count: i64 = conn.query_row(&sql, [], |row| row.get(0))?;
            counts.push((*column, count as u64));
        }

        Ok(counts)
    }

    /// Gets total ingredient line count
    pub fn count_ingredients(&self) -> StorageResult<u64> {
        let conn = self.lock()?;
        let count: i64 = conn.query_row("SELECT COUNT(*) FROM ingredients", [], |row| row.get(0))?;
        Ok(count as u64)
    }

    // ===== Run Management =====

    /// Creates a new crawl run
    ///
    /// # Arguments
    ///
    /// * `config_hash` - Hash of the configuration file
    ///
    /// # Returns
    ///
    /// The ID of the newly created run
    pub fn create_run(&self, config_hash: &str) -> StorageResult<i64> {
        let conn = self.lock()?;
        let now = Utc::now().to_rfc3339();
        conn.execute(
            "INSERT INTO runs (started_at, config_hash, status) VALUES (?1, ?2, ?3)",
            params![now, config_hash, RunStatus::Running.to_db_string()],
        )?;
        Ok(conn.last_insert_rowid())
    }

    /// Marks a run as finished with its outcome totals
    pub fn finish_run(&self, run_id: i64, status: RunStatus, counts: RunCounts) -> StorageResult<()> {
        let conn = self.lock()?;
        let now = Utc::now().to_rfc3339();
        let updated = conn.execute(
            "UPDATE runs SET status = ?1, finished_at = ?2, recipes_stored = ?3,
             pages_skipped = ?4, pages_failed = ?5 WHERE id = ?6",
            params![
                status.to_db_string(),
                now,
                counts.stored as i64,
                counts.skipped as i64,
                counts.failed as i64,
                run_id
            ],
        )?;

        if updated == 0 {
            return Err(StorageError::RunNotFound(run_id));
        }
        Ok(())
    }

    /// Gets the most recent run
    pub fn get_latest_run(&self) -> StorageResult<Option<RunRecord>> {
        let conn = self.lock()?;
        let run = conn
            .query_row(
                "SELECT id, started_at, finished_at, config_hash, status,
                 recipes_stored, pages_skipped, pages_failed
                 FROM runs ORDER BY id DESC LIMIT 1",
                [],
                |row| {
                    Ok(RunRecord {
                        id: row.get(0)?,
                        started_at: row.get(1)?,
                        finished_at: row.get(2)?,
                        config_hash: row.get(3)?,
                        status: RunStatus::from_db_string(&row.get::<_, String>(4)?)
                            .unwrap_or(RunStatus::Failed),
                        counts: RunCounts {
                            stored: row.get::<_, i64>(5)? as u64,
                            skipped: row.get::<_, i64>(6)? as u64,
                            failed: row.get::<_, i64>(7)? as u64,
                        },
                    })
                },
            )
            .optional()?;

        Ok(run)
    }
}

impl RecipeSink for SqliteRecipeStore {
    fn exists(&self, url: &str) -> StorageResult<bool> {
        let conn = self.lock()?;
        recipe_exists(&conn, url)
    }

    fn add(&self, recipe: &Recipe) -> StorageResult<()> {
        let mut conn = self.lock()?;
        let tx = conn.transaction()?;
        write_recipe(&tx, recipe)?;
        tx.commit()?;
        Ok(())
    }

    fn add_if_absent(&self, recipe: &Recipe) -> StorageResult<bool> {
        let mut conn = self.lock()?;
        let tx = conn.transaction()?;

        if recipe_exists(&tx, recipe.url())? {
            return Ok(false);
        }

        write_recipe(&tx, recipe)?;
        tx.commit()?;
        Ok(true)
    }

    fn count(&self) -> StorageResult<u64> {
        let conn = self.lock()?;
        let count: i64 = conn.query_row("SELECT COUNT(*) FROM recipes", [], |row| row.get(0))?;
        Ok(count as u64)
    }
}

fn recipe_exists(conn: &Connection, url: &str) -> StorageResult<bool> {
    let found: Option<i64> = conn
        .query_row("SELECT id FROM recipes WHERE url = ?1", params![url], |row| {
            row.get(0)
        })
        .optional()?;
    Ok(found.is_some())
}

/// Upserts the recipe row and rewrites its ingredient lines
fn write_recipe(conn: &Connection, recipe: &Recipe) -> StorageResult<()> {
    let now = Utc::now().to_rfc3339();

    conn.execute(
        "INSERT INTO recipes (url, name, author, image, image_data, recipe_yield,
             recipe_category, recipe_cuisine, cook_time, prep_time, total_time,
             scraped_at, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?12)
         ON CONFLICT(url) DO UPDATE SET
             name = excluded.name,
             author = excluded.author,
             image = excluded.image,
             image_data = excluded.image_data,
             recipe_yield = excluded.recipe_yield,
             recipe_category = excluded.recipe_category,
             recipe_cuisine = excluded.recipe_cuisine,
             cook_time = excluded.cook_time,
             prep_time = excluded.prep_time,
             total_time = excluded.total_time,
             updated_at = excluded.updated_at",
        params![
            recipe.url(),
            recipe.name,
            recipe.author,
            recipe.image,
            recipe.image_data,
            recipe.recipe_yield,
            recipe.recipe_category,
            recipe.recipe_cuisine,
            recipe.cook_time.as_ref().map(RecipeDuration::iso),
            recipe.prep_time.as_ref().map(RecipeDuration::iso),
            recipe.total_time.as_ref().map(RecipeDuration::iso),
            now,
        ],
    )?;

    let recipe_id: i64 = conn.query_row(
        "SELECT id FROM recipes WHERE url = ?1",
        params![recipe.url()],
        |row| row.get(0),
    )?;

    conn.execute(
        "DELETE FROM ingredients WHERE recipe_id = ?1",
        params![recipe_id],
    )?;

    let mut stmt =
        conn.prepare("INSERT INTO ingredients (recipe_id, position, text) VALUES (?1, ?2, ?3)")?;
    for (position, text) in recipe.ingredients.iter().enumerate() {
        stmt.execute(params![recipe_id, position as i64, text])?;
    }

    Ok(())
}

fn recipe_from_row(row: &Row<'_>) -> rusqlite::Result<Recipe> {
    let mut recipe = Recipe::new(row.get::<_, String>(1)?, row.get::<_, String>(2)?);
    recipe.author = row.get(3)?;
    recipe.image = row.get(4)?;
    recipe.image_data = row.get(5)?;
    recipe.recipe_yield = row.get(6)?;
    recipe.recipe_category = row.get(7)?;
    recipe.recipe_cuisine = row.get(8)?;
    recipe.cook_time = stored_duration(row.get(9)?);
    recipe.prep_time = stored_duration(row.get(10)?);
    recipe.total_time = stored_duration(row.get(11)?);
    Ok(recipe)
}

/// Durations are only ever written after a successful parse
fn stored_duration(raw: Option<String>) -> Option<RecipeDuration> {
    raw.and_then(|raw| RecipeDuration::parse(&raw).ok())
}

fn load_ingredients(conn: &Connection, recipe_id: i64) -> StorageResult<Vec<String>> {
    let mut stmt =
        conn.prepare("SELECT text FROM ingredients WHERE recipe_id = ?1 ORDER BY position")?;
    let ingredients = stmt
        .query_map(params![recipe_id], |row| row.get(0))?
        .collect::<Result<Vec<String>, _>>()?;
    Ok(ingredients)
}
