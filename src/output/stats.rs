//! Statistics generation from the recipe database
//!
//! This module provides functionality for extracting and displaying
//! recipe statistics from the storage layer.

use crate::storage::{RecipeSink, RunRecord, SqliteRecipeStore};
use crate::HarvestError;
use std::collections::HashMap;
use url::Url;

/// Recipe database statistics summary
#[derive(Debug, Clone)]
pub struct RecipeStatistics {
    /// Total number of stored recipes
    pub total_recipes: u64,

    /// Total number of ingredient lines
    pub total_ingredients: u64,

    /// Recipes per host, largest first
    pub recipes_by_host: Vec<(String, u64)>,

    /// Recipes lacking each optional field
    pub missing_fields: Vec<(&'static str, u64)>,

    /// The most recent crawl run
    pub last_run: Option<RunRecord>,
}

/// Loads statistics from storage
///
/// # Arguments
///
/// * `store` - The recipe database to query
///
/// # Returns
///
/// * `Ok(RecipeStatistics)` - Successfully loaded statistics
/// * `Err(HarvestError)` - Failed to query statistics
pub fn load_statistics(store: &SqliteRecipeStore) -> Result<RecipeStatistics, HarvestError> {
    let total_recipes = store.count()?;
    let total_ingredients = store.count_ingredients()?;
    let recipes_by_host = count_by_host(&store.recipe_urls()?);
    let missing_fields = store.count_missing_fields()?;
    let last_run = store.get_latest_run()?;

    Ok(RecipeStatistics {
        total_recipes,
        total_ingredients,
        recipes_by_host,
        missing_fields,
        last_run,
    })
}

fn count_by_host(urls: &[String]) -> Vec<(String, u64)> {
    let mut counts: HashMap<String, u64> = HashMap::new();
    for url in urls {
        let host = Url::parse(url)
            .ok()
            .and_then(|url| url.host_str().map(str::to_string))
            .unwrap_or_else(|| "<invalid>".to_string());
        *counts.entry(host).or_insert(0) += 1;
    }

    let mut counts: Vec<_> = counts.into_iter().collect();
    counts.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
    counts
}

/// Run length in seconds, when the run has finished
pub fn run_duration_seconds(run: &RunRecord) -> Option<i64> {
    let started = run.started_at.parse::<chrono::DateTime<chrono::Utc>>().ok()?;
    let finished = run
        .finished_at
        .as_deref()?
        .parse::<chrono::DateTime<chrono::Utc>>()
        .ok()?;
    Some((finished - started).num_seconds())
}

/// Prints statistics to stdout in a formatted manner
///
/// # Arguments
///
/// * `stats` - The statistics to display
pub fn print_statistics(stats: &RecipeStatistics) {
    println!("=== Recipe Statistics ===\n");

    println!("Overview:");
    println!("  Recipes stored: {}", stats.total_recipes);
    println!("  Ingredient lines: {}", stats.total_ingredients);
    println!();

    if !stats.recipes_by_host.is_empty() {
        println!("Recipes by Host:");
        for (host, count) in &stats.recipes_by_host {
            println!("  {}: {}", host, count);
        }
        println!();
    }

    if stats.total_recipes > 0 {
        println!("Missing Optional Fields:");
        for (field, count) in &stats.missing_fields {
            let percentage = (*count as f64 / stats.total_recipes as f64) * 100.0;
            println!("  {}: {} ({:.1}%)", field, count, percentage);
        }
        println!();
    }

    match &stats.last_run {
        Some(run) => {
            println!("Last Run:");
            println!("  ID: {}", run.id);
            println!("  Status: {}", run.status.to_db_string());
            println!("  Started: {}", run.started_at);
            if let Some(seconds) = run_duration_seconds(run) {
                println!("  Duration: {}s", seconds);
            }
            println!(
                "  Stored: {}, skipped: {}, failed: {}",
                run.counts.stored, run.counts.skipped, run.counts.failed
            );
        }
        None => println!("No crawl runs recorded yet."),
    }
}
