//! JSON export of stored recipes

use crate::model::Recipe;
use crate::storage::SqliteRecipeStore;
use crate::HarvestError;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

/// Writes every stored recipe to `path` as a pretty-printed JSON array
///
/// # Returns
///
/// The number of recipes written
pub fn export_json(store: &SqliteRecipeStore, path: &Path) -> Result<usize, HarvestError> {
    let recipes = store.list_recipes()?;
    let mut writer = BufWriter::new(File::create(path)?);
    write_recipes(&recipes, &mut writer)?;
    writer.flush()?;

    tracing::info!("Exported {} recipes to {}", recipes.len(), path.display());
    Ok(recipes.len())
}

/// Serializes recipes as a JSON array; durations keep their ISO-8601 text
pub fn write_recipes<W: Write>(recipes: &[Recipe], writer: W) -> Result<(), HarvestError> {
    serde_json::to_writer_pretty(writer, recipes)?;
    Ok(())
}
