//! In-memory recipe sink
//!
//! Keeps recipes in insertion order behind one mutex. Useful for tests and for
//! one-off crawls whose results are exported rather than kept.

use crate::model::Recipe;
use crate::storage::{RecipeSink, StorageError, StorageResult};
use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};

#[derive(Debug, Default)]
struct Recipes {
    records: Vec<Recipe>,
    index: HashMap<String, usize>,
}

impl Recipes {
    fn upsert(&mut self, recipe: &Recipe) {
        match self.index.get(recipe.url()) {
            Some(&position) => self.records[position] = recipe.clone(),
            None => self.insert(recipe),
        }
    }

    fn insert(&mut self, recipe: &Recipe) {
        self.index.insert(recipe.url().to_string(), self.records.len());
        self.records.push(recipe.clone());
    }
}

/// A `RecipeSink` that never touches disk
#[derive(Debug, Default)]
pub struct MemorySink {
    recipes: Mutex<Recipes>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> StorageResult<MutexGuard<'_, Recipes>> {
        self.recipes.lock().map_err(|_| StorageError::Poisoned)
    }

    /// The stored record for `url`, if any
    pub fn get(&self, url: &str) -> StorageResult<Option<Recipe>> {
        let recipes = self.lock()?;
        Ok(recipes
            .index
            .get(url)
            .map(|&position| recipes.records[position].clone()))
    }

    /// Every stored recipe in first-insertion order
    pub fn recipes(&self) -> StorageResult<Vec<Recipe>> {
        Ok(self.lock()?.records.clone())
    }
}

impl RecipeSink for MemorySink {
    fn exists(&self, url: &str) -> StorageResult<bool> {
        Ok(self.lock()?.index.contains_key(url))
    }

    fn add(&self, recipe: &Recipe) -> StorageResult<()> {
        self.lock()?.upsert(recipe);
        Ok(())
    }

    fn add_if_absent(&self, recipe: &Recipe) -> StorageResult<bool> {
        let mut recipes = self.lock()?;
        if recipes.index.contains_key(recipe.url()) {
            return Ok(false);
        }
        recipes.insert(recipe);
        Ok(true)
    }

    fn count(&self) -> StorageResult<u64> {
        Ok(self.lock()?.records.len() as u64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn test_add_upserts() {
        let sink = MemorySink::new();
        let mut soup = Recipe::new("https://a.example/soup", "Soup");
        sink.add(&soup).unwrap();
        sink.add(&Recipe::new("https://a.example/toast", "Toast")).unwrap();

        soup.name = "Better Soup".to_string();
        sink.add(&soup).unwrap();

        assert_eq!(sink.count().unwrap(), 2);
        let stored = sink.get("https://a.example/soup").unwrap().unwrap();
        assert_eq!(stored.name, "Better Soup");

        // the replaced record keeps its original position
        let names: Vec<_> = sink.recipes().unwrap().into_iter().map(|r| r.name).collect();
        assert_eq!(names, vec!["Better Soup", "Toast"]);
    }

    #[test]
    fn test_add_if_absent() {
        let sink = MemorySink::new();
        let first = Recipe::new("https://a.example/soup", "Soup");
        let second = Recipe::new("https://a.example/soup", "Other Soup");

        assert!(sink.add_if_absent(&first).unwrap());
        assert!(!sink.add_if_absent(&second).unwrap());
        assert!(sink.exists("https://a.example/soup").unwrap());
        assert!(!sink.exists("https://a.example/soup/").unwrap());
        assert_eq!(sink.count().unwrap(), 1);
        assert_eq!(sink.get("https://a.example/soup").unwrap().unwrap().name, "Soup");
    }

    #[test]
    fn test_add_if_absent_races_store_once() {
        let sink = Arc::new(MemorySink::new());
        let handles: Vec<_> = (0..8)
            .map(|i| {
                let sink = Arc::clone(&sink);
                std::thread::spawn(move || {
                    let recipe = Recipe::new("https://a.example/soup", format!("Soup {}", i));
                    sink.add_if_absent(&recipe).unwrap()
                })
            })
            .collect();

        let inserted = handles
            .into_iter()
            .map(|handle| handle.join().unwrap())
            .filter(|inserted| *inserted)
            .count();

        assert_eq!(inserted, 1);
        assert_eq!(sink.count().unwrap(), 1);
    }
}
