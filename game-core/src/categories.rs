//! The static event dataset, keyed by category.
//!
//! Loaded once at process start and read-only thereafter. A default
//! dataset ships embedded in the binary; deployments can point
//! `CATEGORIES_FILE` at their own JSON.

use std::collections::HashMap;
use std::path::Path;

use anyhow::{Context, Result, bail};
use serde::Deserialize;
use tracing::info;

use game_types::{Category, Event};

const DEFAULT_CATEGORIES: &str = include_str!("../data/categories.json");

/// On-disk shape: an object keyed by category key, the key not repeated
/// inside the body.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CategoryFile {
    name: String,
    description: String,
    map_center: [f64; 2],
    map_zoom: u8,
    timeline_min: i32,
    timeline_max: i32,
    events: Vec<Event>,
}

pub struct CategoryStore {
    categories: HashMap<String, Category>,
}

impl CategoryStore {
    pub fn from_json(json: &str) -> Result<Self> {
        let raw: HashMap<String, CategoryFile> =
            serde_json::from_str(json).context("Failed to parse category dataset")?;

        let mut categories = HashMap::new();
        for (key, data) in raw {
            if data.events.is_empty() {
                bail!("Category '{}' has no events", key);
            }
            categories.insert(
                key.clone(),
                Category {
                    key,
                    name: data.name,
                    description: data.description,
                    map_center: data.map_center,
                    map_zoom: data.map_zoom,
                    timeline_min: data.timeline_min,
                    timeline_max: data.timeline_max,
                    events: data.events,
                },
            );
        }

        if categories.is_empty() {
            bail!("Category dataset is empty");
        }

        Ok(Self { categories })
    }

    /// The dataset compiled into the binary.
    pub fn with_default_categories() -> Result<Self> {
        let store = Self::from_json(DEFAULT_CATEGORIES)?;
        info!("Loaded {} built-in categories", store.len());
        Ok(store)
    }

    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let json = std::fs::read_to_string(path.as_ref()).with_context(|| {
            format!("Failed to read category file {}", path.as_ref().display())
        })?;
        let store = Self::from_json(&json)?;
        info!(
            "Loaded {} categories from {}",
            store.len(),
            path.as_ref().display()
        );
        Ok(store)
    }

    pub fn get(&self, key: &str) -> Option<&Category> {
        self.categories.get(key)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.categories.contains_key(key)
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.categories.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.categories.len()
    }

    pub fn is_empty(&self) -> bool {
        self.categories.is_empty()
    }
}
