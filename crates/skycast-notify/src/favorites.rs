//! Saved cities, kept in the order they were added.
//!
//! The list is persisted as one JSON array under `favorites.cities`.

use anyhow::{Context, Result};
use parking_lot::Mutex;
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use skycast_weather::{Location, LocationId};

pub const FAVORITES_KEY: &str = "favorites.cities";

pub trait FavoritesStore: Send + Sync {
    /// Stored list; empty when absent or unreadable.
    fn load(&self) -> Vec<Location>;

    fn save(&self, favorites: &[Location]) -> Result<()>;
}

fn decode(blob: &str) -> Vec<Location> {
    serde_json::from_str(blob).unwrap_or_else(|e| {
        tracing::warn!("Ignoring malformed {}: {}", FAVORITES_KEY, e);
        Vec::new()
    })
}

#[derive(Debug, Default)]
pub struct MemoryFavoritesStore {
    blob: Mutex<Option<String>>,
}

impl MemoryFavoritesStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert_raw(&self, blob: impl Into<String>) {
        *self.blob.lock() = Some(blob.into());
    }
}

impl FavoritesStore for MemoryFavoritesStore {
    fn load(&self) -> Vec<Location> {
        self.blob.lock().as_deref().map(decode).unwrap_or_default()
    }

    fn save(&self, favorites: &[Location]) -> Result<()> {
        let blob = serde_json::to_string(favorites).context("Failed to serialize favorites")?;
        *self.blob.lock() = Some(blob);
        Ok(())
    }
}

/// `{"favorites.cities": "<json array>"}` on disk.
#[derive(Debug)]
pub struct JsonFileFavoritesStore {
    path: PathBuf,
    lock: Mutex<()>,
}

impl JsonFileFavoritesStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            lock: Mutex::new(()),
        }
    }

    pub fn from_config(config: &skycast_core::Config) -> Self {
        Self::new(config.favorites_path())
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn read_blob(&self) -> Result<Option<String>> {
        if !self.path.exists() {
            return Ok(None);
        }
        let json = fs::read_to_string(&self.path).context("Failed to read favorites file")?;
        if json.trim().is_empty() {
            return Ok(None);
        }
        let mut entries: BTreeMap<String, String> =
            serde_json::from_str(&json).context("Failed to parse favorites file")?;
        Ok(entries.remove(FAVORITES_KEY))
    }
}

impl FavoritesStore for JsonFileFavoritesStore {
    fn load(&self) -> Vec<Location> {
        let _guard = self.lock.lock();
        match self.read_blob() {
            Ok(blob) => blob.as_deref().map(decode).unwrap_or_default(),
            Err(e) => {
                tracing::warn!("Could not read favorites from {:?}: {:#}", self.path, e);
                Vec::new()
            }
        }
    }

    fn save(&self, favorites: &[Location]) -> Result<()> {
        let _guard = self.lock.lock();
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent).context("Failed to create favorites directory")?;
        }
        let blob = serde_json::to_string(favorites).context("Failed to serialize favorites")?;
        let entries = BTreeMap::from([(FAVORITES_KEY.to_string(), blob)]);
        let json = serde_json::to_string_pretty(&entries).context("Failed to serialize favorites")?;
        fs::write(&self.path, json).context("Failed to write favorites file")?;
        Ok(())
    }
}

/// In-memory favorites list backed by a store.
pub struct Favorites {
    store: Arc<dyn FavoritesStore>,
    items: Mutex<Vec<Location>>,
}

impl Favorites {
    /// Load the stored list, dropping repeated ids.
    pub fn load(store: Arc<dyn FavoritesStore>) -> Self {
        let mut items: Vec<Location> = Vec::new();
        for location in store.load() {
            if !items.contains(&location) {
                items.push(location);
            }
        }
        Self {
            store,
            items: Mutex::new(items),
        }
    }

    pub fn favorites(&self) -> Vec<Location> {
        self.items.lock().clone()
    }

    pub fn is_favorite(&self, location: &Location) -> bool {
        self.items.lock().contains(location)
    }

    /// Add the location if absent, otherwise remove it.
    ///
    /// Returns whether it is a favorite afterwards. The in-memory list is
    /// left unchanged when saving fails.
    pub fn toggle(&self, location: &Location) -> Result<bool> {
        let mut items = self.items.lock();
        let mut next = items.clone();
        let added = match next.iter().position(|l| l.id == location.id) {
            Some(idx) => {
                next.remove(idx);
                false
            }
            None => {
                next.push(location.clone());
                true
            }
        };
        self.store.save(&next)?;
        *items = next;
        tracing::info!(
            "{} {} {} favorites",
            if added { "Added" } else { "Removed" },
            location.name,
            if added { "to" } else { "from" }
        );
        Ok(added)
    }

    /// Remove by id; returns whether anything was removed.
    pub fn remove(&self, location_id: LocationId) -> Result<bool> {
        let mut items = self.items.lock();
        let Some(idx) = items.iter().position(|l| l.id == location_id) else {
            return Ok(false);
        };
        let mut next = items.clone();
        next.remove(idx);
        self.store.save(&next)?;
        *items = next;
        Ok(true)
    }
}
