//! Rule persistence keyed by `notify.rule.<location>`.
//!
//! `load` never fails: a missing or unreadable blob reads as "no rule".

use anyhow::{Context, Result};
use parking_lot::Mutex;
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use crate::rule::NotificationRule;
use skycast_weather::LocationId;

pub fn rule_key(location_id: LocationId) -> String {
    format!("notify.rule.{}", location_id)
}

pub trait RuleStore: Send + Sync {
    fn load(&self, location_id: LocationId) -> Option<NotificationRule>;

    /// Overwrite the stored rule.
    fn save(&self, location_id: LocationId, rule: &NotificationRule) -> Result<()>;

    fn remove(&self, location_id: LocationId) -> Result<()>;
}

fn decode(key: &str, blob: &str) -> Option<NotificationRule> {
    match serde_json::from_str(blob) {
        Ok(rule) => Some(rule),
        Err(e) => {
            tracing::warn!("Ignoring malformed rule {}: {}", key, e);
            None
        }
    }
}

/// Serialized rules held in memory.
#[derive(Debug, Default)]
pub struct MemoryRuleStore {
    blobs: Mutex<BTreeMap<String, String>>,
}

impl MemoryRuleStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store a raw blob under `key`, bypassing serialization.
    pub fn insert_raw(&self, key: impl Into<String>, blob: impl Into<String>) {
        self.blobs.lock().insert(key.into(), blob.into());
    }
}

impl RuleStore for MemoryRuleStore {
    fn load(&self, location_id: LocationId) -> Option<NotificationRule> {
        let key = rule_key(location_id);
        let blob = self.blobs.lock().get(&key).cloned()?;
        decode(&key, &blob)
    }

    fn save(&self, location_id: LocationId, rule: &NotificationRule) -> Result<()> {
        let blob = serde_json::to_string(rule).context("Failed to serialize rule")?;
        self.blobs.lock().insert(rule_key(location_id), blob);
        Ok(())
    }

    fn remove(&self, location_id: LocationId) -> Result<()> {
        self.blobs.lock().remove(&rule_key(location_id));
        Ok(())
    }
}

/// All rules in one JSON object (key -> serialized rule) on disk.
#[derive(Debug)]
pub struct JsonFileRuleStore {
    path: PathBuf,
    // Serializes read-modify-write cycles within the process
    lock: Mutex<()>,
}

impl JsonFileRuleStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            lock: Mutex::new(()),
        }
    }

    /// Store at the configured rules path.
    pub fn from_config(config: &skycast_core::Config) -> Self {
        Self::new(config.rules_path())
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn read_all(&self) -> Result<BTreeMap<String, String>> {
        if !self.path.exists() {
            return Ok(BTreeMap::new());
        }
        let json = fs::read_to_string(&self.path).context("Failed to read rules file")?;
        if json.trim().is_empty() {
            return Ok(BTreeMap::new());
        }
        serde_json::from_str(&json).context("Failed to parse rules file")
    }

    fn write_all(&self, blobs: &BTreeMap<String, String>) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent).context("Failed to create rules directory")?;
        }
        let json = serde_json::to_string_pretty(blobs).context("Failed to serialize rules")?;
        fs::write(&self.path, json).context("Failed to write rules file")?;
        Ok(())
    }
}

impl RuleStore for JsonFileRuleStore {
    fn load(&self, location_id: LocationId) -> Option<NotificationRule> {
        let _guard = self.lock.lock();
        let key = rule_key(location_id);
        let blobs = match self.read_all() {
            Ok(blobs) => blobs,
            Err(e) => {
                tracing::warn!("Could not read rules from {:?}: {:#}", self.path, e);
                return None;
            }
        };
        decode(&key, blobs.get(&key)?)
    }

    fn save(&self, location_id: LocationId, rule: &NotificationRule) -> Result<()> {
        let _guard = self.lock.lock();
        // An unreadable file is replaced rather than blocking every save
        let mut blobs = self.read_all().unwrap_or_else(|e| {
            tracing::warn!("Replacing unreadable rules file {:?}: {:#}", self.path, e);
            BTreeMap::new()
        });
        let blob = serde_json::to_string(rule).context("Failed to serialize rule")?;
        blobs.insert(rule_key(location_id), blob);
        self.write_all(&blobs)?;
        tracing::info!("Saved notification rule for {}", location_id);
        Ok(())
    }

    fn remove(&self, location_id: LocationId) -> Result<()> {
        let _guard = self.lock.lock();
        let mut blobs = self.read_all()?;
        if blobs.remove(&rule_key(location_id)).is_some() {
            self.write_all(&blobs)?;
            tracing::info!("Removed notification rule for {}", location_id);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rule::{DaySlot, RuleKind};
    use tempfile::TempDir;

    #[test]
    fn test_rule_key() {
        assert_eq!(rule_key(LocationId::City(5)), "notify.rule.5");
        assert_eq!(rule_key(LocationId::CurrentPosition), "notify.rule.current");
    }

    #[test]
    fn test_memory_store_round_trip_and_remove() {
        let store = MemoryRuleStore::new();
        let id = LocationId::City(1);
        assert!(store.load(id).is_none());

        let rule = NotificationRule::weekly([2, 6], 7, 45);
        store.save(id, &rule).unwrap();
        assert_eq!(store.load(id), Some(rule));

        store.remove(id).unwrap();
        assert!(store.load(id).is_none());
    }

    #[test]
    fn test_malformed_blob_loads_as_none() {
        let store = MemoryRuleStore::new();
        store.insert_raw("notify.rule.3", "{\"kind\": \"hourly\"}");
        assert!(store.load(LocationId::City(3)).is_none());
    }

    #[test]
    fn test_file_store_persists_across_instances() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested").join("rules.json");
        let rule = NotificationRule::new(RuleKind::TempAtOrAbove, 6, 0)
            .with_threshold(33.0)
            .with_today(DaySlot::at(7, 30));

        JsonFileRuleStore::new(&path)
            .save(LocationId::City(9), &rule)
            .unwrap();
        JsonFileRuleStore::new(&path)
            .save(LocationId::CurrentPosition, &NotificationRule::default())
            .unwrap();

        let reopened = JsonFileRuleStore::new(&path);
        assert_eq!(reopened.load(LocationId::City(9)), Some(rule));
        assert_eq!(
            reopened.load(LocationId::CurrentPosition),
            Some(NotificationRule::default())
        );
    }

    #[test]
    fn test_file_store_remove_and_missing_file() {
        let dir = TempDir::new().unwrap();
        let store = JsonFileRuleStore::new(dir.path().join("rules.json"));
        assert!(store.load(LocationId::City(1)).is_none());
        store.remove(LocationId::City(1)).unwrap();

        store.save(LocationId::City(1), &NotificationRule::default()).unwrap();
        store.remove(LocationId::City(1)).unwrap();
        assert!(store.load(LocationId::City(1)).is_none());
    }

    #[test]
    fn test_corrupt_file_loads_as_none_and_is_replaced_on_save() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("rules.json");
        fs::write(&path, "not json").unwrap();

        let store = JsonFileRuleStore::new(&path);
        assert!(store.load(LocationId::City(2)).is_none());

        store.save(LocationId::City(2), &NotificationRule::default()).unwrap();
        assert!(store.load(LocationId::City(2)).is_some());
    }
}
