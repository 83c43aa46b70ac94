use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde_json::{Map, Value};

mod batches;
mod preferences;

pub use batches::{BatchArchive, MAX_BATCHES_STORED};
pub use preferences::{
    load_active_ideas, load_language, load_provider_settings, save_active_ideas, save_language,
    save_provider_settings, ProviderSettings,
};

pub const BATCHES_KEY: &str = "idea_forge_batches";
pub const PROVIDER_SETTINGS_KEY: &str = "idea_forge_ai_settings";
pub const LANGUAGE_KEY: &str = "idea_forge_lang";
pub const ACTIVE_IDEAS_KEY: &str = "idea_forge_active";

/// Flat key-value persistence: one JSON value per key, last write wins.
///
/// Reads never fail; a missing or unreadable entry is `None`.
pub trait KeyValueStore: Send {
    fn get(&mut self, key: &str) -> Option<Value>;
    fn set(&mut self, key: &str, value: Value) -> anyhow::Result<()>;
    fn remove(&mut self, key: &str) -> anyhow::Result<()>;
}

/// All keys in a single JSON object on disk.
///
/// Every read reloads the file so separate handles observe each other's
/// writes, and every write merges only the touched keys into the current
/// on-disk object.
#[derive(Debug, Clone)]
pub struct JsonFileStore {
    path: PathBuf,
    payload: Option<Map<String, Value>>,
    dirty_keys: Vec<String>,
    removed_keys: Vec<String>,
}

impl JsonFileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            payload: None,
            dirty_keys: Vec::new(),
            removed_keys: Vec::new(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn flush(&mut self) -> anyhow::Result<()> {
        if self.payload.is_none() || (self.dirty_keys.is_empty() && self.removed_keys.is_empty())
        {
            return Ok(());
        }

        let mut on_disk = read_json_object(&self.path).unwrap_or_default();
        if let Some(payload) = &self.payload {
            for key in &self.dirty_keys {
                if let Some(value) = payload.get(key) {
                    on_disk.insert(key.clone(), value.clone());
                }
            }
        }
        for key in &self.removed_keys {
            on_disk.remove(key);
        }
        write_json_object(&self.path, &on_disk)?;
        self.payload = Some(on_disk);
        self.dirty_keys.clear();
        self.removed_keys.clear();
        Ok(())
    }

    fn reload(&mut self) -> &mut Map<String, Value> {
        self.payload
            .insert(read_json_object(&self.path).unwrap_or_default())
    }

    fn mark_dirty(&mut self, key: &str) {
        self.removed_keys.retain(|existing| existing != key);
        if !self.dirty_keys.iter().any(|existing| existing == key) {
            self.dirty_keys.push(key.to_string());
        }
    }
}

impl KeyValueStore for JsonFileStore {
    fn get(&mut self, key: &str) -> Option<Value> {
        self.reload().get(key).cloned()
    }

    fn set(&mut self, key: &str, value: Value) -> anyhow::Result<()> {
        let payload = self.reload();
        if payload.get(key) == Some(&value) {
            return Ok(());
        }
        payload.insert(key.to_string(), value);
        self.mark_dirty(key);
        self.flush()
    }

    fn remove(&mut self, key: &str) -> anyhow::Result<()> {
        let payload = self.reload();
        if payload.remove(key).is_none() {
            return Ok(());
        }
        self.dirty_keys.retain(|existing| existing != key);
        if !self.removed_keys.iter().any(|existing| existing == key) {
            self.removed_keys.push(key.to_string());
        }
        self.flush()
    }
}

/// Process-local store for ephemeral sessions.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    entries: BTreeMap<String, Value>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl KeyValueStore for MemoryStore {
    fn get(&mut self, key: &str) -> Option<Value> {
        self.entries.get(key).cloned()
    }

    fn set(&mut self, key: &str, value: Value) -> anyhow::Result<()> {
        self.entries.insert(key.to_string(), value);
        Ok(())
    }

    fn remove(&mut self, key: &str) -> anyhow::Result<()> {
        self.entries.remove(key);
        Ok(())
    }
}

fn read_json_object(path: &Path) -> Option<Map<String, Value>> {
    let raw = std::fs::read_to_string(path).ok()?;
    let parsed: Value = serde_json::from_str(&raw).ok()?;
    parsed.as_object().cloned()
}

fn write_json_object(path: &Path, payload: &Map<String, Value>) -> anyhow::Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(
        path,
        serde_json::to_string_pretty(&Value::Object(payload.clone()))?,
    )?;
    Ok(())
}
