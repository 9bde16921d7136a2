//! Device-local key-value storage.
//!
//! Holds the daily challenge pointer (`lastUpdated`, `currentChallengeId`)
//! and the favourite pose list (`favoritePoses`). Nothing here is synced.

use serde_json::{Map, Value};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use crate::YogaError;

pub const LAST_UPDATED_KEY: &str = "lastUpdated";
pub const CURRENT_CHALLENGE_KEY: &str = "currentChallengeId";
pub const FAVORITE_POSES_KEY: &str = "favoritePoses";

pub trait KeyValueStore: Send + Sync {
    fn get(&self, key: &str) -> Result<Option<Value>, YogaError>;
    fn set(&self, key: &str, value: Value) -> Result<(), YogaError>;
    fn remove(&self, key: &str) -> Result<(), YogaError>;
}

impl<T: KeyValueStore + ?Sized> KeyValueStore for std::sync::Arc<T> {
    fn get(&self, key: &str) -> Result<Option<Value>, YogaError> {
        (**self).get(key)
    }
    fn set(&self, key: &str, value: Value) -> Result<(), YogaError> {
        (**self).set(key, value)
    }
    fn remove(&self, key: &str) -> Result<(), YogaError> {
        (**self).remove(key)
    }
}

fn poisoned<T>(_: T) -> YogaError {
    YogaError::Storage("store lock poisoned".into())
}

#[derive(Default)]
pub struct MemoryStore {
    entries: Mutex<HashMap<String, Value>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl KeyValueStore for MemoryStore {
    fn get(&self, key: &str) -> Result<Option<Value>, YogaError> {
        Ok(self.entries.lock().map_err(poisoned)?.get(key).cloned())
    }

    fn set(&self, key: &str, value: Value) -> Result<(), YogaError> {
        self.entries
            .lock()
            .map_err(poisoned)?
            .insert(key.to_string(), value);
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<(), YogaError> {
        self.entries.lock().map_err(poisoned)?.remove(key);
        Ok(())
    }
}

/// A store persisted as one JSON object on disk. Every write rewrites the
/// whole file through a temporary sibling and a rename.
pub struct JsonFileStore {
    path: PathBuf,
    entries: Mutex<Map<String, Value>>,
}

impl JsonFileStore {
    /// Open the store at `path`; a missing file is an empty store.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, YogaError> {
        let path = path.as_ref().to_path_buf();
        let entries = match std::fs::read_to_string(&path) {
            Ok(text) if text.trim().is_empty() => Map::new(),
            Ok(text) => match serde_json::from_str::<Value>(&text) {
                Ok(Value::Object(map)) => map,
                Ok(_) => {
                    return Err(YogaError::Decode(format!(
                        "{} does not hold a JSON object",
                        path.display()
                    )));
                }
                Err(e) => {
                    return Err(YogaError::Decode(format!("{}: {e}", path.display())));
                }
            },
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Map::new(),
            Err(e) => return Err(YogaError::Storage(format!("{}: {e}", path.display()))),
        };
        Ok(Self {
            path,
            entries: Mutex::new(entries),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn flush(&self, entries: &Map<String, Value>) -> Result<(), YogaError> {
        let body = serde_json::to_vec_pretty(entries)
            .map_err(|e| YogaError::Storage(e.to_string()))?;
        let tmp = self.path.with_extension("json.tmp");
        std::fs::write(&tmp, body)
            .and_then(|_| std::fs::rename(&tmp, &self.path))
            .map_err(|e| YogaError::Storage(format!("{}: {e}", self.path.display())))
    }
}

impl KeyValueStore for JsonFileStore {
    fn get(&self, key: &str) -> Result<Option<Value>, YogaError> {
        Ok(self.entries.lock().map_err(poisoned)?.get(key).cloned())
    }

    fn set(&self, key: &str, value: Value) -> Result<(), YogaError> {
        let mut entries = self.entries.lock().map_err(poisoned)?;
        entries.insert(key.to_string(), value);
        self.flush(&entries)
    }

    fn remove(&self, key: &str) -> Result<(), YogaError> {
        let mut entries = self.entries.lock().map_err(poisoned)?;
        if entries.remove(key).is_some() {
            self.flush(&entries)?;
        }
        Ok(())
    }
}

/// The favourite pose list, stored as an array of challenge ids.
pub struct Favorites<'a, S: ?Sized> {
    store: &'a S,
}

impl<'a, S: KeyValueStore + ?Sized> Favorites<'a, S> {
    pub fn new(store: &'a S) -> Self {
        Self { store }
    }

    pub fn list(&self) -> Result<Vec<u32>, YogaError> {
        let Some(value) = self.store.get(FAVORITE_POSES_KEY)? else {
            return Ok(Vec::new());
        };
        serde_json::from_value(value)
            .map_err(|e| YogaError::Decode(format!("{FAVORITE_POSES_KEY}: {e}")))
    }

    pub fn contains(&self, id: u32) -> Result<bool, YogaError> {
        Ok(self.list()?.contains(&id))
    }

    pub fn add(&self, id: u32) -> Result<(), YogaError> {
        let mut ids = self.list()?;
        if !ids.contains(&id) {
            ids.push(id);
            self.save(&ids)?;
        }
        Ok(())
    }

    pub fn remove(&self, id: u32) -> Result<(), YogaError> {
        let mut ids = self.list()?;
        let before = ids.len();
        ids.retain(|x| *x != id);
        if ids.len() != before {
            self.save(&ids)?;
        }
        Ok(())
    }

    /// Flip membership of `id`; returns whether it is now a favourite.
    pub fn toggle(&self, id: u32) -> Result<bool, YogaError> {
        if self.contains(id)? {
            self.remove(id)?;
            Ok(false)
        } else {
            self.add(id)?;
            Ok(true)
        }
    }

    fn save(&self, ids: &[u32]) -> Result<(), YogaError> {
        self.store.set(FAVORITE_POSES_KEY, Value::from(ids.to_vec()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn memory_store_round_trips_values() {
        let store = MemoryStore::new();
        assert!(store.get("k").unwrap().is_none());
        store.set("k", json!(3)).unwrap();
        assert_eq!(store.get("k").unwrap(), Some(json!(3)));
        store.remove("k").unwrap();
        assert!(store.get("k").unwrap().is_none());
    }

    #[test]
    fn file_store_persists_across_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("store.json");
        {
            let store = JsonFileStore::open(&path).unwrap();
            store.set(CURRENT_CHALLENGE_KEY, json!(7)).unwrap();
        }
        let reopened = JsonFileStore::open(&path).unwrap();
        assert_eq!(reopened.get(CURRENT_CHALLENGE_KEY).unwrap(), Some(json!(7)));
    }

    #[test]
    fn file_store_rejects_non_object_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("store.json");
        std::fs::write(&path, "[1,2,3]").unwrap();
        assert!(matches!(
            JsonFileStore::open(&path),
            Err(YogaError::Decode(_))
        ));
    }

    #[test]
    fn favorites_dedupe_and_toggle() {
        let store = MemoryStore::new();
        let favs = Favorites::new(&store);
        favs.add(3).unwrap();
        favs.add(3).unwrap();
        favs.add(5).unwrap();
        assert_eq!(favs.list().unwrap(), vec![3, 5]);
        assert!(!favs.toggle(3).unwrap());
        assert!(favs.toggle(9).unwrap());
        assert_eq!(favs.list().unwrap(), vec![5, 9]);
    }

    #[test]
    fn favorites_fail_closed_on_malformed_value() {
        let store = MemoryStore::new();
        store.set(FAVORITE_POSES_KEY, json!(["a", "b"])).unwrap();
        assert!(matches!(
            Favorites::new(&store).list(),
            Err(YogaError::Decode(_))
        ));
    }
}
