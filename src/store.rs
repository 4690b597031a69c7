//! Key-value persistence
//!
//! The host owns persistence. The engine only needs a string store with
//! read/write semantics; [`MemoryStore`] and [`JsonFileStore`] cover tests and
//! desktop tooling.

use crate::error::MissionError;
use std::cell::RefCell;
use std::collections::BTreeMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::rc::Rc;

/// Simple string key-value store
pub trait KeyValueStore {
    /// Read a value; `Ok(None)` when the key was never written
    fn read(&self, key: &str) -> Result<Option<String>, MissionError>;

    /// Write a value, replacing any previous one
    fn write(&mut self, key: &str, value: &str) -> Result<(), MissionError>;
}

impl<S: KeyValueStore + ?Sized> KeyValueStore for Box<S> {
    fn read(&self, key: &str) -> Result<Option<String>, MissionError> {
        (**self).read(key)
    }

    fn write(&mut self, key: &str, value: &str) -> Result<(), MissionError> {
        (**self).write(key, value)
    }
}

/// In-memory store.
///
/// Clones share the same map so a caller can inspect what an engine wrote.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    entries: Rc<RefCell<BTreeMap<String, String>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, key: &str) -> Option<String> {
        self.entries.borrow().get(key).cloned()
    }

    pub fn insert(&self, key: &str, value: &str) {
        self.entries
            .borrow_mut()
            .insert(key.to_string(), value.to_string());
    }
}

impl KeyValueStore for MemoryStore {
    fn read(&self, key: &str) -> Result<Option<String>, MissionError> {
        Ok(self.get(key))
    }

    fn write(&mut self, key: &str, value: &str) -> Result<(), MissionError> {
        self.insert(key, value);
        Ok(())
    }
}

/// File-backed store holding a single JSON object of string values
#[derive(Debug, Clone)]
pub struct JsonFileStore {
    path: PathBuf,
}

impl JsonFileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Raw file contents; `None` when the file does not exist
    fn read_content(&self) -> io::Result<Option<String>> {
        match fs::read_to_string(&self.path) {
            Ok(content) => Ok(Some(content)),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e),
        }
    }

    fn parse(content: &str) -> Result<BTreeMap<String, String>, serde_json::Error> {
        if content.trim().is_empty() {
            return Ok(BTreeMap::new());
        }
        serde_json::from_str(content)
    }

    fn load(&self) -> Result<BTreeMap<String, String>, MissionError> {
        let read_err =
            |e: &dyn std::fmt::Display| MissionError::PersistenceRead(format!("{}: {}", self.path.display(), e));

        match self.read_content().map_err(|e| read_err(&e))? {
            Some(content) => Self::parse(&content).map_err(|e| read_err(&e)),
            None => Ok(BTreeMap::new()),
        }
    }
}

impl KeyValueStore for JsonFileStore {
    fn read(&self, key: &str) -> Result<Option<String>, MissionError> {
        Ok(self.load()?.get(key).cloned())
    }

    fn write(&mut self, key: &str, value: &str) -> Result<(), MissionError> {
        let write_err =
            |e: io::Error| MissionError::PersistenceWrite(format!("{}: {}", self.path.display(), e));

        // Only unparseable content is replaced; a failed read keeps the other keys
        let content = self.read_content().map_err(write_err)?;
        let mut entries = match content.as_deref().map(Self::parse) {
            Some(Ok(entries)) => entries,
            Some(Err(e)) => {
                tracing::warn!("Discarding corrupt store contents: {}", e);
                BTreeMap::new()
            }
            None => BTreeMap::new(),
        };
        entries.insert(key.to_string(), value.to_string());

        let serialized = serde_json::to_string_pretty(&entries)
            .map_err(|e| MissionError::PersistenceWrite(e.to_string()))?;

        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent).map_err(write_err)?;
            }
        }

        let tmp_path = self.path.with_extension("tmp");
        fs::write(&tmp_path, serialized).map_err(write_err)?;
        fs::rename(&tmp_path, &self.path).map_err(write_err)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_memory_store_clones_share_entries() {
        let store = MemoryStore::new();
        let mut writer = store.clone();
        writer.write("k", "v").unwrap();
        assert_eq!(store.read("k").unwrap(), Some("v".to_string()));
        assert_eq!(store.read("missing").unwrap(), None);
    }

    #[test]
    fn test_file_store_missing_file_reads_none() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonFileStore::new(dir.path().join("prefs.json"));
        assert_eq!(store.read("k").unwrap(), None);
    }

    #[test]
    fn test_file_store_round_trip_keeps_other_keys() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("prefs.json");
        let mut store = JsonFileStore::new(&path);

        store.write("a", "1").unwrap();
        store.write("b", "{\"x\":2}").unwrap();
        store.write("a", "3").unwrap();

        let reopened = JsonFileStore::new(&path);
        assert_eq!(reopened.read("a").unwrap(), Some("3".to_string()));
        assert_eq!(reopened.read("b").unwrap(), Some("{\"x\":2}".to_string()));
    }

    #[test]
    fn test_file_store_corrupt_file_is_read_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("prefs.json");
        fs::write(&path, "not json").unwrap();

        let mut store = JsonFileStore::new(&path);
        assert!(matches!(
            store.read("k"),
            Err(MissionError::PersistenceRead(_))
        ));

        // writing recovers the file
        store.write("k", "v").unwrap();
        assert_eq!(store.read("k").unwrap(), Some("v".to_string()));
    }

    #[test]
    fn test_file_store_unreadable_file_is_not_replaced() {
        let dir = tempfile::tempdir().unwrap();
        // a directory at the store path fails to read without being corrupt
        let path = dir.path().join("prefs.json");
        fs::create_dir(&path).unwrap();
        fs::write(path.join("keep"), "other app data").unwrap();

        let mut store = JsonFileStore::new(&path);
        assert!(matches!(
            store.write("k", "v"),
            Err(MissionError::PersistenceWrite(_))
        ));
        assert!(!path.with_extension("tmp").exists());
        assert_eq!(
            fs::read_to_string(path.join("keep")).unwrap(),
            "other app data"
        );
    }
}
