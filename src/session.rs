//! Per-session state: the settings store and the symbol index.
//!
//! Created once at startup and passed by reference to whatever needs it.

use anyhow::{Context, Result};
use serde_json::Value;
use std::path::PathBuf;

use crate::index::SymbolIndex;
use crate::store::SettingsStore;
use crate::testrun::{MatchMode, RunMemory};

pub const KEY_SELECTIONS: &str = "selections";
pub const KEY_LAST_TEST_FILE: &str = "last_test_file_path";
pub const KEY_MATCH: &str = "match";

pub struct Session {
    store: Box<dyn SettingsStore>,
    symbols: SymbolIndex,
}

impl Session {
    pub fn new(store: impl SettingsStore + 'static) -> Self {
        Self {
            store: Box::new(store),
            symbols: SymbolIndex::new(),
        }
    }

    pub fn store(&self) -> &dyn SettingsStore {
        self.store.as_ref()
    }

    pub fn store_mut(&mut self) -> &mut dyn SettingsStore {
        self.store.as_mut()
    }

    pub fn symbols(&self) -> &SymbolIndex {
        &self.symbols
    }

    pub fn symbols_mut(&mut self) -> &mut SymbolIndex {
        &mut self.symbols
    }

    /// What the last test run used. Missing or unreadable keys read as unset.
    pub fn run_memory(&self) -> RunMemory {
        fn read<T: serde::de::DeserializeOwned>(store: &dyn SettingsStore, key: &str) -> Option<T> {
            store
                .get(key)
                .and_then(|v| serde_json::from_value::<Option<T>>(v).ok())
                .flatten()
        }
        let store = self.store();
        RunMemory {
            selections: read::<Vec<usize>>(store, KEY_SELECTIONS).unwrap_or_default(),
            last_test_file_path: read::<PathBuf>(store, KEY_LAST_TEST_FILE),
            match_mode: read::<MatchMode>(store, KEY_MATCH),
        }
    }

    /// Persist `memory` and save the store.
    pub fn remember(&mut self, memory: &RunMemory) -> Result<()> {
        let store = self.store_mut();
        store.set(KEY_SELECTIONS, serde_json::to_value(&memory.selections)?);
        store.set(
            KEY_LAST_TEST_FILE,
            serde_json::to_value(&memory.last_test_file_path)?,
        );
        store.set(
            KEY_MATCH,
            memory
                .match_mode
                .map(|m| Value::String(m.to_string()))
                .unwrap_or(Value::Null),
        );
        store.save().context("failed to save run memory")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::FileStore;
    use serde_json::json;

    #[test]
    fn empty_store_has_no_memory() {
        let s = Session::new(FileStore::in_memory());
        assert_eq!(s.run_memory(), RunMemory::default());
    }

    #[test]
    fn remember_then_recall() {
        let mut s = Session::new(FileStore::in_memory());
        let mem = RunMemory {
            selections: vec![3, 40],
            last_test_file_path: Some(PathBuf::from("/p/m/tests/test_a.r")),
            match_mode: Some(MatchMode::SingleTest),
        };
        s.remember(&mem).unwrap();
        assert_eq!(s.store().get(KEY_MATCH), Some(json!("single_test")));
        assert_eq!(s.run_memory(), mem);
    }

    #[test]
    fn remember_persists_to_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        let mut s = Session::new(FileStore::open(&path).unwrap());
        s.remember(&RunMemory {
            selections: vec![1],
            last_test_file_path: None,
            match_mode: Some(MatchMode::All),
        })
        .unwrap();

        let reopened = Session::new(FileStore::open(&path).unwrap());
        assert_eq!(reopened.run_memory().match_mode, Some(MatchMode::All));
        assert_eq!(reopened.run_memory().selections, vec![1]);
    }

    #[test]
    fn garbage_memory_reads_as_unset() {
        let store = FileStore::from_value(json!({"match": 42, "selections": "x"})).unwrap();
        let s = Session::new(store);
        assert_eq!(s.run_memory(), RunMemory::default());
    }
}
