//! Settings store: namespaced key/value settings with an explicit save.
//!
//! `SettingsStore` is the seam a host plugs its own storage into. `FileStore`
//! keeps the values in a JSON or YAML file (format picked by extension, like
//! param files elsewhere in the CLI); without a path it is memory-only.

use anyhow::{Context, Result};
use serde_json::{Map, Value};
use std::path::{Path, PathBuf};

/// Key/value settings scoped to this tool.
pub trait SettingsStore {
    fn get(&self, key: &str) -> Option<Value>;
    fn set(&mut self, key: &str, value: Value);
    fn save(&mut self) -> Result<()>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Format {
    Json,
    Yaml,
}

impl Format {
    fn for_path(path: &Path) -> Self {
        let lower = path.to_string_lossy().to_ascii_lowercase();
        if lower.ends_with(".yaml") || lower.ends_with(".yml") {
            Format::Yaml
        } else {
            Format::Json
        }
    }
}

/// File-backed settings store.
#[derive(Debug, Clone, Default)]
pub struct FileStore {
    path: Option<PathBuf>,
    values: Map<String, Value>,
}

impl FileStore {
    /// Memory-only store; `save` is a no-op.
    pub fn in_memory() -> Self {
        Self::default()
    }

    /// Memory-only store seeded from a JSON object.
    pub fn from_value(value: Value) -> Result<Self> {
        let values = match value {
            Value::Object(map) => map,
            Value::Null => Map::new(),
            _ => anyhow::bail!("settings root must be an object"),
        };
        Ok(Self { path: None, values })
    }

    /// Load from `path`. A missing file gives an empty store that will be
    /// created on the first `save`.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        if !path.exists() {
            return Ok(Self {
                path: Some(path),
                values: Map::new(),
            });
        }

        let raw = std::fs::read_to_string(&path)
            .with_context(|| format!("failed to read settings file: {}", path.display()))?;

        let value: Value = if raw.trim().is_empty() {
            Value::Null
        } else {
            match Format::for_path(&path) {
                Format::Yaml => {
                    let yaml_v: serde_yaml::Value =
                        serde_yaml::from_str(&raw).context("failed to parse YAML settings file")?;
                    serde_json::to_value(yaml_v).context("failed to convert YAML to JSON")?
                }
                Format::Json => {
                    serde_json::from_str(&raw).context("failed to parse JSON settings file")?
                }
            }
        };

        let mut store = Self::from_value(value)
            .with_context(|| format!("invalid settings file: {}", path.display()))?;
        store.path = Some(path);
        Ok(store)
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }
}

impl SettingsStore for FileStore {
    fn get(&self, key: &str) -> Option<Value> {
        self.values.get(key).cloned()
    }

    fn set(&mut self, key: &str, value: Value) {
        self.values.insert(key.to_string(), value);
    }

    fn save(&mut self) -> Result<()> {
        let Some(path) = &self.path else {
            return Ok(());
        };
        let root = Value::Object(self.values.clone());
        let rendered = match Format::for_path(path) {
            Format::Yaml => serde_yaml::to_string(&root).context("failed to render YAML settings")?,
            Format::Json => {
                serde_json::to_string_pretty(&root).context("failed to render JSON settings")?
            }
        };
        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("failed to create {}", parent.display()))?;
        }
        std::fs::write(path, rendered)
            .with_context(|| format!("failed to write settings file: {}", path.display()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn missing_file_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileStore::open(dir.path().join("absent.json")).unwrap();
        assert!(store.get("exec_args").is_none());
    }

    #[test]
    fn json_save_then_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("settings.json");
        let mut store = FileStore::open(&path).unwrap();
        store.set("match", json!("single_test"));
        store.save().unwrap();

        let reopened = FileStore::open(&path).unwrap();
        assert_eq!(reopened.get("match"), Some(json!("single_test")));
    }

    #[test]
    fn yaml_file_is_read() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.yaml");
        std::fs::write(&path, "surround_cmd:\n  - 'set -e; '\n  - ''\n").unwrap();
        let store = FileStore::open(&path).unwrap();
        assert_eq!(store.get("surround_cmd"), Some(json!(["set -e; ", ""])));
    }

    #[test]
    fn non_object_root_rejected() {
        let err = FileStore::from_value(json!([1, 2])).unwrap_err();
        assert!(err.to_string().contains("object"));
    }

    #[test]
    fn in_memory_save_is_noop() {
        let mut store = FileStore::in_memory();
        store.set("k", json!(1));
        store.save().unwrap();
        assert_eq!(store.get("k"), Some(json!(1)));
    }
}
