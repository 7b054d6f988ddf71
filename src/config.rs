/*! Per-DUT settings persistence.

Settings are loaded through an injected base directory and an explicit
file name, never by walking the filesystem upward looking for a project
marker. A missing file is created from the caller's default; a present
one is schema-checked against it before use.
*/
use std::collections::BTreeSet;
use std::path::PathBuf;

use serde_json::Value;

use crate::error::{Error, Result};

/// A keyed store of JSON settings records.
pub trait ConfigStore {
    /// Load the settings record named `name`, creating it from `default`
    /// if missing.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ConfigSchemaMismatch`] if a present file's
    /// top-level keys don't match `default`'s.
    fn load_or_create(&self, name: &str, default: Value) -> Result<Value>;
}

/// A [`ConfigStore`] backed by one JSON file per settings record under a
/// fixed base directory, named `Config_<name>.json`.
pub struct JsonConfigStore {
    base_dir: PathBuf,
}

impl JsonConfigStore {
    /// Create a store rooted at `base_dir`. The directory is created
    /// lazily, the first time a missing record needs to be written.
    pub fn new(base_dir: impl Into<PathBuf>) -> Self {
        Self {
            base_dir: base_dir.into(),
        }
    }

    fn path_for(&self, name: &str) -> PathBuf {
        self.base_dir.join(format!("Config_{name}.json"))
    }
}

impl ConfigStore for JsonConfigStore {
    fn load_or_create(&self, name: &str, default: Value) -> Result<Value> {
        let path = self.path_for(name);
        if !path.exists() {
            std::fs::create_dir_all(&self.base_dir)?;
            std::fs::write(&path, serde_json::to_string_pretty(&default)?)?;
            log::debug!("created default config {}", path.display());
            return Ok(default);
        }
        let text = std::fs::read_to_string(&path)?;
        let actual: Value = serde_json::from_str(&text)?;
        check_schema(&default, &actual, name)?;
        Ok(actual)
    }
}

fn top_level_keys(v: &Value) -> BTreeSet<&String> {
    v.as_object().map(|o| o.keys().collect()).unwrap_or_default()
}

fn check_schema(default: &Value, actual: &Value, name: &str) -> Result<()> {
    if top_level_keys(default) != top_level_keys(actual) {
        return Err(Error::ConfigSchemaMismatch(name.to_string()));
    }
    Ok(())
}
