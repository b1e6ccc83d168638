//! Last-known readings persisted between sessions.
//!
//! The console writes the latest values and status bits to a small JSON file
//! whenever they change and loads it at startup, so operators see the last
//! readings (marked stale) before the first live message arrives.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::decoder::Readings;
use super::state::AggregatedState;

/// The persisted subset of [`AggregatedState`].
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LastKnown {
    #[serde(default)]
    pub values: Readings,
    #[serde(default)]
    pub corrected_values: Readings,
    #[serde(default)]
    pub bits: Vec<bool>,
}

impl LastKnown {
    /// Extract the persisted fields from a state snapshot.
    pub fn from_state(state: &AggregatedState) -> Self {
        Self {
            values: state.values.clone(),
            corrected_values: state.corrected_values.clone(),
            bits: state.bits.clone(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty() && self.corrected_values.is_empty() && self.bits.is_empty()
    }
}

/// JSON file cache for [`LastKnown`] readings.
#[derive(Debug)]
pub struct ReadingCache {
    path: PathBuf,
    last_saved: Option<LastKnown>,
}

impl ReadingCache {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            last_saved: None,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Load the cached readings. A missing file is not an error.
    pub fn load(&mut self) -> Result<Option<LastKnown>> {
        if !self.path.exists() {
            return Ok(None);
        }
        let content = fs::read_to_string(&self.path)
            .with_context(|| format!("Failed to read cache {}", self.path.display()))?;
        let cached: LastKnown = serde_json::from_str(&content)
            .with_context(|| format!("Invalid cache file {}", self.path.display()))?;
        self.last_saved = Some(cached.clone());
        Ok(Some(cached))
    }

    /// Persist the readings of `state` if they changed since the last save.
    ///
    /// Returns true if the file was written.
    pub fn store(&mut self, state: &AggregatedState) -> Result<bool> {
        let current = LastKnown::from_state(state);
        if current.is_empty() || self.last_saved.as_ref() == Some(&current) {
            return Ok(false);
        }

        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)
                    .with_context(|| format!("Failed to create {}", parent.display()))?;
            }
        }

        // Write then rename so a crash never leaves a truncated cache
        let tmp = self.path.with_extension("json.tmp");
        let json = serde_json::to_string_pretty(&current)?;
        fs::write(&tmp, json).with_context(|| format!("Failed to write {}", tmp.display()))?;
        fs::rename(&tmp, &self.path)
            .with_context(|| format!("Failed to replace {}", self.path.display()))?;

        debug!("Cached last-known readings to {}", self.path.display());
        self.last_saved = Some(current);
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cems_types::Parameter;
    use tempfile::TempDir;

    fn state_with_so2(value: Option<f64>) -> AggregatedState {
        let mut state = AggregatedState::default();
        state.values.insert(Parameter::So2, value);
        state.values.insert(Parameter::O2, Some(7.0));
        state.bits = vec![false, true];
        state
    }

    #[test]
    fn test_store_and_load() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("cache").join("last_known.json");

        let mut cache = ReadingCache::new(&path);
        assert!(cache.store(&state_with_so2(None)).unwrap());

        let mut reopened = ReadingCache::new(&path);
        let loaded = reopened.load().unwrap().unwrap();
        assert_eq!(loaded.values[&Parameter::So2], None);
        assert_eq!(loaded.values[&Parameter::O2], Some(7.0));
        assert_eq!(loaded.bits, vec![false, true]);
    }

    #[test]
    fn test_store_skips_unchanged() {
        let dir = TempDir::new().unwrap();
        let mut cache = ReadingCache::new(dir.path().join("last_known.json"));

        assert!(cache.store(&state_with_so2(Some(1.0))).unwrap());
        assert!(!cache.store(&state_with_so2(Some(1.0))).unwrap());
        assert!(cache.store(&state_with_so2(Some(2.0))).unwrap());
        assert!(!cache.store(&AggregatedState::default()).unwrap());
    }

    #[test]
    fn test_load_missing_file() {
        let dir = TempDir::new().unwrap();
        let mut cache = ReadingCache::new(dir.path().join("nope.json"));
        assert!(cache.load().unwrap().is_none());
    }

    #[test]
    fn test_load_corrupt_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("last_known.json");
        fs::write(&path, "{ not json").unwrap();

        let mut cache = ReadingCache::new(&path);
        assert!(cache.load().is_err());
    }
}
