//! Durable user preferences.
//!
//! The only persisted state is the selected map style, stored under
//! [`MAP_STYLE_KEY`] as its raw integer value in a small JSON file.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fs;
use std::path::{Path, PathBuf};

use crate::error::{Result, WhereError};

pub const MAP_STYLE_KEY: &str = "mapStyleSelection";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum MapStyle {
    #[default]
    Standard,
    Satellite,
    Hybrid,
}

impl MapStyle {
    pub const ALL: [MapStyle; 3] = [MapStyle::Standard, MapStyle::Satellite, MapStyle::Hybrid];

    pub fn raw_value(self) -> i64 {
        match self {
            MapStyle::Standard => 0,
            MapStyle::Satellite => 1,
            MapStyle::Hybrid => 2,
        }
    }

    pub fn from_raw(raw: i64) -> Option<Self> {
        Self::ALL.into_iter().find(|s| s.raw_value() == raw)
    }

    pub fn label(self) -> &'static str {
        match self {
            MapStyle::Standard => "Standard",
            MapStyle::Satellite => "Satellite",
            MapStyle::Hybrid => "Hybrid",
        }
    }

    /// Stored selection, or Standard when missing or unknown
    pub fn load(store: &PreferenceStore) -> Self {
        store
            .get_i64(MAP_STYLE_KEY)
            .and_then(Self::from_raw)
            .unwrap_or_default()
    }

    pub fn save(self, store: &mut PreferenceStore) -> Result<()> {
        store.set_i64(MAP_STYLE_KEY, self.raw_value())
    }
}

/// Key/value preferences backed by a JSON file. Writes go straight to disk.
#[derive(Debug, Clone)]
pub struct PreferenceStore {
    path: Option<PathBuf>,
    values: Map<String, Value>,
}

impl PreferenceStore {
    /// Open the store at `path`. A missing file is an empty store.
    pub fn load(path: &Path) -> Result<Self> {
        let values = match fs::read_to_string(path) {
            Ok(content) => {
                serde_json::from_str(&content).map_err(|source| WhereError::PreferencesCorrupt {
                    path: path.to_path_buf(),
                    source,
                })?
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Map::new(),
            Err(source) => {
                return Err(WhereError::PreferencesIo {
                    path: path.to_path_buf(),
                    source,
                })
            }
        };
        Ok(Self {
            path: Some(path.to_path_buf()),
            values,
        })
    }

    /// Store that lives only as long as the process
    pub fn in_memory() -> Self {
        Self {
            path: None,
            values: Map::new(),
        }
    }

    pub fn get_i64(&self, key: &str) -> Option<i64> {
        self.values.get(key).and_then(Value::as_i64)
    }

    pub fn set_i64(&mut self, key: &str, value: i64) -> Result<()> {
        self.values.insert(key.to_string(), Value::from(value));
        self.save()
    }

    fn save(&self) -> Result<()> {
        let Some(path) = &self.path else {
            return Ok(());
        };
        let io_err = |source| WhereError::PreferencesIo {
            path: path.clone(),
            source,
        };
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(io_err)?;
        }
        let json = serde_json::to_string_pretty(&self.values).map_err(|e| {
            WhereError::PreferencesCorrupt {
                path: path.clone(),
                source: e,
            }
        })?;
        fs::write(path, json).map_err(io_err)
    }
}
