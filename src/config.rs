//! Layered configuration: built-in defaults, then an optional JSON file,
//! then command-line overrides.
//!
//! The default file lives at `<config_dir>/xequtive/locator.json`. A missing
//! default file is fine; a named file that cannot be read or parsed is not.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use crate::location::{Coordinate, LocationError};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LocatorConfig {
    /// Nominatim base URL, without a trailing `/search` or `/reverse`.
    pub base_url: String,
    pub user_agent: String,
    pub accept_language: String,
    /// Per-request timeout for geocoding and geolocation calls.
    pub timeout_secs: u64,
    /// Maximum number of suggestions per search.
    pub search_limit: usize,
    pub default_position: Coordinate,
    pub initial_zoom: u8,
    /// Zoom used when the map recenters on a selection.
    pub focus_zoom: u8,
}

impl Default for LocatorConfig {
    fn default() -> Self {
        Self {
            base_url: "https://nominatim.openstreetmap.org".into(),
            user_agent: format!("XequtiveLocator/{}", env!("CARGO_PKG_VERSION")),
            accept_language: "en-US,en;q=0.9".into(),
            timeout_secs: 8,
            search_limit: 5,
            default_position: Coordinate::default(),
            initial_zoom: 13,
            focus_zoom: 16,
        }
    }
}

impl LocatorConfig {
    /// Load from the default path, or defaults if there is no file there.
    pub fn load() -> Result<Self, LocationError> {
        match Self::default_path() {
            Some(path) if path.exists() => Self::load_from(&path),
            _ => Ok(Self::default()),
        }
    }

    /// Load from an explicit path. Fields missing from the file keep their defaults.
    pub fn load_from(path: &Path) -> Result<Self, LocationError> {
        let data = fs::read_to_string(path)
            .map_err(|e| LocationError::Config(format!("{}: {}", path.display(), e)))?;
        let config: Self = serde_json::from_str(&data)
            .map_err(|e| LocationError::Config(format!("{}: {}", path.display(), e)))?;
        config.validate()?;
        Ok(config)
    }

    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|d| d.join("xequtive").join("locator.json"))
    }

    pub fn validate(&self) -> Result<(), LocationError> {
        if self.base_url.trim().is_empty() {
            return Err(LocationError::Config("base_url must not be empty".into()));
        }
        if self.timeout_secs == 0 {
            return Err(LocationError::Config("timeout_secs must be positive".into()));
        }
        if !(1..=50).contains(&self.search_limit) {
            return Err(LocationError::Config(format!(
                "search_limit must be 1..=50, got {}",
                self.search_limit
            )));
        }
        Ok(())
    }
}
