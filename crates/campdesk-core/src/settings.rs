//! Data directory and `settings.json` handling.

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::store::{write_atomic, JsonCollectionFile, JsonViewFile};

/// Environment variable overriding the data directory.
pub const HOME_ENV: &str = "CAMPDESK_HOME";

/// Resolve the data directory: `$CAMPDESK_HOME`, else `~/.campdesk/`.
pub fn home_dir() -> PathBuf {
    if let Some(dir) = std::env::var_os(HOME_ENV).filter(|v| !v.is_empty()) {
        return PathBuf::from(dir);
    }
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".campdesk")
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Settings {
    #[serde(default = "default_collection_file")]
    pub collection_file: PathBuf,
    #[serde(default = "default_view_file")]
    pub view_file: PathBuf,
}

fn default_collection_file() -> PathBuf {
    PathBuf::from("campaigns.json")
}

fn default_view_file() -> PathBuf {
    PathBuf::from("campaign-tree.json")
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            collection_file: default_collection_file(),
            view_file: default_view_file(),
        }
    }
}

impl Settings {
    pub fn collection_path(&self, home: &Path) -> PathBuf {
        home.join(&self.collection_file)
    }

    pub fn view_path(&self, home: &Path) -> PathBuf {
        home.join(&self.view_file)
    }

    pub fn collection_store(&self, home: &Path) -> JsonCollectionFile {
        JsonCollectionFile::new(self.collection_path(home))
    }

    pub fn view_store(&self, home: &Path) -> JsonViewFile {
        JsonViewFile::new(self.view_path(home))
    }
}

pub fn settings_path(home: &Path) -> PathBuf {
    home.join("settings.json")
}

/// Read settings from `home`. Missing or unreadable files yield defaults.
pub fn read_settings(home: &Path) -> Settings {
    let path = settings_path(home);
    if !path.exists() {
        return Settings::default();
    }
    match fs::read_to_string(&path)
        .ok()
        .and_then(|s| serde_json::from_str(&s).ok())
    {
        Some(settings) => settings,
        None => {
            tracing::warn!(path = %path.display(), "unreadable settings, using defaults");
            Settings::default()
        }
    }
}

pub fn write_settings(home: &Path, settings: &Settings) -> Result<()> {
    let path = settings_path(home);
    let json = serde_json::to_string_pretty(settings).map_err(|e| Error::json(&path, e))?;
    write_atomic(&path, json.as_bytes())
}
