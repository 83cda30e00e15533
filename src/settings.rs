//! User-facing capture settings
//!
//! Settings are a small JSON document (`defaultAction`, `saveAs`,
//! `scrollingEnabled`). Missing keys fall back to defaults so older or
//! partial files keep working.

use crate::error::Result;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::str::FromStr;
use tracing::{debug, instrument};

/// What to do with the finished image
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum OutputAction {
    /// Show it in an image viewer
    #[default]
    Open,
    /// Save it to disk
    Download,
    /// Put it on the clipboard
    Copy,
}

impl FromStr for OutputAction {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "open" => Ok(OutputAction::Open),
            "download" | "save" => Ok(OutputAction::Download),
            "copy" | "clipboard" => Ok(OutputAction::Copy),
            other => Err(format!(
                "unknown action '{}', expected open, download or copy",
                other
            )),
        }
    }
}

/// Capture settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CaptureSettings {
    /// Output action for finished captures
    pub default_action: OutputAction,
    /// Ask for a destination when downloading
    pub save_as: bool,
    /// Capture the full scrollable page instead of the visible viewport
    pub scrolling_enabled: bool,
}

impl Default for CaptureSettings {
    fn default() -> Self {
        Self {
            default_action: OutputAction::Open,
            save_as: false,
            scrolling_enabled: true,
        }
    }
}

impl CaptureSettings {
    /// Parse settings from JSON
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }
}

/// Read-only source of capture settings
#[allow(async_fn_in_trait)]
pub trait SettingsSource {
    /// Fetch the current settings
    async fn get_settings(&self) -> Result<CaptureSettings>;
}

impl SettingsSource for CaptureSettings {
    async fn get_settings(&self) -> Result<CaptureSettings> {
        Ok(self.clone())
    }
}

/// Settings stored in a JSON file; a missing file means defaults
#[derive(Debug, Clone)]
pub struct FileSettings {
    path: PathBuf,
}

impl FileSettings {
    /// Settings backed by `path`
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }

    /// Backing file
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl SettingsSource for FileSettings {
    #[instrument(skip(self), fields(path = %self.path.display()))]
    async fn get_settings(&self) -> Result<CaptureSettings> {
        match tokio::fs::read_to_string(&self.path).await {
            Ok(json) => CaptureSettings::from_json(&json),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!("Settings file not found, using defaults");
                Ok(CaptureSettings::default())
            }
            Err(e) => Err(e.into()),
        }
    }
}
