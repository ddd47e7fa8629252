//! User settings persistence.
//!
//! Preferences that survive restarts: the shortcut bindings and whether
//! screenshots are put back after a failed analysis. Stored as JSON in the
//! user's config directory (e.g. `~/.config/shade-shot/settings.json` on
//! Linux).

use crate::error::Result;
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::PathBuf;

/// Key combinations for the three global shortcuts.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ShortcutConfig {
    pub capture: String,
    pub analyze: String,
    pub copy_result: String,
}

impl Default for ShortcutConfig {
    fn default() -> Self {
        Self {
            capture: "Ctrl+Alt+X".to_string(),
            analyze: "Ctrl+Alt+Enter".to_string(),
            copy_result: "Ctrl+Alt+C".to_string(),
        }
    }
}

/// User-configurable settings persisted between sessions.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Settings {
    #[serde(default)]
    pub shortcuts: ShortcutConfig,
    /// Put drained screenshots back into the store when analysis fails.
    #[serde(default)]
    pub restore_on_failure: bool,
}

impl Settings {
    /// Returns the path to the settings file.
    ///
    /// Creates the config directory if it doesn't exist.
    fn config_path() -> Option<PathBuf> {
        ProjectDirs::from("", "shade-shot", "shade-shot").map(|dirs| {
            let config_dir = dirs.config_dir();
            if !config_dir.exists() {
                let _ = fs::create_dir_all(config_dir);
            }
            config_dir.join("settings.json")
        })
    }

    /// Loads settings from disk, falling back to defaults if missing or
    /// unreadable.
    pub fn load() -> Self {
        Self::config_path()
            .and_then(|path| fs::read_to_string(path).ok())
            .and_then(|content| match serde_json::from_str(&content) {
                Ok(settings) => Some(settings),
                Err(e) => {
                    log::warn!("Ignoring unreadable settings file: {}", e);
                    None
                }
            })
            .unwrap_or_default()
    }

    /// Persists settings to disk and returns where they were written.
    ///
    /// # Errors
    /// Returns an error if serialization or file writing fails.
    pub fn save(&self) -> Result<Option<PathBuf>> {
        let Some(path) = Self::config_path() else {
            return Ok(None);
        };
        let json = serde_json::to_string_pretty(self)?;
        fs::write(&path, json)?;
        Ok(Some(path))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_file_fills_in_defaults() {
        let settings: Settings =
            serde_json::from_str(r#"{ "shortcuts": { "capture": "F9" } }"#).unwrap();
        assert_eq!(settings.shortcuts.capture, "F9");
        assert_eq!(settings.shortcuts.analyze, "Ctrl+Alt+Enter");
        assert!(!settings.restore_on_failure);
    }
}
