// Copyright 2025 Chris Custine
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Application configuration management.
//!
//! Persistent settings are stored with `confy` in TOML format. Command line
//! flags override individual values for a single run without being saved.

use serde::{Deserialize, Serialize};

use geo_edit::EditorConfig;

const APP_NAME: &str = "kneeboard-desktop";
const CONFIG_NAME: &str = "config";

/// Application configuration stored in TOML format
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct AppConfig {
    /// Configuration schema version
    #[serde(default = "default_config_version")]
    pub config_version: u32,

    /// Editing behavior shared by every map surface
    #[serde(default)]
    pub editor: EditorConfig,

    /// Initial map center latitude
    #[serde(default = "default_center_lat")]
    pub center_lat: f64,

    /// Initial map center longitude
    #[serde(default = "default_center_lon")]
    pub center_lon: f64,

    /// Initial map zoom level (1.0 - 19.0)
    #[serde(default = "default_zoom")]
    pub default_zoom: f64,

    /// Open the pop-out map window on startup
    #[serde(default = "default_true")]
    pub show_popout: bool,

    /// Whether the pop-out map may edit routes and marks
    #[serde(default)]
    pub popout_editable: bool,

    /// Outline the editor's viewport on the pop-out map
    #[serde(default = "default_true")]
    pub show_viewport_boundary: bool,
}

// Default value functions for serde
fn default_config_version() -> u32 {
    1
}

fn default_center_lat() -> f64 {
    42.0
}

fn default_center_lon() -> f64 {
    42.0
}

fn default_zoom() -> f64 {
    7.0
}

fn default_true() -> bool {
    true
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            config_version: default_config_version(),
            editor: EditorConfig::default(),
            center_lat: default_center_lat(),
            center_lon: default_center_lon(),
            default_zoom: default_zoom(),
            show_popout: true,
            popout_editable: false,
            show_viewport_boundary: true,
        }
    }
}

impl AppConfig {
    /// Load configuration from disk, creating it with defaults if missing
    pub fn load() -> Result<Self, confy::ConfyError> {
        confy::load(APP_NAME, CONFIG_NAME)
    }

    /// Save configuration to disk
    pub fn save(&self) -> Result<(), confy::ConfyError> {
        confy::store(APP_NAME, CONFIG_NAME, self)
    }

    /// Get the config file path for display to user
    pub fn get_config_path() -> Result<std::path::PathBuf, confy::ConfyError> {
        confy::get_configuration_file_path(APP_NAME, CONFIG_NAME)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_fields_use_defaults() {
        let config: AppConfig = serde_json::from_str(r#"{"default_zoom": 9.5}"#).unwrap();
        assert_eq!(config.default_zoom, 9.5);
        assert_eq!(config.editor, EditorConfig::default());
        assert!(config.show_popout);
        assert!(!config.popout_editable);
    }

    #[test]
    fn test_partial_editor_section() {
        let config: AppConfig =
            serde_json::from_str(r#"{"editor": {"hover_delay_ms": 100}}"#).unwrap();
        assert_eq!(config.editor.hover_delay_ms, 100);
        assert_eq!(config.editor.pick_radius_px, EditorConfig::default().pick_radius_px);
        assert_eq!(config.center_lat, 42.0);
    }
}
