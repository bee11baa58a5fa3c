use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::media::decoder::DecodeOptions;
use crate::media::player::PlayerConfig;
use crate::media::render_loop::RenderLoop;
use crate::media::types::DEFAULT_FRAME_DELAY_MS;

/// Viewer preferences. Playback position is never persisted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SettingsConfig {
    pub version: u32,
    #[serde(default = "default_true")]
    pub autoplay: bool,
    #[serde(default = "default_frame_delay_ms")]
    pub default_frame_delay_ms: u32,
    #[serde(default = "default_tick_rate_hz")]
    pub tick_rate_hz: u32,
    #[serde(default = "default_download_file_name")]
    pub download_file_name: String,
}

fn default_true() -> bool {
    true
}

fn default_frame_delay_ms() -> u32 {
    DEFAULT_FRAME_DELAY_MS
}

fn default_tick_rate_hz() -> u32 {
    60
}

fn default_download_file_name() -> String {
    "ev_simulation.gif".to_string()
}

impl Default for SettingsConfig {
    fn default() -> Self {
        Self {
            version: 1,
            autoplay: true,
            default_frame_delay_ms: default_frame_delay_ms(),
            tick_rate_hz: default_tick_rate_hz(),
            download_file_name: default_download_file_name(),
        }
    }
}

impl SettingsConfig {
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("simreel").join("settings.json"))
    }

    pub fn load() -> Self {
        match Self::default_path() {
            Some(path) => Self::load_from(&path),
            None => Self::default(),
        }
    }

    /// Read settings from `path`, falling back to defaults on any error.
    pub fn load_from(path: &Path) -> Self {
        match std::fs::read_to_string(path) {
            Ok(json) => serde_json::from_str(&json).unwrap_or_else(|e| {
                log::warn!("Ignoring invalid settings at {}: {e}", path.display());
                Self::default()
            }),
            Err(_) => Self::default(),
        }
    }

    pub fn save(&self) {
        if let Some(path) = Self::default_path() {
            self.save_to(&path);
        }
    }

    pub fn save_to(&self, path: &Path) {
        if let Some(dir) = path.parent() {
            let _ = std::fs::create_dir_all(dir);
        }
        if let Ok(json) = serde_json::to_string_pretty(self) {
            if let Err(e) = std::fs::write(path, json) {
                log::warn!("Failed to save settings to {}: {e}", path.display());
            }
        }
    }

    pub fn player_config(&self) -> PlayerConfig {
        PlayerConfig {
            autoplay: self.autoplay,
            tick_interval: RenderLoop::interval_for_rate(self.tick_rate_hz),
            decode: DecodeOptions {
                default_delay_ms: self.default_frame_delay_ms.max(1),
            },
        }
    }
}
