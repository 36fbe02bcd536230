//! Paths and persisted player settings
//!
//! Directory priority:
//! 1. CLI `--config-dir`
//! 2. `RLPLAY_CONFIG_DIR` environment variable
//! 3. Current folder IF it already holds rlplay files (rlplay.json, rlplay.log)
//! 4. Platform directory from dirs-next
//!
//! Platform paths:
//! - Linux: ~/.config/rlplay (config), ~/.local/share/rlplay (data)
//! - macOS: ~/Library/Application Support/rlplay
//! - Windows: %APPDATA%\rlplay

use anyhow::{Context, Result};
use log::debug;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::core::cursor::PlaybackMode;
use crate::core::playback::LoadOptions;
use crate::error::PlaybackError;

pub const CONFIG_FILE: &str = "rlplay.json";
pub const LOG_FILE: &str = "rlplay.log";
const APP_DIR: &str = "rlplay";
const ENV_CONFIG_DIR: &str = "RLPLAY_CONFIG_DIR";

/// Configuration for overriding default application paths
#[derive(Debug, Clone, Default)]
pub struct PathConfig {
    /// Custom config directory (from CLI or ENV)
    pub config_dir: Option<PathBuf>,
}

impl PathConfig {
    /// Priority: CLI args → ENV var (RLPLAY_CONFIG_DIR) → None (use defaults)
    pub fn from_env_and_cli(cli_dir: Option<PathBuf>) -> Self {
        let config_dir = cli_dir.or_else(|| std::env::var(ENV_CONFIG_DIR).ok().map(PathBuf::from));
        Self { config_dir }
    }

    pub fn config_file(&self, name: &str) -> PathBuf {
        self.config_dir().join(name)
    }

    /// Data files (logs)
    pub fn data_file(&self, name: &str) -> PathBuf {
        self.data_dir().join(name)
    }

    /// Create config and data directories if missing
    pub fn ensure_dirs(&self) -> Result<()> {
        let config_dir = self.config_dir();
        let data_dir = self.data_dir();

        if !config_dir.exists() {
            std::fs::create_dir_all(&config_dir)
                .with_context(|| format!("Failed to create config directory: {}", config_dir.display()))?;
        }
        if data_dir != config_dir && !data_dir.exists() {
            std::fs::create_dir_all(&data_dir)
                .with_context(|| format!("Failed to create data directory: {}", data_dir.display()))?;
        }
        Ok(())
    }

    fn config_dir(&self) -> PathBuf {
        self.resolve(dirs_next::config_dir())
    }

    fn data_dir(&self) -> PathBuf {
        self.resolve(dirs_next::data_dir())
    }

    fn resolve(&self, platform: Option<PathBuf>) -> PathBuf {
        if let Some(dir) = &self.config_dir {
            return dir.clone();
        }
        if let Ok(current_dir) = std::env::current_dir()
            && has_local_files(&current_dir)
        {
            return current_dir;
        }
        platform
            .map(|dir| dir.join(APP_DIR))
            .unwrap_or_else(|| PathBuf::from("."))
    }
}

fn has_local_files(dir: &Path) -> bool {
    [CONFIG_FILE, LOG_FILE].iter().any(|f| dir.join(f).exists())
}

/// Player settings, `rlplay.json`. Every field is optional in the file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PlayerConfig {
    /// Present every second frame for 60fps+ animations
    pub limit_fps: bool,
    /// Display refresh rate used for pacing
    pub refresh_rate: f32,
    /// Ask the engine to build its frame cache
    pub precache: bool,
    /// Decode pool size, 0 = auto
    pub decode_threads: usize,
    pub playback_mode: PlaybackMode,
    /// Show a still frame while stopped
    pub decode_single_frame: bool,
}

impl Default for PlayerConfig {
    fn default() -> Self {
        Self {
            limit_fps: false,
            refresh_rate: 60.0,
            precache: false,
            decode_threads: 0,
            playback_mode: PlaybackMode::Loop,
            decode_single_frame: true,
        }
    }
}

impl PlayerConfig {
    /// Missing file yields defaults; an unreadable or malformed one is an error.
    pub fn load(path: &Path) -> Result<Self, PlaybackError> {
        let text = match std::fs::read_to_string(path) {
            Ok(text) => text,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!("No settings at {}, using defaults", path.display());
                return Ok(Self::default());
            }
            Err(source) => {
                return Err(PlaybackError::Io {
                    path: Some(path.to_path_buf()),
                    source,
                });
            }
        };
        let config = serde_json::from_str(&text).map_err(|source| PlaybackError::Config {
            path: path.to_path_buf(),
            source,
        })?;
        debug!("Settings loaded from {}", path.display());
        Ok(config)
    }

    pub fn save(&self, path: &Path) -> Result<(), PlaybackError> {
        let json = serde_json::to_string_pretty(self).map_err(|source| PlaybackError::Config {
            path: path.to_path_buf(),
            source,
        })?;
        std::fs::write(path, json).map_err(|source| PlaybackError::Io {
            path: Some(path.to_path_buf()),
            source,
        })
    }

    /// Decode pool size with 0 resolved to 3/4 of the logical CPUs
    pub fn resolved_decode_threads(&self) -> usize {
        if self.decode_threads == 0 {
            (num_cpus::get() * 3 / 4).max(1)
        } else {
            self.decode_threads
        }
    }

    pub fn load_options(&self, width: u32, height: u32) -> LoadOptions {
        LoadOptions {
            precache: self.precache,
            limit_fps: self.limit_fps,
            refresh_rate: self.refresh_rate,
            ..LoadOptions::new(width, height)
        }
    }
}
