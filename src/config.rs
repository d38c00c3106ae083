use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use crate::auto::Presets;

pub const DEFAULT_SIT_CM: f32 = 73.0;
pub const DEFAULT_STAND_CM: f32 = 105.0;

/// Persisted desk address and sit/stand presets
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Bluetooth address of the desk
    pub desk_address: Option<String>,

    /// Sitting height in centimeters
    pub sit_cm: f32,

    /// Standing height in centimeters
    pub stand_cm: f32,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            desk_address: None,
            sit_cm: DEFAULT_SIT_CM,
            stand_cm: DEFAULT_STAND_CM,
        }
    }
}

impl Config {
    /// Get the configuration directory path (~/.desk-control)
    pub fn config_dir() -> Result<PathBuf> {
        let home = dirs::home_dir().context("Could not find home directory")?;
        Ok(home.join(".desk-control"))
    }

    /// Get the configuration file path (~/.desk-control/config)
    pub fn config_file() -> Result<PathBuf> {
        Ok(Self::config_dir()?.join("config"))
    }

    /// Load configuration, falling back to defaults when no file exists yet
    pub fn load() -> Result<Self> {
        Self::load_from(&Self::config_file()?)
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            log::info!("Config file {:?} not found, using defaults", path);
            return Ok(Self::default());
        }

        let content = fs::read_to_string(path).context("Failed to read config file")?;
        let config: Config =
            serde_json::from_str(&content).context("Failed to parse config file")?;
        Ok(config)
    }

    pub fn save(&self) -> Result<()> {
        self.save_to(&Self::config_file()?)
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(dir) = path.parent() {
            if !dir.exists() {
                fs::create_dir_all(dir).context("Failed to create config directory")?;
            }
        }

        let content = serde_json::to_string_pretty(self).context("Failed to serialize config")?;
        fs::write(path, content).context("Failed to write config file")?;

        log::info!("Configuration saved to {:?}", path);
        Ok(())
    }

    pub fn presets(&self) -> Presets {
        Presets {
            sit_cm: self.sit_cm,
            stand_cm: self.stand_cm,
        }
    }
}
