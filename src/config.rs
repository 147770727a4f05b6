//! Manager configuration: TOML file, defaults and startup validation.
//!
//! Values are range-checked once in [`ManagerConfig::validate`]; everything
//! downstream works with [`ValidatedConfig`] and never re-checks.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::controller::axis::{Deadzones, Threshold};
use crate::controller::combination::{CombinationSpec, Requirement};
use crate::controller::poller::{PollerSettings, MAX_FRAME_PERIOD, MIN_FRAME_PERIOD};
use crate::desktop::manager::DesktopSettings;

const CONFIG_ENV_VAR: &str = "PADMANAGER_CONFIG";
const CONFIG_DIR: &str = "padmanager";
const CONFIG_FILE: &str = "config.toml";

const CURSOR_SPEED_RANGE: (f64, f64) = (5.0, 50.0);
const MAX_COOLDOWN_MS: u64 = 10_000;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to access config file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse config file: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Failed to serialize config: {0}")]
    Serialize(#[from] toml::ser::Error),

    #[error("{setting} = {value} is outside [{min}, {max}]")]
    OutOfRange {
        setting: &'static str,
        value: String,
        min: String,
        max: String,
    },

    #[error("Unknown input name in toggle_combination: {0:?}")]
    UnknownInput(String),

    #[error("toggle_combination must name at least one input")]
    EmptyCombination,
}

#[derive(Deserialize, Serialize, Clone, Debug, PartialEq)]
#[serde(default)]
pub struct ManagerConfig {
    pub start_enabled: bool,
    pub polling_period_ms: u64,
    pub max_cursor_speed: f64,
    pub left_stick_threshold: f64,
    pub right_stick_threshold: f64,
    pub trigger_threshold: f64,
    pub toggle_combination: Vec<String>,
    pub toggle_cooldown_ms: u64,
}

impl Default for ManagerConfig {
    fn default() -> Self {
        Self {
            start_enabled: false,
            polling_period_ms: 8,
            max_cursor_speed: 25.0,
            left_stick_threshold: 0.3,
            right_stick_threshold: 0.5,
            trigger_threshold: 0.5,
            toggle_combination: vec!["BACK".to_string(), "A".to_string(), "X".to_string()],
            toggle_cooldown_ms: 1000,
        }
    }
}

/// Settings split per subsystem, all ranges checked
#[derive(Clone, Debug)]
pub struct ValidatedConfig {
    pub poller: PollerSettings,
    pub desktop: DesktopSettings,
}

impl ManagerConfig {
    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(content)?)
    }

    pub fn to_toml(&self) -> Result<String, ConfigError> {
        Ok(toml::to_string_pretty(self)?)
    }

    pub async fn load(path: &Path) -> Result<Self, ConfigError> {
        debug!("Reading config from {}", path.display());
        let content = tokio::fs::read_to_string(path)
            .await
            .map_err(|source| ConfigError::Io {
                path: path.to_path_buf(),
                source,
            })?;
        Self::from_toml(&content)
    }

    /// Writes the defaults to `path` unless a file already exists there.
    pub async fn ensure_default_config(path: &Path) -> Result<(), ConfigError> {
        let io_err = |source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        };

        if tokio::fs::try_exists(path).await.map_err(io_err)? {
            return Ok(());
        }

        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await.map_err(io_err)?;
        }
        tokio::fs::write(path, Self::default().to_toml()?)
            .await
            .map_err(io_err)?;
        info!("Wrote default config to {}", path.display());
        Ok(())
    }

    pub fn validate(&self) -> Result<ValidatedConfig, ConfigError> {
        let period = Duration::from_millis(self.polling_period_ms);
        if period < MIN_FRAME_PERIOD || period > MAX_FRAME_PERIOD {
            return Err(out_of_range(
                "polling_period_ms",
                self.polling_period_ms,
                MIN_FRAME_PERIOD.as_millis(),
                MAX_FRAME_PERIOD.as_millis(),
            ));
        }

        let (min_speed, max_speed) = CURSOR_SPEED_RANGE;
        if !(min_speed..=max_speed).contains(&self.max_cursor_speed) {
            return Err(out_of_range(
                "max_cursor_speed",
                self.max_cursor_speed,
                min_speed,
                max_speed,
            ));
        }

        if self.toggle_cooldown_ms > MAX_COOLDOWN_MS {
            return Err(out_of_range(
                "toggle_cooldown_ms",
                self.toggle_cooldown_ms,
                0,
                MAX_COOLDOWN_MS,
            ));
        }

        let trigger_threshold = threshold("trigger_threshold", self.trigger_threshold)?;
        let deadzones = Deadzones {
            left_stick: threshold("left_stick_threshold", self.left_stick_threshold)?,
            right_stick: threshold("right_stick_threshold", self.right_stick_threshold)?,
            trigger: trigger_threshold,
        };

        let requirements = self
            .toggle_combination
            .iter()
            .map(|name| {
                name.parse::<Requirement>()
                    .map_err(|_| ConfigError::UnknownInput(name.clone()))
            })
            .collect::<Result<Vec<_>, _>>()?;
        let combination = CombinationSpec::new(requirements).ok_or(ConfigError::EmptyCombination)?;

        Ok(ValidatedConfig {
            poller: PollerSettings {
                frame_period: period,
                deadzones,
                combination,
                trigger_threshold,
                cooldown: Duration::from_millis(self.toggle_cooldown_ms),
            },
            desktop: DesktopSettings {
                start_enabled: self.start_enabled,
                max_cursor_speed: self.max_cursor_speed,
            },
        })
    }
}

/// `$PADMANAGER_CONFIG`, else the platform config directory
pub fn config_path() -> PathBuf {
    if let Ok(path) = std::env::var(CONFIG_ENV_VAR) {
        return PathBuf::from(path);
    }

    let mut path = dirs::config_dir().unwrap_or_else(|| {
        warn!("Could not determine config directory, using current directory");
        PathBuf::from(".")
    });
    path.push(CONFIG_DIR);
    path.push(CONFIG_FILE);
    path
}

fn threshold(setting: &'static str, value: f64) -> Result<Threshold, ConfigError> {
    Threshold::new(value).ok_or_else(|| out_of_range(setting, value, 0.0, 1.0))
}

fn out_of_range(
    setting: &'static str,
    value: impl ToString,
    min: impl ToString,
    max: impl ToString,
) -> ConfigError {
    ConfigError::OutOfRange {
        setting,
        value: value.to_string(),
        min: min.to_string(),
        max: max.to_string(),
    }
}
