//! Application configuration.
//!
//! Persisted as TOML in the platform data directory. Every section and field
//! has a default, so a partial or missing file still loads.

use crate::control::types::{ControlTiming, PowerEncoding};
use crate::sensors::types::FrameLayout;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

const KM_TO_MILES: f64 = 0.621371;

/// Unit system preference.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Units {
    /// Metric units (km/h, km)
    Metric,
    /// Imperial units (mph, miles)
    #[default]
    Imperial,
}

impl std::fmt::Display for Units {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Units::Metric => write!(f, "Metric"),
            Units::Imperial => write!(f, "Imperial"),
        }
    }
}

impl Units {
    /// Multiplier from km (or km/h) to this unit system.
    pub fn factor(&self) -> f64 {
        match self {
            Units::Metric => 1.0,
            Units::Imperial => KM_TO_MILES,
        }
    }

    /// Convert a speed in km/h to this unit system.
    pub fn convert_speed(&self, speed_kmh: f64) -> f64 {
        speed_kmh * self.factor()
    }

    pub fn speed_label(&self) -> &'static str {
        match self {
            Units::Metric => "km/h",
            Units::Imperial => "mph",
        }
    }

    pub fn distance_label(&self) -> &'static str {
        match self {
            Units::Metric => "km",
            Units::Imperial => "mi",
        }
    }
}

/// Target power wire unit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PowerUnit {
    /// 1 W units under opcode 0x05
    #[default]
    Watts,
    /// 0.1 W units under `deci_watt_opcode`
    DeciWatts,
}

/// Application configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Trainer settings
    pub trainer: TrainerSettings,
    /// Control point settings
    pub control: ControlSettings,
    /// Ride settings
    pub ride: RideSettings,
}

/// Trainer connection and protocol settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrainerSettings {
    /// Whether instantaneous speed is mandatory or gated by flag bit 0
    pub frame_layout: FrameLayout,
    /// Target power encoding
    pub power_encoding: PowerUnit,
    /// Opcode used with deci-watt encoding
    pub deci_watt_opcode: u8,
    /// Connection timeout in seconds
    pub connection_timeout_secs: u32,
    /// Discovery timeout in seconds
    pub discovery_timeout_secs: u32,
}

impl Default for TrainerSettings {
    fn default() -> Self {
        Self {
            frame_layout: FrameLayout::default(),
            power_encoding: PowerUnit::default(),
            deci_watt_opcode: 0x05,
            connection_timeout_secs: 10,
            discovery_timeout_secs: 30,
        }
    }
}

/// Control point timing settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ControlSettings {
    /// How long to wait for a control point indication
    pub response_timeout_ms: u64,
    /// Quiet period between commands
    pub settle_delay_ms: u64,
}

impl Default for ControlSettings {
    fn default() -> Self {
        Self {
            response_timeout_ms: 3000,
            settle_delay_ms: 500,
        }
    }
}

/// Ride session settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RideSettings {
    /// Display and distance units
    pub units: Units,
    /// ERG target applied when a session starts
    pub initial_target_watts: u16,
    /// Step for +/- target adjustments
    pub erg_step_watts: u16,
    /// Live metrics refresh interval
    pub metrics_interval_ms: u64,
}

impl Default for RideSettings {
    fn default() -> Self {
        Self {
            units: Units::default(),
            initial_target_watts: 50,
            erg_step_watts: 5,
            metrics_interval_ms: 1000,
        }
    }
}

/// Protocol variants selected for the connected trainer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeviceProfile {
    pub frame_layout: FrameLayout,
    pub power_encoding: PowerEncoding,
}

impl AppConfig {
    /// Frame layout and power encoding for the configured trainer.
    pub fn device_profile(&self) -> DeviceProfile {
        let power_encoding = match self.trainer.power_encoding {
            PowerUnit::Watts => PowerEncoding::Watts,
            PowerUnit::DeciWatts => PowerEncoding::DeciWatts {
                opcode: self.trainer.deci_watt_opcode,
            },
        };
        DeviceProfile {
            frame_layout: self.trainer.frame_layout,
            power_encoding,
        }
    }

    /// Control point timing.
    pub fn control_timing(&self) -> ControlTiming {
        ControlTiming {
            response_timeout: Duration::from_millis(self.control.response_timeout_ms),
            settle_delay: Duration::from_millis(self.control.settle_delay_ms),
        }
    }

    pub fn metrics_interval(&self) -> Duration {
        Duration::from_millis(self.ride.metrics_interval_ms.max(1))
    }
}

/// Get the application data directory.
pub fn get_data_dir() -> PathBuf {
    directories::ProjectDirs::from("com", "ergride", "ErgRide")
        .map(|dirs| dirs.data_dir().to_path_buf())
        .unwrap_or_else(|| PathBuf::from("."))
}

/// Get the configuration file path.
pub fn get_config_path() -> PathBuf {
    get_data_dir().join("config.toml")
}

/// Load application configuration from the default location.
pub fn load_config() -> Result<AppConfig, ConfigError> {
    load_config_from(&get_config_path())
}

/// Load configuration from `path`. A missing file yields defaults.
pub fn load_config_from(path: &Path) -> Result<AppConfig, ConfigError> {
    if !path.exists() {
        tracing::debug!("No config at {}, using defaults", path.display());
        return Ok(AppConfig::default());
    }

    let content =
        std::fs::read_to_string(path).map_err(|e| ConfigError::IoError(e.to_string()))?;

    toml::from_str(&content).map_err(|e| ConfigError::ParseError(e.to_string()))
}

/// Save application configuration to the default location.
pub fn save_config(config: &AppConfig) -> Result<(), ConfigError> {
    save_config_to(&get_config_path(), config)
}

/// Save configuration to `path`, creating parent directories.
pub fn save_config_to(path: &Path, config: &AppConfig) -> Result<(), ConfigError> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).map_err(|e| ConfigError::IoError(e.to_string()))?;
    }

    let content =
        toml::to_string_pretty(config).map_err(|e| ConfigError::SerializeError(e.to_string()))?;

    std::fs::write(path, content).map_err(|e| ConfigError::IoError(e.to_string()))?;

    Ok(())
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    IoError(String),

    #[error("Parse error: {0}")]
    ParseError(String),

    #[error("Serialize error: {0}")]
    SerializeError(String),
}
