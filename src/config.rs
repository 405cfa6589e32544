//! Controller settings and their TOML file
//!
//! Settings live in `<config_dir>/megaind/controller.toml`; the
//! `MEGAIND_CONFIG` environment variable points somewhere else. A missing file
//! is created with defaults, missing keys fall back to their defaults.

use color_eyre::eyre::{eyre, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::fs::{create_dir_all, read_to_string, try_exists, write};
use tracing::{debug, info};

use crate::bus::registers::DEVICE_ADDRESS;
use crate::controller::actuators::PwmScaling;
use crate::controller::sampler::{AnalogThresholdWindow, SamplerSettings};

pub const CONFIG_ENV_VAR: &str = "MEGAIND_CONFIG";
const CONFIG_DIR_NAME: &str = "megaind";
const CONFIG_FILE_NAME: &str = "controller.toml";

/// Largest accepted subscriber queue capacity
pub const MAX_QUEUE_CAPACITY: usize = 1024;

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum SettingsError {
    #[error("Poll interval must be greater than zero")]
    ZeroPollInterval,

    #[error("Queue capacity must be greater than zero")]
    ZeroQueueCapacity,

    #[error("Queue capacity {0} exceeds the maximum of {MAX_QUEUE_CAPACITY}")]
    QueueCapacity(usize),

    #[error("Analog window {lower}..{upper} is empty or not finite")]
    InvalidWindow { lower: f64, upper: f64 },
}

/// Settings of the controller subsystem
///
/// # Examples
///
/// ```rust
/// use megaind_controller::config::ControllerSettings;
///
/// let settings = ControllerSettings {
///     poll_interval_ms: 20,
///     ..ControllerSettings::default()
/// };
/// assert!(settings.validate().is_ok());
/// ```
#[derive(Deserialize, Serialize, Clone, Debug, PartialEq)]
#[serde(default)]
pub struct ControllerSettings {
    /// I2C bus number (`/dev/i2c-N`)
    pub bus_id: u8,

    /// Slave address of the board
    pub device_address: u16,

    /// Sampler period in milliseconds
    pub poll_interval_ms: u64,

    /// Capacity of each subscriber queue; snapshots beyond it are dropped
    pub queue_capacity: usize,

    /// Percentage to PWM register conversion for lamps and fan
    pub pwm_scaling: PwmScaling,

    /// Raw analog band that counts as a pressed soft button
    pub analog_window: AnalogThresholdWindow,
}

impl Default for ControllerSettings {
    fn default() -> Self {
        Self {
            bus_id: 1,
            device_address: DEVICE_ADDRESS,
            poll_interval_ms: 50,
            queue_capacity: 10,
            pwm_scaling: PwmScaling::Percent,
            analog_window: AnalogThresholdWindow::default(),
        }
    }
}

impl ControllerSettings {
    pub fn validate(&self) -> Result<(), SettingsError> {
        if self.poll_interval_ms == 0 {
            return Err(SettingsError::ZeroPollInterval);
        }
        if self.queue_capacity == 0 {
            return Err(SettingsError::ZeroQueueCapacity);
        }
        if self.queue_capacity > MAX_QUEUE_CAPACITY {
            return Err(SettingsError::QueueCapacity(self.queue_capacity));
        }
        if !self.analog_window.is_valid() {
            return Err(SettingsError::InvalidWindow {
                lower: self.analog_window.lower,
                upper: self.analog_window.upper,
            });
        }
        Ok(())
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn sampler_settings(&self) -> SamplerSettings {
        SamplerSettings {
            poll_interval: self.poll_interval(),
            analog_window: self.analog_window,
        }
    }
}

/// Location of the settings file
pub fn settings_path() -> Result<PathBuf> {
    if let Some(path) = std::env::var_os(CONFIG_ENV_VAR) {
        return Ok(PathBuf::from(path));
    }
    let base = dirs::config_dir().ok_or_else(|| eyre!("No configuration directory available"))?;
    Ok(base.join(CONFIG_DIR_NAME).join(CONFIG_FILE_NAME))
}

/// Writes the default settings to `path` unless a file is already there
pub async fn ensure_default_settings(path: &Path) -> Result<()> {
    let exists = try_exists(path)
        .await
        .map_err(|e| eyre!("Failed to check if settings file exists: {}", e))?;
    if exists {
        return Ok(());
    }

    if let Some(parent) = path.parent() {
        create_dir_all(parent)
            .await
            .map_err(|e| eyre!("Failed to create settings directory: {}", e))?;
    }
    let content = toml::to_string_pretty(&ControllerSettings::default())
        .map_err(|e| eyre!("Failed to serialize default settings: {}", e))?;
    write(path, content)
        .await
        .map_err(|e| eyre!("Failed to write settings file: {}", e))?;
    info!("Wrote default settings to {}", path.display());
    Ok(())
}

pub async fn load_settings_from(path: &Path) -> Result<ControllerSettings> {
    let content = read_to_string(path)
        .await
        .map_err(|e| eyre!("Failed to read settings file {}: {}", path.display(), e))?;
    let settings: ControllerSettings =
        toml::from_str(&content).map_err(|e| eyre!("Failed to parse settings file: {}", e))?;
    settings
        .validate()
        .map_err(|e| eyre!("Invalid settings in {}: {}", path.display(), e))?;
    debug!("Loaded settings: {:?}", settings);
    Ok(settings)
}

/// Loads settings from [`settings_path`], creating the file if needed
pub async fn load_settings() -> Result<ControllerSettings> {
    let path = settings_path()?;
    ensure_default_settings(&path).await?;
    load_settings_from(&path).await
}
