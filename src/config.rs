//! Configuration for the ocypus_lcdd daemon.
//!
//! An optional YAML file supplies defaults; command-line flags override it.
//! The merged result is validated once into an immutable [`DaemonConfig`].

use std::{
    env, fs,
    path::{Path, PathBuf},
    str::FromStr,
    time::Duration,
};

use anyhow::{Context, Result};
use log::LevelFilter;
use serde::{Deserialize, Serialize};

use crate::{
    drivers::ocypus::{self, DeviceSelector, FrameEncoder, ProtocolRevision},
    error::ConfigError,
    sensors::TemperatureUnit,
    temperature_sensors::SensorBackend,
};

/// Environment variable naming the configuration file.
pub const CONFIG_ENV: &str = "OCYPUS_LCDD_CONFIG";

/// Contents of the YAML configuration file.
///
/// # Example
///
/// ```yaml
/// version: 1
/// unit: f
/// sensor: k10temp
/// backend: auto
/// rate_seconds: 2
/// interface: 1
/// max_open_retries: 30
/// protocol: l36
/// log_level: info
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Config {
    /// Configuration version for compatibility checking.
    #[serde(default = "defaults::version")]
    pub version: u8,

    /// Display unit.
    #[serde(default)]
    pub unit: TemperatureUnit,

    /// Substring of the sensor chip name to read.
    #[serde(default = "defaults::sensor")]
    pub sensor: String,

    #[serde(default)]
    pub backend: SensorBackend,

    /// Poll interval in whole seconds.
    #[serde(default = "defaults::rate_seconds")]
    pub rate_seconds: i64,

    /// Forced HID interface index.
    #[serde(default)]
    pub interface: Option<i64>,

    /// Forced HID device path, e.g. `/dev/hidraw3`.
    #[serde(default)]
    pub device_path: Option<String>,

    /// Give up after this many consecutive failed opens; unbounded when absent.
    #[serde(default)]
    pub max_open_retries: Option<u32>,

    #[serde(default)]
    pub protocol: ProtocolRevision,

    #[serde(default = "defaults::log_level")]
    pub log_level: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            version: defaults::version(),
            unit: TemperatureUnit::default(),
            sensor: defaults::sensor(),
            backend: SensorBackend::default(),
            rate_seconds: defaults::rate_seconds(),
            interface: None,
            device_path: None,
            max_open_retries: None,
            protocol: ProtocolRevision::default(),
            log_level: defaults::log_level(),
        }
    }
}

impl Config {
    /// Loads the configuration file found by [`Config::locate`], or the
    /// built-in defaults when there is none.
    pub fn load(path: Option<PathBuf>) -> Result<Self> {
        Self::load_from(Self::locate(path).as_deref())
    }

    /// Picks the configuration file to use.
    ///
    /// Searches for configuration in the following order:
    /// 1. Provided path parameter
    /// 2. OCYPUS_LCDD_CONFIG environment variable
    /// 3. XDG_CONFIG_HOME/ocypus_lcdd/config.yml or ~/.config/ocypus_lcdd/config.yml
    /// 4. /etc/ocypus_lcdd/config.yml
    ///
    /// An explicitly named path is returned even when it does not exist, so
    /// that loading it fails.
    pub fn locate(path: Option<PathBuf>) -> Option<PathBuf> {
        path.or_else(|| env::var_os(CONFIG_ENV).map(PathBuf::from))
            .or_else(locate_config)
    }

    /// Parses `path`; `None` yields the defaults.
    pub fn load_from(path: Option<&Path>) -> Result<Self> {
        let Some(path) = path else {
            return Ok(Self::default());
        };

        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        serde_yaml::from_str(&content)
            .with_context(|| format!("Failed to parse YAML in: {}", path.display()))
    }
}

mod defaults {
    pub fn version() -> u8 {
        1
    }

    /// AMD CPU die sensor.
    pub fn sensor() -> String {
        "k10temp".to_string()
    }

    pub fn rate_seconds() -> i64 {
        1
    }

    pub fn log_level() -> String {
        "info".to_string()
    }
}

fn locate_config() -> Option<PathBuf> {
    if let Some(mut cfg_dir) = env::var_os("XDG_CONFIG_HOME")
        .map(PathBuf::from)
        .or_else(|| env::var_os("HOME").map(|h| Path::new(&h).join(".config")))
    {
        cfg_dir.push("ocypus_lcdd/config.yml");
        if cfg_dir.exists() {
            return Some(cfg_dir);
        }
    }

    let etc = Path::new("/etc/ocypus_lcdd/config.yml");
    etc.exists().then(|| etc.to_path_buf())
}

/// Values taken from the command line; `None` keeps the file value.
#[derive(Debug, Clone, Default)]
pub struct ConfigOverrides {
    pub unit: Option<TemperatureUnit>,
    pub sensor: Option<String>,
    pub backend: Option<SensorBackend>,
    pub rate_seconds: Option<i64>,
    pub interface: Option<i64>,
    pub device_path: Option<String>,
    pub verbose: bool,
}

/// Validated configuration consumed read-only by the daemon.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DaemonConfig {
    pub unit: TemperatureUnit,
    pub sensor: String,
    pub backend: SensorBackend,
    pub interval: Duration,
    pub interface: Option<i32>,
    pub device_path: Option<String>,
    pub max_open_retries: Option<u32>,
    pub protocol: ProtocolRevision,
    pub log_level: LevelFilter,
}

impl Default for DaemonConfig {
    fn default() -> Self {
        Self {
            unit: TemperatureUnit::default(),
            sensor: defaults::sensor(),
            backend: SensorBackend::default(),
            interval: Duration::from_secs(1),
            interface: None,
            device_path: None,
            max_open_retries: None,
            protocol: ProtocolRevision::default(),
            log_level: LevelFilter::Info,
        }
    }
}

impl DaemonConfig {
    /// Overlays `overrides` on `file` and validates the result.
    pub fn resolve(file: Config, overrides: &ConfigOverrides) -> Result<Self, ConfigError> {
        if file.version != 1 {
            return Err(ConfigError::UnsupportedVersion(file.version));
        }

        let rate = overrides.rate_seconds.unwrap_or(file.rate_seconds);
        if rate <= 0 {
            return Err(ConfigError::InvalidRate(rate));
        }

        let interface = overrides
            .interface
            .or(file.interface)
            .map(|idx| i32::try_from(idx).map_err(|_| ConfigError::InvalidInterface(idx)))
            .transpose()?;
        if let Some(idx) = interface.filter(|idx| *idx < 0) {
            return Err(ConfigError::InvalidInterface(i64::from(idx)));
        }

        let device_path = overrides.device_path.clone().or(file.device_path);
        if device_path.as_deref().is_some_and(|p| p.contains('\0')) {
            return Err(ConfigError::InvalidDevicePath);
        }

        if file.max_open_retries == Some(0) {
            return Err(ConfigError::ZeroRetryBound);
        }

        let sensor = overrides.sensor.clone().unwrap_or(file.sensor);
        if sensor.trim().is_empty() {
            return Err(ConfigError::EmptySensor);
        }

        let log_level = if overrides.verbose {
            LevelFilter::Debug
        } else {
            LevelFilter::from_str(&file.log_level)
                .map_err(|_| ConfigError::InvalidLogLevel(file.log_level.clone()))?
        };

        Ok(Self {
            unit: overrides.unit.unwrap_or(file.unit),
            sensor,
            backend: overrides.backend.unwrap_or(file.backend),
            interval: Duration::from_secs(rate as u64),
            interface,
            device_path,
            max_open_retries: file.max_open_retries,
            protocol: file.protocol,
            log_level,
        })
    }

    /// Device selection derived from the interface and path overrides.
    pub fn device_selector(&self) -> DeviceSelector {
        ocypus::selector(self.interface, self.device_path.clone())
    }

    pub fn encoder(&self) -> FrameEncoder {
        FrameEncoder::new(self.protocol.layout())
    }
}
