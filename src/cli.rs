use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

use crate::{
    config::ConfigOverrides, sensors::TemperatureUnit, temperature_sensors::SensorBackend,
};

/// ocypus_lcdd: temperature display daemon for the Ocypus Iota L36 cooler
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// YAML config file path
    #[arg(short = 'c', long = "config")]
    pub config: Option<PathBuf>,

    /// Detach from the terminal and log to syslog
    #[arg(short = 'd', long = "daemonize", default_value = "false")]
    pub daemonize: bool,

    /// Log to syslog while staying in the foreground
    #[arg(long = "syslog", default_value = "false")]
    pub syslog: bool,

    /// Debug-level logging
    #[arg(short = 'v', long = "verbose", default_value = "false")]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Show the sensor temperature on the display until interrupted
    On(OnArgs),
    /// Blank the display and exit
    Off(DeviceArgs),
    /// List the HID interfaces of the cooler
    List,
    /// List temperature inputs visible to the sensor backend
    Sensors(SensorArgs),
}

/// Forced device selection.
#[derive(Args, Debug, Clone, Default, PartialEq, Eq)]
pub struct DeviceArgs {
    /// Open this HID interface index without probing
    #[arg(long = "interface", allow_negative_numbers = true)]
    pub interface: Option<i64>,

    /// Open this hidraw path, e.g. /dev/hidraw3
    #[arg(long = "device-path")]
    pub device_path: Option<String>,
}

#[derive(Args, Debug, Clone, Default, PartialEq, Eq)]
pub struct SensorArgs {
    /// Substring of the sensor chip name
    #[arg(short = 's', long = "sensor")]
    pub sensor: Option<String>,

    #[arg(long = "backend", value_enum)]
    pub backend: Option<SensorBackend>,
}

#[derive(Args, Debug, Clone, Default, PartialEq, Eq)]
pub struct OnArgs {
    /// Display unit
    #[arg(short = 'u', long = "unit", value_enum)]
    pub unit: Option<TemperatureUnit>,

    /// Update interval in seconds
    #[arg(short = 'r', long = "rate", allow_negative_numbers = true)]
    pub rate: Option<i64>,

    #[command(flatten)]
    pub sensor: SensorArgs,

    #[command(flatten)]
    pub device: DeviceArgs,
}

impl Cli {
    /// Configuration overrides carried by the chosen subcommand.
    pub fn overrides(&self) -> ConfigOverrides {
        let mut overrides = ConfigOverrides {
            verbose: self.verbose,
            ..ConfigOverrides::default()
        };

        let (sensor, device) = match &self.command {
            Command::On(args) => {
                overrides.unit = args.unit;
                overrides.rate_seconds = args.rate;
                (Some(&args.sensor), Some(&args.device))
            }
            Command::Off(device) => (None, Some(device)),
            Command::Sensors(sensor) => (Some(sensor), None),
            Command::List => (None, None),
        };

        if let Some(sensor) = sensor {
            overrides.sensor = sensor.sensor.clone();
            overrides.backend = sensor.backend;
        }
        if let Some(device) = device {
            overrides.interface = device.interface;
            overrides.device_path = device.device_path.clone();
        }
        overrides
    }

    /// Syslog replaces stderr logging when detached or asked for.
    pub fn wants_syslog(&self) -> bool {
        self.daemonize || self.syslog
    }
}
