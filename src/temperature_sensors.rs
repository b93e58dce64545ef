//! Temperature sensor backends.

pub mod hwmon;
pub mod lm_sensor;

use async_trait::async_trait;
use log::debug;
use serde::{Deserialize, Serialize};

use crate::{
    error::SensorReadError,
    sensors::{SensorListing, SensorReader, TemperatureSample},
};

/// Which backend reads the sensor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "kebab-case")]
pub enum SensorBackend {
    /// lm-sensors, then sysfs hwmon.
    #[default]
    Auto,
    LmSensors,
    Hwmon,
}

/// Builds the reader for `backend`.
pub fn build_reader(backend: SensorBackend) -> Box<dyn SensorReader> {
    match backend {
        SensorBackend::Auto => {
            let mut readers: Vec<Box<dyn SensorReader>> = Vec::new();
            let lm = lm_sensor::LmSensorSource::system();
            if lm.is_available() {
                readers.push(Box::new(lm));
            }
            readers.push(Box::new(hwmon::HwmonSource::system()));
            Box::new(FallbackReader::new(readers))
        }
        SensorBackend::LmSensors => Box::new(lm_sensor::LmSensorSource::system()),
        SensorBackend::Hwmon => Box::new(hwmon::HwmonSource::system()),
    }
}

/// Tries each reader in order and returns the first reading.
pub struct FallbackReader {
    readers: Vec<Box<dyn SensorReader>>,
}

impl FallbackReader {
    pub fn new(readers: Vec<Box<dyn SensorReader>>) -> Self {
        Self { readers }
    }
}

#[async_trait]
impl SensorReader for FallbackReader {
    async fn read(&self, source: &str) -> Result<TemperatureSample, SensorReadError> {
        let mut last_error = None;

        for reader in &self.readers {
            match reader.read(source).await {
                Ok(sample) => return Ok(sample),
                Err(e) => {
                    debug!("{} could not read '{source}': {e}", reader.backend_name());
                    last_error = Some(e);
                }
            }
        }

        Err(last_error.unwrap_or_else(|| SensorReadError::Unavailable {
            backend: "auto",
            reason: "no sensor backend configured".to_string(),
        }))
    }

    fn backend_name(&self) -> &'static str {
        "auto"
    }

    fn list(&self) -> Vec<SensorListing> {
        self.readers
            .iter()
            .map(|r| r.list())
            .find(|listings| !listings.is_empty())
            .unwrap_or_default()
    }
}
