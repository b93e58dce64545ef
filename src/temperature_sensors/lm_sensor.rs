use std::sync::LazyLock;

use async_trait::async_trait;
use lm_sensors::{
    LMSensors,
    value::{Kind as ValueKind, Value},
};
#[cfg(debug_assertions)]
use log::info;

use crate::{
    error::SensorReadError,
    sensors::{SensorListing, SensorReader, TemperatureSample, source_matches},
};

const BACKEND: &str = "lm-sensors";

/// Wrapper for the libsensors handle.
pub struct LMSensorsRef(pub LMSensors);

// SAFETY: libsensors (>= 3.6) guards all sensor access with an internal global mutex.
//         Only read-only calls are made through this handle.
unsafe impl Send for LMSensorsRef {}
unsafe impl Sync for LMSensorsRef {}

/// Process-wide libsensors instance; `None` when the library cannot initialize.
pub static LMSENSORS: LazyLock<Option<LMSensorsRef>> =
    LazyLock::new(|| match lm_sensors::Initializer::default().initialize() {
        Ok(sensors) => {
            log::info!("lm-sensors initialized successfully");
            Some(LMSensorsRef(sensors))
        }
        Err(e) => {
            log::warn!("lm-sensors not available: {e}");
            None
        }
    });

/// Reads chips through libsensors, matching the chip name by substring.
pub struct LmSensorSource {
    sensors: Option<&'static LMSensorsRef>,
}

impl LmSensorSource {
    pub fn system() -> Self {
        Self {
            sensors: LMSENSORS.as_ref(),
        }
    }

    pub fn is_available(&self) -> bool {
        self.sensors.is_some()
    }

    fn handle(&self) -> Result<&'static LMSensors, SensorReadError> {
        self.sensors
            .map(|s| &s.0)
            .ok_or_else(|| SensorReadError::Unavailable {
                backend: BACKEND,
                reason: "libsensors failed to initialize".to_string(),
            })
    }
}

/// Converts a libsensors reading, refusing NaN and infinities.
fn sample_from_celsius(t: f64, chip_name: String) -> Result<TemperatureSample, SensorReadError> {
    if !t.is_finite() {
        return Err(SensorReadError::Unavailable {
            backend: BACKEND,
            reason: format!("{chip_name}: non-finite reading {t}"),
        });
    }
    TemperatureSample::celsius((t * 1000.0).round() as i64, chip_name)
}

#[async_trait]
impl SensorReader for LmSensorSource {
    async fn read(&self, source: &str) -> Result<TemperatureSample, SensorReadError> {
        let sensors = self.handle()?;

        for chip in sensors.chip_iter(None) {
            let Ok(chip_name) = chip.name() else {
                continue;
            };
            if !source_matches(&chip_name, source) {
                continue;
            }

            let input = chip.feature_iter().find_map(|feature| {
                feature
                    .sub_feature_iter()
                    .find(|s| matches!(s.kind(), Some(ValueKind::TemperatureInput)))
            });
            let Some(input) = input else {
                continue;
            };

            #[cfg(debug_assertions)]
            {
                info!("Reading LM sensor chip={chip_name} for '{source}'");
            }

            return match input.value() {
                Ok(Value::TemperatureInput(t)) => sample_from_celsius(t, chip_name),
                Ok(_) => Err(SensorReadError::Unavailable {
                    backend: BACKEND,
                    reason: "non-temperature value".to_string(),
                }),
                Err(e) => Err(SensorReadError::Unavailable {
                    backend: BACKEND,
                    reason: format!("{chip_name}: {e}"),
                }),
            };
        }

        Err(SensorReadError::SourceNotFound {
            source_name: source.to_string(),
            backend: BACKEND,
        })
    }

    fn backend_name(&self) -> &'static str {
        BACKEND
    }

    fn list(&self) -> Vec<SensorListing> {
        let Ok(sensors) = self.handle() else {
            return Vec::new();
        };

        let mut listings = Vec::new();
        for chip in sensors.chip_iter(None) {
            let Ok(chip_name) = chip.name() else {
                continue;
            };
            for feature in chip.feature_iter() {
                let label = feature
                    .name()
                    .and_then(|n| n.ok())
                    .unwrap_or("N/A")
                    .to_string();
                let reading = feature
                    .sub_feature_iter()
                    .filter(|s| matches!(s.kind(), Some(ValueKind::TemperatureInput)))
                    .find_map(|s| match s.value() {
                        Ok(Value::TemperatureInput(t)) => Some(t),
                        _ => None,
                    });
                if let Some(celsius) = reading {
                    listings.push(SensorListing {
                        chip: chip_name.clone(),
                        label,
                        celsius,
                    });
                }
            }
        }
        listings
    }
}
