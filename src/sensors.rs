use std::{fmt, time::SystemTime};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::SensorReadError;

/// Lowest plausible reading, in m°C.
pub const PLAUSIBLE_MIN_MILLI_C: i64 = -20_000;
/// Highest plausible reading, in m°C.
pub const PLAUSIBLE_MAX_MILLI_C: i64 = 150_000;

/// Exact for the plausibility bounds, which are multiples of 5 m°C.
const fn milli_c_to_milli_f(milli_c: i64) -> i64 {
    milli_c * 9 / 5 + 32_000
}

/// Display unit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum)]
pub enum TemperatureUnit {
    #[default]
    #[serde(rename = "c", alias = "celsius")]
    #[value(name = "c")]
    Celsius,
    #[serde(rename = "f", alias = "fahrenheit")]
    #[value(name = "f")]
    Fahrenheit,
}

impl TemperatureUnit {
    pub fn symbol(self) -> &'static str {
        match self {
            TemperatureUnit::Celsius => "°C",
            TemperatureUnit::Fahrenheit => "°F",
        }
    }
}

/// One reading, stored as fixed-point milli-degrees in its native unit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TemperatureSample {
    millidegrees: i32,
    unit: TemperatureUnit,
    source: String,
    captured_at: SystemTime,
}

impl TemperatureSample {
    /// Builds a sample, rejecting values whose Celsius equivalent lies outside
    /// the plausible sensor range.
    pub fn new(
        millidegrees: i64,
        unit: TemperatureUnit,
        source: impl Into<String>,
    ) -> Result<Self, SensorReadError> {
        let source = source.into();
        let (min, max) = match unit {
            TemperatureUnit::Celsius => (PLAUSIBLE_MIN_MILLI_C, PLAUSIBLE_MAX_MILLI_C),
            TemperatureUnit::Fahrenheit => (
                milli_c_to_milli_f(PLAUSIBLE_MIN_MILLI_C),
                milli_c_to_milli_f(PLAUSIBLE_MAX_MILLI_C),
            ),
        };
        if !(min..=max).contains(&millidegrees) {
            let celsius = match unit {
                TemperatureUnit::Celsius => millidegrees,
                TemperatureUnit::Fahrenheit => {
                    millidegrees.saturating_sub(32_000).saturating_mul(5) / 9
                }
            };
            return Err(SensorReadError::Implausible {
                source_name: source,
                millidegrees: celsius,
            });
        }

        Ok(Self {
            // Range check above keeps this well inside i32.
            millidegrees: millidegrees as i32,
            unit,
            source,
            captured_at: SystemTime::now(),
        })
    }

    pub fn celsius(millidegrees: i64, source: impl Into<String>) -> Result<Self, SensorReadError> {
        Self::new(millidegrees, TemperatureUnit::Celsius, source)
    }

    pub fn millidegrees(&self) -> i32 {
        self.millidegrees
    }

    pub fn unit(&self) -> TemperatureUnit {
        self.unit
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn captured_at(&self) -> SystemTime {
        self.captured_at
    }
}

impl fmt::Display for TemperatureSample {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}: {:.1}{}",
            self.source,
            f64::from(self.millidegrees) / 1000.0,
            self.unit.symbol()
        )
    }
}

/// One temperature input visible to a backend.
#[derive(Debug, Clone, PartialEq)]
pub struct SensorListing {
    pub chip: String,
    pub label: String,
    pub celsius: f64,
}

impl SensorListing {
    /// Whether `source` would select this input.
    pub fn matches(&self, source: &str) -> bool {
        source_matches(&self.chip, source)
    }
}

/// Case-insensitive substring match used by every backend.
pub fn source_matches(chip: &str, source: &str) -> bool {
    chip.to_lowercase().contains(&source.to_lowercase())
}

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait SensorReader: Send + Sync {
    /// Reads the first temperature input of the first chip matching `source`.
    async fn read(&self, source: &str) -> Result<TemperatureSample, SensorReadError>;

    fn backend_name(&self) -> &'static str;

    /// Every temperature input this backend can see.
    fn list(&self) -> Vec<SensorListing> {
        Vec::new()
    }
}
