//! Error kinds shared by the sensor, transport and configuration layers.

use thiserror::Error;

/// Stable process exit codes.
pub mod exit_code {
    pub const SUCCESS: u8 = 0;
    pub const GENERAL: u8 = 1;
    pub const CONFIG: u8 = 2;
    pub const DEVICE_NOT_FOUND: u8 = 3;
    pub const PERMISSION_DENIED: u8 = 4;
}

/// Failure to obtain a temperature from a sensor source.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SensorReadError {
    #[error("no temperature sensor matching '{source_name}' ({backend})")]
    SourceNotFound {
        source_name: String,
        backend: &'static str,
    },

    #[error("sensor backend {backend} unavailable: {reason}")]
    Unavailable {
        backend: &'static str,
        reason: String,
    },

    #[error("implausible reading {millidegrees} m°C from '{source_name}'")]
    Implausible {
        source_name: String,
        millidegrees: i64,
    },
}

/// Failure to open the display interface.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum OpenError {
    #[error("display device not found: {reason}")]
    DeviceNotFound { reason: String },

    #[error("permission denied opening {path}")]
    PermissionDenied { path: String },
}

impl OpenError {
    pub fn exit_code(&self) -> u8 {
        match self {
            OpenError::DeviceNotFound { .. } => exit_code::DEVICE_NOT_FOUND,
            OpenError::PermissionDenied { .. } => exit_code::PERMISSION_DENIED,
        }
    }
}

/// A report could not be delivered; the link is treated as gone.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("report write failed: {0}")]
pub struct WriteFailure(pub String);

/// Invalid resolved configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("poll rate must be a positive number of seconds, got {0}")]
    InvalidRate(i64),

    #[error("max_open_retries must be at least 1 when set")]
    ZeroRetryBound,

    #[error("interface index must be non-negative, got {0}")]
    InvalidInterface(i64),

    #[error("device path contains a NUL byte")]
    InvalidDevicePath,

    #[error("unsupported config version {0}")]
    UnsupportedVersion(u8),

    #[error("sensor name must not be empty")]
    EmptySensor,

    #[error("unknown log level '{0}'")]
    InvalidLogLevel(String),

    #[error("failed to load configuration: {0:#}")]
    Load(#[from] anyhow::Error),
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn open_errors_map_to_distinct_exit_codes() {
        let missing = OpenError::DeviceNotFound {
            reason: "nothing enumerated".into(),
        };
        let denied = OpenError::PermissionDenied {
            path: "/dev/hidraw3".into(),
        };

        assert_eq!(missing.exit_code(), exit_code::DEVICE_NOT_FOUND);
        assert_eq!(denied.exit_code(), exit_code::PERMISSION_DENIED);
        assert_ne!(missing.exit_code(), exit_code::CONFIG);
        assert_ne!(denied.exit_code(), exit_code::CONFIG);
    }

    #[test]
    fn messages_name_the_failing_thing() {
        let err = SensorReadError::SourceNotFound {
            source_name: "k10temp".into(),
            backend: "hwmon",
        };
        assert!(err.to_string().contains("k10temp"));

        let err = OpenError::PermissionDenied {
            path: "/dev/hidraw3".into(),
        };
        assert!(err.to_string().contains("/dev/hidraw3"));
    }
}
