//! Direct sysfs hwmon reader, used when libsensors is missing.

use std::{
    fs, io,
    path::{Path, PathBuf},
};

use async_trait::async_trait;

use crate::{
    error::SensorReadError,
    sensors::{SensorListing, SensorReader, TemperatureSample, source_matches},
};

pub const HWMON_ROOT: &str = "/sys/class/hwmon";

const BACKEND: &str = "hwmon";

pub struct HwmonSource {
    root: PathBuf,
}

impl HwmonSource {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn system() -> Self {
        Self::new(HWMON_ROOT)
    }

    /// `(name, directory)` of every hwmon chip, ordered by directory.
    fn chips(&self) -> io::Result<Vec<(String, PathBuf)>> {
        let mut dirs: Vec<PathBuf> = fs::read_dir(&self.root)?
            .filter_map(|entry| entry.ok().map(|e| e.path()))
            .collect();
        dirs.sort();

        Ok(dirs
            .into_iter()
            .filter_map(|dir| {
                let name = fs::read_to_string(dir.join("name")).ok()?;
                Some((name.trim().to_string(), dir))
            })
            .collect())
    }

    fn unavailable(&self, e: &io::Error) -> SensorReadError {
        SensorReadError::Unavailable {
            backend: BACKEND,
            reason: format!("{}: {e}", self.root.display()),
        }
    }
}

/// `tempN_input` files of one chip, ordered by N.
fn temp_inputs(dir: &Path) -> Vec<(u32, PathBuf)> {
    let Ok(entries) = fs::read_dir(dir) else {
        return Vec::new();
    };
    let mut inputs: Vec<(u32, PathBuf)> = entries
        .filter_map(|entry| {
            let entry = entry.ok()?;
            let file_name = entry.file_name();
            let index = file_name
                .to_str()?
                .strip_prefix("temp")?
                .strip_suffix("_input")?
                .parse()
                .ok()?;
            Some((index, entry.path()))
        })
        .collect();
    inputs.sort();
    inputs
}

fn read_millidegrees(path: &Path) -> Result<i64, SensorReadError> {
    let raw = fs::read_to_string(path).map_err(|e| SensorReadError::Unavailable {
        backend: BACKEND,
        reason: format!("{}: {e}", path.display()),
    })?;
    raw.trim()
        .parse()
        .map_err(|e| SensorReadError::Unavailable {
            backend: BACKEND,
            reason: format!("{}: {e}", path.display()),
        })
}

#[async_trait]
impl SensorReader for HwmonSource {
    async fn read(&self, source: &str) -> Result<TemperatureSample, SensorReadError> {
        let chips = self.chips().map_err(|e| self.unavailable(&e))?;

        for (name, dir) in chips {
            if !source_matches(&name, source) {
                continue;
            }
            if let Some((_, input)) = temp_inputs(&dir).into_iter().next() {
                return TemperatureSample::celsius(read_millidegrees(&input)?, name);
            }
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
        let Ok(chips) = self.chips() else {
            return Vec::new();
        };

        chips
            .into_iter()
            .flat_map(|(name, dir)| {
                temp_inputs(&dir)
                    .into_iter()
                    .filter_map(move |(index, path)| {
                        let millis = read_millidegrees(&path).ok()?;
                        let label = fs::read_to_string(dir.join(format!("temp{index}_label")))
                            .map(|l| l.trim().to_string())
                            .unwrap_or_else(|_| format!("temp{index}"));
                        Some(SensorListing {
                            chip: name.clone(),
                            label,
                            celsius: millis as f64 / 1000.0,
                        })
                    })
            })
            .collect()
    }
}
