//! # ocypus_lcdd
//!
//! A Linux daemon that shows a temperature sensor reading on the LCD of the
//! Ocypus Iota L36 liquid cooler.
//!
//! ## Architecture
//!
//! One [`PollLoop`](poll_loop::PollLoop) task owns everything:
//! - a [`SensorReader`](sensors::SensorReader) backed by lm-sensors or sysfs hwmon
//! - a [`FrameEncoder`](drivers::ocypus::FrameEncoder) turning samples into 64-byte reports
//! - a [`DisplayTransport`](drivers::ocypus::DisplayTransport) holding the single HID handle
//!
//! Each interval the loop samples, encodes and writes. A lost device is
//! reopened on the next cycle, and a cancellation token ends the loop.
//!
//! ## Example
//!
//! ```no_run
//! use ocypus_lcdd::{
//!     application::Application,
//!     config::{Config, ConfigOverrides, DaemonConfig},
//! };
//!
//! #[tokio::main(flavor = "current_thread")]
//! async fn main() -> anyhow::Result<()> {
//!     let config = DaemonConfig::resolve(Config::load(None)?, &ConfigOverrides::default())?;
//!     Application::builder()
//!         .with_config(config)
//!         .build()?
//!         .run()
//!         .await?;
//!     Ok(())
//! }
//! ```

pub mod application;
pub mod cli;
pub mod config;
pub mod drivers;
pub mod error;
pub mod logging;
pub mod poll_loop;
pub mod sensors;
pub mod temperature_sensors;
