//! Ocypus Iota L36 liquid cooler LCD.
//!
//! The panel is driven through 64-byte HID output reports written to one of
//! the interfaces exposed under a single VID:PID.
//!
//! # Example
//!
//! ```no_run
//! use ocypus_lcdd::drivers::ocypus::{
//!     DisplayTransport, FrameEncoder, HidTransport, selector,
//! };
//! use ocypus_lcdd::sensors::{TemperatureSample, TemperatureUnit};
//!
//! # fn example() -> anyhow::Result<()> {
//! let encoder = FrameEncoder::default();
//! let mut transport = HidTransport::system(encoder)?;
//! transport.open(&selector(None, None))?;
//!
//! let sample = TemperatureSample::celsius(45_000, "k10temp")?;
//! transport.write(&encoder.encode(&sample, TemperatureUnit::Celsius))?;
//! transport.close();
//! # Ok(())
//! # }
//! ```

pub mod device_io;
pub mod discovery;
pub mod protocol;
pub mod transport;

pub use discovery::DeviceSelector;
pub use protocol::{FrameEncoder, OutputReport, ProtocolRevision, ReportLayout};
pub use transport::{DeviceHandle, DisplayTransport, HidTransport, TransportState};

/// Ocypus vendor ID.
pub const VID: u16 = 0x1A2C;
/// Iota L36 display controller product ID.
pub const PID: u16 = 0x434D;

/// Selector for the L36 with optional overrides.
pub fn selector(interface: Option<i32>, path: Option<String>) -> DeviceSelector {
    DeviceSelector {
        vendor_id: VID,
        product_id: PID,
        interface,
        path,
    }
}
