use anyhow::{Context, Result};
use hidapi::HidApi;
use log::{debug, info, warn};

use crate::error::{OpenError, WriteFailure};

use super::{
    PID, VID,
    device_io::{DeviceIO, HidBackend, InterfaceInfo, OpenFailure},
    discovery::{DeviceSelector, ranked_candidates, unique_interfaces},
    protocol::{FrameEncoder, OutputReport},
};

/// The connection currently held by a transport.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceHandle {
    pub vendor_id: u16,
    pub product_id: u16,
    /// Interface index as reported by hidapi; -1 when unknown.
    pub interface_number: i32,
    pub path: String,
    pub product: Option<String>,
}

impl DeviceHandle {
    fn from_info(info: &InterfaceInfo) -> Self {
        Self {
            vendor_id: info.vendor_id,
            product_id: info.product_id,
            interface_number: info.interface_number,
            path: info.path.clone(),
            product: info.product.clone(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportState {
    Unopened,
    Open,
    Disconnected,
}

/// Lifecycle of the single display connection.
pub trait DisplayTransport {
    /// Opens the display interface; a no-op when already open.
    fn open(&mut self, selector: &DeviceSelector) -> Result<(), OpenError>;

    /// Sends one report. Any failure leaves the transport `Disconnected`.
    fn write(&mut self, report: &OutputReport) -> Result<(), WriteFailure>;

    /// Releases the handle. Safe in every state.
    fn close(&mut self);

    fn state(&self) -> TransportState;

    fn handle(&self) -> Option<&DeviceHandle>;
}

enum Link<D> {
    Unopened,
    Open { device: D, handle: DeviceHandle },
    Disconnected { last: DeviceHandle },
}

/// [`DisplayTransport`] over a HID backend.
pub struct HidTransport<B: HidBackend> {
    backend: B,
    encoder: FrameEncoder,
    link: Link<B::Device>,
}

impl HidTransport<HidApi> {
    /// Transport over the system hidapi context.
    pub fn system(encoder: FrameEncoder) -> Result<Self> {
        let api = HidApi::new().context("hidapi init")?;
        Ok(Self::with_backend(api, encoder))
    }
}

impl<B: HidBackend> HidTransport<B> {
    pub fn with_backend(backend: B, encoder: FrameEncoder) -> Self {
        Self {
            backend,
            encoder,
            link: Link::Unopened,
        }
    }

    /// Interfaces currently exposed by the display device.
    pub fn list_interfaces(&mut self) -> Result<Vec<InterfaceInfo>, OpenError> {
        self.refresh()?;
        Ok(unique_interfaces(self.backend.interfaces(VID, PID)))
    }

    /// Handle of the connection lost by the last failed write.
    pub fn last_disconnected(&self) -> Option<&DeviceHandle> {
        match &self.link {
            Link::Disconnected { last } => Some(last),
            _ => None,
        }
    }

    fn refresh(&mut self) -> Result<(), OpenError> {
        self.backend
            .refresh()
            .map_err(|e| OpenError::DeviceNotFound {
                reason: format!("HID enumeration failed: {e}"),
            })
    }

    fn attach(&mut self, device: B::Device, handle: DeviceHandle) {
        info!(
            "Connected to display on interface {} ({})",
            handle.interface_number, handle.path
        );
        self.link = Link::Open { device, handle };
    }

    fn open_forced_path(
        &mut self,
        path: &str,
        infos: &[InterfaceInfo],
        selector: &DeviceSelector,
    ) -> Result<(), OpenError> {
        let device = self.backend.open_path(path).map_err(open_error)?;
        let handle = infos
            .iter()
            .find(|info| info.path == path)
            .map(DeviceHandle::from_info)
            .unwrap_or_else(|| DeviceHandle {
                vendor_id: selector.vendor_id,
                product_id: selector.product_id,
                interface_number: -1,
                path: path.to_string(),
                product: None,
            });
        self.attach(device, handle);
        Ok(())
    }

    fn open_forced_interface(
        &mut self,
        number: i32,
        infos: Vec<InterfaceInfo>,
    ) -> Result<(), OpenError> {
        let info = unique_interfaces(infos)
            .into_iter()
            .find(|info| info.interface_number == number)
            .ok_or_else(|| OpenError::DeviceNotFound {
                reason: format!("device does not expose interface {number}"),
            })?;
        let device = self.backend.open_path(&info.path).map_err(open_error)?;
        self.attach(device, DeviceHandle::from_info(&info));
        Ok(())
    }

    fn open_probed(&mut self, infos: Vec<InterfaceInfo>) -> Result<(), OpenError> {
        let probe = self.encoder.probe();
        let mut denied_path = None;
        let mut last_error = None;

        for info in ranked_candidates(infos) {
            let device = match self.backend.open_path(&info.path) {
                Ok(device) => device,
                Err(failure) => {
                    if failure.permission_denied && denied_path.is_none() {
                        denied_path = Some(failure.path.clone());
                    }
                    last_error = Some(format!("{}: {}", failure.path, failure.message));
                    continue;
                }
            };

            match device.write(probe.as_bytes()) {
                Ok(n) if n > 0 => {
                    self.attach(device, DeviceHandle::from_info(&info));
                    return Ok(());
                }
                Ok(n) => last_error = Some(format!("{}: probe wrote {n} bytes", info.path)),
                Err(e) => last_error = Some(format!("{}: {e}", info.path)),
            }

            debug!(
                "Interface {} (usage_page={:#06x}) rejected probe",
                info.interface_number, info.usage_page
            );
        }

        Err(match denied_path {
            Some(path) => OpenError::PermissionDenied { path },
            None => OpenError::DeviceNotFound {
                reason: format!(
                    "no interface accepted a display report ({})",
                    last_error.unwrap_or_else(|| "no candidates".to_string())
                ),
            },
        })
    }
}

impl<B: HidBackend> DisplayTransport for HidTransport<B> {
    fn open(&mut self, selector: &DeviceSelector) -> Result<(), OpenError> {
        if matches!(self.link, Link::Open { .. }) {
            return Ok(());
        }

        self.refresh()?;
        let infos = self.backend.interfaces(selector.vendor_id, selector.product_id);

        if let Some(path) = &selector.path {
            return self.open_forced_path(path, &infos, selector);
        }

        if infos.is_empty() {
            return Err(OpenError::DeviceNotFound {
                reason: format!(
                    "no HID device {:04x}:{:04x}",
                    selector.vendor_id, selector.product_id
                ),
            });
        }

        match selector.interface {
            Some(number) => self.open_forced_interface(number, infos),
            None => self.open_probed(infos),
        }
    }

    fn write(&mut self, report: &OutputReport) -> Result<(), WriteFailure> {
        let Link::Open { device, .. } = &self.link else {
            return Err(WriteFailure("device not open".to_string()));
        };

        let reason = match device.write(report.as_bytes()) {
            Ok(n) if n > 0 => return Ok(()),
            Ok(n) => format!("short write ({n} bytes)"),
            Err(e) => e,
        };

        if let Link::Open { handle, .. } = std::mem::replace(&mut self.link, Link::Unopened) {
            warn!(
                "Display on interface {} disconnected: {reason}",
                handle.interface_number
            );
            self.link = Link::Disconnected { last: handle };
        }
        Err(WriteFailure(reason))
    }

    fn close(&mut self) {
        if let Link::Open { handle, .. } = &self.link {
            info!("Closing display on interface {}", handle.interface_number);
        }
        self.link = Link::Unopened;
    }

    fn state(&self) -> TransportState {
        match self.link {
            Link::Unopened => TransportState::Unopened,
            Link::Open { .. } => TransportState::Open,
            Link::Disconnected { .. } => TransportState::Disconnected,
        }
    }

    fn handle(&self) -> Option<&DeviceHandle> {
        match &self.link {
            Link::Open { handle, .. } => Some(handle),
            _ => None,
        }
    }
}

fn open_error(failure: OpenFailure) -> OpenError {
    if failure.permission_denied {
        OpenError::PermissionDenied { path: failure.path }
    } else {
        OpenError::DeviceNotFound {
            reason: format!("{}: {}", failure.path, failure.message),
        }
    }
}


#[cfg(test)]
mod tests {
    use super::testing::FakeBackend;
    use super::*;
    use crate::{
        drivers::ocypus::discovery::fake_interface,
        sensors::{TemperatureSample, TemperatureUnit},
    };
    use pretty_assertions::assert_eq;

    fn auto_selector() -> DeviceSelector {
        DeviceSelector {
            vendor_id: VID,
            product_id: PID,
            interface: None,
            path: None,
        }
    }

    fn report() -> OutputReport {
        FrameEncoder::default().encode(
            &TemperatureSample::celsius(45_000, "k10temp").unwrap(),
            TemperatureUnit::Celsius,
        )
    }

    fn l36_bus() -> FakeBackend {
        FakeBackend::with_interfaces(vec![
            fake_interface(0, 0x0001, "/dev/hidraw0"),
            fake_interface(1, 0xFF00, "/dev/hidraw1"),
        ])
    }

    #[test]
    fn open_without_device_is_not_found() {
        let backend = FakeBackend::default();
        let mut transport = HidTransport::with_backend(backend.clone(), FrameEncoder::default());

        let err = transport.open(&auto_selector()).unwrap_err();

        assert!(matches!(err, OpenError::DeviceNotFound { .. }));
        assert_eq!(transport.state(), TransportState::Unopened);
        assert_eq!(backend.bus().refreshes, 1);
    }

    #[test]
    fn auto_selection_prefers_vendor_interface() {
        let backend = l36_bus();
        let mut transport = HidTransport::with_backend(backend.clone(), FrameEncoder::default());

        transport.open(&auto_selector()).unwrap();

        assert_eq!(transport.state(), TransportState::Open);
        assert_eq!(transport.handle().unwrap().interface_number, 1);
        let bus = backend.bus();
        assert_eq!(bus.opened, vec!["/dev/hidraw1".to_string()]);
        assert_eq!(bus.writes[0].1, FrameEncoder::default().probe().as_bytes());
    }

    #[test]
    fn auto_selection_skips_interfaces_rejecting_probe() {
        let backend = l36_bus();
        backend.bus().rejecting.push("/dev/hidraw1".to_string());
        let mut transport = HidTransport::with_backend(backend.clone(), FrameEncoder::default());

        transport.open(&auto_selector()).unwrap();

        assert_eq!(transport.handle().unwrap().interface_number, 0);
        assert_eq!(
            backend.bus().opened,
            vec!["/dev/hidraw1".to_string(), "/dev/hidraw0".to_string()]
        );
    }

    #[test]
    fn forced_interface_is_used_verbatim() {
        let backend = l36_bus();
        let mut transport = HidTransport::with_backend(backend.clone(), FrameEncoder::default());
        let selector = DeviceSelector {
            interface: Some(0),
            ..auto_selector()
        };

        transport.open(&selector).unwrap();

        assert_eq!(transport.handle().unwrap().interface_number, 0);
        let bus = backend.bus();
        assert_eq!(bus.opened, vec!["/dev/hidraw0".to_string()]);
        assert!(bus.writes.is_empty(), "forced interface must not be probed");
    }

    #[test]
    fn forced_interface_one_bypasses_ranking() {
        let backend = FakeBackend::with_interfaces(vec![
            fake_interface(1, 0x0001, "/dev/hidraw1"),
            fake_interface(2, 0xFF00, "/dev/hidraw2"),
        ]);
        let mut transport = HidTransport::with_backend(backend.clone(), FrameEncoder::default());
        let selector = DeviceSelector {
            interface: Some(1),
            ..auto_selector()
        };

        transport.open(&selector).unwrap();

        assert_eq!(transport.handle().unwrap().interface_number, 1);
        assert_eq!(backend.bus().opened, vec!["/dev/hidraw1".to_string()]);
    }

    #[test]
    fn forced_interface_missing_is_not_found() {
        let mut transport = HidTransport::with_backend(l36_bus(), FrameEncoder::default());
        let selector = DeviceSelector {
            interface: Some(4),
            ..auto_selector()
        };

        let err = transport.open(&selector).unwrap_err();

        assert!(err.to_string().contains("interface 4"));
        assert_eq!(transport.state(), TransportState::Unopened);
    }

    #[test]
    fn forced_path_is_opened_directly() {
        let backend = l36_bus();
        let mut transport = HidTransport::with_backend(backend.clone(), FrameEncoder::default());
        let selector = DeviceSelector {
            path: Some("/dev/hidraw0".to_string()),
            interface: Some(1),
            ..auto_selector()
        };

        transport.open(&selector).unwrap();

        assert_eq!(transport.handle().unwrap().path, "/dev/hidraw0");
        assert_eq!(backend.bus().opened, vec!["/dev/hidraw0".to_string()]);
    }

    #[test]
    fn permission_refusal_is_reported() {
        let backend = l36_bus();
        {
            let mut bus = backend.bus();
            bus.denied.push("/dev/hidraw1".to_string());
            bus.denied.push("/dev/hidraw0".to_string());
        }
        let mut transport = HidTransport::with_backend(backend, FrameEncoder::default());

        let err = transport.open(&auto_selector()).unwrap_err();

        assert_eq!(
            err,
            OpenError::PermissionDenied {
                path: "/dev/hidraw1".to_string()
            }
        );
    }

    #[test]
    fn write_failure_disconnects() {
        let backend = l36_bus();
        let mut transport = HidTransport::with_backend(backend.clone(), FrameEncoder::default());
        transport.open(&auto_selector()).unwrap();

        transport.write(&report()).unwrap();
        backend.bus().interfaces.clear();
        let err = transport.write(&report()).unwrap_err();

        assert!(err.to_string().contains("Broken pipe"));
        assert_eq!(transport.state(), TransportState::Disconnected);
        assert_eq!(transport.last_disconnected().unwrap().interface_number, 1);
        assert!(transport.handle().is_none());
    }

    #[test]
    fn write_while_not_open_never_touches_device() {
        let backend = l36_bus();
        let mut transport = HidTransport::with_backend(backend.clone(), FrameEncoder::default());

        assert!(transport.write(&report()).is_err());
        assert_eq!(transport.state(), TransportState::Unopened);
        assert!(backend.bus().writes.is_empty());
    }

    #[test]
    fn reopen_after_replug() {
        let backend = l36_bus();
        let mut transport = HidTransport::with_backend(backend.clone(), FrameEncoder::default());
        transport.open(&auto_selector()).unwrap();

        let saved = std::mem::take(&mut backend.bus().interfaces);
        assert!(transport.write(&report()).is_err());
        assert!(transport.open(&auto_selector()).is_err());
        assert_eq!(transport.state(), TransportState::Disconnected);

        backend.bus().interfaces = saved;
        transport.open(&auto_selector()).unwrap();
        transport.write(&report()).unwrap();
        assert_eq!(transport.state(), TransportState::Open);
    }

    #[test]
    fn open_twice_keeps_single_handle() {
        let backend = l36_bus();
        let mut transport = HidTransport::with_backend(backend.clone(), FrameEncoder::default());

        transport.open(&auto_selector()).unwrap();
        transport.open(&auto_selector()).unwrap();

        assert_eq!(backend.bus().opened.len(), 1);
    }

    #[test]
    fn close_is_idempotent() {
        let mut transport = HidTransport::with_backend(l36_bus(), FrameEncoder::default());
        transport.close();
        assert_eq!(transport.state(), TransportState::Unopened);

        transport.open(&auto_selector()).unwrap();
        transport.close();
        transport.close();
        assert_eq!(transport.state(), TransportState::Unopened);
    }

    #[test]
    fn list_interfaces_deduplicates() {
        let backend = l36_bus();
        backend
            .bus()
            .interfaces
            .push(fake_interface(1, 0xFF00, "/dev/hidraw1"));
        let mut transport = HidTransport::with_backend(backend, FrameEncoder::default());

        assert_eq!(transport.list_interfaces().unwrap().len(), 2);
    }
}
