use std::{ffi::CString, io};

use hidapi::{HidApi, HidDevice, HidError};

/// Write side of an open HID interface.
pub trait DeviceIO {
    fn write(&self, buf: &[u8]) -> Result<usize, String>;
}

impl DeviceIO for HidDevice {
    fn write(&self, buf: &[u8]) -> Result<usize, String> {
        Self::write(self, buf).map_err(|e| e.to_string())
    }
}

/// One enumerated HID interface.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InterfaceInfo {
    pub path: String,
    pub vendor_id: u16,
    pub product_id: u16,
    pub interface_number: i32,
    pub usage_page: u16,
    pub usage: u16,
    pub product: Option<String>,
}

/// Why a path could not be opened.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OpenFailure {
    pub path: String,
    pub permission_denied: bool,
    pub message: String,
}

/// Enumeration and open access to the host's HID devices.
pub trait HidBackend {
    type Device: DeviceIO;

    /// Re-reads the device list so replugged devices become visible.
    fn refresh(&mut self) -> Result<(), String>;

    fn interfaces(&self, vendor_id: u16, product_id: u16) -> Vec<InterfaceInfo>;

    fn open_path(&self, path: &str) -> Result<Self::Device, OpenFailure>;
}

impl HidBackend for HidApi {
    type Device = HidDevice;

    fn refresh(&mut self) -> Result<(), String> {
        self.refresh_devices().map_err(|e| e.to_string())
    }

    fn interfaces(&self, vendor_id: u16, product_id: u16) -> Vec<InterfaceInfo> {
        self.device_list()
            .filter(|d| d.vendor_id() == vendor_id && d.product_id() == product_id)
            .map(|d| InterfaceInfo {
                path: d.path().to_string_lossy().into_owned(),
                vendor_id: d.vendor_id(),
                product_id: d.product_id(),
                interface_number: d.interface_number(),
                usage_page: d.usage_page(),
                usage: d.usage(),
                product: d.product_string().map(str::to_owned),
            })
            .collect()
    }

    fn open_path(&self, path: &str) -> Result<HidDevice, OpenFailure> {
        let failure = |permission_denied: bool, message: String| OpenFailure {
            path: path.to_string(),
            permission_denied,
            message,
        };
        let c_path = CString::new(path)
            .map_err(|_| failure(false, "path contains a NUL byte".to_string()))?;

        HidApi::open_path(self, c_path.as_c_str()).map_err(|e| {
            let permission_denied = is_permission_denied(&e);
            failure(permission_denied, e.to_string())
        })
    }
}

fn is_permission_denied(err: &HidError) -> bool {
    match err {
        HidError::IoError { error, .. } if error.kind() == io::ErrorKind::PermissionDenied => true,
        other => message_says_denied(&other.to_string()),
    }
}

fn message_says_denied(message: &str) -> bool {
    let message = message.to_lowercase();
    message.contains("permission denied") || message.contains("access is denied")
}
