//! Interface selection for the display device.
//!
//! The cooler enumerates as a keyboard-class product with several HID
//! interfaces under one VID:PID; only one of them accepts display reports.

use std::collections::BTreeMap;

use super::device_io::InterfaceInfo;

/// Usage pages at or above this value are vendor-defined.
pub const VENDOR_USAGE_PAGE: u16 = 0xFF00;

/// How `open` should pick an interface.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceSelector {
    pub vendor_id: u16,
    pub product_id: u16,
    pub interface: Option<i32>,
    pub path: Option<String>,
}

/// Drops duplicate enumeration entries (same interface and path).
pub fn unique_interfaces(infos: Vec<InterfaceInfo>) -> Vec<InterfaceInfo> {
    let mut uniq = BTreeMap::new();
    for info in infos {
        uniq.insert((info.interface_number, info.path.clone()), info);
    }
    uniq.into_values().collect()
}

/// Orders candidates for probing: vendor usage page first, then higher
/// interface numbers.
pub fn ranked_candidates(infos: Vec<InterfaceInfo>) -> Vec<InterfaceInfo> {
    let mut candidates = unique_interfaces(infos);
    candidates.sort_by_key(|info| {
        std::cmp::Reverse((info.usage_page >= VENDOR_USAGE_PAGE, info.interface_number))
    });
    candidates
}

#[cfg(test)]
pub(crate) fn fake_interface(number: i32, usage_page: u16, path: &str) -> InterfaceInfo {
    InterfaceInfo {
        path: path.to_string(),
        vendor_id: super::VID,
        product_id: super::PID,
        interface_number: number,
        usage_page,
        usage: 1,
        product: Some("Ocypus L36".to_string()),
    }
}
