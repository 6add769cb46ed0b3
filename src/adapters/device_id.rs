//! Device identity derived from the ESP32 factory MAC address.
//!
//! Produces a stable, human-readable device ID in the form `CH-XXYYZZ`
//! (last 3 bytes of the 6-byte MAC in uppercase hex). The ID is
//! deterministic across reboots and is reported by the settings route.
//! The lowercase form doubles as the mDNS hostname (`chime-xxyyzz.local`)
//! and the provisioning access point SSID.

use core::fmt::Write;

use serde::Serialize;

/// Fixed-size device ID string: "CH-XXYYZZ".
pub type DeviceIdString = heapless::String<16>;

/// Hostname / AP SSID string: "chime-xxyyzz".
pub type HostnameString = heapless::String<24>;

/// Full 6-byte MAC address.
pub type MacAddress = [u8; 6];

/// Read the factory MAC address from eFuse.
#[cfg(target_os = "espidf")]
pub fn read_mac() -> MacAddress {
    let mut mac: MacAddress = [0u8; 6];
    unsafe {
        esp_idf_svc::sys::esp_efuse_mac_get_default(mac.as_mut_ptr());
    }
    mac
}

/// Simulation: returns a deterministic fake MAC.
#[cfg(not(target_os = "espidf"))]
pub fn read_mac() -> MacAddress {
    [0xDE, 0xAD, 0xBE, 0xEF, 0xCA, 0xFE]
}

pub fn device_id(mac: &MacAddress) -> DeviceIdString {
    let mut id = DeviceIdString::new();
    let _ = write!(id, "CH-{:02X}{:02X}{:02X}", mac[3], mac[4], mac[5]);
    id
}

pub fn hostname(mac: &MacAddress) -> HostnameString {
    let mut name = HostnameString::new();
    let _ = write!(name, "chime-{:02x}{:02x}{:02x}", mac[3], mac[4], mac[5]);
    name
}

/// Identity block of the settings report.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DeviceIdentity {
    pub device_id: DeviceIdString,
    pub hostname: HostnameString,
    pub firmware: &'static str,
}

impl DeviceIdentity {
    pub fn from_mac(mac: &MacAddress) -> Self {
        Self {
            device_id: device_id(mac),
            hostname: hostname(mac),
            firmware: env!("CARGO_PKG_VERSION"),
        }
    }
}
