//! mDNS advertisement for the control API.
//!
//! Registers `<hostname>.local` and an `_http._tcp` service on the HTTP
//! port with TXT records for firmware version and device ID. No-op on
//! simulation targets.
//!
//! Start after the station has an IP address. The provisioning portal
//! tears the station down, so the loop restarts advertisement when it
//! rejoins.

use log::info;

use crate::adapters::device_id::DeviceIdentity;

const MDNS_SERVICE_TYPE: &str = "_http";
const MDNS_INSTANCE_NAME: &str = "Chime";

pub struct MdnsAdapter {
    identity: DeviceIdentity,
    port: u16,
    active: bool,
}

impl MdnsAdapter {
    pub fn new(identity: DeviceIdentity, port: u16) -> Self {
        Self {
            identity,
            port,
            active: false,
        }
    }

    pub fn is_active(&self) -> bool {
        self.active
    }

    pub fn start(&mut self) {
        if self.active {
            return;
        }
        self.platform_start();
        self.active = true;
        info!(
            "mDNS: advertising {}.local {}._tcp:{} (device={})",
            self.identity.hostname, MDNS_SERVICE_TYPE, self.port, self.identity.device_id
        );
    }

    pub fn stop(&mut self) {
        if !self.active {
            return;
        }
        self.platform_stop();
        self.active = false;
        info!("mDNS: stopped");
    }

    /// Stop then start, used after the station reconnects.
    pub fn restart(&mut self) {
        self.stop();
        self.start();
    }

    // ── Platform-specific ─────────────────────────────────────

    #[cfg(target_os = "espidf")]
    fn platform_start(&self) {
        use esp_idf_svc::sys::*;

        let hostname = c_string::<32>(&self.identity.hostname);
        let device_id = c_string::<24>(&self.identity.device_id);
        let version = concat!(env!("CARGO_PKG_VERSION"), "\0");
        let svc_type = b"_http\0";
        let svc_proto = b"_tcp\0";

        // SAFETY: every pointer refers to a NUL-terminated buffer that
        // outlives the call; mDNS copies the strings it keeps.
        unsafe {
            let ret = mdns_init();
            if ret != ESP_OK {
                log::error!("mDNS: mdns_init failed ({})", ret);
                return;
            }
            mdns_hostname_set(hostname.as_ptr() as *const _);
            mdns_instance_name_set(b"Chime\0".as_ptr() as *const _);
            mdns_service_add(
                b"Chime\0".as_ptr() as *const _,
                svc_type.as_ptr() as *const _,
                svc_proto.as_ptr() as *const _,
                self.port,
                core::ptr::null_mut(),
                0,
            );
            mdns_service_txt_item_set(
                svc_type.as_ptr() as *const _,
                svc_proto.as_ptr() as *const _,
                b"version\0".as_ptr() as *const _,
                version.as_ptr() as *const _,
            );
            mdns_service_txt_item_set(
                svc_type.as_ptr() as *const _,
                svc_proto.as_ptr() as *const _,
                b"id\0".as_ptr() as *const _,
                device_id.as_ptr() as *const _,
            );
        }
    }

    #[cfg(not(target_os = "espidf"))]
    fn platform_start(&self) {
        info!(
            "mDNS(sim): registered {} on {}.local v={}",
            MDNS_INSTANCE_NAME,
            self.identity.hostname,
            self.identity.firmware
        );
    }

    #[cfg(target_os = "espidf")]
    fn platform_stop(&self) {
        // SAFETY: only called after a successful start.
        unsafe {
            esp_idf_svc::sys::mdns_free();
        }
    }

    #[cfg(not(target_os = "espidf"))]
    fn platform_stop(&self) {
        info!("mDNS(sim): unregistered {}", MDNS_INSTANCE_NAME);
    }
}

/// Copy `s` into a NUL-terminated buffer, truncating to `N - 1` bytes.
#[cfg(target_os = "espidf")]
fn c_string<const N: usize>(s: &str) -> [u8; N] {
    let mut buf = [0u8; N];
    let len = s.len().min(N - 1);
    buf[..len].copy_from_slice(&s.as_bytes()[..len]);
    buf
}
