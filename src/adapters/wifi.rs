//! WiFi adapter: station mode for normal operation, access point mode for
//! the provisioning portal.
//!
//! ## cfg gating
//!
//! - **`target_os = "espidf"`**: [`WifiManager`] drives the ESP-IDF WiFi
//!   driver through `esp_idf_svc::wifi::BlockingWifi`. The driver persists
//!   the station configuration in NVS, so credentials entered through the
//!   portal survive a reboot without extra storage code.
//! - **all targets**: credential validation, so the portal form parser can
//!   be tested on the host.

use core::fmt;

// ───────────────────────────────────────────────────────────────
// Errors
// ───────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectivityError {
    NoCredentials,
    InvalidSsid,
    InvalidPassword,
    ConnectionFailed,
    AccessPointFailed,
}

impl fmt::Display for ConnectivityError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NoCredentials => write!(f, "no WiFi credentials configured"),
            Self::InvalidSsid => write!(f, "SSID invalid (must be 1-32 printable ASCII bytes)"),
            Self::InvalidPassword => {
                write!(f, "password invalid (must be 8-64 bytes for WPA2, or empty for open)")
            }
            Self::ConnectionFailed => write!(f, "WiFi connection failed"),
            Self::AccessPointFailed => write!(f, "could not start the provisioning access point"),
        }
    }
}

impl core::error::Error for ConnectivityError {}

// ───────────────────────────────────────────────────────────────
// Credentials
// ───────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WifiCredentials {
    pub ssid: heapless::String<32>,
    pub password: heapless::String<64>,
}

impl WifiCredentials {
    pub fn new(ssid: &str, password: &str) -> Result<Self, ConnectivityError> {
        validate_ssid(ssid)?;
        validate_password(password)?;
        Ok(Self {
            ssid: heapless::String::try_from(ssid).map_err(|_| ConnectivityError::InvalidSsid)?,
            password: heapless::String::try_from(password)
                .map_err(|_| ConnectivityError::InvalidPassword)?,
        })
    }
}

fn is_printable_ascii(s: &str) -> bool {
    s.bytes().all(|b| (0x20..=0x7E).contains(&b))
}

fn validate_ssid(ssid: &str) -> Result<(), ConnectivityError> {
    if ssid.is_empty() || ssid.len() > 32 || !is_printable_ascii(ssid) {
        return Err(ConnectivityError::InvalidSsid);
    }
    Ok(())
}

fn validate_password(password: &str) -> Result<(), ConnectivityError> {
    if password.is_empty() {
        return Ok(());
    }
    if password.len() < 8 || password.len() > 64 {
        return Err(ConnectivityError::InvalidPassword);
    }
    Ok(())
}

// ───────────────────────────────────────────────────────────────
// ESP-IDF driver wrapper
// ───────────────────────────────────────────────────────────────

#[cfg(target_os = "espidf")]
pub use esp::{SharedWifi, WifiManager};

#[cfg(target_os = "espidf")]
mod esp {
    use core::fmt::Write;
    use std::sync::{Arc, Mutex};
    use std::time::Duration;

    use esp_idf_svc::eventloop::EspSystemEventLoop;
    use esp_idf_hal::modem::Modem;
    use esp_idf_svc::nvs::EspDefaultNvsPartition;
    use esp_idf_svc::sys::EspError;
    use esp_idf_svc::wifi::{
        AccessPointConfiguration, AuthMethod, BlockingWifi, ClientConfiguration, Configuration,
        EspWifi,
    };
    use log::{info, warn};

    use super::{ConnectivityError, WifiCredentials};
    use crate::app::ports::NetworkStatus;

    const RETRY_DELAY_MS: u64 = 2000;

    pub type SharedWifi = Arc<Mutex<WifiManager>>;

    pub struct WifiManager {
        wifi: BlockingWifi<EspWifi<'static>>,
    }

    impl WifiManager {
        pub fn new(
            modem: Modem,
            sysloop: EspSystemEventLoop,
            nvs: EspDefaultNvsPartition,
        ) -> Result<Self, EspError> {
            let esp_wifi = EspWifi::new(modem, sysloop.clone(), Some(nvs))?;
            let wifi = BlockingWifi::wrap(esp_wifi, sysloop)?;
            Ok(Self { wifi })
        }

        /// Connect with the credentials the driver stored in NVS.
        pub fn connect_stored(&mut self, attempts: u8) -> Result<(), ConnectivityError> {
            let stored = match self.wifi.get_configuration() {
                Ok(Configuration::Client(c)) | Ok(Configuration::Mixed(c, _)) => c,
                _ => return Err(ConnectivityError::NoCredentials),
            };
            if stored.ssid.is_empty() {
                return Err(ConnectivityError::NoCredentials);
            }
            let creds = WifiCredentials::new(stored.ssid.as_str(), stored.password.as_str())?;
            self.connect_with(&creds, attempts)
        }

        /// Switch to station mode and join `creds.ssid`, retrying up to
        /// `attempts` times.
        pub fn connect_with(
            &mut self,
            creds: &WifiCredentials,
            attempts: u8,
        ) -> Result<(), ConnectivityError> {
            let auth_method = if creds.password.is_empty() {
                AuthMethod::None
            } else {
                AuthMethod::WPAWPA2Personal
            };

            let _ = self.wifi.stop();
            self.wifi
                .set_configuration(&Configuration::Client(ClientConfiguration {
                    ssid: creds.ssid.clone(),
                    password: creds.password.clone(),
                    auth_method,
                    ..Default::default()
                }))
                .map_err(|_| ConnectivityError::ConnectionFailed)?;
            self.wifi
                .start()
                .map_err(|_| ConnectivityError::ConnectionFailed)?;
            info!("WiFi: connecting to '{}'", creds.ssid);

            let attempts = attempts.max(1);
            for attempt in 1..=attempts {
                match self.wifi.connect().and_then(|()| self.wifi.wait_netif_up()) {
                    Ok(()) => {
                        info!("WiFi: connected on attempt {attempt}/{attempts}");
                        return Ok(());
                    }
                    Err(e) => warn!("WiFi: attempt {attempt}/{attempts} failed: {e}"),
                }
                if attempt < attempts {
                    let _ = self.wifi.disconnect();
                    std::thread::sleep(Duration::from_millis(RETRY_DELAY_MS));
                }
            }
            let _ = self.wifi.disconnect();
            Err(ConnectivityError::ConnectionFailed)
        }

        /// Open network named `ssid` for the provisioning portal.
        pub fn start_access_point(&mut self, ssid: &str) -> Result<(), ConnectivityError> {
            let _ = self.wifi.stop();
            self.wifi
                .set_configuration(&Configuration::AccessPoint(AccessPointConfiguration {
                    ssid: ssid
                        .try_into()
                        .map_err(|_| ConnectivityError::AccessPointFailed)?,
                    auth_method: AuthMethod::None,
                    channel: 1,
                    ..Default::default()
                }))
                .map_err(|_| ConnectivityError::AccessPointFailed)?;
            self.wifi
                .start()
                .and_then(|()| self.wifi.wait_netif_up())
                .map_err(|_| ConnectivityError::AccessPointFailed)?;
            info!("WiFi: provisioning AP '{}' up", ssid);
            Ok(())
        }

        pub fn status(&self) -> NetworkStatus {
            let connected = self.wifi.is_connected().unwrap_or(false);
            let mut status = NetworkStatus {
                connected,
                ..Default::default()
            };
            if let Ok(Configuration::Client(c)) = self.wifi.get_configuration() {
                let _ = status.ssid.push_str(c.ssid.as_str());
            }
            if connected {
                if let Ok(ip) = self.wifi.wifi().sta_netif().get_ip_info() {
                    let _ = write!(status.ip, "{}", ip.ip);
                }
                let mut ap = esp_idf_svc::sys::wifi_ap_record_t::default();
                // SAFETY: `ap` is a valid out-pointer for the duration of the call.
                if unsafe { esp_idf_svc::sys::esp_wifi_sta_get_ap_info(&mut ap) }
                    == esp_idf_svc::sys::ESP_OK
                {
                    status.rssi = Some(ap.rssi);
                }
            }
            status
        }
    }
}
