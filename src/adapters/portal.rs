//! Captive provisioning portal.
//!
//! While the portal runs, the device is an open access point named after
//! its hostname and the HTTP server answers every page with a credential
//! form. The form posts to `/wifi`; the route handler parses the body and
//! hands the credentials to the blocked main loop through an
//! `embassy-sync` [`Signal`]. The loop then rejoins as a station.
//!
//! The portal never goes through the command bus: the loop that would
//! drain it is the one blocked here.

use core::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::signal::Signal;

use super::wifi::{ConnectivityError, WifiCredentials};

/// Credential form served for every page while provisioning.
pub const PORTAL_FORM: &str = "<title>Chime setup</title>\
    <h1>Connect the chime to WiFi</h1>\
    <form method=POST action=/wifi>\
    SSID <input name=ssid maxlength=32 required><br>\
    Password <input name=password type=password maxlength=64><br><br>\
    <input type=submit value=Connect>\
    </form>";

pub const PORTAL_ACK: &str = "Credentials received, connecting...";

const WAIT_POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Credentials submitted through the form, consumed by the waiting loop.
pub static PORTAL_CREDENTIALS: Signal<CriticalSectionRawMutex, WifiCredentials> = Signal::new();

static PORTAL_ACTIVE: AtomicBool = AtomicBool::new(false);

/// Whether HTTP routes should serve the portal instead of the control API.
pub fn is_active() -> bool {
    PORTAL_ACTIVE.load(Ordering::Acquire)
}

/// Parse an `application/x-www-form-urlencoded` body with `ssid` and
/// `password` fields.
pub fn parse_credentials_form(body: &[u8]) -> Result<WifiCredentials, ConnectivityError> {
    let mut ssid: Option<String> = None;
    let mut password = String::new();

    for pair in body.split(|&b| b == b'&') {
        let mut parts = pair.splitn(2, |&b| b == b'=');
        let key = parts.next().unwrap_or_default();
        let value = parts.next().unwrap_or_default();
        match key {
            b"ssid" => ssid = Some(percent_decode(value).ok_or(ConnectivityError::InvalidSsid)?),
            b"password" => {
                password = percent_decode(value).ok_or(ConnectivityError::InvalidPassword)?;
            }
            _ => {}
        }
    }

    let ssid = ssid.ok_or(ConnectivityError::NoCredentials)?;
    WifiCredentials::new(ssid.trim(), &password)
}

/// Hand credentials to the waiting portal. A newer submission replaces an
/// unread one.
pub fn submit_credentials(creds: WifiCredentials) {
    PORTAL_CREDENTIALS.signal(creds);
}

/// Block until credentials arrive or `timeout` passes. `on_wait` runs on
/// every poll.
pub fn wait_for_credentials(timeout: Duration, mut on_wait: impl FnMut()) -> Option<WifiCredentials> {
    let deadline = Instant::now() + timeout;
    loop {
        if let Some(creds) = PORTAL_CREDENTIALS.try_take() {
            return Some(creds);
        }
        if Instant::now() >= deadline {
            return None;
        }
        on_wait();
        std::thread::sleep(WAIT_POLL_INTERVAL);
    }
}

fn percent_decode(raw: &[u8]) -> Option<String> {
    let mut out = Vec::with_capacity(raw.len());
    let mut i = 0;
    while i < raw.len() {
        match raw[i] {
            b'+' => out.push(b' '),
            b'%' => {
                let hex = raw.get(i + 1..i + 3)?;
                let hex = core::str::from_utf8(hex).ok()?;
                out.push(u8::from_str_radix(hex, 16).ok()?);
                i += 2;
            }
            b => out.push(b),
        }
        i += 1;
    }
    String::from_utf8(out).ok()
}

// ───────────────────────────────────────────────────────────────
// ProvisioningPort (ESP-IDF)
// ───────────────────────────────────────────────────────────────

#[cfg(target_os = "espidf")]
pub use esp::CaptivePortal;

#[cfg(target_os = "espidf")]
mod esp {
    use core::sync::atomic::Ordering;
    use std::time::Duration;

    use log::{info, warn};

    use super::{wait_for_credentials, PORTAL_ACTIVE, PORTAL_CREDENTIALS};
    use crate::adapters::device_id::HostnameString;
    use crate::adapters::wifi::SharedWifi;
    use crate::app::ports::{PortalOutcome, ProvisioningPort};
    use crate::drivers::watchdog::Watchdog;

    pub struct CaptivePortal {
        wifi: SharedWifi,
        ap_ssid: HostnameString,
        connect_attempts: u8,
        watchdog: Watchdog,
        /// Runs every poll while waiting for credentials (LED blink).
        on_wait: Box<dyn FnMut()>,
    }

    impl CaptivePortal {
        pub fn new(
            wifi: SharedWifi,
            ap_ssid: HostnameString,
            connect_attempts: u8,
            watchdog: Watchdog,
            on_wait: impl FnMut() + 'static,
        ) -> Self {
            Self {
                wifi,
                ap_ssid,
                connect_attempts,
                watchdog,
                on_wait: Box::new(on_wait),
            }
        }
    }

    impl ProvisioningPort for CaptivePortal {
        fn run_portal(&mut self, timeout_secs: u32) -> PortalOutcome {
            let Ok(mut wifi) = self.wifi.lock() else {
                return PortalOutcome::Failed;
            };
            if let Err(e) = wifi.start_access_point(&self.ap_ssid) {
                warn!("portal: {e}");
                return PortalOutcome::Failed;
            }

            PORTAL_CREDENTIALS.reset();
            PORTAL_ACTIVE.store(true, Ordering::Release);
            info!("portal: waiting up to {timeout_secs}s on '{}'", self.ap_ssid);

            let watchdog = self.watchdog;
            let on_wait = &mut self.on_wait;
            let creds = wait_for_credentials(Duration::from_secs(u64::from(timeout_secs)), || {
                watchdog.feed();
                on_wait();
            });
            PORTAL_ACTIVE.store(false, Ordering::Release);

            let Some(creds) = creds else {
                return PortalOutcome::TimedOut;
            };
            // Let the form response reach the client before the AP goes down.
            std::thread::sleep(Duration::from_millis(500));

            self.watchdog.pause();
            let joined = wifi.connect_with(&creds, self.connect_attempts);
            self.watchdog.resume();
            match joined {
                Ok(()) => PortalOutcome::Connected,
                Err(e) => {
                    warn!("portal: {e}");
                    PortalOutcome::Failed
                }
            }
        }
    }
}
