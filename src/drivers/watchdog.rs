//! Task Watchdog Timer (TWDT) driver.
//!
//! Wraps the ESP-IDF TWDT API to reset the device if the main loop
//! stalls for more than 10 seconds.
//!
//! The main loop feeds it every iteration; the provisioning portal, which
//! blocks the loop for minutes, feeds it while it waits. Blocking WiFi
//! joins can outlast the timeout, so callers [`pause`](Watchdog::pause)
//! the subscription around them.

#[cfg(target_os = "espidf")]
use esp_idf_svc::sys::*;

#[cfg(target_os = "espidf")]
use log::{info, warn};

const TIMEOUT_MS: u32 = 10_000;

/// Handle on the main task's TWDT subscription. Every copy acts on the
/// same subscription; all calls must come from the main task.
#[derive(Debug, Clone, Copy)]
pub struct Watchdog;

impl Default for Watchdog {
    fn default() -> Self {
        Self::new()
    }
}

impl Watchdog {
    /// Configure the TWDT and subscribe the current task.
    pub fn new() -> Self {
        #[cfg(target_os = "espidf")]
        {
            let cfg = esp_task_wdt_config_t {
                timeout_ms: TIMEOUT_MS,
                idle_core_mask: 0,
                trigger_panic: true,
            };
            // SAFETY: `cfg` outlives the call.
            let ret = unsafe { esp_task_wdt_reconfigure(&cfg) };
            if ret != ESP_OK {
                warn!(
                    "TWDT reconfigure returned {} (may already be configured)",
                    ret
                );
            }
        }

        #[cfg(not(target_os = "espidf"))]
        log::info!("Watchdog(sim): no-op ({TIMEOUT_MS} ms)");

        let wdt = Self;
        wdt.resume();
        wdt
    }

    /// Feed the watchdog. Must be called at least every 10 seconds while
    /// subscribed; a no-op otherwise.
    pub fn feed(&self) {
        #[cfg(target_os = "espidf")]
        {
            // SAFETY: no pointers involved; fails harmlessly when unsubscribed.
            unsafe {
                esp_task_wdt_reset();
            }
        }
    }

    /// Unsubscribe the current task before a long blocking call.
    pub fn pause(&self) {
        #[cfg(target_os = "espidf")]
        {
            // SAFETY: a null handle means the calling task.
            unsafe {
                esp_task_wdt_delete(core::ptr::null_mut());
            }
        }
    }

    /// (Re)subscribe the current task.
    pub fn resume(&self) {
        #[cfg(target_os = "espidf")]
        {
            // SAFETY: a null handle means the calling task.
            let ret = unsafe { esp_task_wdt_add(core::ptr::null_mut()) };
            if ret == ESP_OK {
                info!("Watchdog: subscribed ({TIMEOUT_MS} ms timeout, panic on trigger)");
            } else {
                warn!("Watchdog: failed to subscribe ({})", ret);
            }
        }
    }
}
