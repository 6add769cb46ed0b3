//! Runtime metrics for the settings report.
//!
//! On ESP-IDF the heap figures come from the allocator and the network
//! status from the shared WiFi driver. The simulation build reports a
//! fixed heap and a disconnected network so host tests are deterministic.

use crate::adapters::time::MonotonicClock;
use crate::app::ports::{HeapStats, NetworkStatus, PlatformPort};

#[cfg(target_os = "espidf")]
use crate::adapters::wifi::SharedWifi;

pub struct EspPlatform {
    clock: MonotonicClock,
    #[cfg(target_os = "espidf")]
    wifi: SharedWifi,
}

impl EspPlatform {
    #[cfg(target_os = "espidf")]
    pub fn new(clock: MonotonicClock, wifi: SharedWifi) -> Self {
        Self { clock, wifi }
    }

    #[cfg(not(target_os = "espidf"))]
    pub fn new(clock: MonotonicClock) -> Self {
        Self { clock }
    }
}

impl PlatformPort for EspPlatform {
    fn uptime_secs(&self) -> u64 {
        self.clock.uptime_secs()
    }

    #[cfg(target_os = "espidf")]
    fn heap(&self) -> HeapStats {
        // SAFETY: both calls only read allocator counters.
        unsafe {
            HeapStats {
                free_bytes: esp_idf_svc::sys::esp_get_free_heap_size(),
                min_free_bytes: esp_idf_svc::sys::esp_get_minimum_free_heap_size(),
            }
        }
    }

    #[cfg(not(target_os = "espidf"))]
    fn heap(&self) -> HeapStats {
        HeapStats {
            free_bytes: SIM_FREE_HEAP,
            min_free_bytes: SIM_FREE_HEAP,
        }
    }

    #[cfg(target_os = "espidf")]
    fn network(&self) -> NetworkStatus {
        match self.wifi.try_lock() {
            Ok(wifi) => wifi.status(),
            // The portal holds the driver while it runs.
            Err(_) => NetworkStatus::default(),
        }
    }

    #[cfg(not(target_os = "espidf"))]
    fn network(&self) -> NetworkStatus {
        NetworkStatus::default()
    }
}

#[cfg(not(target_os = "espidf"))]
const SIM_FREE_HEAP: u32 = 200 * 1024;
