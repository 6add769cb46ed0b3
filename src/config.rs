//! System configuration parameters
//!
//! All tunable parameters for the chime. Values are persisted in NVS
//! (see [`NvsAdapter`](crate::adapters::nvs::NvsAdapter)) and fall back to
//! [`SystemConfig::default`] on first boot.

use serde::{Deserialize, Serialize};

/// Core system configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SystemConfig {
    // --- Playback ---
    /// Maximum bytes of the ringtone consumed per playback tick
    pub decode_chunk_bytes: u16,
    /// Ticks without source progress before a session is declared stalled
    pub stall_tick_limit: u16,

    // --- Upload ---
    /// Largest ringtone accepted by the upload controller (bytes)
    pub max_ringtone_bytes: u32,

    // --- Network ---
    /// Station connect attempts at boot before the device restarts
    pub wifi_connect_retries: u8,
    /// How long the reconfiguration portal waits for credentials (seconds)
    pub portal_timeout_secs: u32,
    /// HTTP control API port
    pub http_port: u16,
    /// How long an HTTP handler waits for the main loop to answer (ms)
    pub request_timeout_ms: u32,

    // --- Timing ---
    /// Pause between the reboot acknowledgment and the restart (ms)
    pub reboot_delay_ms: u32,
    /// Pause before restarting after a fatal fault (ms)
    pub restart_delay_ms: u32,
    /// Yield per loop iteration while nothing is playing (ms)
    pub idle_yield_ms: u32,
}

impl Default for SystemConfig {
    fn default() -> Self {
        Self {
            // Playback
            decode_chunk_bytes: 512,
            stall_tick_limit: 200,

            // Upload
            max_ringtone_bytes: 1024 * 1024, // 1 MiB SPIFFS partition

            // Network
            wifi_connect_retries: 10,
            portal_timeout_secs: 180,
            http_port: 80,
            request_timeout_ms: 5000,

            // Timing
            reboot_delay_ms: 1000,
            restart_delay_ms: 3000,
            idle_yield_ms: 10,
        }
    }
}
