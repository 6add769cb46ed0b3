//! Adapters: concrete implementations of the hexagonal port traits.
//!
//! | Adapter       | Implements          | Connects to                  |
//! |---------------|---------------------|------------------------------|
//! | `audio_out`   | AudioSink           | ESP32 I2S peripheral         |
//! | `flash_store` | RingtoneStore       | SPIFFS partition / host dir  |
//! | `http`        | (bus producer)      | ESP-IDF HTTP server          |
//! | `log_sink`    | EventSink           | Serial log output            |
//! | `mdns`        |                     | ESP-IDF mDNS responder       |
//! | `multipart`   |                     | Upload body parsing          |
//! | `nvs`         | ConfigPort          | NVS / in-memory store        |
//! | `platform`    | PlatformPort        | Heap counters, WiFi status   |
//! | `portal`      | ProvisioningPort    | SoftAP + credential form     |
//! | `time`        |                     | ESP32 system timer           |
//! | `wifi`        |                     | ESP-IDF WiFi STA / AP        |
//! | `device_id`   |                     | Factory MAC                  |

pub mod audio_out;
pub mod device_id;
pub mod flash_store;
#[cfg(target_os = "espidf")]
pub mod http;
pub mod log_sink;
pub mod mdns;
pub mod multipart;
pub mod nvs;
pub mod platform;
pub mod portal;
pub mod time;
pub mod wifi;
