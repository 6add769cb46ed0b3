//! Port traits: the hexagonal boundary between domain logic and the outside world.
//!
//! ```text
//!   Adapter ──▶ Port trait ──▶ Controllers / EventLoop (domain)
//! ```
//!
//! Driven adapters (flash store, I2S output, portal, OTA, logger) implement
//! these traits. The controllers consume them via generics, so the domain
//! core never touches hardware directly and runs unchanged on the host.

use serde::Serialize;

use crate::config::SystemConfig;
use crate::error::{AudioError, StorageError};

// ───────────────────────────────────────────────────────────────
// Ringtone store (driven adapter: domain ↔ flash filesystem)
// ───────────────────────────────────────────────────────────────

/// Read handle on a stored asset.
///
/// `size` is captured when the handle is opened and never changes, even if
/// the underlying file is replaced while the handle is open.
pub trait AssetReader {
    /// Read up to `buf.len()` bytes. `Ok(0)` means end of file.
    fn read(&mut self, buf: &mut [u8]) -> Result<usize, StorageError>;

    /// Bytes consumed so far.
    fn position(&self) -> u32;

    /// Total size of the asset at open time.
    fn size(&self) -> u32;
}

/// Write handle on an asset opened with truncation.
///
/// Dropping the handle closes it; [`close`](AssetWriter::close) additionally
/// flushes and reports the final length.
pub trait AssetWriter {
    fn write(&mut self, data: &[u8]) -> Result<(), StorageError>;

    fn bytes_written(&self) -> u32;

    fn close(self) -> Result<u32, StorageError>;
}

/// Capacity figures for the settings report.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct StorageUsage {
    pub total_bytes: u32,
    pub used_bytes: u32,
}

/// Persistent byte store holding named assets.
pub trait RingtoneStore {
    type Reader: AssetReader;
    type Writer: AssetWriter;

    fn open_read(&mut self, name: &str) -> Result<Self::Reader, StorageError>;

    /// Open for write, truncating any existing content.
    fn open_write(&mut self, name: &str) -> Result<Self::Writer, StorageError>;

    fn exists(&self, name: &str) -> bool;

    /// Remove an asset. Deleting a missing asset is `Ok(())`.
    fn delete(&mut self, name: &str) -> Result<(), StorageError>;

    /// Size of a stored asset, `None` when absent.
    fn asset_size(&self, name: &str) -> Option<u32>;

    fn usage(&self) -> StorageUsage;
}

// ───────────────────────────────────────────────────────────────
// Audio output + decoding
// ───────────────────────────────────────────────────────────────

/// Sample layout announced by the decoder when a stream begins.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PcmFormat {
    pub sample_rate: u32,
    pub channels: u8,
}

/// Output device accepting interleaved signed 16-bit samples.
pub trait AudioSink {
    fn start(&mut self, format: PcmFormat) -> Result<(), AudioError>;

    /// Queue samples. Returns once every sample has been accepted.
    fn write(&mut self, samples: &[i16]) -> Result<(), AudioError>;

    fn stop(&mut self);

    fn is_running(&self) -> bool;
}

/// Streaming decoder bound to one source for the lifetime of a session.
///
/// A fresh decoder is built with `Default` for every session.
pub trait Decoder: Default {
    /// Parse the stream header and return the sample layout.
    fn begin<R: AssetReader>(&mut self, source: &mut R) -> Result<PcmFormat, AudioError>;

    /// Consume at most `budget` bytes of `source` and push the decoded
    /// samples to `output`. Returns the number of source bytes consumed.
    fn step<R: AssetReader, O: AudioSink>(
        &mut self,
        source: &mut R,
        output: &mut O,
        budget: usize,
    ) -> Result<usize, AudioError>;

    fn stop(&mut self);
}

// ───────────────────────────────────────────────────────────────
// Event sink port (driven adapter: domain → logging / telemetry)
// ───────────────────────────────────────────────────────────────

/// The domain emits structured [`AppEvent`](super::events::AppEvent)s
/// through this port.
pub trait EventSink {
    fn emit(&mut self, event: &super::events::AppEvent);
}

// ───────────────────────────────────────────────────────────────
// Reconfiguration + update channel
// ───────────────────────────────────────────────────────────────

/// Manual reconfiguration trigger (long press on the setup button).
pub trait ReconfigTrigger {
    /// Returns `true` once per trigger gesture.
    fn poll(&mut self, now_ms: u32) -> bool;
}

/// Result of one blocking run of the provisioning portal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum PortalOutcome {
    /// New credentials were accepted and the station is connected.
    Connected,
    /// Nobody submitted credentials before the timeout.
    TimedOut,
    /// Credentials were submitted but the connection failed.
    Failed,
}

/// Captive provisioning portal. `run_portal` blocks until it succeeds or
/// times out.
pub trait ProvisioningPort {
    fn run_portal(&mut self, timeout_secs: u32) -> PortalOutcome;
}

/// What the update channel wants from the loop after a service call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpdateStatus {
    Idle,
    Busy,
    RebootRequired,
}

/// Remote firmware update channel, serviced once per loop iteration.
pub trait UpdatePort {
    fn handle(&mut self, event: super::commands::UpdateEvent) -> Result<(), crate::update::OtaError>;

    fn service(&mut self) -> UpdateStatus;
}

// ───────────────────────────────────────────────────────────────
// Platform metrics (settings report)
// ───────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct NetworkStatus {
    pub connected: bool,
    pub ssid: heapless::String<32>,
    pub ip: heapless::String<16>,
    pub rssi: Option<i8>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct HeapStats {
    pub free_bytes: u32,
    pub min_free_bytes: u32,
}

/// Live runtime metrics read by the settings command.
pub trait PlatformPort {
    fn uptime_secs(&self) -> u64;

    fn heap(&self) -> HeapStats;

    fn network(&self) -> NetworkStatus;
}

// ───────────────────────────────────────────────────────────────
// Configuration port (driven adapter: domain ↔ persistent config)
// ───────────────────────────────────────────────────────────────

/// Loads and persists system configuration.
///
/// Implementations MUST validate config values before persisting.
pub trait ConfigPort {
    /// Returns [`SystemConfig::default()`] if no stored config exists.
    fn load(&self) -> Result<SystemConfig, ConfigError>;

    fn save(&self, config: &SystemConfig) -> Result<(), ConfigError>;
}

/// Errors from [`ConfigPort`] operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigError {
    /// Stored config failed deserialization.
    Corrupted,
    /// A config field failed range validation.
    ValidationFailed(&'static str),
    /// Generic I/O error from the storage backend.
    IoError,
}

impl core::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::Corrupted => write!(f, "config corrupted"),
            Self::ValidationFailed(msg) => write!(f, "validation failed: {}", msg),
            Self::IoError => write!(f, "I/O error"),
        }
    }
}

impl core::error::Error for ConfigError {}
