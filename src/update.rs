//! Remote firmware update channel, backed by the `esp-ota` crate.
//!
//! Flow: `Begin { size }` → N × `Chunk` → `Finish` → reboot.
//!
//! Chunks arrive inside the loop's dispatch step. Writing flash there would
//! stall playback, so each chunk is copied into a staging buffer and the
//! actual partition write happens on the next [`UpdatePort::service`] call
//! (or right before the following chunk is staged, whichever comes first).

use core::fmt;
use log::{info, warn};

use crate::app::commands::{UpdateEvent, CHUNK_CAPACITY};
use crate::app::ports::{UpdatePort, UpdateStatus};

const MAX_FIRMWARE_SIZE: u32 = 4 * 1024 * 1024; // 4 MB

// ── Error type ────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OtaError {
    AlreadyInProgress,
    InvalidSize,
    BeginFailed,
    WriteFailed,
    VerifyFailed,
    BootSetFailed,
    IncompleteTransfer,
    NotReceiving,
    Overflow,
}

impl fmt::Display for OtaError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::AlreadyInProgress => write!(f, "update already in progress"),
            Self::InvalidSize => write!(f, "firmware size out of range (max 4 MB)"),
            Self::BeginFailed => write!(f, "OTA begin failed"),
            Self::WriteFailed => write!(f, "OTA write failed"),
            Self::VerifyFailed => write!(f, "OTA verification failed"),
            Self::BootSetFailed => write!(f, "set boot partition failed"),
            Self::IncompleteTransfer => write!(f, "finish called before all bytes written"),
            Self::NotReceiving => write!(f, "no update in progress"),
            Self::Overflow => write!(f, "chunk would exceed declared firmware size"),
        }
    }
}

impl core::error::Error for OtaError {}

// ── State machine ─────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OtaState {
    Idle,
    Receiving {
        expected_size: u32,
        bytes_written: u32,
    },
    WritePending {
        expected_size: u32,
        bytes_written: u32,
        pending_len: u32,
    },
    ReadyToReboot,
    Failed,
}

/// Firmware update manager.
///
/// On ESP-IDF targets, uses the `esp-ota` crate for partition management.
/// On host targets, chunks are only counted.
pub struct OtaUpdater {
    state: OtaState,
    staging_buf: [u8; CHUNK_CAPACITY],
    #[cfg(target_os = "espidf")]
    ota_update: Option<esp_ota::OtaUpdate>,
}

impl OtaUpdater {
    pub fn new() -> Self {
        Self {
            state: OtaState::Idle,
            staging_buf: [0u8; CHUNK_CAPACITY],
            #[cfg(target_os = "espidf")]
            ota_update: None,
        }
    }

    pub fn state(&self) -> OtaState {
        self.state
    }

    /// Open the inactive partition for an image of `firmware_size` bytes.
    pub fn begin(&mut self, firmware_size: u32) -> Result<(), OtaError> {
        if !matches!(self.state, OtaState::Idle | OtaState::Failed) {
            return Err(OtaError::AlreadyInProgress);
        }
        if firmware_size == 0 || firmware_size > MAX_FIRMWARE_SIZE {
            return Err(OtaError::InvalidSize);
        }

        #[cfg(target_os = "espidf")]
        {
            let update = esp_ota::OtaUpdate::begin().map_err(|e| {
                warn!("esp-ota begin failed: {:?}", e);
                OtaError::BeginFailed
            })?;
            self.ota_update = Some(update);
        }

        self.state = OtaState::Receiving {
            expected_size: firmware_size,
            bytes_written: 0,
        };
        info!("OTA: begin ({} bytes)", firmware_size);
        Ok(())
    }

    /// Stage a chunk for the next flush. A chunk already staged is written
    /// out first. Returns the byte count accepted so far.
    pub fn queue_chunk(&mut self, data: &[u8]) -> Result<u32, OtaError> {
        self.flush_pending()?;

        let OtaState::Receiving {
            expected_size,
            bytes_written,
        } = self.state
        else {
            return Err(OtaError::NotReceiving);
        };

        let len = data.len() as u32;
        if data.len() > CHUNK_CAPACITY || bytes_written + len > expected_size {
            self.abort();
            return Err(OtaError::Overflow);
        }

        self.staging_buf[..data.len()].copy_from_slice(data);
        self.state = OtaState::WritePending {
            expected_size,
            bytes_written,
            pending_len: len,
        };
        Ok(bytes_written + len)
    }

    /// Perform the deferred flash write. Returns `true` if a write was
    /// flushed, `false` if nothing was pending.
    pub fn flush_pending(&mut self) -> Result<bool, OtaError> {
        let OtaState::WritePending {
            expected_size,
            bytes_written,
            pending_len,
        } = self.state
        else {
            return Ok(false);
        };

        #[cfg(target_os = "espidf")]
        {
            let data = &self.staging_buf[..pending_len as usize];
            let written = match self.ota_update.as_mut() {
                Some(update) => update.write(data).map_err(|e| {
                    warn!("esp-ota deferred write failed: {:?}", e);
                }),
                None => Err(()),
            };
            if written.is_err() {
                self.fail();
                return Err(OtaError::WriteFailed);
            }
        }

        self.state = OtaState::Receiving {
            expected_size,
            bytes_written: bytes_written + pending_len,
        };
        Ok(true)
    }

    /// Verify the image and mark its partition bootable.
    pub fn finalize(&mut self) -> Result<(), OtaError> {
        self.flush_pending()?;

        match self.state {
            OtaState::Receiving {
                expected_size,
                bytes_written,
            } if bytes_written == expected_size => {}
            OtaState::Receiving { .. } => {
                self.abort();
                return Err(OtaError::IncompleteTransfer);
            }
            _ => return Err(OtaError::NotReceiving),
        }

        #[cfg(target_os = "espidf")]
        {
            let Some(update) = self.ota_update.take() else {
                self.fail();
                return Err(OtaError::NotReceiving);
            };
            let mut completed = match update.finalize() {
                Ok(c) => c,
                Err(e) => {
                    warn!("esp-ota finalize failed: {:?}", e);
                    self.fail();
                    return Err(OtaError::VerifyFailed);
                }
            };
            if let Err(e) = completed.set_as_boot_partition() {
                warn!("esp-ota set_as_boot_partition failed: {:?}", e);
                self.fail();
                return Err(OtaError::BootSetFailed);
            }
        }

        self.state = OtaState::ReadyToReboot;
        info!("OTA: finalized, ready to reboot");
        Ok(())
    }

    pub fn has_pending(&self) -> bool {
        matches!(self.state, OtaState::WritePending { .. })
    }

    /// Abort the current session; resets to Idle.
    pub fn abort(&mut self) {
        #[cfg(target_os = "espidf")]
        {
            // esp-ota aborts automatically when OtaUpdate is dropped
            self.ota_update.take();
        }
        if self.state != OtaState::Idle {
            warn!("OTA: aborted");
        }
        self.state = OtaState::Idle;
    }

    #[cfg_attr(not(target_os = "espidf"), allow(dead_code))]
    fn fail(&mut self) {
        #[cfg(target_os = "espidf")]
        {
            self.ota_update.take();
        }
        self.state = OtaState::Failed;
    }
}

impl Default for OtaUpdater {
    fn default() -> Self {
        Self::new()
    }
}

impl UpdatePort for OtaUpdater {
    fn handle(&mut self, event: UpdateEvent) -> Result<(), OtaError> {
        match event {
            UpdateEvent::Begin { size } => self.begin(size),
            UpdateEvent::Chunk(data) => self.queue_chunk(&data).map(|_| ()),
            UpdateEvent::Finish => self.finalize(),
            UpdateEvent::Abort => {
                self.abort();
                Ok(())
            }
        }
    }

    fn service(&mut self) -> UpdateStatus {
        if let Err(e) = self.flush_pending() {
            warn!("OTA: {e}");
        }
        match self.state {
            OtaState::Idle | OtaState::Failed => UpdateStatus::Idle,
            OtaState::Receiving { .. } | OtaState::WritePending { .. } => UpdateStatus::Busy,
            OtaState::ReadyToReboot => UpdateStatus::RebootRequired,
        }
    }
}

// ── Boot validation ───────────────────────────────────────────

/// Check OTA image state on startup and mark this firmware as valid.
///
/// Without this, the bootloader reverts to the previous firmware after the
/// next reset.
#[cfg(target_os = "espidf")]
pub fn check_rollback() {
    match esp_ota::mark_app_valid() {
        Ok(()) => info!("OTA: firmware marked valid (rollback cancelled)"),
        Err(e) => warn!("OTA: mark_app_valid failed: {:?}", e),
    }
}

#[cfg(not(target_os = "espidf"))]
pub fn check_rollback() {
    log::info!("OTA rollback check (simulation): skipped");
}

// ── Tests ─────────────────────────────────────────────────────
