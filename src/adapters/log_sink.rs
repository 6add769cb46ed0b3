//! Log-based event sink adapter.
//!
//! Implements [`EventSink`] by writing one structured line per application
//! event to the ESP-IDF logger (UART / USB-CDC in production).

use log::{info, warn};

use crate::app::events::{AppEvent, PlaybackFailure, StopReason};
use crate::app::ports::EventSink;

/// Adapter that logs every [`AppEvent`] to the serial console.
#[derive(Default)]
pub struct LogEventSink;

impl LogEventSink {
    pub fn new() -> Self {
        Self
    }
}

impl EventSink for LogEventSink {
    fn emit(&mut self, event: &AppEvent) {
        match event {
            AppEvent::Started => info!("START | chime ready"),

            AppEvent::PlaybackStarted { size } => info!("RING | started, {} bytes", size),
            AppEvent::PlaybackRestarted { size } => {
                info!("RING | restarted from the top, {} bytes", size);
            }
            AppEvent::PlaybackFinished { position, reason } => match reason {
                StopReason::EndOfStream => info!("RING | finished at {} bytes", position),
                StopReason::ReadFailed | StopReason::Stalled => {
                    warn!("RING | stopped at {} bytes ({:?})", position, reason);
                }
            },
            AppEvent::PlaybackFailed(failure) => match failure {
                PlaybackFailure::Open(e) => warn!("RING | no ringtone: {}", e),
                PlaybackFailure::EmptyAsset => warn!("RING | ringtone is empty"),
                PlaybackFailure::Decoder(e) => warn!("RING | cannot decode ringtone: {}", e),
            },

            AppEvent::UploadStarted { writable } => {
                if *writable {
                    info!("UPLOAD | receiving");
                } else {
                    warn!("UPLOAD | receiving, store not writable, chunks will be dropped");
                }
            }
            AppEvent::UploadWriteFailed(reason) => warn!("UPLOAD | write handle dropped: {}", reason),
            AppEvent::UploadCompleted { bytes } => info!("UPLOAD | stored {} bytes", bytes),
            AppEvent::UploadRejected(reason) => warn!("UPLOAD | rejected: {}", reason),
            AppEvent::UploadAborted { bytes } => warn!("UPLOAD | aborted after {} bytes", bytes),

            AppEvent::ProvisioningEntered => info!("PORTAL | entered"),
            AppEvent::ProvisioningExited(outcome) => info!("PORTAL | exited: {:?}", outcome),

            AppEvent::UpdateFailed(e) => warn!("UPDATE | {}", e),
            AppEvent::RebootScheduled { delay_ms } => info!("REBOOT | in {} ms", delay_ms),
        }
    }
}
