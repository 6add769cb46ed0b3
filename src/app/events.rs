//! Outbound application events.
//!
//! The controllers emit these through the [`EventSink`](super::ports::EventSink)
//! port instead of returning errors. Adapters on the other side decide what
//! to do with them.

use crate::error::{AudioError, StorageError};
use crate::update::OtaError;

use super::ports::PortalOutcome;
use super::upload::UploadRejection;

/// Why a playback session ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    /// Read position reached the asset size.
    EndOfStream,
    /// The decoder or the source failed mid-stream.
    ReadFailed,
    /// The source stopped advancing.
    Stalled,
}

/// Why a ring command did not create a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlaybackFailure {
    Open(StorageError),
    EmptyAsset,
    Decoder(AudioError),
}

/// Structured events emitted by the application core.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AppEvent {
    /// The main loop is about to start.
    Started,

    PlaybackStarted { size: u32 },
    /// A ring arrived while playing; the old session was torn down first.
    PlaybackRestarted { size: u32 },
    PlaybackFinished { position: u32, reason: StopReason },
    /// A ring was absorbed without creating a session.
    PlaybackFailed(PlaybackFailure),

    UploadStarted { writable: bool },
    /// The write handle was invalidated; remaining chunks are dropped.
    UploadWriteFailed(UploadRejection),
    UploadCompleted { bytes: u32 },
    UploadRejected(UploadRejection),
    UploadAborted { bytes: u32 },

    ProvisioningEntered,
    ProvisioningExited(PortalOutcome),

    UpdateFailed(OtaError),
    RebootScheduled { delay_ms: u32 },
}
