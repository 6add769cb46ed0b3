//! Ringtone upload state machine.
//!
//! ```text
//!   Idle ──start──▶ Receiving ──end──▶ Completed ─┐
//!                     │    ▲                      ├──▶ Idle
//!                     │  chunk                    │
//!                     └──abort──▶ Aborted ────────┘
//! ```
//!
//! `Completed` and `Aborted` are pass-through states: the machine reports
//! them through the returned outcome and the event sink, then settles back
//! in `Idle` within the same call.

use super::events::AppEvent;
use super::playback::RINGTONE_NAME;
use super::ports::{AssetWriter, EventSink, RingtoneStore};

#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
pub enum UploadState {
    Idle,
    Receiving,
    Completed,
    Aborted,
}

/// Why an upload did not produce a stored ringtone.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UploadRejection {
    /// `end` or `abort` arrived with no transfer in progress.
    NotStarted,
    /// Declared total was zero.
    EmptyPayload,
    /// The write handle could not be opened.
    OpenFailed,
    /// A chunk write failed; the handle was invalidated.
    WriteFailed,
    /// The payload exceeded the configured maximum.
    TooLarge,
    /// Declared total and bytes written disagree.
    Incomplete { declared: u32, written: u32 },
    /// Flushing the handle on close failed.
    CloseFailed,
}

impl core::fmt::Display for UploadRejection {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::NotStarted => write!(f, "no upload in progress"),
            Self::EmptyPayload => write!(f, "empty payload"),
            Self::OpenFailed => write!(f, "could not open ringtone for write"),
            Self::WriteFailed => write!(f, "write failed"),
            Self::TooLarge => write!(f, "payload too large"),
            Self::Incomplete { declared, written } => {
                write!(f, "incomplete: declared {declared} B, wrote {written} B")
            }
            Self::CloseFailed => write!(f, "close failed"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UploadOutcome {
    Stored { bytes: u32 },
    Rejected(UploadRejection),
    Aborted { bytes: u32 },
}

struct UploadSession<W> {
    /// `None` when the open failed or the handle was invalidated.
    writer: Option<W>,
    bytes_written: u32,
    failure: Option<UploadRejection>,
}

pub struct UploadController<W: AssetWriter> {
    state: UploadState,
    session: Option<UploadSession<W>>,
    max_bytes: u32,
}

impl<W: AssetWriter> UploadController<W> {
    pub fn new(max_bytes: u32) -> Self {
        Self {
            state: UploadState::Idle,
            session: None,
            max_bytes,
        }
    }

    pub fn state(&self) -> UploadState {
        self.state
    }

    /// Bytes accepted by the current session, 0 when idle.
    pub fn bytes_written(&self) -> u32 {
        self.session.as_ref().map_or(0, |s| s.bytes_written)
    }

    /// Begin a transfer. A transfer already in progress is aborted first.
    pub fn start<S>(&mut self, store: &mut S, sink: &mut impl EventSink)
    where
        S: RingtoneStore<Writer = W>,
    {
        if self.session.is_some() {
            self.abort(store, sink);
        }

        if let Err(e) = store.delete(RINGTONE_NAME) {
            log::warn!("upload: could not remove previous ringtone: {e}");
        }

        let (writer, failure) = match store.open_write(RINGTONE_NAME) {
            Ok(w) => (Some(w), None),
            Err(e) => {
                log::error!("upload: open for write failed: {e}");
                (None, Some(UploadRejection::OpenFailed))
            }
        };
        sink.emit(&AppEvent::UploadStarted {
            writable: writer.is_some(),
        });

        self.session = Some(UploadSession {
            writer,
            bytes_written: 0,
            failure,
        });
        self.state = UploadState::Receiving;
    }

    /// Append a chunk. Dropped silently when idle or the handle is invalid.
    pub fn chunk(&mut self, data: &[u8], sink: &mut impl EventSink) {
        let Some(session) = self.session.as_mut() else {
            return;
        };
        let Some(writer) = session.writer.as_mut() else {
            return;
        };

        let Ok(len) = u32::try_from(data.len()) else {
            return;
        };
        let next = session.bytes_written.saturating_add(len);
        let failure = if next > self.max_bytes {
            Some(UploadRejection::TooLarge)
        } else if writer.write(data).is_err() {
            Some(UploadRejection::WriteFailed)
        } else {
            session.bytes_written = next;
            None
        };

        if let Some(reason) = failure {
            // Invalidate: dropping the handle closes it.
            session.writer = None;
            session.failure = Some(reason);
            sink.emit(&AppEvent::UploadWriteFailed(reason));
        }
    }

    /// Finish the transfer. `total` is the byte count the client declared.
    pub fn end<S>(&mut self, store: &mut S, total: u32, sink: &mut impl EventSink) -> UploadOutcome
    where
        S: RingtoneStore<Writer = W>,
    {
        let Some(session) = self.session.take() else {
            return UploadOutcome::Rejected(UploadRejection::NotStarted);
        };
        self.state = UploadState::Completed;

        let UploadSession {
            writer,
            bytes_written,
            failure,
        } = session;

        let closed = writer.map(AssetWriter::close);
        let rejection = if total == 0 {
            Some(UploadRejection::EmptyPayload)
        } else if let Some(reason) = failure {
            Some(reason)
        } else if matches!(closed, Some(Err(_))) {
            Some(UploadRejection::CloseFailed)
        } else if total != bytes_written {
            Some(UploadRejection::Incomplete {
                declared: total,
                written: bytes_written,
            })
        } else {
            None
        };

        let outcome = match rejection {
            Some(reason) => {
                if let Err(e) = store.delete(RINGTONE_NAME) {
                    log::warn!("upload: could not remove rejected asset: {e}");
                }
                sink.emit(&AppEvent::UploadRejected(reason));
                UploadOutcome::Rejected(reason)
            }
            None => {
                sink.emit(&AppEvent::UploadCompleted {
                    bytes: bytes_written,
                });
                UploadOutcome::Stored {
                    bytes: bytes_written,
                }
            }
        };

        self.state = UploadState::Idle;
        outcome
    }

    /// Cancel the transfer and discard the partial asset.
    pub fn abort<S>(&mut self, store: &mut S, sink: &mut impl EventSink) -> UploadOutcome
    where
        S: RingtoneStore<Writer = W>,
    {
        let Some(session) = self.session.take() else {
            return UploadOutcome::Rejected(UploadRejection::NotStarted);
        };
        self.state = UploadState::Aborted;

        let bytes = session.bytes_written;
        drop(session);
        if let Err(e) = store.delete(RINGTONE_NAME) {
            log::warn!("upload: could not remove partial asset: {e}");
        }
        sink.emit(&AppEvent::UploadAborted { bytes });

        self.state = UploadState::Idle;
        UploadOutcome::Aborted { bytes }
    }
}
