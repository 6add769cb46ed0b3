//! Playback controller.
//!
//! Owns the audio output and at most one [`PlaybackSession`]. The session
//! bundles the open ringtone source with the decoder bound to it, so tearing
//! it down is a single `take()`: the decoder is stopped, the output is
//! stopped, and dropping the source closes the file handle.
//!
//! End of stream is detected by polling the source position against the
//! size captured at open time after every decode step. `>=` rather than `==`
//! covers sources that were truncated or replaced while open, and the stall
//! counter covers sources that stop advancing altogether.

use super::events::{AppEvent, PlaybackFailure, StopReason};
use super::indicator::Indicator;
use super::ports::{AssetReader, AudioSink, Decoder, EventSink, RingtoneStore};

/// Logical name of the single persisted ringtone.
pub const RINGTONE_NAME: &str = "ringtone.wav";

/// What a ring command did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RingOutcome {
    Started,
    /// A session was already running and has been replaced.
    Restarted,
    /// No session was created.
    Absorbed(PlaybackFailure),
}

struct PlaybackSession<R, D> {
    source: R,
    decoder: D,
    last_position: u32,
    stalled_ticks: u16,
}

pub struct PlaybackController<R, D, O> {
    output: O,
    session: Option<PlaybackSession<R, D>>,
    chunk_bytes: usize,
    stall_limit: u16,
}

impl<R, D, O> PlaybackController<R, D, O>
where
    R: AssetReader,
    D: Decoder,
    O: AudioSink,
{
    pub fn new(output: O, chunk_bytes: usize, stall_limit: u16) -> Self {
        Self {
            output,
            session: None,
            chunk_bytes: chunk_bytes.max(1),
            stall_limit: stall_limit.max(1),
        }
    }

    /// Start playing the stored ringtone, replacing any running session.
    pub fn ring<S>(
        &mut self,
        store: &mut S,
        indicator: &mut Indicator,
        sink: &mut impl EventSink,
    ) -> RingOutcome
    where
        S: RingtoneStore<Reader = R>,
    {
        // Old source is closed before the new one is opened.
        let restarted = self.teardown();

        match self.open_session(store) {
            Ok(session) => {
                let size = session.source.size();
                self.session = Some(session);
                indicator.set_playing(true);
                if restarted {
                    sink.emit(&AppEvent::PlaybackRestarted { size });
                    RingOutcome::Restarted
                } else {
                    sink.emit(&AppEvent::PlaybackStarted { size });
                    RingOutcome::Started
                }
            }
            Err(failure) => {
                indicator.set_playing(false);
                sink.emit(&AppEvent::PlaybackFailed(failure));
                RingOutcome::Absorbed(failure)
            }
        }
    }

    /// Advance the running session by one decode step.
    pub fn tick(&mut self, indicator: &mut Indicator, sink: &mut impl EventSink) {
        let Some(session) = self.session.as_mut() else {
            return;
        };

        let stepped = session
            .decoder
            .step(&mut session.source, &mut self.output, self.chunk_bytes);

        let position = session.source.position();
        let reason = match stepped {
            Err(e) => {
                log::warn!("playback: decode step failed: {e}");
                Some(StopReason::ReadFailed)
            }
            Ok(_) if position >= session.source.size() => Some(StopReason::EndOfStream),
            Ok(_) if position == session.last_position => {
                session.stalled_ticks = session.stalled_ticks.saturating_add(1);
                (session.stalled_ticks >= self.stall_limit).then_some(StopReason::Stalled)
            }
            Ok(_) => {
                session.last_position = position;
                session.stalled_ticks = 0;
                None
            }
        };

        if let Some(reason) = reason {
            self.teardown();
            indicator.set_playing(false);
            sink.emit(&AppEvent::PlaybackFinished { position, reason });
        }
    }

    pub fn is_playing(&self) -> bool {
        self.session.is_some()
    }

    /// Read position of the running session, 0 when idle.
    pub fn position(&self) -> u32 {
        self.session.as_ref().map_or(0, |s| s.source.position())
    }

    /// Asset size of the running session, 0 when idle.
    pub fn size(&self) -> u32 {
        self.session.as_ref().map_or(0, |s| s.source.size())
    }

    pub fn output(&self) -> &O {
        &self.output
    }

    // ── Internal ──────────────────────────────────────────────

    fn open_session<S>(&mut self, store: &mut S) -> Result<PlaybackSession<R, D>, PlaybackFailure>
    where
        S: RingtoneStore<Reader = R>,
    {
        let mut source = store
            .open_read(RINGTONE_NAME)
            .map_err(PlaybackFailure::Open)?;
        if source.size() == 0 {
            return Err(PlaybackFailure::EmptyAsset);
        }

        let mut decoder = D::default();
        let format = decoder
            .begin(&mut source)
            .map_err(PlaybackFailure::Decoder)?;
        if let Err(e) = self.output.start(format) {
            decoder.stop();
            return Err(PlaybackFailure::Decoder(e));
        }

        let last_position = source.position();
        Ok(PlaybackSession {
            source,
            decoder,
            last_position,
            stalled_ticks: 0,
        })
    }

    /// Returns `true` if a session was torn down.
    fn teardown(&mut self) -> bool {
        let Some(mut session) = self.session.take() else {
            return false;
        };
        session.decoder.stop();
        self.output.stop();
        drop(session);
        true
    }
}
