//! Application service: the hexagonal core.
//!
//! [`ChimeService`] owns the ringtone store, both controllers and the
//! indicator. The store is lent to exactly one controller per call, so the
//! two can never hold it at the same time; asset sharing between them is
//! last-writer-wins on the underlying files.
//!
//! ```text
//!   ring ──────▶ ┌──────────────────────────────┐ ──▶ EventSink
//!   upload ────▶ │         ChimeService          │
//!   tick ──────▶ │ Store · Playback · Upload · ◉ │ ──▶ AudioSink
//!                └──────────────────────────────┘
//! ```

use log::info;
use serde::Serialize;

use crate::config::SystemConfig;

use super::commands::UploadEvent;
use super::events::AppEvent;
use super::indicator::{Indicator, IndicatorState};
use super::playback::{PlaybackController, RingOutcome, RINGTONE_NAME};
use super::ports::{AudioSink, Decoder, EventSink, RingtoneStore, StorageUsage};
use super::upload::{UploadController, UploadOutcome, UploadState};

/// Point-in-time view of the controllers, used by the settings report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ChimeStatus {
    pub ringtone_present: bool,
    pub ringtone_bytes: u32,
    pub playing: bool,
    pub play_position: u32,
    pub play_size: u32,
    pub upload: UploadState,
    pub upload_bytes: u32,
    pub indicator: IndicatorState,
    pub storage: StorageUsage,
}

pub struct ChimeService<S: RingtoneStore, D, O> {
    store: S,
    playback: PlaybackController<S::Reader, D, O>,
    upload: UploadController<S::Writer>,
    indicator: Indicator,
}

impl<S, D, O> ChimeService<S, D, O>
where
    S: RingtoneStore,
    D: Decoder,
    O: AudioSink,
{
    pub fn new(store: S, output: O, config: &SystemConfig) -> Self {
        Self {
            store,
            playback: PlaybackController::new(
                output,
                usize::from(config.decode_chunk_bytes),
                config.stall_tick_limit,
            ),
            upload: UploadController::new(config.max_ringtone_bytes),
            indicator: Indicator::new(),
        }
    }

    pub fn start(&mut self, sink: &mut impl EventSink) {
        let present = self.store.exists(RINGTONE_NAME);
        info!("ChimeService started, ringtone present: {present}");
        sink.emit(&AppEvent::Started);
    }

    // ── Commands ──────────────────────────────────────────────

    pub fn ring(&mut self, sink: &mut impl EventSink) -> RingOutcome {
        self.playback
            .ring(&mut self.store, &mut self.indicator, sink)
    }

    /// Feed one transfer event to the upload machine. `Start` and `Chunk`
    /// produce no outcome.
    pub fn upload(&mut self, event: UploadEvent, sink: &mut impl EventSink) -> Option<UploadOutcome> {
        match event {
            UploadEvent::Start => {
                self.upload.start(&mut self.store, sink);
                None
            }
            UploadEvent::Chunk(data) => {
                self.upload.chunk(&data, sink);
                None
            }
            UploadEvent::End { total } => Some(self.upload.end(&mut self.store, total, sink)),
            UploadEvent::Abort => Some(self.upload.abort(&mut self.store, sink)),
        }
    }

    /// One cooperative playback step.
    pub fn tick(&mut self, sink: &mut impl EventSink) {
        self.playback.tick(&mut self.indicator, sink);
    }

    // ── Provisioning ──────────────────────────────────────────

    pub fn enter_provisioning(&mut self, sink: &mut impl EventSink) {
        self.indicator.enter_provisioning();
        sink.emit(&AppEvent::ProvisioningEntered);
    }

    pub fn exit_provisioning(&mut self) {
        self.indicator.exit_provisioning();
    }

    // ── Queries ───────────────────────────────────────────────

    pub fn status(&self) -> ChimeStatus {
        let ringtone_bytes = self.store.asset_size(RINGTONE_NAME);
        ChimeStatus {
            ringtone_present: ringtone_bytes.is_some(),
            ringtone_bytes: ringtone_bytes.unwrap_or(0),
            playing: self.playback.is_playing(),
            play_position: self.playback.position(),
            play_size: self.playback.size(),
            upload: self.upload.state(),
            upload_bytes: self.upload.bytes_written(),
            indicator: self.indicator.state(),
            storage: self.store.usage(),
        }
    }

    pub fn indicator(&self) -> IndicatorState {
        self.indicator.state()
    }

    pub fn is_playing(&self) -> bool {
        self.playback.is_playing()
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn store_mut(&mut self) -> &mut S {
        &mut self.store
    }

    pub fn output(&self) -> &O {
        self.playback.output()
    }
}
