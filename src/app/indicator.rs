//! Device indicator state.
//!
//! Two writers share one visual signal: the playback controller (session
//! start/stop) and the provisioning mode (portal entry/exit). Provisioning
//! always wins; playback updates made while provisioning is active are
//! remembered but not shown until the portal exits.

use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum IndicatorState {
    Idle,
    Playing,
    Provisioning,
}

#[derive(Debug, Default)]
pub struct Indicator {
    provisioning: bool,
    playing: bool,
}

impl Indicator {
    pub fn new() -> Self {
        Self::default()
    }

    /// The state to render.
    pub fn state(&self) -> IndicatorState {
        if self.provisioning {
            IndicatorState::Provisioning
        } else if self.playing {
            IndicatorState::Playing
        } else {
            IndicatorState::Idle
        }
    }

    /// Playback-side update.
    pub fn set_playing(&mut self, playing: bool) {
        self.playing = playing;
    }

    pub fn enter_provisioning(&mut self) {
        self.provisioning = true;
    }

    pub fn exit_provisioning(&mut self) {
        self.provisioning = false;
    }

    pub fn is_provisioning(&self) -> bool {
        self.provisioning
    }
}
