//! Background-play gating shared between the control thread and the audio thread.
//!
//! All state is atomic so the audio callback can read it without locking.

use std::sync::atomic::{AtomicBool, Ordering};

use crossbeam::atomic::AtomicCell;
use serde::{Deserialize, Serialize};

/// What an unfocused host without background play silences.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BackgroundGate {
    /// The entire tick is silent: sounds, waveforms and noise.
    #[default]
    AllSources,
    /// Only the native mixer read is silenced; waveforms and noise still play.
    EngineOnly,
}

/// Outcome of a gate check for one tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GateState {
    Open,
    SilenceAll,
    SilenceEngine,
}

#[derive(Debug)]
pub struct PlaybackGate {
    background_play: AtomicBool,
    focused: AtomicBool,
    policy: AtomicCell<BackgroundGate>,
}

impl PlaybackGate {
    /// Hosts start out focused.
    pub fn new(background_play: bool, policy: BackgroundGate) -> Self {
        Self {
            background_play: AtomicBool::new(background_play),
            focused: AtomicBool::new(true),
            policy: AtomicCell::new(policy),
        }
    }

    pub fn set_background_play(&self, enabled: bool) {
        self.background_play.store(enabled, Ordering::Release);
    }

    pub fn background_play(&self) -> bool {
        self.background_play.load(Ordering::Acquire)
    }

    pub fn set_focused(&self, focused: bool) {
        self.focused.store(focused, Ordering::Release);
    }

    pub fn is_focused(&self) -> bool {
        self.focused.load(Ordering::Acquire)
    }

    pub fn set_policy(&self, policy: BackgroundGate) {
        self.policy.store(policy);
    }

    pub fn policy(&self) -> BackgroundGate {
        self.policy.load()
    }

    /// Realtime safe.
    #[inline]
    pub fn state(&self) -> GateState {
        if self.background_play() || self.is_focused() {
            return GateState::Open;
        }
        match self.policy() {
            BackgroundGate::AllSources => GateState::SilenceAll,
            BackgroundGate::EngineOnly => GateState::SilenceEngine,
        }
    }
}

impl Default for PlaybackGate {
    fn default() -> Self {
        Self::new(false, BackgroundGate::default())
    }
}
