use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{ChimeError, Result};
use crate::gate::BackgroundGate;
use crate::native::PanLaw;

pub const DEFAULT_SAMPLE_RATE: u32 = 48_000;
pub const DEFAULT_CHANNELS: u16 = 2;
pub const DEFAULT_MAX_FRAMES: usize = 4096;

/// Engine configuration. Fixed for the lifetime of an engine.
///
/// Every field has a default, so a JSON document only needs the keys it
/// wants to override:
///
/// ```
/// # use chime_core::EngineConfig;
/// let config = EngineConfig::from_json_str(r#"{ "sample_rate": 44100 }"#).unwrap();
/// assert_eq!(config.sample_rate, 44100);
/// assert_eq!(config.channels, 2);
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub sample_rate: u32,
    /// Output channels. Only interleaved stereo is supported.
    pub channels: u16,
    /// Requested device buffer in frames; `None` lets the device decide.
    pub buffer_frames: Option<u32>,
    /// Scratch buffers are pre-sized for this many frames per tick.
    pub max_frames: usize,
    pub background_play: bool,
    pub background_gate: BackgroundGate,
    /// Output device to open, matched case-insensitively. Default device when `None`.
    pub device_name: Option<String>,
    pub sound_capacity: usize,
    pub waveform_capacity: usize,
    /// How the built-in mixer maps a sound's pan to channel gains.
    pub pan_law: PanLaw,
    /// EMA smoothing for callback timing statistics, in (0, 1].
    pub perf_ema_alpha: f64,
}

impl EngineConfig {
    pub fn new() -> Self {
        Self {
            sample_rate: DEFAULT_SAMPLE_RATE,
            channels: DEFAULT_CHANNELS,
            buffer_frames: None,
            max_frames: DEFAULT_MAX_FRAMES,
            background_play: false,
            background_gate: BackgroundGate::AllSources,
            device_name: None,
            sound_capacity: 64,
            waveform_capacity: 32,
            pan_law: PanLaw::Balance,
            perf_ema_alpha: 0.1,
        }
    }

    pub fn with_sample_rate(mut self, rate: u32) -> Self {
        self.sample_rate = rate;
        self
    }

    pub fn with_buffer_frames(mut self, frames: u32) -> Self {
        self.buffer_frames = Some(frames);
        self
    }

    pub fn with_max_frames(mut self, frames: usize) -> Self {
        self.max_frames = frames;
        self
    }

    pub fn with_background_play(mut self, enabled: bool) -> Self {
        self.background_play = enabled;
        self
    }

    pub fn with_background_gate(mut self, gate: BackgroundGate) -> Self {
        self.background_gate = gate;
        self
    }

    pub fn with_device_name(mut self, name: impl Into<String>) -> Self {
        self.device_name = Some(name.into());
        self
    }

    pub fn from_json_str(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::from_json_str(&text)
    }

    pub fn to_json_string(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Reject configurations the engine cannot run with.
    pub fn validate(&self) -> Result<()> {
        if self.sample_rate == 0 {
            return Err(ChimeError::EngineInit("sample rate must be non-zero".into()));
        }
        if self.channels != DEFAULT_CHANNELS {
            return Err(ChimeError::EngineInit(format!(
                "only stereo output is supported, got {} channels",
                self.channels
            )));
        }
        if self.max_frames == 0 {
            return Err(ChimeError::EngineInit("max_frames must be non-zero".into()));
        }
        if !(self.perf_ema_alpha > 0.0 && self.perf_ema_alpha <= 1.0) {
            return Err(ChimeError::EngineInit(format!(
                "perf_ema_alpha must be in (0, 1], got {}",
                self.perf_ema_alpha
            )));
        }
        Ok(())
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self::new()
    }
}
