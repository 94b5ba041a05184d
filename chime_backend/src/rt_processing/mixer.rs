//! The per-tick mix: native sounds, then waveforms, then noise, then clamp.

use std::sync::Arc;

use chime_core::mix::clamp_unit;
use chime_core::{GateState, NativeMixer, NoiseSlot, PlaybackGate, WaveformVoices};
use spin::Mutex;

use crate::rt_processing::callback::AudioCallback;
use crate::rt_processing::performance::PerformanceMonitor;

/// State shared between the control API and the mixer.
#[derive(Clone)]
pub struct MixSources {
    pub native: Arc<dyn NativeMixer>,
    pub waveforms: Arc<WaveformVoices>,
    pub noise: Arc<Mutex<NoiseSlot>>,
    pub gate: Arc<PlaybackGate>,
}

impl MixSources {
    pub fn new(native: Arc<dyn NativeMixer>, waveforms: Arc<WaveformVoices>, gate: PlaybackGate) -> Self {
        Self {
            native,
            waveforms,
            noise: Arc::new(Mutex::new(NoiseSlot::new())),
            gate: Arc::new(gate),
        }
    }
}

pub struct Mixer {
    sources: MixSources,
    monitor: Arc<PerformanceMonitor>,
    /// Accumulates the tick before it is copied to the device buffer.
    scratch: Vec<f32>,
    /// Per-waveform render target.
    wave_scratch: Vec<f32>,
}

impl Mixer {
    pub fn new(sources: MixSources, monitor: Arc<PerformanceMonitor>, channels: usize, max_frames: usize) -> Self {
        let len = channels * max_frames;
        Self {
            sources,
            monitor,
            scratch: vec![0.0; len],
            wave_scratch: vec![0.0; len],
        }
    }

    fn render(&mut self, output: &mut [f32], sample_rate: f32, channels: usize, frames: usize) {
        self.monitor.add_frames_processed(frames as u64);

        let gate = self.sources.gate.state();
        if gate == GateState::SilenceAll {
            output.fill(0.0);
            self.monitor.increment_silenced_ticks();
            return;
        }

        let len = frames * channels;
        if self.scratch.len() != len {
            // Stays within capacity unless the device exceeds max_frames.
            self.scratch.resize(len, 0.0);
            self.wave_scratch.resize(len, 0.0);
        }

        if gate == GateState::SilenceEngine {
            self.scratch.fill(0.0);
        } else {
            match self.sources.native.read_pcm_frames(&mut self.scratch, frames) {
                Ok(read) if read < frames => self.scratch[read * channels..].fill(0.0),
                Ok(_) => {}
                Err(_) => {
                    self.scratch.fill(0.0);
                    self.monitor.increment_source_failures();
                }
            }
        }

        let waveforms = self
            .sources
            .waveforms
            .mix_into(&mut self.scratch, &mut self.wave_scratch, sample_rate, channels, frames);
        if waveforms.is_none() {
            self.monitor.increment_source_failures();
        }

        match self.sources.noise.try_lock() {
            Some(mut noise) => {
                noise.mix_into(&mut self.scratch, channels, frames, 1.0 / sample_rate);
            }
            None => self.monitor.increment_source_failures(),
        }

        clamp_unit(&mut self.scratch);
        output[..len].copy_from_slice(&self.scratch);
    }
}

impl AudioCallback for Mixer {
    fn process(&mut self, output: &mut [f32], sample_rate: f32, channels: usize, frames: usize) {
        let monitor = Arc::clone(&self.monitor);
        let _tick = monitor.scoped_callback();
        self.render(output, sample_rate, channels, frames);
    }
}
