use crossbeam::atomic::AtomicCell;

use super::tables::{WaveformType, init_tables, normalize_phase, phase_increment};

/// Table-lookup oscillator. Phase survives parameter changes and pauses.
///
/// Parameters are atomics so the control thread can retune a running
/// oscillator while the mixer reads it. Only the mixer writes the phase.
#[derive(Debug)]
pub struct Oscillator {
    waveform: AtomicCell<WaveformType>,
    frequency: AtomicCell<f32>,
    amplitude: AtomicCell<f32>,
    phase: AtomicCell<f32>,
}

impl Oscillator {
    pub fn new(waveform: WaveformType, frequency: f32, amplitude: f32) -> Self {
        init_tables();

        Self {
            waveform: AtomicCell::new(waveform),
            frequency: AtomicCell::new(sanitize_frequency(frequency)),
            amplitude: AtomicCell::new(sanitize_amplitude(amplitude)),
            phase: AtomicCell::new(0.0),
        }
    }

    pub fn set_waveform(&self, waveform: WaveformType) {
        self.waveform.store(waveform);
    }

    pub fn set_frequency(&self, frequency: f32) {
        self.frequency.store(sanitize_frequency(frequency));
    }

    /// Negative amplitudes invert the phase.
    pub fn set_amplitude(&self, amplitude: f32) {
        self.amplitude.store(sanitize_amplitude(amplitude));
    }

    pub fn waveform(&self) -> WaveformType {
        self.waveform.load()
    }

    pub fn frequency(&self) -> f32 {
        self.frequency.load()
    }

    pub fn amplitude(&self) -> f32 {
        self.amplitude.load()
    }

    pub fn phase(&self) -> f32 {
        self.phase.load()
    }

    /// Write `frame_count` frames into interleaved `output`, the same value on
    /// every channel.
    pub fn fill_buffer(&self, output: &mut [f32], sample_rate: f32, channels: usize, frame_count: usize) {
        let waveform = self.waveform.load();
        let amplitude = self.amplitude.load();
        let increment = phase_increment(self.frequency.load(), sample_rate);
        let mut phase = self.phase.load();

        for frame in output[..frame_count * channels].chunks_exact_mut(channels) {
            frame.fill(waveform.sample(phase) * amplitude);
            phase = normalize_phase(phase + increment);
        }

        self.phase.store(phase);
    }
}

fn sanitize_frequency(frequency: f32) -> f32 {
    if frequency.is_finite() { frequency.max(0.0) } else { 0.0 }
}

fn sanitize_amplitude(amplitude: f32) -> f32 {
    if amplitude.is_finite() { amplitude } else { 0.0 }
}
