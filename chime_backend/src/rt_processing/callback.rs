//! Lock-conscious realtime callback slot.
//!
//! The device thread (or `Engine::render` in headless mode) enters through
//! `CallbackSlot::process_realtime`. It never blocks: if the processor is
//! locked, the tick goes out silent.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use spin::Mutex;

use crate::rt_processing::performance::PerformanceMonitor;

/// Trait every realtime processor must implement.
///
/// `process` must not block, allocate or log.
pub trait AudioCallback: Send + 'static {
    /// Fill the interleaved `output` buffer (length == frames * channels).
    fn process(&mut self, output: &mut [f32], sample_rate: f32, channels: usize, frames: usize);
}

/// Holds the processor behind a `spin::Mutex` and keeps the sample clock.
pub struct CallbackSlot {
    processor: Mutex<Box<dyn AudioCallback>>,
    /// Frames handed to the device so far, silent ticks included.
    sample_clock: AtomicU64,
    monitor: Arc<PerformanceMonitor>,
    sample_rate: f32,
    channels: usize,
}

impl CallbackSlot {
    pub fn new(
        processor: Box<dyn AudioCallback>,
        sample_rate: f32,
        channels: usize,
        monitor: Arc<PerformanceMonitor>,
    ) -> Self {
        Self {
            processor: Mutex::new(processor),
            sample_clock: AtomicU64::new(0),
            monitor,
            sample_rate,
            channels,
        }
    }

    /// Realtime-safe process entry.
    ///
    /// Returns `true` if the processor ran, `false` if the buffer was
    /// silenced instead. A trailing partial frame is always zeroed.
    pub fn process_realtime(&self, output: &mut [f32]) -> bool {
        let frames = output.len() / self.channels;
        let (whole, partial) = output.split_at_mut(frames * self.channels);
        partial.fill(0.0);
        if frames == 0 {
            return false;
        }

        self.sample_clock.fetch_add(frames as u64, Ordering::Relaxed);

        if let Some(mut processor) = self.processor.try_lock() {
            processor.process(whole, self.sample_rate, self.channels, frames);
            true
        } else {
            whole.fill(0.0);
            self.monitor.increment_contended_ticks();
            false
        }
    }

    /// Seconds of audio handed out (frames / sample_rate).
    pub fn playback_time(&self) -> f64 {
        self.frame_count() as f64 / self.sample_rate as f64
    }

    pub fn frame_count(&self) -> u64 {
        self.sample_clock.load(Ordering::Relaxed)
    }

    pub fn sample_rate(&self) -> f32 {
        self.sample_rate
    }

    pub fn channels(&self) -> usize {
        self.channels
    }

    #[cfg(test)]
    pub(crate) fn lock_processor(&self) -> spin::MutexGuard<'_, Box<dyn AudioCallback>> {
        self.processor.lock()
    }
}
