use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

use quanta::{Clock, Instant as QuantaInstant};

/// Snapshot of mixer metrics suitable for logging/telemetry (non-RT).
#[derive(Debug, Clone)]
pub struct PerformanceSnapshot {
    /// Frames rendered since creation or the last `reset_all`.
    pub frames_processed: u64,
    pub callback_count: u64,
    /// Ticks silenced by the background-play gate.
    pub silenced_ticks: u64,
    /// Ticks where the mixer itself was locked and silence went out instead.
    pub contended_ticks: u64,
    /// Individual source reads (native mixer, waveform bank, noise slot) that
    /// failed or were contended and contributed nothing.
    pub source_failures: u64,
    pub min_callback_nanos: Option<u64>,
    pub max_callback_nanos: Option<u64>,
    /// EMA of callback duration in nanoseconds.
    pub ema_callback_nanos: f64,
    /// Wall time available per tick at the configured buffer size.
    pub expected_callback_nanos: f64,
    pub avg_load_percent: f64,
    pub timestamp: Instant,
}

/// Real-time-safe performance monitor.
///
/// The audio thread only calls the `add_*`/`increment_*` methods and
/// `scoped_callback()`; all of them are plain atomics. `snapshot` runs on the
/// control thread.
pub struct PerformanceMonitor {
    clock: Clock,
    frame_size: usize,
    sample_rate: f32,

    frames_processed: AtomicU64,
    callback_count: AtomicU64,
    silenced_ticks: AtomicU64,
    contended_ticks: AtomicU64,
    source_failures: AtomicU64,

    min_callback_nanos: AtomicU64,
    max_callback_nanos: AtomicU64,
    /// f64 bits
    ema_callback_bits: AtomicU64,
    ema_alpha: f64,
}

impl PerformanceMonitor {
    /// `ema_alpha` must be in (0, 1]; around 0.05..0.2 works well.
    pub fn new(frame_size: usize, sample_rate: f32, ema_alpha: f64) -> Self {
        assert!(ema_alpha > 0.0 && ema_alpha <= 1.0);
        Self {
            clock: Clock::new(),
            frame_size,
            sample_rate,
            frames_processed: AtomicU64::new(0),
            callback_count: AtomicU64::new(0),
            silenced_ticks: AtomicU64::new(0),
            contended_ticks: AtomicU64::new(0),
            source_failures: AtomicU64::new(0),
            min_callback_nanos: AtomicU64::new(u64::MAX),
            max_callback_nanos: AtomicU64::new(0),
            ema_callback_bits: AtomicU64::new(0),
            ema_alpha,
        }
    }

    #[inline(always)]
    pub fn add_frames_processed(&self, n: u64) {
        self.frames_processed.fetch_add(n, Ordering::Relaxed);
    }

    #[inline(always)]
    pub fn increment_silenced_ticks(&self) {
        self.silenced_ticks.fetch_add(1, Ordering::Relaxed);
    }

    #[inline(always)]
    pub fn increment_contended_ticks(&self) {
        self.contended_ticks.fetch_add(1, Ordering::Relaxed);
    }

    #[inline(always)]
    pub fn increment_source_failures(&self) {
        self.source_failures.fetch_add(1, Ordering::Relaxed);
    }

    /// Updates min, max and EMA with compare-exchange loops.
    #[inline(always)]
    pub fn record_callback_duration_nanos(&self, nanos: u64) {
        self.min_callback_nanos.fetch_min(nanos, Ordering::Relaxed);
        self.max_callback_nanos.fetch_max(nanos, Ordering::Relaxed);

        let alpha = self.ema_alpha;
        let mut old_bits = self.ema_callback_bits.load(Ordering::Relaxed);
        loop {
            let old = f64::from_bits(old_bits);
            let new = alpha * nanos as f64 + (1.0 - alpha) * old;
            match self.ema_callback_bits.compare_exchange_weak(
                old_bits,
                new.to_bits(),
                Ordering::Relaxed,
                Ordering::Relaxed,
            ) {
                Ok(_) => break,
                Err(found) => old_bits = found,
            }
        }
    }

    #[inline(always)]
    pub fn record_callback_duration(&self, d: Duration) {
        self.record_callback_duration_nanos(u64::try_from(d.as_nanos()).unwrap_or(u64::MAX));
    }

    /// Counts the tick now and records its duration when the guard drops.
    #[inline(always)]
    pub fn scoped_callback(&self) -> RealtimeGuard<'_> {
        self.callback_count.fetch_add(1, Ordering::Relaxed);
        RealtimeGuard {
            monitor: self,
            start: self.clock.now(),
        }
    }

    /// Not real-time safe. With `reset_peaks`, min/max/EMA start over.
    pub fn snapshot(&self, reset_peaks: bool) -> PerformanceSnapshot {
        let min_raw = self.min_callback_nanos.load(Ordering::Relaxed);
        let max_raw = self.max_callback_nanos.load(Ordering::Relaxed);
        let ema = f64::from_bits(self.ema_callback_bits.load(Ordering::Relaxed));
        let expected_callback_nanos = (self.frame_size as f64 / self.sample_rate as f64) * 1_000_000_000.0;
        let avg_load_percent = if expected_callback_nanos > 0.0 {
            (ema / expected_callback_nanos) * 100.0
        } else {
            0.0
        };

        if reset_peaks {
            self.min_callback_nanos.store(u64::MAX, Ordering::Relaxed);
            self.max_callback_nanos.store(0, Ordering::Relaxed);
            self.ema_callback_bits.store(0, Ordering::Relaxed);
        }

        PerformanceSnapshot {
            frames_processed: self.frames_processed.load(Ordering::Relaxed),
            callback_count: self.callback_count.load(Ordering::Relaxed),
            silenced_ticks: self.silenced_ticks.load(Ordering::Relaxed),
            contended_ticks: self.contended_ticks.load(Ordering::Relaxed),
            source_failures: self.source_failures.load(Ordering::Relaxed),
            min_callback_nanos: (min_raw != u64::MAX).then_some(min_raw),
            max_callback_nanos: (max_raw != 0).then_some(max_raw),
            ema_callback_nanos: ema,
            expected_callback_nanos,
            avg_load_percent,
            timestamp: Instant::now(),
        }
    }

    pub fn reset_all(&self) {
        self.frames_processed.store(0, Ordering::Relaxed);
        self.callback_count.store(0, Ordering::Relaxed);
        self.silenced_ticks.store(0, Ordering::Relaxed);
        self.contended_ticks.store(0, Ordering::Relaxed);
        self.source_failures.store(0, Ordering::Relaxed);
        self.min_callback_nanos.store(u64::MAX, Ordering::Relaxed);
        self.max_callback_nanos.store(0, Ordering::Relaxed);
        self.ema_callback_bits.store(0, Ordering::Relaxed);
    }
}

/// Records callback latency on drop. Atomics only.
pub struct RealtimeGuard<'a> {
    monitor: &'a PerformanceMonitor,
    start: QuantaInstant,
}

impl Drop for RealtimeGuard<'_> {
    fn drop(&mut self) {
        let elapsed = self.monitor.clock.now().saturating_duration_since(self.start);
        self.monitor.record_callback_duration(elapsed);
    }
}
