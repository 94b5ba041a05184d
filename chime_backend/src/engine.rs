//! The engine facade: owns the output stream, the native mixer and the
//! handle registries, and exposes the control API to the application thread.

use std::sync::Arc;

use chime_core::waveform::tables::init_tables;
use chime_core::{
    BackgroundGate, ChimeError, EngineConfig, NativeMixer, PcmMixer, PlaybackGate, Result, SoundHandle,
    SoundRegistry, VirtualFileSystem, WaveformBank, WaveformHandle, WaveformType,
};
use tracing::{debug, info, warn};

use crate::audio_device::open_output_stream;
use crate::rt_processing::callback::CallbackSlot;
use crate::rt_processing::mixer::{MixSources, Mixer};
use crate::rt_processing::performance::{PerformanceMonitor, PerformanceSnapshot};

/// Where rendered audio goes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Output {
    /// Open the configured (or default) output device.
    Device,
    /// No device; the host drives ticks through [`Engine::render`].
    Headless,
}

pub struct Engine {
    config: EngineConfig,
    sources: MixSources,
    sounds: SoundRegistry,
    waveforms: WaveformBank,
    slot: Arc<CallbackSlot>,
    monitor: Arc<PerformanceMonitor>,
    vfs: Option<Box<dyn VirtualFileSystem>>,
    stream: Option<cpal::Stream>,
}

impl Engine {
    /// Start an engine on an output device with the built-in [`PcmMixer`].
    pub fn new(config: EngineConfig) -> Result<Self> {
        let native = Self::default_native(&config)?;
        Self::with_native(config, native, Output::Device)
    }

    /// Start an engine without an output device.
    pub fn headless(config: EngineConfig) -> Result<Self> {
        let native = Self::default_native(&config)?;
        Self::with_native(config, native, Output::Headless)
    }

    fn default_native(config: &EngineConfig) -> Result<Arc<dyn NativeMixer>> {
        config.validate()?;
        Ok(Arc::new(
            PcmMixer::new(config.sample_rate)
                .with_pan_law(config.pan_law)
                .with_voice_capacity(config.sound_capacity),
        ))
    }

    pub fn with_native(config: EngineConfig, native: Arc<dyn NativeMixer>, output: Output) -> Result<Self> {
        config.validate()?;
        if native.sample_rate() != config.sample_rate {
            return Err(ChimeError::ResourceManagerInit(format!(
                "native mixer runs at {} Hz, engine configured for {} Hz",
                native.sample_rate(),
                config.sample_rate
            )));
        }

        // Build oscillator tables before the audio thread can ask for them.
        init_tables();

        let channels = usize::from(config.channels);
        let sample_rate = config.sample_rate as f32;
        let monitor = Arc::new(PerformanceMonitor::new(
            config.buffer_frames.map_or(config.max_frames, |frames| frames as usize),
            sample_rate,
            config.perf_ema_alpha,
        ));

        let gate = PlaybackGate::new(config.background_play, config.background_gate);
        let waveforms = WaveformBank::with_capacity(config.waveform_capacity);
        let sources = MixSources::new(native, Arc::clone(waveforms.voices()), gate);
        let mixer = Mixer::new(sources.clone(), Arc::clone(&monitor), channels, config.max_frames);
        let slot = Arc::new(CallbackSlot::new(
            Box::new(mixer),
            sample_rate,
            channels,
            Arc::clone(&monitor),
        ));

        let stream = match output {
            Output::Device => Some(open_output_stream(&config, Arc::clone(&slot))?),
            Output::Headless => None,
        };

        info!(
            sample_rate = config.sample_rate,
            channels = config.channels,
            max_frames = config.max_frames,
            background_play = config.background_play,
            ?output,
            "engine started"
        );

        Ok(Self {
            sounds: SoundRegistry::with_capacity(config.sample_rate, config.sound_capacity),
            waveforms,
            config,
            sources,
            slot,
            monitor,
            vfs: None,
            stream,
        })
    }

    /// Resolve sound paths through `vfs` instead of the disk.
    pub fn with_file_system(mut self, vfs: impl VirtualFileSystem + 'static) -> Self {
        self.vfs = Some(Box::new(vfs));
        self
    }

    // Sounds

    pub fn load_sound(&mut self, path: &str, play_once: bool) -> Result<SoundHandle> {
        self.sounds
            .load_sound(&*self.sources.native, path, play_once, self.vfs.as_deref())
    }

    /// Load `path` as a one-shot and start it. It is unloaded by
    /// [`Engine::on_before_user_update`] once it finishes.
    pub fn play_once(&mut self, path: &str) -> Result<SoundHandle> {
        let handle = self.load_sound(path, true)?;
        if let Err(e) = self.sounds.play(&*self.sources.native, handle, false) {
            self.sounds.unload_sound(&*self.sources.native, handle)?;
            return Err(e);
        }
        Ok(handle)
    }

    pub fn unload_sound(&mut self, handle: SoundHandle) -> Result<()> {
        self.sounds.unload_sound(&*self.sources.native, handle)
    }

    /// Start from the beginning, restarting if already playing.
    pub fn play(&mut self, handle: SoundHandle, looping: bool) -> Result<()> {
        self.sounds.play(&*self.sources.native, handle, looping)
    }

    /// Halt and rewind.
    pub fn stop(&mut self, handle: SoundHandle) -> Result<()> {
        self.sounds.stop(&*self.sources.native, handle)
    }

    /// Halt in place. No-op when already paused.
    pub fn pause(&mut self, handle: SoundHandle) -> Result<()> {
        self.sounds.pause(&*self.sources.native, handle)
    }

    /// Flip between playing and paused. With `rewind`, pausing also seeks
    /// back to frame 0.
    pub fn toggle(&mut self, handle: SoundHandle, rewind: bool) -> Result<()> {
        self.sounds.toggle(&*self.sources.native, handle, rewind)
    }

    pub fn set_volume(&mut self, handle: SoundHandle, volume: f32) -> Result<()> {
        self.sounds.set_volume(&*self.sources.native, handle, volume)
    }

    pub fn set_pan(&mut self, handle: SoundHandle, pan: f32) -> Result<()> {
        self.sounds.set_pan(&*self.sources.native, handle, pan)
    }

    pub fn set_pitch(&mut self, handle: SoundHandle, pitch: f32) -> Result<()> {
        self.sounds.set_pitch(&*self.sources.native, handle, pitch)
    }

    pub fn volume(&self, handle: SoundHandle) -> Result<f32> {
        self.sounds.volume(&*self.sources.native, handle)
    }

    pub fn pan(&self, handle: SoundHandle) -> Result<f32> {
        self.sounds.pan(&*self.sources.native, handle)
    }

    pub fn pitch(&self, handle: SoundHandle) -> Result<f32> {
        self.sounds.pitch(&*self.sources.native, handle)
    }

    pub fn seek_ms(&mut self, handle: SoundHandle, milliseconds: u64) -> Result<()> {
        self.sounds.seek_ms(&*self.sources.native, handle, milliseconds)
    }

    /// Seek to `location` in [0, 1] of the sound's length.
    pub fn seek_normalized(&mut self, handle: SoundHandle, location: f32) -> Result<()> {
        self.sounds.seek_normalized(&*self.sources.native, handle, location)
    }

    pub fn forward(&mut self, handle: SoundHandle, milliseconds: u64) -> Result<()> {
        self.sounds.forward(&*self.sources.native, handle, milliseconds)
    }

    pub fn rewind(&mut self, handle: SoundHandle, milliseconds: u64) -> Result<()> {
        self.sounds.rewind(&*self.sources.native, handle, milliseconds)
    }

    pub fn is_playing(&self, handle: SoundHandle) -> Result<bool> {
        self.sounds.is_playing(&*self.sources.native, handle)
    }

    pub fn cursor_ms(&self, handle: SoundHandle) -> Result<u64> {
        self.sounds.cursor_ms(&*self.sources.native, handle)
    }

    pub fn cursor_normalized(&self, handle: SoundHandle) -> Result<f32> {
        self.sounds.cursor_normalized(&*self.sources.native, handle)
    }

    pub fn length_frames(&self, handle: SoundHandle) -> Result<u64> {
        self.sounds.length_frames(handle)
    }

    pub fn length_seconds(&self, handle: SoundHandle) -> Result<f32> {
        self.sounds.length_seconds(handle)
    }

    // Waveforms

    /// Create a halted oscillator.
    pub fn create_waveform(&mut self, amplitude: f32, frequency: f32, waveform_type: WaveformType) -> WaveformHandle {
        let handle = self.waveforms.create(amplitude, frequency, waveform_type);
        debug!(index = handle.index(), ?waveform_type, frequency, amplitude, "created waveform");
        handle
    }

    pub fn play_waveform(&mut self, handle: WaveformHandle) -> Result<()> {
        self.waveforms.play(handle)
    }

    /// Halt without resetting phase.
    pub fn stop_waveform(&mut self, handle: WaveformHandle) -> Result<()> {
        self.waveforms.stop(handle)
    }

    pub fn is_waveform_playing(&self, handle: WaveformHandle) -> Result<bool> {
        self.waveforms.is_playing(handle)
    }

    pub fn set_waveform_amplitude(&mut self, handle: WaveformHandle, amplitude: f32) -> Result<()> {
        self.waveforms.set_amplitude(handle, amplitude)
    }

    pub fn set_waveform_frequency(&mut self, handle: WaveformHandle, frequency: f32) -> Result<()> {
        self.waveforms.set_frequency(handle, frequency)
    }

    pub fn set_waveform_type(&mut self, handle: WaveformHandle, waveform_type: WaveformType) -> Result<()> {
        self.waveforms.set_type(handle, waveform_type)
    }

    pub fn unload_waveform(&mut self, handle: WaveformHandle) -> Result<()> {
        let removed = self.waveforms.unload(handle)?;
        drop(removed);
        debug!(index = handle.index(), "unloaded waveform");
        Ok(())
    }

    // Noise

    /// Install the per-frame noise callback, replacing any previous one.
    /// See [`chime_core::NoiseFn`] for the realtime contract.
    pub fn set_noise_callback<F>(&mut self, callback: F)
    where
        F: FnMut(&mut f32, &mut f32, f32) + Send + 'static,
    {
        let previous = self.sources.noise.lock().set(Box::new(callback));
        drop(previous);
    }

    pub fn clear_noise_callback(&mut self) {
        let previous = self.sources.noise.lock().clear();
        drop(previous);
    }

    // Gating and host hooks

    pub fn set_background_play(&self, enabled: bool) {
        self.sources.gate.set_background_play(enabled);
    }

    pub fn background_play(&self) -> bool {
        self.sources.gate.background_play()
    }

    pub fn set_background_gate(&self, policy: BackgroundGate) {
        self.sources.gate.set_policy(policy);
    }

    /// Report whether the host window has focus.
    pub fn set_focused(&self, focused: bool) {
        self.sources.gate.set_focused(focused);
    }

    /// Per-frame hook: runs queued native work and unloads finished one-shot
    /// sounds. Returns how many one-shots were unloaded.
    pub fn on_before_user_update(&mut self) -> Result<usize> {
        self.sources.native.process_pending_jobs();
        let collected = self.sounds.collect_finished_one_offs(&*self.sources.native)?;
        if collected > 0 {
            debug!(collected, remaining = self.sounds.one_off_count(), "collected finished one-shots");
        }
        Ok(collected)
    }

    // Queries

    pub fn one_off_count(&self) -> usize {
        self.sounds.one_off_count()
    }

    pub fn sound_count(&self) -> usize {
        self.sounds.len()
    }

    pub fn waveform_count(&self) -> usize {
        self.waveforms.len()
    }

    /// Number of live sounds sharing the encoded bytes of `path`.
    pub fn file_refcount(&self, path: &str) -> usize {
        self.sounds.files().refcount(path)
    }

    pub fn sounds(&self) -> &SoundRegistry {
        &self.sounds
    }

    /// Direct access to the native mixer for controls the engine does not wrap.
    pub fn native(&self) -> &Arc<dyn NativeMixer> {
        &self.sources.native
    }

    /// Render one tick into interleaved `output`. Intended for headless
    /// engines; with a live device this races the device for the mixer and
    /// may come back silent. Returns whether the mixer ran.
    pub fn render(&self, output: &mut [f32]) -> bool {
        self.slot.process_realtime(output)
    }

    pub fn performance(&self) -> PerformanceSnapshot {
        self.monitor.snapshot(false)
    }

    pub fn frames_rendered(&self) -> u64 {
        self.slot.frame_count()
    }

    /// Seconds of audio rendered so far.
    pub fn stream_time(&self) -> f64 {
        self.slot.playback_time()
    }

    pub fn sample_rate(&self) -> u32 {
        self.config.sample_rate
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn is_headless(&self) -> bool {
        self.stream.is_none()
    }
}

impl Drop for Engine {
    fn drop(&mut self) {
        // Stop callbacks before tearing down what they read.
        drop(self.stream.take());

        if let Err(e) = self.sounds.unload_all(&*self.sources.native) {
            warn!(error = %e, "failed to unload every sound during shutdown");
        }
        self.clear_noise_callback();

        debug!("engine shut down");
    }
}
