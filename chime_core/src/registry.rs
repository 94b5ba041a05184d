//! Handle-based arena of loaded sounds.
//!
//! Slots are reused before the arena grows. Every free bumps the slot
//! generation, so a handle kept past `unload_sound` is rejected instead of
//! silently addressing whatever was loaded into the slot next.

use tracing::{debug, warn};

use crate::error::{ChimeError, HandleKind, Result};
use crate::file_cache::FileBufferCache;
use crate::native::{NativeMixer, NativeSoundId};
use crate::vfs::VirtualFileSystem;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SoundHandle {
    index: u32,
    generation: u32,
}

impl SoundHandle {
    pub fn index(&self) -> u32 {
        self.index
    }

    pub fn generation(&self) -> u32 {
        self.generation
    }
}

#[derive(Debug)]
struct Sound {
    native: NativeSoundId,
    path: String,
    length_frames: u64,
    length_seconds: f32,
    play_once: bool,
    started: bool,
}

#[derive(Debug)]
struct Slot {
    generation: u32,
    sound: Option<Sound>,
}

#[derive(Debug)]
pub struct SoundRegistry {
    slots: Vec<Slot>,
    free: Vec<u32>,
    files: FileBufferCache,
    one_off_count: usize,
    sample_rate: u32,
}

impl SoundRegistry {
    pub fn new(sample_rate: u32) -> Self {
        Self::with_capacity(sample_rate, 0)
    }

    pub fn with_capacity(sample_rate: u32, capacity: usize) -> Self {
        Self {
            slots: Vec::with_capacity(capacity),
            free: Vec::new(),
            files: FileBufferCache::new(),
            one_off_count: 0,
            sample_rate,
        }
    }

    pub fn load_sound(
        &mut self,
        native: &dyn NativeMixer,
        path: &str,
        play_once: bool,
        source: Option<&dyn VirtualFileSystem>,
    ) -> Result<SoundHandle> {
        self.files.load(path, source, native)?;

        let id = match native.create_sound(path) {
            Ok(id) => id,
            Err(e) => {
                self.files.unload(path, native)?;
                return Err(ChimeError::sound_init(path, e));
            }
        };

        // Querying the length can be expensive; do it once.
        let length_frames = match native.length_frames(id) {
            Ok(frames) => frames,
            Err(e) => {
                native.destroy_sound(id)?;
                self.files.unload(path, native)?;
                return Err(ChimeError::sound_init(path, e));
            }
        };

        let sound = Sound {
            native: id,
            path: path.to_string(),
            length_frames,
            length_seconds: length_frames as f32 / self.sample_rate as f32,
            play_once,
            started: false,
        };
        let handle = self.insert(sound);
        if play_once {
            self.one_off_count += 1;
        }

        debug!(path, index = handle.index, play_once, length_frames, "loaded sound");
        Ok(handle)
    }

    fn insert(&mut self, sound: Sound) -> SoundHandle {
        if let Some(index) = self.free.pop() {
            let slot = &mut self.slots[index as usize];
            slot.sound = Some(sound);
            return SoundHandle {
                index,
                generation: slot.generation,
            };
        }

        let index = self.slots.len() as u32;
        self.slots.push(Slot {
            generation: 0,
            sound: Some(sound),
        });
        SoundHandle { index, generation: 0 }
    }

    /// Stop and destroy the native sound, then free the slot and release
    /// the file. If the native side refuses, the handle stays valid so the
    /// caller can retry.
    pub fn unload_sound(&mut self, native: &dyn NativeMixer, handle: SoundHandle) -> Result<()> {
        let id = self.sound(handle)?.native;
        native.stop(id)?;
        native.destroy_sound(id)?;

        let slot = &mut self.slots[handle.index as usize];
        let Some(sound) = slot.sound.take() else {
            return Err(invalid(handle));
        };
        slot.generation = slot.generation.wrapping_add(1);
        self.free.push(handle.index);
        if sound.play_once {
            self.one_off_count = self.one_off_count.saturating_sub(1);
        }

        self.files.unload(&sound.path, native)?;

        debug!(path = %sound.path, index = handle.index, "unloaded sound");
        Ok(())
    }

    /// Start playback. A sound that is already playing restarts from frame 0
    /// and keeps its looping flag.
    pub fn play(&mut self, native: &dyn NativeMixer, handle: SoundHandle, looping: bool) -> Result<()> {
        let sound = self.sound_mut(handle)?;
        sound.started = true;
        let id = sound.native;

        if native.is_playing(id)? {
            native.seek_to_frame(id, 0)?;
            return Ok(());
        }
        native.set_looping(id, looping)?;
        native.start(id)?;
        Ok(())
    }

    /// Halt and rewind to frame 0.
    pub fn stop(&self, native: &dyn NativeMixer, handle: SoundHandle) -> Result<()> {
        let id = self.sound(handle)?.native;
        native.stop(id)?;
        native.seek_to_frame(id, 0)?;
        Ok(())
    }

    /// Halt in place.
    pub fn pause(&self, native: &dyn NativeMixer, handle: SoundHandle) -> Result<()> {
        let id = self.sound(handle)?.native;
        native.stop(id)?;
        Ok(())
    }

    /// Flip between playing and halted, optionally rewinding when halting.
    pub fn toggle(&mut self, native: &dyn NativeMixer, handle: SoundHandle, rewind: bool) -> Result<()> {
        let sound = self.sound_mut(handle)?;
        let id = sound.native;

        if native.is_playing(id)? {
            native.stop(id)?;
            if rewind {
                native.seek_to_frame(id, 0)?;
            }
            return Ok(());
        }
        sound.started = true;
        native.start(id)?;
        Ok(())
    }

    pub fn seek_ms(&self, native: &dyn NativeMixer, handle: SoundHandle, milliseconds: u64) -> Result<()> {
        let sound = self.sound(handle)?;
        let frame = self.ms_to_frames(milliseconds).min(sound.length_frames);
        native.seek_to_frame(sound.native, frame)?;
        Ok(())
    }

    /// Seek to `location` in [0, 1] of the sound's length.
    pub fn seek_normalized(&self, native: &dyn NativeMixer, handle: SoundHandle, location: f32) -> Result<()> {
        let sound = self.sound(handle)?;
        let frame = (sound.length_frames as f64 * location.clamp(0.0, 1.0) as f64) as u64;
        native.seek_to_frame(sound.native, frame)?;
        Ok(())
    }

    /// Relative seek, clamped to the last frame.
    pub fn forward(&self, native: &dyn NativeMixer, handle: SoundHandle, milliseconds: u64) -> Result<()> {
        let sound = self.sound(handle)?;
        let cursor = native.cursor_frames(sound.native)?;
        let last = sound.length_frames.saturating_sub(1);
        let frame = cursor.saturating_add(self.ms_to_frames(milliseconds)).min(last);
        native.seek_to_frame(sound.native, frame)?;
        Ok(())
    }

    /// Relative seek, clamped to frame 0.
    pub fn rewind(&self, native: &dyn NativeMixer, handle: SoundHandle, milliseconds: u64) -> Result<()> {
        let sound = self.sound(handle)?;
        let cursor = native.cursor_frames(sound.native)?;
        let frame = cursor.saturating_sub(self.ms_to_frames(milliseconds));
        native.seek_to_frame(sound.native, frame)?;
        Ok(())
    }

    pub fn set_volume(&self, native: &dyn NativeMixer, handle: SoundHandle, volume: f32) -> Result<()> {
        let id = self.sound(handle)?.native;
        native.set_volume(id, finite_or(volume, 1.0).clamp(0.0, 1.0))?;
        Ok(())
    }

    pub fn set_pan(&self, native: &dyn NativeMixer, handle: SoundHandle, pan: f32) -> Result<()> {
        let id = self.sound(handle)?.native;
        native.set_pan(id, finite_or(pan, 0.0).clamp(-1.0, 1.0))?;
        Ok(())
    }

    pub fn set_pitch(&self, native: &dyn NativeMixer, handle: SoundHandle, pitch: f32) -> Result<()> {
        let id = self.sound(handle)?.native;
        native.set_pitch(id, finite_or(pitch, 1.0).max(0.0))?;
        Ok(())
    }

    pub fn volume(&self, native: &dyn NativeMixer, handle: SoundHandle) -> Result<f32> {
        Ok(native.volume(self.sound(handle)?.native)?)
    }

    pub fn pan(&self, native: &dyn NativeMixer, handle: SoundHandle) -> Result<f32> {
        Ok(native.pan(self.sound(handle)?.native)?)
    }

    pub fn pitch(&self, native: &dyn NativeMixer, handle: SoundHandle) -> Result<f32> {
        Ok(native.pitch(self.sound(handle)?.native)?)
    }

    pub fn is_playing(&self, native: &dyn NativeMixer, handle: SoundHandle) -> Result<bool> {
        Ok(native.is_playing(self.sound(handle)?.native)?)
    }

    pub fn cursor_ms(&self, native: &dyn NativeMixer, handle: SoundHandle) -> Result<u64> {
        let cursor = native.cursor_frames(self.sound(handle)?.native)?;
        Ok(cursor * 1000 / self.sample_rate as u64)
    }

    /// Cursor as a fraction of the cached length.
    pub fn cursor_normalized(&self, native: &dyn NativeMixer, handle: SoundHandle) -> Result<f32> {
        let sound = self.sound(handle)?;
        if sound.length_frames == 0 {
            return Ok(0.0);
        }
        let cursor = native.cursor_frames(sound.native)?;
        Ok(cursor as f32 / sound.length_frames as f32)
    }

    pub fn length_frames(&self, handle: SoundHandle) -> Result<u64> {
        Ok(self.sound(handle)?.length_frames)
    }

    pub fn length_seconds(&self, handle: SoundHandle) -> Result<f32> {
        Ok(self.sound(handle)?.length_seconds)
    }

    pub fn path(&self, handle: SoundHandle) -> Result<&str> {
        Ok(&self.sound(handle)?.path)
    }

    pub fn native_id(&self, handle: SoundHandle) -> Result<NativeSoundId> {
        Ok(self.sound(handle)?.native)
    }

    /// Unload every one-shot sound that was started and has stopped playing.
    ///
    /// Application thread only. Returns how many sounds were unloaded.
    pub fn collect_finished_one_offs(&mut self, native: &dyn NativeMixer) -> Result<usize> {
        let mut finished = Vec::new();
        for (index, slot) in self.slots.iter().enumerate() {
            let Some(sound) = slot.sound.as_ref() else { continue };
            if !sound.play_once || !sound.started {
                continue;
            }
            if !native.is_playing(sound.native)? {
                finished.push(SoundHandle {
                    index: index as u32,
                    generation: slot.generation,
                });
            }
        }

        for &handle in &finished {
            self.unload_sound(native, handle)?;
        }
        Ok(finished.len())
    }

    /// Unload everything. Keeps going past failures and reports the first.
    pub fn unload_all(&mut self, native: &dyn NativeMixer) -> Result<()> {
        let handles: Vec<SoundHandle> = self.handles().collect();
        let mut first_error = None;
        for handle in handles {
            if let Err(e) = self.unload_sound(native, handle) {
                warn!(index = handle.index, error = %e, "failed to unload sound");
                first_error.get_or_insert(e);
            }
        }
        first_error.map_or(Ok(()), Err)
    }

    /// Handles of all loaded sounds.
    pub fn handles(&self) -> impl Iterator<Item = SoundHandle> + '_ {
        self.slots.iter().enumerate().filter_map(|(index, slot)| {
            slot.sound.as_ref().map(|_| SoundHandle {
                index: index as u32,
                generation: slot.generation,
            })
        })
    }

    pub fn contains(&self, handle: SoundHandle) -> bool {
        self.sound(handle).is_ok()
    }

    /// Number of loaded sounds.
    pub fn len(&self) -> usize {
        self.slots.len() - self.free.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Number of slots, occupied or not.
    pub fn slot_count(&self) -> usize {
        self.slots.len()
    }

    pub fn one_off_count(&self) -> usize {
        self.one_off_count
    }

    pub fn files(&self) -> &FileBufferCache {
        &self.files
    }

    fn ms_to_frames(&self, milliseconds: u64) -> u64 {
        milliseconds.saturating_mul(self.sample_rate as u64) / 1000
    }

    fn sound(&self, handle: SoundHandle) -> Result<&Sound> {
        self.slots
            .get(handle.index as usize)
            .filter(|slot| slot.generation == handle.generation)
            .and_then(|slot| slot.sound.as_ref())
            .ok_or_else(|| invalid(handle))
    }

    fn sound_mut(&mut self, handle: SoundHandle) -> Result<&mut Sound> {
        self.slots
            .get_mut(handle.index as usize)
            .filter(|slot| slot.generation == handle.generation)
            .and_then(|slot| slot.sound.as_mut())
            .ok_or_else(|| invalid(handle))
    }
}

/// Non-finite control values fall back to the parameter's default.
fn finite_or(value: f32, default: f32) -> f32 {
    if value.is_finite() { value } else { default }
}

fn invalid(handle: SoundHandle) -> ChimeError {
    ChimeError::InvalidHandle {
        kind: HandleKind::Sound,
        index: handle.index,
        generation: handle.generation,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicBool, Ordering};

    use crate::error::NativeError;
    use crate::native::PcmMixer;
    use crate::test_support::wav_bytes;
    use crate::vfs::MemoryFileSystem;

    const RATE: u32 = 48_000;

    struct Fixture {
        fs: MemoryFileSystem,
        native: PcmMixer,
        registry: SoundRegistry,
    }

    impl Fixture {
        fn new() -> Self {
            let fs = MemoryFileSystem::new();
            // One second of audio.
            fs.insert("a.wav", wav_bytes(1, RATE, &vec![0.2; RATE as usize]));
            fs.insert("b.wav", wav_bytes(2, RATE, &vec![0.1; 2 * 4800]));
            Self {
                fs,
                native: PcmMixer::new(RATE),
                registry: SoundRegistry::new(RATE),
            }
        }

        fn load(&mut self, path: &str) -> SoundHandle {
            self.load_with(path, false)
        }

        fn load_with(&mut self, path: &str, play_once: bool) -> SoundHandle {
            self.registry
                .load_sound(&self.native, path, play_once, Some(&self.fs))
                .unwrap()
        }

        fn render(&self, frames: usize) {
            let mut out = vec![0.0; frames * 2];
            self.native.read_pcm_frames(&mut out, frames).unwrap();
        }
    }

    #[test]
    fn test_load_caches_metadata() {
        let mut fx = Fixture::new();
        let h = fx.load("a.wav");

        assert_eq!(fx.registry.length_frames(h).unwrap(), RATE as u64);
        assert!((fx.registry.length_seconds(h).unwrap() - 1.0).abs() < 1e-6);
        assert_eq!(fx.registry.path(h).unwrap(), "a.wav");
        assert!(!fx.registry.is_playing(&fx.native, h).unwrap());
    }

    #[test]
    fn test_same_path_shares_one_buffer() {
        let mut fx = Fixture::new();
        let first = fx.load("a.wav");
        let second = fx.load("a.wav");

        assert_ne!(first, second);
        assert_eq!(fx.registry.files().len(), 1);
        assert_eq!(fx.registry.files().refcount("a.wav"), 2);

        fx.registry.unload_sound(&fx.native, first).unwrap();
        assert_eq!(fx.registry.files().refcount("a.wav"), 1);
        fx.registry.unload_sound(&fx.native, second).unwrap();
        assert!(fx.registry.files().is_empty());
        assert_eq!(fx.native.registered_buffers(), 0);
    }

    #[test]
    fn test_freed_slots_are_reused_before_growing() {
        let mut fx = Fixture::new();
        let handles: Vec<_> = (0..4).map(|_| fx.load("a.wav")).collect();
        assert_eq!(fx.registry.slot_count(), 4);

        fx.registry.unload_sound(&fx.native, handles[1]).unwrap();
        fx.registry.unload_sound(&fx.native, handles[3]).unwrap();
        assert_eq!(fx.registry.len(), 2);

        let a = fx.load("b.wav");
        let b = fx.load("b.wav");
        assert_eq!(fx.registry.slot_count(), 4);
        assert!([1, 3].contains(&a.index()));
        assert!([1, 3].contains(&b.index()));

        fx.load("b.wav");
        assert_eq!(fx.registry.slot_count(), 5);
    }

    #[test]
    fn test_stale_handle_is_rejected() {
        let mut fx = Fixture::new();
        let old = fx.load("a.wav");
        fx.registry.unload_sound(&fx.native, old).unwrap();
        let new = fx.load("b.wav");
        assert_eq!(old.index(), new.index());

        let err = fx.registry.play(&fx.native, old, false).unwrap_err();
        assert!(matches!(err, ChimeError::InvalidHandle { kind: HandleKind::Sound, .. }));
        assert!(fx.registry.unload_sound(&fx.native, old).is_err());
        assert!(fx.registry.contains(new));
    }

    #[test]
    fn test_failed_load_yields_no_handle() {
        let mut fx = Fixture::new();
        let err = fx
            .registry
            .load_sound(&fx.native, "missing.wav", false, Some(&fx.fs))
            .unwrap_err();

        assert!(matches!(err, ChimeError::SoundInit { .. }));
        assert!(fx.registry.is_empty());
        assert_eq!(fx.registry.slot_count(), 0);
    }

    #[test]
    fn test_play_retriggers_but_toggle_pauses_in_place() {
        let mut fx = Fixture::new();
        let h = fx.load("a.wav");

        fx.registry.play(&fx.native, h, false).unwrap();
        fx.render(480);
        assert_eq!(fx.native.cursor_frames(fx.registry.native_id(h).unwrap()).unwrap(), 480);

        // Play while playing rewinds and keeps going.
        fx.registry.play(&fx.native, h, false).unwrap();
        assert!(fx.registry.is_playing(&fx.native, h).unwrap());
        assert_eq!(fx.registry.cursor_ms(&fx.native, h).unwrap(), 0);

        fx.render(480);
        fx.registry.toggle(&fx.native, h, false).unwrap();
        assert!(!fx.registry.is_playing(&fx.native, h).unwrap());
        assert_eq!(fx.registry.cursor_ms(&fx.native, h).unwrap(), 10);

        fx.registry.toggle(&fx.native, h, false).unwrap();
        assert!(fx.registry.is_playing(&fx.native, h).unwrap());
        assert_eq!(fx.registry.cursor_ms(&fx.native, h).unwrap(), 10);

        fx.registry.toggle(&fx.native, h, true).unwrap();
        assert_eq!(fx.registry.cursor_ms(&fx.native, h).unwrap(), 0);
    }

    #[test]
    fn test_pause_and_stop() {
        let mut fx = Fixture::new();
        let h = fx.load("a.wav");
        fx.registry.play(&fx.native, h, false).unwrap();
        fx.render(960);

        fx.registry.pause(&fx.native, h).unwrap();
        fx.registry.pause(&fx.native, h).unwrap();
        assert!(!fx.registry.is_playing(&fx.native, h).unwrap());
        assert_eq!(fx.registry.cursor_ms(&fx.native, h).unwrap(), 20);

        fx.registry.stop(&fx.native, h).unwrap();
        assert!(!fx.registry.is_playing(&fx.native, h).unwrap());
        assert_eq!(fx.registry.cursor_ms(&fx.native, h).unwrap(), 0);
    }

    #[test]
    fn test_seek_round_trip() {
        let mut fx = Fixture::new();
        let h = fx.load("a.wav");

        fx.registry.seek_normalized(&fx.native, h, 0.5).unwrap();
        assert!((fx.registry.cursor_normalized(&fx.native, h).unwrap() - 0.5).abs() < 1e-3);
        assert_eq!(fx.registry.cursor_ms(&fx.native, h).unwrap(), 500);

        fx.registry.seek_ms(&fx.native, h, 250).unwrap();
        assert_eq!(fx.registry.cursor_ms(&fx.native, h).unwrap(), 250);

        fx.registry.seek_normalized(&fx.native, h, 7.0).unwrap();
        assert_eq!(fx.registry.cursor_normalized(&fx.native, h).unwrap(), 1.0);
    }

    #[test]
    fn test_forward_and_rewind_are_clamped() {
        let mut fx = Fixture::new();
        let h = fx.load("a.wav");

        fx.registry.forward(&fx.native, h, 300).unwrap();
        assert_eq!(fx.registry.cursor_ms(&fx.native, h).unwrap(), 300);

        fx.registry.rewind(&fx.native, h, 1000).unwrap();
        assert_eq!(fx.registry.cursor_ms(&fx.native, h).unwrap(), 0);

        fx.registry.forward(&fx.native, h, 60_000).unwrap();
        let id = fx.registry.native_id(h).unwrap();
        assert_eq!(fx.native.cursor_frames(id).unwrap(), RATE as u64 - 1);
    }

    #[test]
    fn test_parameters_are_clamped() {
        let mut fx = Fixture::new();
        let h = fx.load("a.wav");

        fx.registry.set_volume(&fx.native, h, 1.5).unwrap();
        fx.registry.set_pan(&fx.native, h, -4.0).unwrap();
        fx.registry.set_pitch(&fx.native, h, -1.0).unwrap();
        assert_eq!(fx.registry.volume(&fx.native, h).unwrap(), 1.0);
        assert_eq!(fx.registry.pan(&fx.native, h).unwrap(), -1.0);
        assert_eq!(fx.registry.pitch(&fx.native, h).unwrap(), 0.0);

        fx.registry.set_volume(&fx.native, h, 0.3).unwrap();
        assert_eq!(fx.registry.volume(&fx.native, h).unwrap(), 0.3);
    }

    #[test]
    fn test_finished_one_off_is_collected() {
        let mut fx = Fixture::new();
        let music = fx.load("a.wav");
        let blip = fx.load_with("b.wav", true);
        let idle = fx.load_with("b.wav", true);
        assert_eq!(fx.registry.one_off_count(), 2);

        fx.registry.play(&fx.native, music, true).unwrap();
        fx.registry.play(&fx.native, blip, false).unwrap();

        // Still playing: nothing to collect.
        fx.render(480);
        assert_eq!(fx.registry.collect_finished_one_offs(&fx.native).unwrap(), 0);

        // b.wav is 4800 frames long.
        fx.render(4800);
        assert_eq!(fx.registry.collect_finished_one_offs(&fx.native).unwrap(), 1);
        assert_eq!(fx.registry.one_off_count(), 1);
        assert!(!fx.registry.contains(blip));
        assert!(fx.registry.contains(music));
        // Never started, so never collected.
        assert!(fx.registry.contains(idle));
    }

    #[test]
    fn test_unload_all() {
        let mut fx = Fixture::new();
        fx.load("a.wav");
        fx.load("b.wav");
        fx.load_with("b.wav", true);

        fx.registry.unload_all(&fx.native).unwrap();
        assert!(fx.registry.is_empty());
        assert!(fx.registry.files().is_empty());
        assert_eq!(fx.registry.one_off_count(), 0);
        assert_eq!(fx.native.live_voices(), 0);
    }

    #[test]
    fn test_play_while_playing_keeps_looping() {
        let mut fx = Fixture::new();
        let h = fx.load("b.wav");
        fx.registry.play(&fx.native, h, true).unwrap();
        fx.render(480);

        fx.registry.play(&fx.native, h, false).unwrap();
        assert_eq!(fx.registry.cursor_ms(&fx.native, h).unwrap(), 0);

        // b.wav is 4800 frames; a non-looping sound would have stopped.
        fx.render(6000);
        assert!(fx.registry.is_playing(&fx.native, h).unwrap());
    }

    #[test]
    fn test_non_finite_parameters_fall_back_to_defaults() {
        let mut fx = Fixture::new();
        let h = fx.load("a.wav");
        fx.registry.set_volume(&fx.native, h, 0.3).unwrap();
        fx.registry.set_pan(&fx.native, h, 0.5).unwrap();
        fx.registry.set_pitch(&fx.native, h, 2.0).unwrap();

        fx.registry.set_volume(&fx.native, h, f32::NAN).unwrap();
        fx.registry.set_pan(&fx.native, h, f32::NAN).unwrap();
        fx.registry.set_pitch(&fx.native, h, f32::INFINITY).unwrap();
        assert_eq!(fx.registry.volume(&fx.native, h).unwrap(), 1.0);
        assert_eq!(fx.registry.pan(&fx.native, h).unwrap(), 0.0);
        assert_eq!(fx.registry.pitch(&fx.native, h).unwrap(), 1.0);

        fx.registry.play(&fx.native, h, false).unwrap();
        let mut out = vec![0.0; 64];
        fx.native.read_pcm_frames(&mut out, 32).unwrap();
        assert!(out.iter().all(|s| s.is_finite()));
    }

    /// Delegates to a [`PcmMixer`] but can be told to refuse teardown.
    struct Stubborn {
        inner: PcmMixer,
        refuse: AtomicBool,
    }

    impl Stubborn {
        fn refusing(&self) -> Result<(), NativeError> {
            if self.refuse.load(Ordering::Relaxed) {
                Err(NativeError::Busy)
            } else {
                Ok(())
            }
        }
    }

    impl NativeMixer for Stubborn {
        fn sample_rate(&self) -> u32 {
            self.inner.sample_rate()
        }
        fn register_encoded(&self, path: &str, bytes: Arc<[u8]>) -> Result<(), NativeError> {
            self.inner.register_encoded(path, bytes)
        }
        fn unregister_encoded(&self, path: &str) -> Result<(), NativeError> {
            self.inner.unregister_encoded(path)
        }
        fn create_sound(&self, path: &str) -> Result<NativeSoundId, NativeError> {
            self.inner.create_sound(path)
        }
        fn destroy_sound(&self, id: NativeSoundId) -> Result<(), NativeError> {
            self.refusing()?;
            self.inner.destroy_sound(id)
        }
        fn start(&self, id: NativeSoundId) -> Result<(), NativeError> {
            self.inner.start(id)
        }
        fn stop(&self, id: NativeSoundId) -> Result<(), NativeError> {
            self.inner.stop(id)
        }
        fn is_playing(&self, id: NativeSoundId) -> Result<bool, NativeError> {
            self.inner.is_playing(id)
        }
        fn set_looping(&self, id: NativeSoundId, looping: bool) -> Result<(), NativeError> {
            self.inner.set_looping(id, looping)
        }
        fn seek_to_frame(&self, id: NativeSoundId, frame: u64) -> Result<(), NativeError> {
            self.inner.seek_to_frame(id, frame)
        }
        fn cursor_frames(&self, id: NativeSoundId) -> Result<u64, NativeError> {
            self.inner.cursor_frames(id)
        }
        fn length_frames(&self, id: NativeSoundId) -> Result<u64, NativeError> {
            self.inner.length_frames(id)
        }
        fn set_volume(&self, id: NativeSoundId, volume: f32) -> Result<(), NativeError> {
            self.inner.set_volume(id, volume)
        }
        fn volume(&self, id: NativeSoundId) -> Result<f32, NativeError> {
            self.inner.volume(id)
        }
        fn set_pan(&self, id: NativeSoundId, pan: f32) -> Result<(), NativeError> {
            self.inner.set_pan(id, pan)
        }
        fn pan(&self, id: NativeSoundId) -> Result<f32, NativeError> {
            self.inner.pan(id)
        }
        fn set_pitch(&self, id: NativeSoundId, pitch: f32) -> Result<(), NativeError> {
            self.inner.set_pitch(id, pitch)
        }
        fn pitch(&self, id: NativeSoundId) -> Result<f32, NativeError> {
            self.inner.pitch(id)
        }
        fn read_pcm_frames(&self, out: &mut [f32], frames: usize) -> Result<usize, NativeError> {
            self.inner.read_pcm_frames(out, frames)
        }
    }

    #[test]
    fn test_refused_teardown_keeps_handle_and_file() {
        let fs = MemoryFileSystem::new();
        fs.insert("a.wav", wav_bytes(1, RATE, &[0.2; 480]));
        let native = Stubborn {
            inner: PcmMixer::new(RATE),
            refuse: AtomicBool::new(false),
        };
        let mut registry = SoundRegistry::new(RATE);
        let h = registry.load_sound(&native, "a.wav", true, Some(&fs)).unwrap();
        registry.play(&native, h, true).unwrap();

        native.refuse.store(true, Ordering::Relaxed);
        assert!(matches!(
            registry.unload_sound(&native, h),
            Err(ChimeError::Native(NativeError::Busy))
        ));
        assert!(registry.contains(h));
        assert_eq!(registry.files().refcount("a.wav"), 1);
        assert_eq!(registry.one_off_count(), 1);
        assert_eq!(native.inner.live_voices(), 1);

        native.refuse.store(false, Ordering::Relaxed);
        registry.unload_sound(&native, h).unwrap();
        assert!(!registry.contains(h));
        assert_eq!(registry.files().refcount("a.wav"), 0);
        assert_eq!(registry.one_off_count(), 0);
        assert_eq!(native.inner.live_voices(), 0);
        assert_eq!(native.inner.registered_buffers(), 0);
    }
}
