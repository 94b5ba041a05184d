//! Pure Rust native mixer.
//!
//! Decoded buffers and the handle table live behind `parking_lot::RwLock`s
//! that only the control thread touches. Per-voice parameters and the
//! playback cursor are atomics, so control calls never contend with the
//! audio thread. The `spin::Mutex` around the render list is taken by the
//! control thread only when a voice is created or destroyed; the audio
//! thread only ever `try_lock`s it.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use crossbeam::atomic::AtomicCell;
use parking_lot::RwLock;
use spin::Mutex;

use super::decode::{DecodedBuffer, decode_wav};
use super::pan::{Pan, PanLaw};
use super::{NativeMixer, NativeSoundId};
use crate::error::NativeError;

struct Voice {
    buffer: Arc<DecodedBuffer>,
    /// Fractional frame position as `f64` bits; advances by `pitch` per
    /// output frame.
    position: AtomicU64,
    volume: AtomicCell<f32>,
    pan: AtomicCell<f32>,
    pitch: AtomicCell<f32>,
    looping: AtomicBool,
    playing: AtomicBool,
}

impl Voice {
    fn new(buffer: Arc<DecodedBuffer>) -> Self {
        Self {
            buffer,
            position: AtomicU64::new(0.0f64.to_bits()),
            volume: AtomicCell::new(1.0),
            pan: AtomicCell::new(0.0),
            pitch: AtomicCell::new(1.0),
            looping: AtomicBool::new(false),
            playing: AtomicBool::new(false),
        }
    }

    fn length(&self) -> f64 {
        self.buffer.frames() as f64
    }

    fn position(&self) -> f64 {
        f64::from_bits(self.position.load(Ordering::Acquire))
    }

    fn set_position(&self, frame: f64) {
        self.position.store(frame.to_bits(), Ordering::Release);
    }

    fn is_playing(&self) -> bool {
        self.playing.load(Ordering::Acquire)
    }

    /// Accumulate into interleaved stereo `out`.
    fn render_add(&self, out: &mut [f32], frames: usize, law: PanLaw) {
        let total = self.buffer.frames() as usize;
        if total == 0 {
            self.playing.store(false, Ordering::Release);
            return;
        }
        let length = self.length();

        let start = self.position.load(Ordering::Acquire);
        let mut position = f64::from_bits(start);
        let looping = self.looping.load(Ordering::Acquire);
        let pitch = self.pitch.load() as f64;
        let volume = self.volume.load();
        let (pan_l, pan_r) = Pan::new(self.pan.load(), law).gains();
        let gain_l = pan_l * volume;
        let gain_r = pan_r * volume;
        let mut finished = false;

        for frame in 0..frames {
            if position >= length {
                if looping {
                    position %= length;
                } else {
                    finished = true;
                    break;
                }
            }

            let index = position as usize;
            let next = if index + 1 < total {
                index + 1
            } else if looping {
                0
            } else {
                index
            };
            let frac = (position - index as f64) as f32;
            let (l0, r0) = self.buffer.frame(index);
            let (l1, r1) = self.buffer.frame(next);

            out[frame * 2] += (l0 + frac * (l1 - l0)) * gain_l;
            out[frame * 2 + 1] += (r0 + frac * (r1 - r0)) * gain_r;

            position += pitch;
        }

        if finished || (position >= length && !looping) {
            finished = true;
            position = length;
        }

        // A seek made during this tick wins over the advance.
        let published = self
            .position
            .compare_exchange(start, position.to_bits(), Ordering::AcqRel, Ordering::Acquire)
            .is_ok();
        if published && finished {
            self.playing.store(false, Ordering::Release);
        }
    }
}

struct VoiceSlot {
    generation: u32,
    voice: Option<Arc<Voice>>,
}

#[derive(Default)]
struct VoiceTable {
    slots: Vec<VoiceSlot>,
    free: Vec<u32>,
}

impl VoiceTable {
    fn insert(&mut self, voice: Arc<Voice>) -> NativeSoundId {
        if let Some(slot) = self.free.pop() {
            let entry = &mut self.slots[slot as usize];
            entry.voice = Some(voice);
            return NativeSoundId {
                slot,
                generation: entry.generation,
            };
        }

        let slot = self.slots.len() as u32;
        self.slots.push(VoiceSlot {
            generation: 0,
            voice: Some(voice),
        });
        NativeSoundId { slot, generation: 0 }
    }

    fn remove(&mut self, id: NativeSoundId) -> Option<Arc<Voice>> {
        let entry = self.slots.get_mut(id.slot as usize)?;
        if entry.generation != id.generation {
            return None;
        }
        let voice = entry.voice.take()?;
        entry.generation = entry.generation.wrapping_add(1);
        self.free.push(id.slot);
        Some(voice)
    }

    fn get(&self, id: NativeSoundId) -> Result<&Voice, NativeError> {
        self.slots
            .get(id.slot as usize)
            .filter(|entry| entry.generation == id.generation)
            .and_then(|entry| entry.voice.as_deref())
            .ok_or(NativeError::UnknownSound(id))
    }
}

pub struct PcmMixer {
    sample_rate: u32,
    pan_law: PanLaw,
    buffers: RwLock<HashMap<String, Arc<DecodedBuffer>>>,
    table: RwLock<VoiceTable>,
    /// Every live voice in creation order. Shared with the audio thread.
    active: Mutex<Vec<Arc<Voice>>>,
}

impl PcmMixer {
    pub fn new(sample_rate: u32) -> Self {
        Self {
            sample_rate,
            pan_law: PanLaw::default(),
            buffers: RwLock::new(HashMap::new()),
            table: RwLock::new(VoiceTable::default()),
            active: Mutex::new(Vec::new()),
        }
    }

    pub fn with_pan_law(mut self, law: PanLaw) -> Self {
        self.pan_law = law;
        self
    }

    /// Reserve voice slots up front so that creating sounds does not grow
    /// the render list while the audio thread is running.
    pub fn with_voice_capacity(self, capacity: usize) -> Self {
        self.table.write().slots.reserve(capacity);
        self.active.lock().reserve(capacity);
        self
    }

    pub fn registered_buffers(&self) -> usize {
        self.buffers.read().len()
    }

    pub fn live_voices(&self) -> usize {
        let table = self.table.read();
        table.slots.iter().filter(|s| s.voice.is_some()).count()
    }

    fn with_voice<R>(&self, id: NativeSoundId, f: impl FnOnce(&Voice) -> R) -> Result<R, NativeError> {
        let table = self.table.read();
        table.get(id).map(f)
    }
}

impl NativeMixer for PcmMixer {
    fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    fn register_encoded(&self, path: &str, bytes: Arc<[u8]>) -> Result<(), NativeError> {
        if self.buffers.read().contains_key(path) {
            return Err(NativeError::AlreadyRegistered(path.to_string()));
        }
        // Decode before taking the write lock.
        let decoded = decode_wav(path, &bytes, self.sample_rate)?;
        self.buffers.write().insert(path.to_string(), Arc::new(decoded));
        Ok(())
    }

    fn unregister_encoded(&self, path: &str) -> Result<(), NativeError> {
        self.buffers
            .write()
            .remove(path)
            .map(|_| ())
            .ok_or_else(|| NativeError::NotRegistered(path.to_string()))
    }

    fn create_sound(&self, path: &str) -> Result<NativeSoundId, NativeError> {
        let buffer = self
            .buffers
            .read()
            .get(path)
            .cloned()
            .ok_or_else(|| NativeError::NotRegistered(path.to_string()))?;
        let voice = Arc::new(Voice::new(buffer));
        let id = self.table.write().insert(Arc::clone(&voice));
        self.active.lock().push(voice);
        Ok(id)
    }

    fn destroy_sound(&self, id: NativeSoundId) -> Result<(), NativeError> {
        let voice = self.table.write().remove(id).ok_or(NativeError::UnknownSound(id))?;
        self.active.lock().retain(|live| !Arc::ptr_eq(live, &voice));
        // Last reference dropped here, outside both locks.
        drop(voice);
        Ok(())
    }

    fn start(&self, id: NativeSoundId) -> Result<(), NativeError> {
        self.with_voice(id, |voice| {
            if voice.position() >= voice.length() {
                voice.set_position(0.0);
            }
            voice.playing.store(true, Ordering::Release);
        })
    }

    fn stop(&self, id: NativeSoundId) -> Result<(), NativeError> {
        self.with_voice(id, |voice| voice.playing.store(false, Ordering::Release))
    }

    fn is_playing(&self, id: NativeSoundId) -> Result<bool, NativeError> {
        self.with_voice(id, Voice::is_playing)
    }

    fn set_looping(&self, id: NativeSoundId, looping: bool) -> Result<(), NativeError> {
        self.with_voice(id, |voice| voice.looping.store(looping, Ordering::Release))
    }

    fn seek_to_frame(&self, id: NativeSoundId, frame: u64) -> Result<(), NativeError> {
        self.with_voice(id, |voice| {
            voice.set_position(frame.min(voice.buffer.frames()) as f64);
        })
    }

    fn cursor_frames(&self, id: NativeSoundId) -> Result<u64, NativeError> {
        self.with_voice(id, |voice| voice.position() as u64)
    }

    fn length_frames(&self, id: NativeSoundId) -> Result<u64, NativeError> {
        self.with_voice(id, |voice| voice.buffer.frames())
    }

    fn set_volume(&self, id: NativeSoundId, volume: f32) -> Result<(), NativeError> {
        self.with_voice(id, |voice| voice.volume.store(volume))
    }

    fn volume(&self, id: NativeSoundId) -> Result<f32, NativeError> {
        self.with_voice(id, |voice| voice.volume.load())
    }

    fn set_pan(&self, id: NativeSoundId, pan: f32) -> Result<(), NativeError> {
        self.with_voice(id, |voice| voice.pan.store(pan.clamp(-1.0, 1.0)))
    }

    fn pan(&self, id: NativeSoundId) -> Result<f32, NativeError> {
        self.with_voice(id, |voice| voice.pan.load())
    }

    fn set_pitch(&self, id: NativeSoundId, pitch: f32) -> Result<(), NativeError> {
        self.with_voice(id, |voice| voice.pitch.store(pitch))
    }

    fn pitch(&self, id: NativeSoundId) -> Result<f32, NativeError> {
        self.with_voice(id, |voice| voice.pitch.load())
    }

    fn read_pcm_frames(&self, out: &mut [f32], frames: usize) -> Result<usize, NativeError> {
        let out = &mut out[..frames * 2];
        out.fill(0.0);

        let Some(active) = self.active.try_lock() else {
            return Err(NativeError::Busy);
        };
        for voice in active.iter().filter(|voice| voice.is_playing()) {
            voice.render_add(out, frames, self.pan_law);
        }
        Ok(frames)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::wav_bytes;

    fn mixer_with(path: &str, channels: u16, samples: &[f32]) -> PcmMixer {
        let mixer = PcmMixer::new(48_000);
        let bytes: Arc<[u8]> = wav_bytes(channels, 48_000, samples).into();
        mixer.register_encoded(path, bytes).unwrap();
        mixer
    }

    #[test]
    fn test_new_sound_is_halted_at_zero() {
        let mixer = mixer_with("a.wav", 1, &[0.5; 100]);
        let id = mixer.create_sound("a.wav").unwrap();

        assert!(!mixer.is_playing(id).unwrap());
        assert_eq!(mixer.cursor_frames(id).unwrap(), 0);
        assert_eq!(mixer.length_frames(id).unwrap(), 100);
    }

    #[test]
    fn test_unregistered_path() {
        let mixer = PcmMixer::new(48_000);
        assert!(matches!(mixer.create_sound("nope.wav"), Err(NativeError::NotRegistered(_))));
        assert!(matches!(mixer.unregister_encoded("nope.wav"), Err(NativeError::NotRegistered(_))));
    }

    #[test]
    fn test_double_registration_rejected() {
        let mixer = mixer_with("a.wav", 1, &[0.5; 10]);
        let bytes: Arc<[u8]> = wav_bytes(1, 48_000, &[0.5; 10]).into();
        assert!(matches!(
            mixer.register_encoded("a.wav", bytes),
            Err(NativeError::AlreadyRegistered(_))
        ));
    }

    #[test]
    fn test_render_applies_volume_and_pan() {
        let mixer = mixer_with("a.wav", 1, &[0.5; 64]);
        let id = mixer.create_sound("a.wav").unwrap();
        mixer.set_volume(id, 0.5).unwrap();
        mixer.set_pan(id, 1.0).unwrap();
        mixer.start(id).unwrap();

        let mut out = vec![1.0; 32];
        assert_eq!(mixer.read_pcm_frames(&mut out, 16).unwrap(), 16);
        for frame in out.chunks_exact(2) {
            assert!(frame[0].abs() < 1e-6);
            assert!((frame[1] - 0.25).abs() < 1e-3);
        }
        assert_eq!(mixer.cursor_frames(id).unwrap(), 16);
    }

    #[test]
    fn test_halted_sounds_are_silent() {
        let mixer = mixer_with("a.wav", 1, &[0.5; 64]);
        let _id = mixer.create_sound("a.wav").unwrap();

        let mut out = vec![1.0; 32];
        mixer.read_pcm_frames(&mut out, 16).unwrap();
        assert!(out.iter().all(|&s| s == 0.0));
    }

    #[test]
    fn test_sound_stops_at_end() {
        let mixer = mixer_with("a.wav", 1, &[0.5; 10]);
        let id = mixer.create_sound("a.wav").unwrap();
        mixer.start(id).unwrap();

        let mut out = vec![0.0; 32];
        mixer.read_pcm_frames(&mut out, 16).unwrap();

        assert!(!mixer.is_playing(id).unwrap());
        assert_eq!(mixer.cursor_frames(id).unwrap(), 10);
        assert!(out[..20].iter().all(|&s| (s - 0.5).abs() < 1e-3));
        assert!(out[20..].iter().all(|&s| s == 0.0));

        // Starting a finished sound plays it again from the top.
        mixer.start(id).unwrap();
        assert_eq!(mixer.cursor_frames(id).unwrap(), 0);
    }

    #[test]
    fn test_looping_wraps() {
        let mixer = mixer_with("a.wav", 1, &[0.5; 10]);
        let id = mixer.create_sound("a.wav").unwrap();
        mixer.set_looping(id, true).unwrap();
        mixer.start(id).unwrap();

        let mut out = vec![0.0; 50];
        mixer.read_pcm_frames(&mut out, 25).unwrap();

        assert!(mixer.is_playing(id).unwrap());
        assert_eq!(mixer.cursor_frames(id).unwrap(), 5);
        assert!(out.iter().all(|&s| (s - 0.5).abs() < 1e-3));
    }

    #[test]
    fn test_pitch_advances_cursor() {
        let mixer = mixer_with("a.wav", 1, &[0.5; 100]);
        let id = mixer.create_sound("a.wav").unwrap();
        mixer.set_pitch(id, 2.0).unwrap();
        mixer.start(id).unwrap();

        let mut out = vec![0.0; 20];
        mixer.read_pcm_frames(&mut out, 10).unwrap();
        assert_eq!(mixer.cursor_frames(id).unwrap(), 20);
    }

    #[test]
    fn test_destroyed_id_is_stale() {
        let mixer = mixer_with("a.wav", 1, &[0.5; 10]);
        let id = mixer.create_sound("a.wav").unwrap();
        mixer.destroy_sound(id).unwrap();

        assert!(matches!(mixer.start(id), Err(NativeError::UnknownSound(_))));

        let reused = mixer.create_sound("a.wav").unwrap();
        assert_eq!(reused.slot, id.slot);
        assert_ne!(reused.generation, id.generation);
        assert_eq!(mixer.live_voices(), 1);
    }

    #[test]
    fn test_contended_read_reports_busy() {
        let mixer = mixer_with("a.wav", 1, &[0.5; 10]);
        let _guard = mixer.active.lock();

        let mut out = vec![1.0; 8];
        assert!(matches!(mixer.read_pcm_frames(&mut out, 4), Err(NativeError::Busy)));
        assert!(out.iter().all(|&s| s == 0.0));
    }

    #[test]
    fn test_parameter_changes_never_starve_the_render() {
        let mixer = Arc::new(mixer_with("a.wav", 1, &[0.5; 4800]));
        let id = mixer.create_sound("a.wav").unwrap();
        mixer.set_looping(id, true).unwrap();
        mixer.start(id).unwrap();

        let done = Arc::new(AtomicBool::new(false));
        let control = {
            let mixer = Arc::clone(&mixer);
            let done = Arc::clone(&done);
            std::thread::spawn(move || {
                let mut frame = 0;
                while !done.load(Ordering::Relaxed) {
                    mixer.set_volume(id, 1.0).unwrap();
                    mixer.set_pan(id, 0.0).unwrap();
                    mixer.set_pitch(id, 1.0).unwrap();
                    mixer.seek_to_frame(id, frame % 4800).unwrap();
                    assert!(mixer.is_playing(id).unwrap());
                    mixer.cursor_frames(id).unwrap();
                    frame += 97;
                }
            })
        };

        let mut out = vec![0.0; 960];
        for _ in 0..2_000 {
            assert_eq!(mixer.read_pcm_frames(&mut out, 480).unwrap(), 480);
            assert!(out.iter().all(|&s| (s - 0.5).abs() < 1e-3));
        }
        done.store(true, Ordering::Relaxed);
        control.join().unwrap();
    }

    #[test]
    fn test_equal_power_pan_law() {
        let mixer = PcmMixer::new(48_000).with_pan_law(PanLaw::EqualPower);
        mixer
            .register_encoded("a.wav", wav_bytes(1, 48_000, &[0.5; 16]).into())
            .unwrap();
        let id = mixer.create_sound("a.wav").unwrap();
        mixer.start(id).unwrap();

        let mut out = vec![0.0; 8];
        mixer.read_pcm_frames(&mut out, 4).unwrap();
        let expected = 0.5 * std::f32::consts::FRAC_1_SQRT_2;
        assert!(out.iter().all(|&s| (s - expected).abs() < 1e-3));
    }
}
