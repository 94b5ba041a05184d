//! Continuously running oscillators, independent of file playback.

pub mod oscillator;
pub mod tables;

pub use oscillator::Oscillator;
pub use tables::WaveformType;

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use spin::Mutex;

use crate::error::{ChimeError, HandleKind, Result};
use crate::mix::add_into;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct WaveformHandle {
    index: u32,
    generation: u32,
}

impl WaveformHandle {
    pub fn index(&self) -> u32 {
        self.index
    }

    pub fn generation(&self) -> u32 {
        self.generation
    }
}

#[derive(Debug)]
pub struct Waveform {
    oscillator: Oscillator,
    playing: AtomicBool,
}

impl Waveform {
    pub fn oscillator(&self) -> &Oscillator {
        &self.oscillator
    }

    pub fn is_playing(&self) -> bool {
        self.playing.load(Ordering::Acquire)
    }
}

/// The mixer's side of a [`WaveformBank`]: every loaded waveform in
/// creation order. The bank locks it only to add or remove a waveform.
#[derive(Debug, Default)]
pub struct WaveformVoices {
    live: Mutex<Vec<Arc<Waveform>>>,
}

impl WaveformVoices {
    /// Add every playing waveform into interleaved `mix`.
    ///
    /// Realtime safe provided `scratch` holds at least `frames * channels`
    /// samples. Returns how many waveforms contributed, or `None` when the
    /// bank was mid-edit and nothing was mixed.
    pub fn mix_into(
        &self,
        mix: &mut [f32],
        scratch: &mut [f32],
        sample_rate: f32,
        channels: usize,
        frames: usize,
    ) -> Option<usize> {
        let live = self.live.try_lock()?;
        let len = frames * channels;
        let scratch = &mut scratch[..len];
        let mut voices = 0;

        for waveform in live.iter().filter(|waveform| waveform.is_playing()) {
            waveform.oscillator.fill_buffer(scratch, sample_rate, channels, frames);
            add_into(&mut mix[..len], scratch);
            voices += 1;
        }
        Some(voices)
    }
}

#[derive(Debug)]
struct WaveformSlot {
    generation: u32,
    /// `None` while unloaded.
    waveform: Option<Arc<Waveform>>,
}

#[derive(Debug, Default)]
pub struct WaveformBank {
    slots: Vec<WaveformSlot>,
    voices: Arc<WaveformVoices>,
}

impl WaveformBank {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(capacity: usize) -> Self {
        let voices = WaveformVoices::default();
        voices.live.lock().reserve(capacity);
        Self {
            slots: Vec::with_capacity(capacity),
            voices: Arc::new(voices),
        }
    }

    /// The render list to hand to the mixer.
    pub fn voices(&self) -> &Arc<WaveformVoices> {
        &self.voices
    }

    /// New waveforms start halted.
    pub fn create(&mut self, amplitude: f32, frequency: f32, waveform_type: WaveformType) -> WaveformHandle {
        let waveform = Arc::new(Waveform {
            oscillator: Oscillator::new(waveform_type, frequency, amplitude),
            playing: AtomicBool::new(false),
        });
        self.voices.live.lock().push(Arc::clone(&waveform));

        if let Some(index) = self.slots.iter().position(|slot| slot.waveform.is_none()) {
            let slot = &mut self.slots[index];
            slot.waveform = Some(waveform);
            return WaveformHandle {
                index: index as u32,
                generation: slot.generation,
            };
        }

        let index = self.slots.len() as u32;
        self.slots.push(WaveformSlot {
            generation: 0,
            waveform: Some(waveform),
        });
        WaveformHandle { index, generation: 0 }
    }

    /// Release the slot. The removed waveform is handed back so the caller
    /// can drop it outside any lock.
    pub fn unload(&mut self, handle: WaveformHandle) -> Result<Arc<Waveform>> {
        self.get(handle)?;
        let slot = &mut self.slots[handle.index as usize];
        let waveform = slot.waveform.take().ok_or_else(|| invalid(handle))?;
        slot.generation = slot.generation.wrapping_add(1);
        self.voices.live.lock().retain(|live| !Arc::ptr_eq(live, &waveform));
        Ok(waveform)
    }

    pub fn play(&self, handle: WaveformHandle) -> Result<()> {
        self.get(handle)?.playing.store(true, Ordering::Release);
        Ok(())
    }

    /// Halt without resetting phase.
    pub fn stop(&self, handle: WaveformHandle) -> Result<()> {
        self.get(handle)?.playing.store(false, Ordering::Release);
        Ok(())
    }

    pub fn is_playing(&self, handle: WaveformHandle) -> Result<bool> {
        Ok(self.get(handle)?.is_playing())
    }

    pub fn set_amplitude(&self, handle: WaveformHandle, amplitude: f32) -> Result<()> {
        self.get(handle)?.oscillator.set_amplitude(amplitude);
        Ok(())
    }

    pub fn set_frequency(&self, handle: WaveformHandle, frequency: f32) -> Result<()> {
        self.get(handle)?.oscillator.set_frequency(frequency);
        Ok(())
    }

    pub fn set_type(&self, handle: WaveformHandle, waveform_type: WaveformType) -> Result<()> {
        self.get(handle)?.oscillator.set_waveform(waveform_type);
        Ok(())
    }

    pub fn amplitude(&self, handle: WaveformHandle) -> Result<f32> {
        Ok(self.get(handle)?.oscillator.amplitude())
    }

    pub fn frequency(&self, handle: WaveformHandle) -> Result<f32> {
        Ok(self.get(handle)?.oscillator.frequency())
    }

    pub fn waveform_type(&self, handle: WaveformHandle) -> Result<WaveformType> {
        Ok(self.get(handle)?.oscillator.waveform())
    }

    pub fn get(&self, handle: WaveformHandle) -> Result<&Waveform> {
        self.slots
            .get(handle.index as usize)
            .filter(|slot| slot.generation == handle.generation)
            .and_then(|slot| slot.waveform.as_deref())
            .ok_or_else(|| invalid(handle))
    }

    /// Loaded waveforms.
    pub fn len(&self) -> usize {
        self.slots.iter().filter(|slot| slot.waveform.is_some()).count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn slot_count(&self) -> usize {
        self.slots.len()
    }

    pub fn handles(&self) -> impl Iterator<Item = WaveformHandle> + '_ {
        self.slots.iter().enumerate().filter_map(|(index, slot)| {
            slot.waveform.as_ref().map(|_| WaveformHandle {
                index: index as u32,
                generation: slot.generation,
            })
        })
    }
}

fn invalid(handle: WaveformHandle) -> ChimeError {
    ChimeError::InvalidHandle {
        kind: HandleKind::Waveform,
        index: handle.index,
        generation: handle.generation,
    }
}
