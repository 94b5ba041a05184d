//! Domain model for the chime audio engine: sound and waveform arenas, the
//! noise slot, the native mixer contract and its pure Rust implementation.
//!
//! Everything here is driven from the application thread except the pieces
//! explicitly documented as realtime safe, which the backend's mixer calls
//! from the audio callback.

pub mod config;
pub mod error;
pub mod file_cache;
pub mod gate;
pub mod mix;
pub mod native;
pub mod noise;
pub mod registry;
pub mod vfs;
pub mod waveform;

#[cfg(test)]
mod test_support;

pub use config::EngineConfig;
pub use error::{ChimeError, HandleKind, NativeError, Result};
pub use file_cache::FileBufferCache;
pub use gate::{BackgroundGate, GateState, PlaybackGate};
pub use native::{NativeMixer, NativeSoundId, PcmMixer};
pub use noise::{NoiseFn, NoiseSlot};
pub use registry::{SoundHandle, SoundRegistry};
pub use vfs::{MemoryFileSystem, VirtualFileSystem};
pub use waveform::{WaveformBank, WaveformHandle, WaveformType, WaveformVoices};
