//! The native mixer: decoding, per-sound playback state and PCM rendering.
//!
//! The engine treats the mixer as an opaque, internally synchronized
//! collaborator. Control methods are called from the application thread,
//! [`NativeMixer::read_pcm_frames`] from the audio thread.

use std::sync::Arc;

use crate::error::NativeError;

mod decode;
mod pan;
mod pcm;

pub use decode::{DecodedBuffer, decode_wav};
pub use pan::{Pan, PanLaw};
pub use pcm::PcmMixer;

/// Identifies one sound instance inside a native mixer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NativeSoundId {
    pub slot: u32,
    pub generation: u32,
}

pub trait NativeMixer: Send + Sync {
    fn sample_rate(&self) -> u32;

    /// Make encoded bytes available under `path`. Decoding happens here.
    fn register_encoded(&self, path: &str, bytes: Arc<[u8]>) -> Result<(), NativeError>;

    fn unregister_encoded(&self, path: &str) -> Result<(), NativeError>;

    /// Create a halted sound bound to the bytes registered under `path`.
    fn create_sound(&self, path: &str) -> Result<NativeSoundId, NativeError>;

    fn destroy_sound(&self, id: NativeSoundId) -> Result<(), NativeError>;

    fn start(&self, id: NativeSoundId) -> Result<(), NativeError>;

    fn stop(&self, id: NativeSoundId) -> Result<(), NativeError>;

    fn is_playing(&self, id: NativeSoundId) -> Result<bool, NativeError>;

    fn set_looping(&self, id: NativeSoundId, looping: bool) -> Result<(), NativeError>;

    fn seek_to_frame(&self, id: NativeSoundId, frame: u64) -> Result<(), NativeError>;

    fn cursor_frames(&self, id: NativeSoundId) -> Result<u64, NativeError>;

    fn length_frames(&self, id: NativeSoundId) -> Result<u64, NativeError>;

    fn set_volume(&self, id: NativeSoundId, volume: f32) -> Result<(), NativeError>;

    fn volume(&self, id: NativeSoundId) -> Result<f32, NativeError>;

    fn set_pan(&self, id: NativeSoundId, pan: f32) -> Result<(), NativeError>;

    fn pan(&self, id: NativeSoundId) -> Result<f32, NativeError>;

    fn set_pitch(&self, id: NativeSoundId, pitch: f32) -> Result<(), NativeError>;

    fn pitch(&self, id: NativeSoundId) -> Result<f32, NativeError>;

    /// Mix every playing sound into `out[..frames * 2]` (overwriting it).
    ///
    /// Called on the audio thread: must not block or allocate. Returns the
    /// number of frames written.
    fn read_pcm_frames(&self, out: &mut [f32], frames: usize) -> Result<usize, NativeError>;

    /// Run queued background work. Hosts without worker threads call this
    /// once per frame.
    fn process_pending_jobs(&self) {}
}
