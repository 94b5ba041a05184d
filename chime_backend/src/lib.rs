//! Realtime side of the chime audio engine: the cpal output stream, the
//! per-tick mixer and the [`Engine`] facade that drives both.
//!
//! ```no_run
//! use chime_backend::Engine;
//! use chime_core::{EngineConfig, WaveformType};
//!
//! # fn main() -> chime_core::Result<()> {
//! let mut engine = Engine::new(EngineConfig::default())?;
//! let tone = engine.create_waveform(0.1, 440.0, WaveformType::Sine);
//! engine.play_waveform(tone)?;
//!
//! let click = engine.load_sound("assets/click.wav", false)?;
//! engine.play(click, false)?;
//!
//! // once per application frame
//! engine.on_before_user_update()?;
//! # Ok(())
//! # }
//! ```

pub mod audio_device;
pub mod engine;
pub mod rt_processing;

pub use engine::{Engine, Output};
pub use rt_processing::PerformanceSnapshot;
