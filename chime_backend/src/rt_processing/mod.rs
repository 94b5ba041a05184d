//! Everything that runs on the audio thread.

pub mod callback;
pub mod mixer;
pub mod performance;

pub use callback::{AudioCallback, CallbackSlot};
pub use mixer::{MixSources, Mixer};
pub use performance::{PerformanceMonitor, PerformanceSnapshot};
