//! Raw per-sample audio injected by external code.

use std::fmt;

/// Called once per output frame with the left/right samples it produced last
/// time and the frame duration in seconds. Runs on the audio thread: it must
/// not block, allocate or do I/O.
pub type NoiseFn = Box<dyn FnMut(&mut f32, &mut f32, f32) + Send + 'static>;

#[derive(Default)]
pub struct NoiseSlot {
    callback: Option<NoiseFn>,
    left: f32,
    right: f32,
}

impl NoiseSlot {
    pub fn new() -> Self {
        Self::default()
    }

    /// Install `callback`, returning the one it replaces.
    pub fn set(&mut self, callback: NoiseFn) -> Option<NoiseFn> {
        self.callback.replace(callback)
    }

    /// Remove the callback and reset the held samples to silence.
    pub fn clear(&mut self) -> Option<NoiseFn> {
        self.left = 0.0;
        self.right = 0.0;
        self.callback.take()
    }

    pub fn is_installed(&self) -> bool {
        self.callback.is_some()
    }

    /// Last (left, right) pair produced.
    pub fn held(&self) -> (f32, f32) {
        (self.left, self.right)
    }

    /// Invoke the callback once per frame and add its output to channels 0
    /// and 1 of interleaved `mix`.
    pub fn mix_into(&mut self, mix: &mut [f32], channels: usize, frames: usize, delta: f32) -> bool {
        let Some(callback) = self.callback.as_mut() else {
            return false;
        };

        for frame in mix[..frames * channels].chunks_exact_mut(channels) {
            callback(&mut self.left, &mut self.right, delta);
            frame[0] += self.left;
            if channels > 1 {
                frame[1] += self.right;
            }
        }
        true
    }
}

impl fmt::Debug for NoiseSlot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NoiseSlot")
            .field("installed", &self.is_installed())
            .field("left", &self.left)
            .field("right", &self.right)
            .finish()
    }
}
