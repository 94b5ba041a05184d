use std::fmt;

use thiserror::Error;

use crate::native::NativeSoundId;

/// Which arena a handle belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HandleKind {
    Sound,
    Waveform,
}

impl fmt::Display for HandleKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HandleKind::Sound => write!(f, "sound"),
            HandleKind::Waveform => write!(f, "waveform"),
        }
    }
}

/// Failures reported by a [`NativeMixer`](crate::native::NativeMixer).
#[derive(Debug, Error)]
pub enum NativeError {
    #[error("no encoded buffer registered for `{0}`")]
    NotRegistered(String),

    #[error("an encoded buffer is already registered for `{0}`")]
    AlreadyRegistered(String),

    #[error("failed to decode `{path}`: {reason}")]
    Decode { path: String, reason: String },

    #[error("unknown native sound {0:?}")]
    UnknownSound(NativeSoundId),

    #[error("voice table is busy")]
    Busy,
}

#[derive(Debug, Error)]
pub enum ChimeError {
    #[error("failed to initialize audio device: {0}")]
    DeviceInit(String),

    #[error("failed to initialize resource manager: {0}")]
    ResourceManagerInit(String),

    #[error("failed to initialize audio engine: {0}")]
    EngineInit(String),

    #[error("failed to initialize sound `{path}`: {reason}")]
    SoundInit { path: String, reason: String },

    #[error("invalid {kind} handle {index} (generation {generation})")]
    InvalidHandle {
        kind: HandleKind,
        index: u32,
        generation: u32,
    },

    /// Bookkeeping went out of sync. Never expected in a correct build.
    #[error("internal consistency error: {0}")]
    InternalConsistency(String),

    #[error(transparent)]
    Native(#[from] NativeError),

    #[error("invalid configuration: {0}")]
    Config(#[from] serde_json::Error),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl ChimeError {
    pub(crate) fn sound_init(path: &str, reason: impl fmt::Display) -> Self {
        ChimeError::SoundInit {
            path: path.to_string(),
            reason: reason.to_string(),
        }
    }
}

pub type Result<T, E = ChimeError> = std::result::Result<T, E>;
