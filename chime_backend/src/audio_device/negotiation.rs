use crate::audio_device::enumeration::DeviceInfo;
use chime_core::EngineConfig;
use cpal::{BufferSize, SampleFormat, SampleRate, StreamConfig};
use std::fmt;

/// What the engine needs from the device. The mixer renders interleaved f32
/// at one fixed rate, so rate, channel count and format are not negotiable;
/// only the buffer size may move.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfigurationRequest {
    pub sample_rate: u32,
    pub channels: u16,
    pub buffer_size: Option<u32>,
    pub sample_format: SampleFormat,
}

impl ConfigurationRequest {
    pub fn new(sample_rate: u32, channels: u16) -> Self {
        Self {
            sample_rate,
            channels,
            buffer_size: None,
            sample_format: SampleFormat::F32,
        }
    }

    pub fn with_buffer_size(mut self, size: u32) -> Self {
        self.buffer_size = Some(size);
        self
    }

    pub fn from_engine(config: &EngineConfig) -> Self {
        let request = Self::new(config.sample_rate, config.channels);
        match config.buffer_frames {
            Some(frames) => request.with_buffer_size(frames),
            None => request,
        }
    }
}

#[derive(Debug, Clone)]
pub struct NegotiatedConfig {
    pub sample_rate: u32,
    pub channels: u16,
    pub buffer_size: BufferSize,
    pub sample_format: SampleFormat,
    pub stream_config: StreamConfig,

    /// False when the requested buffer size was clamped to the device range.
    pub buffer_size_matched: bool,
}

impl NegotiatedConfig {
    /// Latency of one buffer, when the buffer size is fixed.
    pub fn latency_ms(&self) -> Option<f32> {
        match self.buffer_size {
            BufferSize::Fixed(frames) => Some(ConfigNegotiator::calculate_latency_ms(self.sample_rate, frames)),
            BufferSize::Default => None,
        }
    }
}

impl fmt::Display for NegotiatedConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}ch @ {}Hz, buffer: {:?}, format: {:?}",
            self.channels, self.sample_rate, self.buffer_size, self.sample_format
        )
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum NegotiationError {
    SampleRateNotSupported { requested: u32, available: Vec<u32> },
    ChannelsNotSupported { requested: u16, available: Vec<u16> },
    FormatNotSupported { requested: SampleFormat, available: Vec<SampleFormat> },
}

impl fmt::Display for NegotiationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::SampleRateNotSupported { requested, available } => {
                write!(f, "Sample rate {} not supported. Available: {:?}", requested, available)
            }
            Self::ChannelsNotSupported { requested, available } => {
                write!(f, "Channel count {} not supported. Available: {:?}", requested, available)
            }
            Self::FormatNotSupported { requested, available } => {
                write!(f, "Sample format {:?} not supported. Available: {:?}", requested, available)
            }
        }
    }
}

impl std::error::Error for NegotiationError {}

pub type NegotiationResult<T> = Result<T, NegotiationError>;

pub struct ConfigNegotiator;

impl ConfigNegotiator {
    pub fn negotiate(device_info: &DeviceInfo, request: &ConfigurationRequest) -> NegotiationResult<NegotiatedConfig> {
        Self::validate_config(device_info, request.sample_rate, request.channels, request.sample_format)?;

        let (buffer_size, buffer_size_matched) = Self::negotiate_buffer_size(device_info, request.buffer_size);

        let stream_config = StreamConfig {
            channels: request.channels,
            sample_rate: SampleRate(request.sample_rate),
            buffer_size: buffer_size.clone(),
        };

        Ok(NegotiatedConfig {
            sample_rate: request.sample_rate,
            channels: request.channels,
            buffer_size,
            sample_format: request.sample_format,
            stream_config,
            buffer_size_matched,
        })
    }

    fn negotiate_buffer_size(device_info: &DeviceInfo, requested: Option<u32>) -> (BufferSize, bool) {
        let Some(requested) = requested else {
            return (BufferSize::Default, true);
        };
        match device_info.buffer_size_range {
            Some((min, max)) => {
                let size = requested.clamp(min, max);
                (BufferSize::Fixed(size), size == requested)
            }
            None => (BufferSize::Fixed(requested), true),
        }
    }

    pub fn calculate_latency_ms(sample_rate: u32, buffer_size: u32) -> f32 {
        (buffer_size as f32 / sample_rate as f32) * 1000.0
    }

    fn is_sample_rate_supported(device_info: &DeviceInfo, rate: u32) -> bool {
        rate >= device_info.min_sample_rate && rate <= device_info.max_sample_rate
    }

    pub fn validate_config(
        device_info: &DeviceInfo,
        sample_rate: u32,
        channels: u16,
        format: SampleFormat,
    ) -> NegotiationResult<()> {
        if !Self::is_sample_rate_supported(device_info, sample_rate) {
            return Err(NegotiationError::SampleRateNotSupported {
                requested: sample_rate,
                available: device_info.supported_sample_rates.clone(),
            });
        }

        if !device_info.supported_channels.contains(&channels) && channels > device_info.max_channels {
            return Err(NegotiationError::ChannelsNotSupported {
                requested: channels,
                available: device_info.supported_channels.clone(),
            });
        }

        if !device_info.supported_sample_formats.contains(&format) {
            return Err(NegotiationError::FormatNotSupported {
                requested: format,
                available: device_info.supported_sample_formats.clone(),
            });
        }

        Ok(())
    }
}
