use std::sync::Arc;

use chime_core::{ChimeError, EngineConfig, Result};
use cpal::traits::{DeviceTrait, StreamTrait};
use tracing::{error, info, warn};

use crate::audio_device::enumeration::DeviceEnumerator;
use crate::audio_device::negotiation::{ConfigNegotiator, ConfigurationRequest};
use crate::rt_processing::callback::CallbackSlot;

fn device_error(e: impl std::fmt::Display) -> ChimeError {
    ChimeError::DeviceInit(e.to_string())
}

/// Open and start the configured (or default) output device, feeding it from
/// `slot`. Dropping the returned stream stops the callbacks.
pub fn open_output_stream(config: &EngineConfig, slot: Arc<CallbackSlot>) -> Result<cpal::Stream> {
    let enumerator = DeviceEnumerator::new().map_err(device_error)?;
    let info = match config.device_name.as_deref() {
        Some(name) => enumerator.find_device_by_name(name),
        None => enumerator.default_output_device(),
    }
    .map_err(device_error)?;

    let negotiated =
        ConfigNegotiator::negotiate(info, &ConfigurationRequest::from_engine(config)).map_err(device_error)?;
    if !negotiated.buffer_size_matched {
        warn!(requested = ?config.buffer_frames, actual = ?negotiated.buffer_size, "buffer size clamped to device range");
    }
    let device = enumerator.select_device(info).map_err(device_error)?;

    info!(device = %info, host = info.host_id.name(), config = %negotiated, "opening output stream");

    let stream = device
        .build_output_stream(
            &negotiated.stream_config,
            move |data: &mut [f32], _: &cpal::OutputCallbackInfo| {
                slot.process_realtime(data);
            },
            |err| error!(%err, "output stream error"),
            None,
        )
        .map_err(device_error)?;

    stream.play().map_err(|e| ChimeError::EngineInit(e.to_string()))?;
    Ok(stream)
}
