use std::io::Cursor;

use dasp::Sample;
use hound::{SampleFormat, WavReader};

use crate::error::NativeError;

/// Sources more than this many times slower than the mixer are refused
/// rather than stretched.
pub const MAX_UPSAMPLE_RATIO: u32 = 16;

/// Interleaved stereo f32 PCM at the mixer's sample rate.
#[derive(Debug, Clone, PartialEq)]
pub struct DecodedBuffer {
    samples: Vec<f32>,
}

impl DecodedBuffer {
    pub fn from_interleaved_stereo(samples: Vec<f32>) -> Self {
        debug_assert!(samples.len() % 2 == 0);
        Self { samples }
    }

    pub fn frames(&self) -> u64 {
        (self.samples.len() / 2) as u64
    }

    pub fn samples(&self) -> &[f32] {
        &self.samples
    }

    #[inline]
    pub(crate) fn frame(&self, index: usize) -> (f32, f32) {
        (self.samples[index * 2], self.samples[index * 2 + 1])
    }
}

/// Decode a WAV file held in memory into stereo f32 at `target_rate`.
///
/// Mono sources are duplicated to both sides; sources with more than two
/// channels keep their first two.
pub fn decode_wav(path: &str, bytes: &[u8], target_rate: u32) -> Result<DecodedBuffer, NativeError> {
    let decode_err = |reason: String| NativeError::Decode {
        path: path.to_string(),
        reason,
    };

    let mut reader = WavReader::new(Cursor::new(bytes)).map_err(|e| decode_err(e.to_string()))?;
    let spec = reader.spec();
    if spec.channels == 0 {
        return Err(decode_err("stream declares zero channels".into()));
    }
    if spec.sample_rate == 0 {
        return Err(decode_err("stream declares a sample rate of 0 Hz".into()));
    }
    if u64::from(spec.sample_rate) * u64::from(MAX_UPSAMPLE_RATIO) < u64::from(target_rate) {
        return Err(decode_err(format!(
            "{} Hz is too slow to resample to {} Hz",
            spec.sample_rate, target_rate
        )));
    }

    let raw: Vec<f32> = match (spec.sample_format, spec.bits_per_sample) {
        (SampleFormat::Float, 32) => reader.samples::<f32>().collect::<Result<_, _>>(),
        (SampleFormat::Int, 8) => reader
            .samples::<i8>()
            .map(|s| s.map(|v| v.to_sample::<f32>()))
            .collect::<Result<_, _>>(),
        (SampleFormat::Int, 16) => reader
            .samples::<i16>()
            .map(|s| s.map(|v| v.to_sample::<f32>()))
            .collect::<Result<_, _>>(),
        (SampleFormat::Int, 24) => reader
            .samples::<i32>()
            .map(|s| s.map(|v| v as f32 / 8_388_608.0))
            .collect::<Result<_, _>>(),
        (SampleFormat::Int, 32) => reader
            .samples::<i32>()
            .map(|s| s.map(|v| v.to_sample::<f32>()))
            .collect::<Result<_, _>>(),
        (format, bits) => {
            return Err(decode_err(format!("unsupported sample layout {format:?}/{bits}-bit")));
        }
    }
    .map_err(|e| decode_err(e.to_string()))?;

    let stereo = to_stereo(&raw, spec.channels as usize);
    let samples = if spec.sample_rate == target_rate {
        stereo
    } else {
        resample_linear(&stereo, spec.sample_rate, target_rate)
    };

    Ok(DecodedBuffer::from_interleaved_stereo(samples))
}

fn to_stereo(raw: &[f32], channels: usize) -> Vec<f32> {
    match channels {
        2 => raw.to_vec(),
        1 => raw.iter().flat_map(|&s| [s, s]).collect(),
        _ => raw
            .chunks_exact(channels)
            .flat_map(|frame| [frame[0], frame[1]])
            .collect(),
    }
}

fn resample_linear(stereo: &[f32], from_rate: u32, to_rate: u32) -> Vec<f32> {
    let in_frames = stereo.len() / 2;
    if in_frames == 0 {
        return Vec::new();
    }

    let out_frames = (in_frames as u64 * to_rate as u64 / from_rate as u64) as usize;
    let step = from_rate as f64 / to_rate as f64;
    let mut out = Vec::with_capacity(out_frames * 2);

    for i in 0..out_frames {
        let position = i as f64 * step;
        let index = (position as usize).min(in_frames - 1);
        let next = (index + 1).min(in_frames - 1);
        let frac = (position - index as f64) as f32;
        for ch in 0..2 {
            let a = stereo[index * 2 + ch];
            let b = stereo[next * 2 + ch];
            out.push(a + frac * (b - a));
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{wav_bytes, with_declared_rate};

    #[test]
    fn test_mono_is_duplicated() {
        let bytes = wav_bytes(1, 48_000, &[0.5, -0.5, 0.25]);
        let decoded = decode_wav("mono.wav", &bytes, 48_000).unwrap();

        assert_eq!(decoded.frames(), 3);
        let (l, r) = decoded.frame(1);
        assert!((l + 0.5).abs() < 1e-3);
        assert_eq!(l, r);
    }

    #[test]
    fn test_stereo_passthrough() {
        let bytes = wav_bytes(2, 48_000, &[0.25, -0.25, 0.5, -0.5]);
        let decoded = decode_wav("stereo.wav", &bytes, 48_000).unwrap();

        assert_eq!(decoded.frames(), 2);
        let (l, r) = decoded.frame(1);
        assert!((l - 0.5).abs() < 1e-3);
        assert!((r + 0.5).abs() < 1e-3);
    }

    #[test]
    fn test_resampled_to_target_rate() {
        let bytes = wav_bytes(1, 24_000, &vec![0.1; 2400]);
        let decoded = decode_wav("slow.wav", &bytes, 48_000).unwrap();
        assert_eq!(decoded.frames(), 4800);
    }

    #[test]
    fn test_zero_sample_rate_is_decode_error() {
        let bytes = with_declared_rate(wav_bytes(1, 48_000, &[0.5; 64]), 0);
        let err = decode_wav("zero.wav", &bytes, 48_000).unwrap_err();
        assert!(matches!(err, NativeError::Decode { ref reason, .. } if reason.contains("0 Hz")));
    }

    #[test]
    fn test_extreme_upsampling_is_refused() {
        let bytes = with_declared_rate(wav_bytes(1, 48_000, &[0.5; 64]), 1);
        assert!(matches!(
            decode_wav("slow.wav", &bytes, 48_000),
            Err(NativeError::Decode { .. })
        ));

        // 8 kHz is still within range.
        let bytes = with_declared_rate(wav_bytes(1, 48_000, &[0.5; 64]), 8_000);
        assert_eq!(decode_wav("phone.wav", &bytes, 48_000).unwrap().frames(), 384);
    }

    #[test]
    fn test_garbage_is_decode_error() {
        let err = decode_wav("junk.wav", b"definitely not a riff header", 48_000).unwrap_err();
        assert!(matches!(err, NativeError::Decode { ref path, .. } if path == "junk.wav"));
    }
}
