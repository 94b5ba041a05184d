use std::io::Cursor;

use hound::{SampleFormat, WavSpec, WavWriter};

/// Encode interleaved samples as a 16-bit PCM WAV file in memory.
pub(crate) fn wav_bytes(channels: u16, sample_rate: u32, samples: &[f32]) -> Vec<u8> {
    let spec = WavSpec {
        channels,
        sample_rate,
        bits_per_sample: 16,
        sample_format: SampleFormat::Int,
    };

    let mut bytes = Vec::new();
    let mut writer = WavWriter::new(Cursor::new(&mut bytes), spec).unwrap();
    for &s in samples {
        writer.write_sample((s.clamp(-1.0, 1.0) * 32767.0) as i16).unwrap();
    }
    writer.finalize().unwrap();
    bytes
}

/// Rewrite the sample rate (and the matching byte rate) in the fmt chunk of
/// a mono 16-bit file produced by [`wav_bytes`].
pub(crate) fn with_declared_rate(mut bytes: Vec<u8>, rate: u32) -> Vec<u8> {
    bytes[24..28].copy_from_slice(&rate.to_le_bytes());
    bytes[28..32].copy_from_slice(&(rate * 2).to_le_bytes());
    bytes
}
