//! Sample-wise helpers used on the audio thread. No allocation.

use wide::f32x4;

/// `dst[i] += src[i]`
#[inline]
pub fn add_into(dst: &mut [f32], src: &[f32]) {
    let len = dst.len().min(src.len());
    let (dst, src) = (&mut dst[..len], &src[..len]);

    let mut dst_chunks = dst.chunks_exact_mut(4);
    let mut src_chunks = src.chunks_exact(4);
    for (d, s) in (&mut dst_chunks).zip(&mut src_chunks) {
        let sum = f32x4::from([d[0], d[1], d[2], d[3]]) + f32x4::from([s[0], s[1], s[2], s[3]]);
        d.copy_from_slice(&sum.to_array());
    }
    for (d, s) in dst_chunks.into_remainder().iter_mut().zip(src_chunks.remainder()) {
        *d += *s;
    }
}

/// Clamp every sample to [-1, 1].
#[inline]
pub fn clamp_unit(buffer: &mut [f32]) {
    let lo = f32x4::splat(-1.0);
    let hi = f32x4::splat(1.0);

    let mut chunks = buffer.chunks_exact_mut(4);
    for chunk in &mut chunks {
        let v = f32x4::from([chunk[0], chunk[1], chunk[2], chunk[3]]);
        chunk.copy_from_slice(&v.max(lo).min(hi).to_array());
    }
    for s in chunks.into_remainder() {
        *s = s.clamp(-1.0, 1.0);
    }
}
