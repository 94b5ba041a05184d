use std::f32::consts::PI;
use std::sync::OnceLock;

use serde::{Deserialize, Serialize};

// Power of two so the index wraps with a mask.
const TABLE_SIZE: usize = 8192;
const TABLE_MASK: usize = TABLE_SIZE - 1;

static SINE_TABLE: OnceLock<Vec<f32>> = OnceLock::new();
static TRIANGLE_TABLE: OnceLock<Vec<f32>> = OnceLock::new();
static SAWTOOTH_TABLE: OnceLock<Vec<f32>> = OnceLock::new();
static SQUARE_TABLE: OnceLock<Vec<f32>> = OnceLock::new();

fn build(shape: impl Fn(f32) -> f32) -> Vec<f32> {
    (0..TABLE_SIZE)
        .map(|i| shape(i as f32 / TABLE_SIZE as f32))
        .collect()
}

/// Build every table. Call before the audio thread starts so the first
/// lookup never allocates.
pub fn init_tables() {
    for kind in [
        WaveformType::Sine,
        WaveformType::Square,
        WaveformType::Triangle,
        WaveformType::Sawtooth,
    ] {
        let _ = kind.table();
    }
}

/// Linearly interpolated lookup. `phase` is in [0, 1).
#[inline]
pub fn interpolated_lookup(table: &[f32], phase: f32) -> f32 {
    let scaled = phase * TABLE_SIZE as f32;
    let index = scaled as usize & TABLE_MASK;
    let frac = scaled - (scaled as usize as f32);

    let a = table[index];
    let b = table[(index + 1) & TABLE_MASK];
    a + frac * (b - a)
}

/// Wrap phase into [0, 1).
#[inline]
pub fn normalize_phase(phase: f32) -> f32 {
    phase - phase.floor()
}

#[inline]
pub fn phase_increment(frequency: f32, sample_rate: f32) -> f32 {
    frequency / sample_rate
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WaveformType {
    Sine,
    Square,
    Triangle,
    Sawtooth,
}

impl WaveformType {
    pub fn table(self) -> &'static [f32] {
        match self {
            WaveformType::Sine => SINE_TABLE.get_or_init(|| build(|p| (2.0 * PI * p).sin())),
            WaveformType::Square => {
                SQUARE_TABLE.get_or_init(|| build(|p| if p < 0.5 { 1.0 } else { -1.0 }))
            }
            WaveformType::Triangle => TRIANGLE_TABLE.get_or_init(|| {
                build(|p| {
                    if p < 0.25 {
                        4.0 * p
                    } else if p < 0.75 {
                        2.0 - 4.0 * p
                    } else {
                        4.0 * p - 4.0
                    }
                })
            }),
            WaveformType::Sawtooth => SAWTOOTH_TABLE.get_or_init(|| build(|p| 2.0 * p - 1.0)),
        }
    }

    #[inline]
    pub fn sample(self, phase: f32) -> f32 {
        interpolated_lookup(self.table(), phase)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_table_sizes() {
        init_tables();
        for kind in [
            WaveformType::Sine,
            WaveformType::Square,
            WaveformType::Triangle,
            WaveformType::Sawtooth,
        ] {
            assert_eq!(kind.table().len(), TABLE_SIZE);
        }
    }

    #[test]
    fn test_sine_quadrants() {
        let sine = WaveformType::Sine;
        assert!(sine.sample(0.0).abs() < 0.001);
        assert!((sine.sample(0.25) - 1.0).abs() < 0.001);
        assert!(sine.sample(0.5).abs() < 0.001);
        assert!((sine.sample(0.75) + 1.0).abs() < 0.001);
    }

    #[test]
    fn test_triangle_quadrants() {
        let triangle = WaveformType::Triangle;
        assert!(triangle.sample(0.0).abs() < 0.001);
        assert!((triangle.sample(0.25) - 1.0).abs() < 0.001);
        assert!(triangle.sample(0.5).abs() < 0.001);
        assert!((triangle.sample(0.75) + 1.0).abs() < 0.001);
    }

    #[test]
    fn test_square_and_sawtooth() {
        assert_eq!(WaveformType::Square.sample(0.1), 1.0);
        assert_eq!(WaveformType::Square.sample(0.6), -1.0);
        assert!((WaveformType::Sawtooth.sample(0.0) + 1.0).abs() < 0.001);
        assert!(WaveformType::Sawtooth.sample(0.5).abs() < 0.001);
    }

    #[test]
    fn test_phase_normalization() {
        assert_eq!(normalize_phase(1.5), 0.5);
        assert_eq!(normalize_phase(2.0), 0.0);
        assert_eq!(normalize_phase(-0.5), 0.5);
    }
}
