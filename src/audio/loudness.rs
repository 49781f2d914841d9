use super::window::SampleWindow;

/// Top of the "loudest" scale that decibels are remapped onto.
const LOUDEST_DB: f32 = 160.0;
/// Only the 120..160 part of that scale is treated as audible range.
const BAND_FLOOR: f32 = 120.0;
const BAND_WIDTH: f32 = 40.0;
const BAND_NORMALIZER: f32 = 0.3;
/// Perceptual window the normalized value is stretched over.
const PERCEPTUAL_LOW: f32 = 0.03;
const PERCEPTUAL_HIGH: f32 = 0.25;

/// Mean-square energy of a block of samples.
pub fn mean_square(samples: &[f32]) -> f32 {
    if samples.is_empty() {
        return 0.0;
    }
    samples.iter().map(|s| s * s).sum::<f32>() / samples.len() as f32
}

/// Loudness in `[0, 1]` for one window. Never returns a non-finite value.
pub fn estimate(window: &SampleWindow) -> f32 {
    loudness_from_energy(mean_square(window.samples()))
}

pub fn loudness_from_energy(energy: f32) -> f32 {
    // log10(0) is -inf, and NaN samples poison the sum
    if !energy.is_finite() || energy <= 0.0 {
        return 0.0;
    }

    let db = 10.0 * energy.log10();
    let band = LOUDEST_DB + db - BAND_FLOOR;
    let norm = (band / (BAND_WIDTH / BAND_NORMALIZER)).clamp(0.0, 1.0);
    let result =
        ((norm - PERCEPTUAL_LOW) / (PERCEPTUAL_HIGH - PERCEPTUAL_LOW)).clamp(0.0, 1.0);

    if result.is_finite() {
        result
    } else {
        0.0
    }
}
