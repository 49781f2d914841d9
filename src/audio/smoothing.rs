use serde::{Deserialize, Serialize};

/// Which form of the seven-point interpolation ladder to use.
///
/// `Faithful` reproduces historical output: the second rung is built from a
/// rung that has not been computed yet and so reads zero. That makes
/// `smooth(x, x)` come out as `6x / 7` instead of `x`. `Corrected` builds the
/// rung from the midpoint, which is what the ladder is meant to do.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum SmoothingMode {
    Faithful,
    #[default]
    Corrected,
}

#[derive(Clone, Copy, Debug, Default)]
pub struct Smoother {
    mode: SmoothingMode,
}

impl Smoother {
    pub fn new(mode: SmoothingMode) -> Self {
        Self { mode }
    }

    pub fn mode(&self) -> SmoothingMode {
        self.mode
    }

    pub fn smooth_scalar(&self, previous: f32, current: f32) -> f32 {
        let v6 = current;
        let v3 = (current + previous) * 0.5;
        let v1 = match self.mode {
            SmoothingMode::Faithful => previous * 0.5,
            SmoothingMode::Corrected => (v3 + previous) * 0.5,
        };
        let v4 = (v3 + current) * 0.5;
        let v5 = (v6 + current) * 0.5;
        let v2 = (v1 + v3) * 0.5;
        let v0 = (previous + v1) * 0.5;

        (v0 + v1 + v2 + v3 + v4 + v5 + v6) / 7.0
    }

    /// Smooths `current` against `previous` bin by bin into `out`.
    ///
    /// A `previous` of a different length (first frame, or after a reset) is
    /// treated as absent and `current` is copied through.
    pub fn smooth_slice(&self, previous: &[f32], current: &[f32], out: &mut Vec<f32>) {
        out.clear();
        if previous.len() != current.len() {
            out.extend_from_slice(current);
            return;
        }
        out.extend(
            previous
                .iter()
                .zip(current)
                .map(|(&p, &c)| self.smooth_scalar(p, c)),
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const EPS: f32 = 1e-5;

    #[test]
    fn corrected_is_idempotent_on_equal_inputs() {
        let smoother = Smoother::new(SmoothingMode::Corrected);
        for x in [0.0f32, 0.5, 1.0, -3.25, 120.0] {
            assert!((smoother.smooth_scalar(x, x) - x).abs() < EPS, "x = {x}");
        }
    }

    #[test]
    fn faithful_mode_shrinks_equal_inputs() {
        let smoother = Smoother::new(SmoothingMode::Faithful);
        let x = 0.7f32;
        let expected = 6.0 * x / 7.0;
        assert!((smoother.smooth_scalar(x, x) - expected).abs() < EPS);
    }

    #[test]
    fn result_lies_between_previous_and_current() {
        let smoother = Smoother::default();
        let value = smoother.smooth_scalar(0.0, 1.0);
        assert!(value > 0.0 && value < 1.0);
        // biased toward the current value
        assert!(value > 0.5);
    }

    #[test]
    fn faithful_reference_value() {
        // previous = 0.2, current = 0.6
        // v6 .6, v3 .4, v1 .1, v4 .5, v5 .6, v2 .25, v0 .15
        let smoother = Smoother::new(SmoothingMode::Faithful);
        let expected = (0.15 + 0.1 + 0.25 + 0.4 + 0.5 + 0.6 + 0.6) / 7.0;
        assert!((smoother.smooth_scalar(0.2, 0.6) - expected).abs() < EPS);
    }

    #[test]
    fn slice_smoothing_is_per_bin() {
        let smoother = Smoother::default();
        let previous = [0.0, 1.0, 2.0];
        let current = [1.0, 1.0, 0.0];
        let mut out = Vec::new();
        smoother.smooth_slice(&previous, &current, &mut out);
        assert_eq!(out.len(), 3);
        assert!((out[1] - 1.0).abs() < EPS);
        assert!((out[0] - smoother.smooth_scalar(0.0, 1.0)).abs() < EPS);
        assert!((out[2] - smoother.smooth_scalar(2.0, 0.0)).abs() < EPS);
    }

    #[test]
    fn slice_without_history_passes_through() {
        let smoother = Smoother::default();
        let mut out = vec![9.0; 2];
        smoother.smooth_slice(&[], &[0.3, 0.4], &mut out);
        assert_eq!(out, vec![0.3, 0.4]);
    }
}
