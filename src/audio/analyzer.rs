use std::sync::Arc;
use std::time::Duration;

use super::history::HistoryRing;
use super::loudness;
use super::publish::FeaturePublisher;
use super::shared::{SharedFeatures, SnapshotWriter, SpectralSnapshot};
use super::smoothing::Smoother;
use super::spectrum::SpectralEstimator;
use super::window::SampleWindow;
use crate::config::{AnalysisConfig, ConfigError};

/// What happened to one tap delivery.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Outcome {
    Published,
    /// Live analysis is off; nothing was computed.
    Paused,
    /// The buffer was unusable and was dropped.
    Skipped,
    /// Loudness went out but the frame did not fit the history.
    Rejected,
}

/// Real-time analysis core. Lives on the audio callback thread; everything
/// it exposes to other threads goes through `SharedFeatures` or the
/// publisher's channels.
pub struct Analyzer {
    config: AnalysisConfig,
    spectrum: SpectralEstimator,
    smoother: Smoother,
    history: HistoryRing,
    publisher: FeaturePublisher,
    shared: Arc<SharedFeatures>,
    snapshots: SnapshotWriter,
    previous_loudness: f32,
    previous_frame: Vec<f32>,
    raw_frame: Vec<f32>,
    smoothed_frame: Vec<f32>,
    sequence: u64,
    processed: u64,
}

impl Analyzer {
    pub fn new(config: AnalysisConfig) -> Result<Self, ConfigError> {
        config.validate()?;

        let spectrum = SpectralEstimator::new(config.bins, config.scaling)?;
        log::info!(
            "Analyzer: {} bins, scaling {:.1}, {} history frames, {:?} smoothing",
            config.bins,
            config.scaling,
            config.history,
            config.smoothing
        );

        let (shared, snapshots) = SharedFeatures::new();
        Ok(Self {
            spectrum,
            smoother: Smoother::new(config.smoothing),
            history: HistoryRing::new(config.history),
            publisher: FeaturePublisher::new(config.channel_capacity, config.throttle),
            shared,
            snapshots,
            previous_loudness: 0.0,
            previous_frame: Vec::with_capacity(config.bins),
            raw_frame: Vec::with_capacity(config.bins),
            smoothed_frame: Vec::with_capacity(config.bins),
            sequence: 0,
            processed: 0,
            config,
        })
    }

    /// Entry point for the tap callback. Never panics on bad input.
    pub fn process_tap<C: AsRef<[f32]>>(&mut self, channels: &[C], timestamp: Duration) -> Outcome {
        match SampleWindow::from_channels(channels, timestamp) {
            Ok(window) => self.process(&window),
            Err(err) => {
                log::warn!("Skipping tap buffer at {:?}: {}", timestamp, err);
                Outcome::Skipped
            }
        }
    }

    pub fn process(&mut self, window: &SampleWindow) -> Outcome {
        if !self.config.live {
            return Outcome::Paused;
        }

        let raw = loudness::estimate(window);
        let smoothed = self.smoother.smooth_scalar(self.previous_loudness, raw);
        let value = if smoothed.is_finite() {
            smoothed.clamp(0.0, 1.0)
        } else {
            0.0
        };
        self.previous_loudness = value;
        self.shared.store_loudness(value);
        self.publisher.publish_loudness(value, window.timestamp());

        self.spectrum.analyze_into(window, &mut self.raw_frame);
        self.smoother
            .smooth_slice(&self.previous_frame, &self.raw_frame, &mut self.smoothed_frame);
        std::mem::swap(&mut self.previous_frame, &mut self.smoothed_frame);
        let frame: Arc<[f32]> = Arc::from(self.previous_frame.as_slice());

        self.processed += 1;

        if let Err(err) = self.history.append(frame.clone()) {
            log::warn!("Spectral frame rejected: {}", err);
            return Outcome::Rejected;
        }

        self.publish_snapshot();
        self.publisher.publish_spectrum(frame, window.timestamp());
        Outcome::Published
    }

    /// Clears history and smoothing state. Published values drop to zero.
    pub fn reset(&mut self) {
        self.history.reset();
        self.previous_loudness = 0.0;
        self.previous_frame.clear();
        self.shared.store_loudness(0.0);
        self.publish_snapshot();
        log::debug!("Analyzer state reset");
    }

    fn publish_snapshot(&mut self) {
        self.sequence += 1;
        self.snapshots
            .publish(SpectralSnapshot::from_history(&self.history, self.sequence));
    }

    pub fn shared(&self) -> Arc<SharedFeatures> {
        Arc::clone(&self.shared)
    }

    /// Subscribe before handing the analyzer to the tap thread.
    pub fn publisher_mut(&mut self) -> &mut FeaturePublisher {
        &mut self.publisher
    }

    pub fn history(&self) -> &HistoryRing {
        &self.history
    }

    pub fn config(&self) -> &AnalysisConfig {
        &self.config
    }

    pub fn frames_processed(&self) -> u64 {
        self.processed
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::smoothing::SmoothingMode;
    use crate::audio::window::WINDOW_SIZE;
    use crate::config::{Preset, VizStyle};

    fn tone(amplitude: f32) -> Vec<f32> {
        (0..WINDOW_SIZE)
            .map(|n| {
                amplitude * (2.0 * std::f32::consts::PI * 8.0 * n as f32 / WINDOW_SIZE as f32).sin()
            })
            .collect()
    }

    fn bars() -> AnalysisConfig {
        AnalysisConfig::for_style(VizStyle::Bars, Preset::Muziqi)
    }

    #[test]
    fn rejects_invalid_config() {
        let config = AnalysisConfig { history: 0, ..bars() };
        assert!(matches!(Analyzer::new(config), Err(ConfigError::EmptyHistory)));
    }

    #[test]
    fn publishes_loudness_and_history() {
        let mut analyzer = Analyzer::new(bars()).unwrap();
        let shared = analyzer.shared();
        let samples = tone(0.3);

        for i in 0..6 {
            let outcome = analyzer.process_tap(&[samples.as_slice()], Duration::from_millis(i * 23));
            assert_eq!(outcome, Outcome::Published);
        }

        assert!(shared.loudness() > 0.0 && shared.loudness() <= 1.0);
        let snap = shared.spectral();
        assert_eq!(snap.frames, 4);
        assert_eq!(snap.bins, 40);
        assert_eq!(snap.data.len(), 160);
        assert!(snap.max_magnitude > 0.0);
        assert_eq!(analyzer.frames_processed(), 6);
    }

    #[test]
    fn malformed_buffer_keeps_previous_values() {
        let mut analyzer = Analyzer::new(bars()).unwrap();
        let shared = analyzer.shared();
        let samples = tone(0.3);
        analyzer.process_tap(&[samples.as_slice()], Duration::ZERO);
        let loudness = shared.loudness();
        let sequence = shared.spectral().sequence;

        let short = vec![1.0f32; 100];
        assert_eq!(
            analyzer.process_tap(&[short.as_slice()], Duration::from_millis(23)),
            Outcome::Skipped
        );
        let none: [&[f32]; 0] = [];
        assert_eq!(analyzer.process_tap(&none, Duration::ZERO), Outcome::Skipped);

        assert_eq!(shared.loudness(), loudness);
        assert_eq!(shared.spectral().sequence, sequence);
    }

    #[test]
    fn silence_never_publishes_nan() {
        let mut analyzer = Analyzer::new(bars()).unwrap();
        let shared = analyzer.shared();
        let silence = vec![0.0f32; WINDOW_SIZE];
        for _ in 0..3 {
            analyzer.process_tap(&[silence.as_slice()], Duration::ZERO);
        }
        assert_eq!(shared.loudness(), 0.0);
        assert!(shared.spectral().data.iter().all(|v| v.is_finite()));
    }

    #[test]
    fn steady_input_converges_with_corrected_smoothing() {
        let mut analyzer = Analyzer::new(bars()).unwrap();
        let shared = analyzer.shared();
        let samples = vec![0.1f32; WINDOW_SIZE];
        for _ in 0..60 {
            analyzer.process_tap(&[samples.as_slice()], Duration::ZERO);
        }
        let target = loudness::loudness_from_energy(0.01);
        assert!((shared.loudness() - target).abs() < 1e-3);
    }

    #[test]
    fn faithful_smoothing_settles_below_target() {
        let config = AnalysisConfig {
            smoothing: SmoothingMode::Faithful,
            ..bars()
        };
        let mut analyzer = Analyzer::new(config).unwrap();
        let shared = analyzer.shared();
        let samples = vec![0.1f32; WINDOW_SIZE];
        for _ in 0..60 {
            analyzer.process_tap(&[samples.as_slice()], Duration::ZERO);
        }
        let target = loudness::loudness_from_energy(0.01);
        assert!(shared.loudness() < target - 1e-3);
    }

    #[test]
    fn paused_analyzer_ignores_input() {
        let config = AnalysisConfig { live: false, ..bars() };
        let mut analyzer = Analyzer::new(config).unwrap();
        let shared = analyzer.shared();
        let samples = tone(0.5);
        assert_eq!(
            analyzer.process_tap(&[samples.as_slice()], Duration::ZERO),
            Outcome::Paused
        );
        assert_eq!(shared.loudness(), 0.0);
        assert!(shared.spectral().is_empty());
        assert_eq!(analyzer.frames_processed(), 0);
    }

    #[test]
    fn reset_clears_history() {
        let mut analyzer = Analyzer::new(bars()).unwrap();
        let shared = analyzer.shared();
        let samples = tone(0.5);
        analyzer.process_tap(&[samples.as_slice()], Duration::ZERO);
        assert_eq!(analyzer.history().len(), 1);

        analyzer.reset();
        assert!(analyzer.history().is_empty());
        assert_eq!(shared.loudness(), 0.0);
        assert!(shared.spectral().is_empty());
    }

    #[test]
    fn subscribers_see_every_frame_in_order() {
        let mut analyzer = Analyzer::new(bars()).unwrap();
        let loudness_rx = analyzer.publisher_mut().subscribe_loudness();
        let spectrum_rx = analyzer.publisher_mut().subscribe_spectrum();
        let samples = tone(0.2);

        for i in 0..5 {
            analyzer.process_tap(&[samples.as_slice()], Duration::from_millis(i));
        }

        let stamps: Vec<u128> = loudness_rx.try_iter().map(|e| e.timestamp.as_millis()).collect();
        assert_eq!(stamps, vec![0, 1, 2, 3, 4]);
        let frames: Vec<_> = spectrum_rx.try_iter().collect();
        assert_eq!(frames.len(), 5);
        assert!(frames.iter().all(|e| e.frame.len() == 40));
    }

    #[test]
    fn last_frame_reaches_renderer_that_was_reading() {
        let mut analyzer = Analyzer::new(bars()).unwrap();
        let shared = analyzer.shared();
        let samples = tone(0.3);
        analyzer.process_tap(&[samples.as_slice()], Duration::ZERO);

        // the renderer is mid-read while the stream's final windows arrive
        shared.with_spectral(|held| {
            assert_eq!(held.frames, 1);
            analyzer.process_tap(&[samples.as_slice()], Duration::from_millis(23));
            analyzer.process_tap(&[samples.as_slice()], Duration::from_millis(46));
        });

        let snap = shared.spectral();
        assert_eq!(snap.frames, analyzer.history().len());
        assert_eq!(snap.frames, 3);
        assert_eq!(&*snap.data, analyzer.history().flatten().as_slice());
    }
}
