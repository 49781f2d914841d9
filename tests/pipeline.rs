use std::sync::Arc;
use std::time::Duration;

use tapviz::audio::analyzer::{Analyzer, Outcome};
use tapviz::audio::decode::DecodedAudio;
use tapviz::audio::spectrum::SpectralEstimator;
use tapviz::audio::window::{SampleWindow, WINDOW_SIZE};
use tapviz::config::{AnalysisConfig, Preset, VizStyle};
use tapviz::render::uniforms::VizUniforms;
use tapviz::tap::{Pacing, TapSession};

const SAMPLE_RATE: f32 = 44_100.0;

fn sine_at(freq: f32, amplitude: f32, offset: usize) -> Vec<f32> {
    (0..WINDOW_SIZE)
        .map(|n| {
            let t = (offset + n) as f32 / SAMPLE_RATE;
            amplitude * (2.0 * std::f32::consts::PI * freq * t).sin()
        })
        .collect()
}

#[test]
fn sine_lands_in_expected_bucket() {
    // bin k covers k * 44100 / 1024 Hz; 1033.6 Hz sits on bin 24
    let bin_width = SAMPLE_RATE / WINDOW_SIZE as f32;
    let freq = 24.0 * bin_width;
    let samples = sine_at(freq, 0.5, 0);
    let window = SampleWindow::new(&samples, Duration::ZERO).unwrap();

    let mut estimator = SpectralEstimator::new(40, 30.0).unwrap();
    let frame = estimator.analyze(&window);
    assert_eq!(frame.len(), 40);

    let peak = frame
        .iter()
        .enumerate()
        .max_by(|a, b| a.1.partial_cmp(b.1).unwrap())
        .map(|(i, _)| i)
        .unwrap();
    assert_eq!(peak, 24);

    let peak_value = frame[peak];
    for (i, &v) in frame.iter().enumerate() {
        if i != peak {
            assert!(v < peak_value * 1e-2, "bin {i} = {v}, peak {peak_value}");
        }
    }
}

#[test]
fn history_window_slides_over_a_stream() {
    let config = AnalysisConfig::for_style(VizStyle::Spectrum, Preset::Awaaz);
    let mut analyzer = Analyzer::new(config).unwrap();
    let shared = analyzer.shared();

    for i in 0..20 {
        let samples = sine_at(440.0, 0.4, i * WINDOW_SIZE);
        let outcome = analyzer.process_tap(&[samples.as_slice()], Duration::ZERO);
        assert_eq!(outcome, Outcome::Published);
    }

    let snapshot = shared.spectral();
    assert_eq!(snapshot.frames, 8);
    assert_eq!(snapshot.bins, 80);
    assert_eq!(snapshot.data.len(), 8 * 80);
    assert!(snapshot.data.iter().all(|v| v.is_finite() && *v >= 0.0));

    let uniforms = VizUniforms::from_snapshot(&snapshot, None);
    assert_eq!(uniforms.buffers_count, 8.0);
    assert_eq!(uniforms.max_frequency, snapshot.max_magnitude);
}

#[test]
fn tap_to_subscribers_end_to_end() {
    let frames = WINDOW_SIZE * 12;
    let left: Vec<f32> = (0..frames)
        .map(|n| 0.3 * (2.0 * std::f32::consts::PI * 220.0 * n as f32 / SAMPLE_RATE).sin())
        .collect();
    let right = vec![0.0; frames];
    let audio = DecodedAudio {
        channels: vec![left, right],
        sample_rate: SAMPLE_RATE as u32,
    };

    let config = AnalysisConfig {
        throttle: Duration::from_secs(3600),
        ..AnalysisConfig::for_style(VizStyle::Bars, Preset::Muziqi)
    };
    let mut analyzer = Analyzer::new(config).unwrap();
    let shared = analyzer.shared();
    let loudness_rx = analyzer.publisher_mut().subscribe_loudness();
    let spectrum_rx = analyzer.publisher_mut().subscribe_spectrum();
    let mut throttled = analyzer.publisher_mut().subscribe_throttled_loudness();

    let session = TapSession::attach(audio, analyzer, Pacing::Unpaced).unwrap();
    let analyzer = session.wait().unwrap();
    assert_eq!(analyzer.frames_processed(), 12);
    drop(analyzer);

    let raw: Vec<_> = loudness_rx.try_iter().collect();
    assert_eq!(raw.len(), 12);
    assert!(raw.windows(2).all(|w| w[0].timestamp < w[1].timestamp));
    assert!(raw.iter().all(|e| (0.0..=1.0).contains(&e.value)));

    let spectra: Vec<_> = spectrum_rx.try_iter().collect();
    assert_eq!(spectra.len(), 12);
    let last: &Arc<[f32]> = &spectra[11].frame;
    assert_eq!(last.len(), 40);

    // a reader that only looks after playback sees the last value, not a backlog
    assert_eq!(throttled.next(), Some(raw[11].value));
    assert_eq!(throttled.next(), None);

    assert_eq!(shared.loudness(), raw[11].value);
    assert_eq!(shared.spectral().frames, 4);
}
