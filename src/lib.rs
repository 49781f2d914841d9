//! Real-time loudness and spectrum analysis for audio visualizers.
//!
//! An [`audio::analyzer::Analyzer`] sits on an audio tap, turns each
//! [`audio::window::WINDOW_SIZE`]-sample buffer into a smoothed loudness
//! value and spectral frame, and publishes both: lock-free to a renderer
//! through [`audio::shared::SharedFeatures`], and as events to subscribers
//! through [`audio::publish::FeaturePublisher`].

pub mod audio;
pub mod config;
pub mod render;
pub mod tap;
