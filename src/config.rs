use serde::Deserialize;
use std::path::Path;
use std::time::Duration;
use thiserror::Error;

use crate::audio::publish::{DEFAULT_CHANNEL_CAPACITY, DEFAULT_THROTTLE};
use crate::audio::smoothing::SmoothingMode;
use crate::audio::window::MAX_BINS;

#[derive(Debug, Error, PartialEq)]
pub enum ConfigError {
    #[error("bin count {bins} is outside 1..={max}")]
    BinCount { bins: usize, max: usize },
    #[error("scaling multiplier must be finite, got {0}")]
    Scaling(f32),
    #[error("history must hold at least one frame")]
    EmptyHistory,
    #[error("fixed max magnitude must be positive, got {0}")]
    MaxMagnitude(f32),
}

/// Visualization styles and the spectrum shape each one asks for.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "snake_case")]
pub enum VizStyle {
    RadialFunk,
    #[default]
    Kishimisu,
    Bars,
    Spectrum,
}

impl VizStyle {
    pub fn bins(self) -> usize {
        match self {
            VizStyle::RadialFunk => 360,
            VizStyle::Spectrum => 80,
            VizStyle::Bars => 40,
            VizStyle::Kishimisu => 50,
        }
    }

    pub fn scaling(self) -> f32 {
        match self {
            VizStyle::RadialFunk | VizStyle::Spectrum => 80.0,
            VizStyle::Bars | VizStyle::Kishimisu => 30.0,
        }
    }
}

/// Renderer-side presets: how much history to keep and how to scale it.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "snake_case")]
pub enum Preset {
    /// Four frames against a fixed display ceiling.
    #[default]
    Muziqi,
    /// Eight frames, ceiling follows the observed maximum.
    Awaaz,
}

impl Preset {
    pub fn history(self) -> usize {
        match self {
            Preset::Muziqi => 4,
            Preset::Awaaz => 8,
        }
    }

    pub fn max_magnitude(self) -> Option<f32> {
        match self {
            Preset::Muziqi => Some(20.0),
            Preset::Awaaz => None,
        }
    }
}

/// Fixed for the lifetime of an `Analyzer`; build a new one to change it.
#[derive(Clone, Debug, PartialEq)]
pub struct AnalysisConfig {
    pub bins: usize,
    pub scaling: f32,
    pub history: usize,
    /// When false, incoming windows are ignored and the last output stays.
    pub live: bool,
    pub smoothing: SmoothingMode,
    /// Display ceiling; `None` uses the maximum seen in the history.
    pub max_magnitude: Option<f32>,
    pub throttle: Duration,
    pub channel_capacity: usize,
}

impl AnalysisConfig {
    pub fn for_style(style: VizStyle, preset: Preset) -> Self {
        Self {
            bins: style.bins(),
            scaling: style.scaling(),
            history: preset.history(),
            live: true,
            smoothing: SmoothingMode::default(),
            max_magnitude: preset.max_magnitude(),
            throttle: DEFAULT_THROTTLE,
            channel_capacity: DEFAULT_CHANNEL_CAPACITY,
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.bins == 0 || self.bins > MAX_BINS {
            return Err(ConfigError::BinCount {
                bins: self.bins,
                max: MAX_BINS,
            });
        }
        if !self.scaling.is_finite() {
            return Err(ConfigError::Scaling(self.scaling));
        }
        if self.history == 0 {
            return Err(ConfigError::EmptyHistory);
        }
        if let Some(max) = self.max_magnitude {
            if !(max.is_finite() && max > 0.0) {
                return Err(ConfigError::MaxMagnitude(max));
            }
        }
        Ok(())
    }
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self::for_style(VizStyle::default(), Preset::default())
    }
}

// ---- tapviz.toml ----

#[derive(Debug, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub analysis: AnalysisSection,
    #[serde(default)]
    pub publish: PublishSection,
    #[serde(default)]
    pub render: RenderSection,
}

#[derive(Debug, Deserialize)]
pub struct AnalysisSection {
    #[serde(default)]
    pub style: VizStyle,
    #[serde(default)]
    pub preset: Preset,
    /// Overrides the style's bin count.
    #[serde(default)]
    pub bins: Option<usize>,
    #[serde(default)]
    pub scaling: Option<f32>,
    #[serde(default)]
    pub history: Option<usize>,
    #[serde(default = "default_live")]
    pub live: bool,
    #[serde(default)]
    pub smoothing: SmoothingMode,
}

#[derive(Debug, Deserialize)]
pub struct PublishSection {
    #[serde(default = "default_throttle_ms")]
    pub throttle_ms: u64,
    #[serde(default = "default_channel_capacity")]
    pub channel_capacity: usize,
}

#[derive(Debug, Deserialize)]
pub struct RenderSection {
    #[serde(default = "default_fps")]
    pub fps: u32,
    #[serde(default = "default_gpu")]
    pub gpu: bool,
}

impl Default for AnalysisSection {
    fn default() -> Self {
        Self {
            style: VizStyle::default(),
            preset: Preset::default(),
            bins: None,
            scaling: None,
            history: None,
            live: default_live(),
            smoothing: SmoothingMode::default(),
        }
    }
}

impl Default for PublishSection {
    fn default() -> Self {
        Self {
            throttle_ms: default_throttle_ms(),
            channel_capacity: default_channel_capacity(),
        }
    }
}

impl Default for RenderSection {
    fn default() -> Self {
        Self {
            fps: default_fps(),
            gpu: default_gpu(),
        }
    }
}

fn default_live() -> bool { true }
fn default_throttle_ms() -> u64 { DEFAULT_THROTTLE.as_millis() as u64 }
fn default_channel_capacity() -> usize { DEFAULT_CHANNEL_CAPACITY }
fn default_fps() -> u32 { 60 }
fn default_gpu() -> bool { true }

impl Config {
    pub fn analysis_config(&self) -> AnalysisConfig {
        let a = &self.analysis;
        let mut config = AnalysisConfig::for_style(a.style, a.preset);
        if let Some(bins) = a.bins {
            config.bins = bins;
        }
        if let Some(scaling) = a.scaling {
            config.scaling = scaling;
        }
        if let Some(history) = a.history {
            config.history = history;
        }
        config.live = a.live;
        config.smoothing = a.smoothing;
        config.throttle = Duration::from_millis(self.publish.throttle_ms);
        config.channel_capacity = self.publish.channel_capacity;
        config
    }
}

pub fn parse_config(content: &str) -> Result<Config, toml::de::Error> {
    toml::from_str(content)
}

pub fn load_config(path: &Path) -> Option<Config> {
    let content = std::fs::read_to_string(path).ok()?;
    match parse_config(&content) {
        Ok(config) => Some(config),
        Err(err) => {
            log::warn!("Invalid config {}: {}", path.display(), err);
            None
        }
    }
}
