use clap::Parser;
use std::path::PathBuf;

use tapviz::audio::smoothing::SmoothingMode;
use tapviz::config::{Preset, VizStyle};

#[derive(Parser, Debug)]
#[command(name = "tapviz", about = "Live loudness and spectrum analysis over an audio tap")]
pub struct Cli {
    /// Input audio file (WAV, MP3, FLAC, OGG)
    pub input: PathBuf,

    /// Visualization style, which sets bin count and scaling
    #[arg(short, long, value_enum)]
    pub style: Option<VizStyle>,

    /// Renderer preset, which sets history depth and display ceiling
    #[arg(short, long, value_enum)]
    pub preset: Option<Preset>,

    /// Override the number of history frames
    #[arg(long)]
    pub history: Option<usize>,

    /// Smoothing ladder variant
    #[arg(long, value_enum)]
    pub smoothing: Option<SmoothingMode>,

    /// Deliver buffers at playback speed instead of as fast as possible
    #[arg(long)]
    pub realtime: bool,

    /// Render loop rate in frames per second
    #[arg(long)]
    pub fps: Option<u32>,

    /// Skip GPU upload entirely
    #[arg(long)]
    pub no_gpu: bool,

    /// Write the final published state as JSON
    #[arg(long)]
    pub dump: Option<PathBuf>,

    /// Config file (defaults to ./tapviz.toml or the platform config dir)
    #[arg(short, long)]
    pub config: Option<PathBuf>,
}
