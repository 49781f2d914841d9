mod cli;

use anyhow::{Context, Result};
use clap::Parser;
use indicatif::{ProgressBar, ProgressStyle};
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

use cli::Cli;
use tapviz::audio::analyzer::Analyzer;
use tapviz::audio::decode;
use tapviz::audio::shared::SharedFeatures;
use tapviz::config::{self, Config};
use tapviz::render::gpu::GpuContext;
use tapviz::render::upload::FeatureBuffers;
use tapviz::tap::{Pacing, TapSession};

#[derive(Serialize)]
struct StateDump {
    loudness: f32,
    frames: usize,
    bins: usize,
    max_magnitude: f32,
    /// frames x bins, oldest first
    history: Vec<f32>,
    frames_processed: u64,
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .format_timestamp_millis()
        .init();

    let cli = Cli::parse();

    // Load config: explicit --config path, or auto-detect tapviz.toml / global config
    let config_path = cli.config.clone().or_else(|| {
        let local = PathBuf::from("tapviz.toml");
        if local.exists() {
            return Some(local);
        }
        if let Some(home) = dirs::home_dir() {
            let xdg = home.join(".config").join("tapviz").join("config.toml");
            if xdg.exists() {
                return Some(xdg);
            }
        }
        if let Some(config_dir) = dirs::config_dir() {
            let platform = config_dir.join("tapviz").join("config.toml");
            if platform.exists() {
                return Some(platform);
            }
        }
        None
    });
    let mut cfg = match config_path {
        Some(ref path) => match config::load_config(path) {
            Some(cfg) => {
                log::info!("Loaded config from {}", path.display());
                cfg
            }
            None => {
                log::warn!("Failed to load config from {}", path.display());
                Config::default()
            }
        },
        None => Config::default(),
    };

    // CLI flags win over the file
    if let Some(style) = cli.style { cfg.analysis.style = style; }
    if let Some(preset) = cli.preset { cfg.analysis.preset = preset; }
    if let Some(history) = cli.history { cfg.analysis.history = Some(history); }
    if let Some(smoothing) = cli.smoothing { cfg.analysis.smoothing = smoothing; }
    if let Some(fps) = cli.fps { cfg.render.fps = fps; }
    if cli.no_gpu { cfg.render.gpu = false; }

    if !cli.input.exists() {
        anyhow::bail!("Input file not found: {}", cli.input.display());
    }

    log::info!("tapviz - live audio analysis");
    log::info!("Input: {}", cli.input.display());
    log::info!("Style: {:?}, preset: {:?}", cfg.analysis.style, cfg.analysis.preset);

    // 1. Decode audio standing in for the playback node
    log::info!("Decoding audio...");
    let audio = decode::decode_channels(&cli.input)?;
    log::info!("Duration: {:.1}s", audio.duration_secs());

    // 2. Analysis core and its consumers
    let analysis_config = cfg.analysis_config();
    let fixed_max = analysis_config.max_magnitude;
    let mut analyzer = Analyzer::new(analysis_config).context("Invalid analysis config")?;
    let shared = analyzer.shared();
    let mut throttled = analyzer.publisher_mut().subscribe_throttled_loudness();
    let spectrum_rx = analyzer.publisher_mut().subscribe_spectrum();

    let ui = std::thread::Builder::new()
        .name("ui".into())
        .spawn(move || {
            let mut updates = 0u64;
            while let Some(loudness) = throttled.next() {
                updates += 1;
                log::debug!("loudness {:.3}", loudness);
            }
            updates
        })
        .context("Failed to spawn UI thread")?;

    // 3. Optional GPU target
    let gpu = if cfg.render.gpu { GpuContext::try_new() } else { None };
    let mut buffers = gpu.as_ref().map(|gpu| {
        let config = analyzer.config();
        FeatureBuffers::new(gpu, config.bins, config.history, fixed_max)
    });

    // 4. Attach the tap and run the render loop until playback ends
    let pacing = if cli.realtime { Pacing::Realtime } else { Pacing::Unpaced };
    let session = TapSession::attach(audio, analyzer, pacing)?;

    let pb = ProgressBar::new(session.total());
    pb.set_style(
        ProgressStyle::default_bar()
            .template("[{elapsed_precise}] {bar:40.cyan/blue} {pos}/{len} buffers ({eta} remaining)")
            .context("Invalid progress template")?
            .progress_chars("=>-"),
    );

    let frame_interval = Duration::from_secs_f64(1.0 / cfg.render.fps.max(1) as f64);
    let mut uploads = 0u64;
    let mut spectrum_events = 0u64;
    loop {
        let finished = session.is_finished();
        if let (Some(gpu), Some(buffers)) = (gpu.as_ref(), buffers.as_mut()) {
            if buffers.upload(gpu, &shared) {
                uploads += 1;
            }
        }
        spectrum_events += spectrum_rx.try_iter().count() as u64;
        pb.set_position(session.delivered());
        if finished {
            break;
        }
        std::thread::sleep(frame_interval);
    }
    pb.finish_with_message("Playback complete");

    // 5. Detach before tearing anything down
    let analyzer = session.wait()?;
    let frames_processed = analyzer.frames_processed();
    drop(analyzer);
    spectrum_events += spectrum_rx.try_iter().count() as u64;
    let ui_updates = ui.join().map_err(|_| anyhow::anyhow!("UI thread panicked"))?;

    log::info!(
        "Processed {} buffers: {} spectrum events, {} throttled loudness updates, {} GPU uploads",
        frames_processed,
        spectrum_events,
        ui_updates,
        uploads
    );
    if gpu.is_none() {
        log::info!("Ran without a GPU target");
    }

    if let Some(ref path) = cli.dump {
        write_dump(path, &shared, frames_processed)?;
        log::info!("Wrote state to {}", path.display());
    }

    Ok(())
}

fn write_dump(path: &Path, shared: &SharedFeatures, frames_processed: u64) -> Result<()> {
    let snapshot = shared.spectral();
    let dump = StateDump {
        loudness: shared.loudness(),
        frames: snapshot.frames,
        bins: snapshot.bins,
        max_magnitude: snapshot.max_magnitude,
        history: snapshot.data.to_vec(),
        frames_processed,
    };
    let json = serde_json::to_string_pretty(&dump)?;
    std::fs::write(path, json)
        .with_context(|| format!("Failed to write dump: {}", path.display()))
}
