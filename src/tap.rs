use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

use anyhow::{anyhow, Context, Result};

use crate::audio::analyzer::Analyzer;
use crate::audio::decode::DecodedAudio;
use crate::audio::window::WINDOW_SIZE;

const PACING_NAP: Duration = Duration::from_millis(10);

/// Receives tap buffers, one call at a time, on the tap thread.
pub trait TapHandler: Send + 'static {
    fn on_buffer(&mut self, channels: &[&[f32]], timestamp: Duration);
}

impl TapHandler for Analyzer {
    fn on_buffer(&mut self, channels: &[&[f32]], timestamp: Duration) {
        self.process_tap(channels, timestamp);
    }
}

impl<F> TapHandler for F
where
    F: FnMut(&[&[f32]], Duration) + Send + 'static,
{
    fn on_buffer(&mut self, channels: &[&[f32]], timestamp: Duration) {
        self(channels, timestamp)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Pacing {
    /// Deliver each buffer when playback would reach it.
    Realtime,
    /// Deliver as fast as the handler keeps up.
    Unpaced,
}

/// A running tap over decoded audio. Buffers of `WINDOW_SIZE` frames are
/// handed to the handler on a dedicated thread; a trailing partial buffer
/// is not delivered.
pub struct TapSession<H: TapHandler> {
    handle: Option<JoinHandle<H>>,
    stop: Arc<AtomicBool>,
    delivered: Arc<AtomicU64>,
    total: u64,
}

impl<H: TapHandler> TapSession<H> {
    pub fn attach(audio: DecodedAudio, mut handler: H, pacing: Pacing) -> Result<Self> {
        let stop = Arc::new(AtomicBool::new(false));
        let delivered = Arc::new(AtomicU64::new(0));
        let total = (audio.frames() / WINDOW_SIZE) as u64;

        let thread_stop = Arc::clone(&stop);
        let thread_delivered = Arc::clone(&delivered);

        let handle = std::thread::Builder::new()
            .name("tap".into())
            .spawn(move || {
                let sample_rate = audio.sample_rate.max(1) as f64;
                let started = Instant::now();
                let mut views: Vec<&[f32]> = Vec::with_capacity(audio.channels.len());

                for index in 0..total as usize {
                    if thread_stop.load(Ordering::Acquire) {
                        break;
                    }
                    let start = index * WINDOW_SIZE;
                    let timestamp = Duration::from_secs_f64(start as f64 / sample_rate);

                    if pacing == Pacing::Realtime {
                        // short naps so a detach is noticed promptly
                        while let Some(wait) = timestamp.checked_sub(started.elapsed()) {
                            if wait.is_zero() || thread_stop.load(Ordering::Acquire) {
                                break;
                            }
                            std::thread::sleep(wait.min(PACING_NAP));
                        }
                        if thread_stop.load(Ordering::Acquire) {
                            break;
                        }
                    }

                    views.clear();
                    views.extend(
                        audio
                            .channels
                            .iter()
                            .map(|c| &c[start..start + WINDOW_SIZE]),
                    );
                    handler.on_buffer(&views, timestamp);
                    thread_delivered.fetch_add(1, Ordering::Release);
                }
                handler
            })
            .context("Failed to spawn tap thread")?;

        log::debug!("Tap attached: {} buffers, {:?}", total, pacing);

        Ok(Self {
            handle: Some(handle),
            stop,
            delivered,
            total,
        })
    }

    pub fn delivered(&self) -> u64 {
        self.delivered.load(Ordering::Acquire)
    }

    pub fn total(&self) -> u64 {
        self.total
    }

    pub fn is_finished(&self) -> bool {
        self.handle.as_ref().map_or(true, |h| h.is_finished())
    }

    /// Stops delivery and waits for any in-flight callback before handing
    /// the handler back.
    pub fn detach(mut self) -> Result<H> {
        self.stop.store(true, Ordering::Release);
        self.join()
    }

    /// Lets the tap run to the end of the audio, then returns the handler.
    pub fn wait(mut self) -> Result<H> {
        self.join()
    }

    fn join(&mut self) -> Result<H> {
        let handle = self
            .handle
            .take()
            .ok_or_else(|| anyhow!("tap already detached"))?;
        let handler = handle.join().map_err(|_| anyhow!("tap thread panicked"))?;
        log::debug!("Tap detached after {} buffers", self.delivered());
        Ok(handler)
    }
}

impl<H: TapHandler> Drop for TapSession<H> {
    fn drop(&mut self) {
        if let Some(handle) = self.handle.take() {
            self.stop.store(true, Ordering::Release);
            if handle.join().is_err() {
                log::error!("tap thread panicked during teardown");
            }
        }
    }
}
