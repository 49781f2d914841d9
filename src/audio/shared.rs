use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use triple_buffer::TripleBuffer;

use super::history::HistoryRing;

/// Flattened spectral history as the renderer consumes it.
#[derive(Clone, Debug)]
pub struct SpectralSnapshot {
    pub frames: usize,
    pub bins: usize,
    /// `frames * bins` values, row-major, oldest frame first.
    pub data: Arc<[f32]>,
    pub max_magnitude: f32,
    /// Bumped on every publish so readers can skip unchanged data.
    pub sequence: u64,
}

impl Default for SpectralSnapshot {
    fn default() -> Self {
        Self {
            frames: 0,
            bins: 0,
            data: Arc::from(Vec::new()),
            max_magnitude: 0.0,
            sequence: 0,
        }
    }
}

impl SpectralSnapshot {
    pub fn from_history(history: &HistoryRing, sequence: u64) -> Self {
        Self {
            frames: history.len(),
            bins: history.bins().unwrap_or(0),
            data: history.flatten().into(),
            max_magnitude: history.max_magnitude(),
            sequence,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.frames == 0
    }

    pub fn as_bytes(&self) -> &[u8] {
        bytemuck::cast_slice(&self.data)
    }
}

/// Latest analysis output, read by the renderer on its own clock.
///
/// The audio thread never waits on it: loudness is a plain atomic store and
/// spectral snapshots go through a triple buffer whose write half is held by
/// the analyzer (`SnapshotWriter`). The mutex here only serializes readers.
pub struct SharedFeatures {
    loudness: AtomicU32,
    spectral: Mutex<triple_buffer::Output<SpectralSnapshot>>,
}

/// Write half of the spectral hand-off. Every `publish` lands, whatever the
/// readers are doing.
pub struct SnapshotWriter {
    input: triple_buffer::Input<SpectralSnapshot>,
}

impl SnapshotWriter {
    pub fn publish(&mut self, snapshot: SpectralSnapshot) {
        self.input.write(snapshot);
    }
}

impl SharedFeatures {
    pub fn new() -> (Arc<Self>, SnapshotWriter) {
        let (input, output) = TripleBuffer::new(&SpectralSnapshot::default()).split();
        let shared = Arc::new(Self {
            loudness: AtomicU32::new(0),
            spectral: Mutex::new(output),
        });
        (shared, SnapshotWriter { input })
    }

    pub fn store_loudness(&self, value: f32) {
        self.loudness.store(value.to_bits(), Ordering::Release);
    }

    pub fn loudness(&self) -> f32 {
        f32::from_bits(self.loudness.load(Ordering::Acquire))
    }

    /// Loudness as the four native-endian bytes a GPU buffer expects.
    pub fn loudness_bytes(&self) -> [u8; 4] {
        self.loudness().to_ne_bytes()
    }

    /// Runs `f` against the newest snapshot without copying it out.
    pub fn with_spectral<R>(&self, f: impl FnOnce(&SpectralSnapshot) -> R) -> R {
        // a reader that panicked leaves the buffer itself intact
        let mut output = self.spectral.lock().unwrap_or_else(PoisonError::into_inner);
        f(output.read())
    }

    /// Cheap copy of the current snapshot; the data itself is shared.
    pub fn spectral(&self) -> SpectralSnapshot {
        self.with_spectral(SpectralSnapshot::clone)
    }
}

impl std::fmt::Debug for SharedFeatures {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SharedFeatures")
            .field("loudness", &self.loudness())
            .finish_non_exhaustive()
    }
}
