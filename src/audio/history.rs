use std::collections::VecDeque;
use std::sync::Arc;

use thiserror::Error;

#[derive(Debug, Error, PartialEq)]
pub enum HistoryError {
    #[error("frame has {got} bins but history holds {expected}-bin frames; reset first")]
    BinCountMismatch { expected: usize, got: usize },
    #[error("empty frames cannot be stored")]
    EmptyFrame,
}

/// Bounded FIFO of the most recent spectral frames, oldest first.
///
/// The bin count is fixed by the first frame appended after construction or
/// `reset()`; frames of any other length are refused.
#[derive(Debug)]
pub struct HistoryRing {
    frames: VecDeque<Arc<[f32]>>,
    capacity: usize,
    bins: Option<usize>,
}

impl HistoryRing {
    /// A zero capacity is raised to one; `AnalysisConfig::validate`
    /// rejects it before it gets here.
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            frames: VecDeque::with_capacity(capacity),
            capacity,
            bins: None,
        }
    }

    pub fn append(&mut self, frame: Arc<[f32]>) -> Result<(), HistoryError> {
        if frame.is_empty() {
            return Err(HistoryError::EmptyFrame);
        }
        if let Some(expected) = self.bins {
            if frame.len() != expected {
                return Err(HistoryError::BinCountMismatch {
                    expected,
                    got: frame.len(),
                });
            }
        }

        while self.frames.len() >= self.capacity {
            self.frames.pop_front();
        }
        self.bins = Some(frame.len());
        self.frames.push_back(frame);
        Ok(())
    }

    pub fn snapshot(&self) -> Vec<Arc<[f32]>> {
        self.frames.iter().cloned().collect()
    }

    pub fn reset(&mut self) {
        self.frames.clear();
        self.bins = None;
    }

    /// Frames laid out row-major, oldest first: `len() * bins()` values.
    pub fn flatten(&self) -> Vec<f32> {
        let mut out = Vec::with_capacity(self.frames.len() * self.bins.unwrap_or(0));
        for frame in &self.frames {
            out.extend_from_slice(frame);
        }
        out
    }

    pub fn max_magnitude(&self) -> f32 {
        self.frames
            .iter()
            .flat_map(|f| f.iter().copied())
            .fold(0.0f32, f32::max)
    }

    pub fn len(&self) -> usize {
        self.frames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn bins(&self) -> Option<usize> {
        self.bins
    }
}
