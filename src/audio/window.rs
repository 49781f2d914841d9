use std::time::Duration;

use thiserror::Error;

/// Length of one tap buffer, and of the forward transform run over it.
pub const WINDOW_SIZE: usize = 1024;

/// Highest usable bin count for a real-input transform of `WINDOW_SIZE` points.
pub const MAX_BINS: usize = WINDOW_SIZE / 2;

#[derive(Debug, Error, PartialEq)]
pub enum WindowError {
    #[error("tap buffer carried no channel data")]
    NoChannels,
    #[error("tap buffer has {got} samples, expected {expected}")]
    WrongLength { expected: usize, got: usize },
}

/// One tap delivery: a borrowed view of mono samples plus the tap timestamp.
#[derive(Clone, Copy, Debug)]
pub struct SampleWindow<'a> {
    samples: &'a [f32],
    timestamp: Duration,
}

impl<'a> SampleWindow<'a> {
    pub fn new(samples: &'a [f32], timestamp: Duration) -> Result<Self, WindowError> {
        if samples.len() != WINDOW_SIZE {
            return Err(WindowError::WrongLength {
                expected: WINDOW_SIZE,
                got: samples.len(),
            });
        }
        Ok(Self { samples, timestamp })
    }

    /// Only the first channel is analyzed.
    pub fn from_channels<C: AsRef<[f32]>>(
        channels: &'a [C],
        timestamp: Duration,
    ) -> Result<Self, WindowError> {
        let first = channels.first().ok_or(WindowError::NoChannels)?;
        Self::new(first.as_ref(), timestamp)
    }

    pub fn samples(&self) -> &'a [f32] {
        self.samples
    }

    pub fn timestamp(&self) -> Duration {
        self.timestamp
    }
}
