use std::sync::Arc;
use std::time::{Duration, Instant};

use crossbeam::channel::{bounded, Receiver, RecvTimeoutError, Sender, TrySendError};
use crossbeam::queue::ArrayQueue;

/// Minimum gap between deliveries on the UI-facing loudness stream.
pub const DEFAULT_THROTTLE: Duration = Duration::from_millis(150);
pub const DEFAULT_CHANNEL_CAPACITY: usize = 64;

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct LoudnessEvent {
    pub value: f32,
    pub timestamp: Duration,
}

#[derive(Clone, Debug)]
pub struct SpectrumEvent {
    pub frame: Arc<[f32]>,
    pub timestamp: Duration,
}

/// Fans a stream of events out to every live subscriber.
///
/// Sends never block: a subscriber whose queue is full misses that event,
/// a subscriber that hung up is dropped from the list.
struct Fanout<T> {
    name: &'static str,
    senders: Vec<Sender<T>>,
    capacity: usize,
    dropped: u64,
}

impl<T: Clone> Fanout<T> {
    fn new(name: &'static str, capacity: usize) -> Self {
        Self {
            name,
            senders: Vec::new(),
            capacity,
            dropped: 0,
        }
    }

    fn subscribe(&mut self) -> Receiver<T> {
        let (tx, rx) = bounded(self.capacity);
        self.senders.push(tx);
        rx
    }

    fn emit(&mut self, event: T) {
        let name = self.name;
        let dropped = &mut self.dropped;
        self.senders.retain(|tx| match tx.try_send(event.clone()) {
            Ok(()) => true,
            Err(TrySendError::Full(_)) => {
                *dropped += 1;
                log::debug!("{} subscriber is behind, event dropped", name);
                true
            }
            Err(TrySendError::Disconnected(_)) => {
                log::debug!("{} subscriber disconnected", name);
                false
            }
        });
    }
}

/// Producer half of a throttled subscription: a one-slot queue that always
/// holds the newest value, plus a wake-up for a blocked reader.
struct LatestSlot {
    latest: Arc<ArrayQueue<LoudnessEvent>>,
    wake: Sender<()>,
}

impl LatestSlot {
    /// Returns false once the reader is gone.
    fn store(&self, event: LoudnessEvent) -> bool {
        self.latest.force_push(event);
        !matches!(self.wake.try_send(()), Err(TrySendError::Disconnected(_)))
    }
}

/// Observable channels for the analysis output.
pub struct FeaturePublisher {
    loudness: Fanout<LoudnessEvent>,
    spectrum: Fanout<SpectrumEvent>,
    throttled: Vec<LatestSlot>,
    throttle_interval: Duration,
}

impl FeaturePublisher {
    pub fn new(channel_capacity: usize, throttle_interval: Duration) -> Self {
        let capacity = channel_capacity.max(1);
        Self {
            loudness: Fanout::new("loudness", capacity),
            spectrum: Fanout::new("spectrum", capacity),
            throttled: Vec::new(),
            throttle_interval,
        }
    }

    pub fn subscribe_loudness(&mut self) -> Receiver<LoudnessEvent> {
        self.loudness.subscribe()
    }

    pub fn subscribe_spectrum(&mut self) -> Receiver<SpectrumEvent> {
        self.spectrum.subscribe()
    }

    /// Loudness at no more than one value per throttle interval.
    /// The throttling happens on whichever thread reads from the result;
    /// values the reader has not picked up yet are overwritten, never queued.
    pub fn subscribe_throttled_loudness(&mut self) -> ThrottledLoudness {
        let latest = Arc::new(ArrayQueue::new(1));
        let (wake, woken) = bounded(1);
        self.throttled.push(LatestSlot {
            latest: Arc::clone(&latest),
            wake,
        });
        ThrottledLoudness::new(latest, woken, self.throttle_interval)
    }

    pub fn publish_loudness(&mut self, value: f32, timestamp: Duration) {
        let event = LoudnessEvent { value, timestamp };
        self.loudness.emit(event);
        self.throttled.retain(|slot| {
            let alive = slot.store(event);
            if !alive {
                log::debug!("throttled loudness subscriber disconnected");
            }
            alive
        });
    }

    pub fn publish_spectrum(&mut self, frame: Arc<[f32]>, timestamp: Duration) {
        self.spectrum.emit(SpectrumEvent { frame, timestamp });
    }

    pub fn subscriber_count(&self) -> usize {
        self.loudness.senders.len() + self.spectrum.senders.len() + self.throttled.len()
    }

    pub fn dropped_events(&self) -> u64 {
        self.loudness.dropped + self.spectrum.dropped
    }
}

impl Default for FeaturePublisher {
    fn default() -> Self {
        Self::new(DEFAULT_CHANNEL_CAPACITY, DEFAULT_THROTTLE)
    }
}

/// Latest-value-wins rate limiter driven by caller-supplied instants.
///
/// The first value goes through immediately. Values arriving inside the
/// interval replace each other; the survivor is released once the interval
/// has elapsed, either by the next `push` or by `poll`.
#[derive(Debug)]
pub struct Throttle {
    interval: Duration,
    last_emit: Option<Instant>,
    pending: Option<f32>,
}

impl Throttle {
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            last_emit: None,
            pending: None,
        }
    }

    fn ready(&self, now: Instant) -> bool {
        match self.last_emit {
            None => true,
            Some(last) => now.saturating_duration_since(last) >= self.interval,
        }
    }

    pub fn push(&mut self, value: f32, now: Instant) -> Option<f32> {
        if self.ready(now) {
            self.pending = None;
            self.last_emit = Some(now);
            Some(value)
        } else {
            self.pending = Some(value);
            None
        }
    }

    pub fn poll(&mut self, now: Instant) -> Option<f32> {
        if self.pending.is_some() && self.ready(now) {
            self.last_emit = Some(now);
            self.pending.take()
        } else {
            None
        }
    }

    /// When the pending value, if any, may be released.
    pub fn deadline(&self) -> Option<Instant> {
        self.pending?;
        self.last_emit.map(|last| last + self.interval)
    }
}

/// Consumer end of the throttled loudness stream.
pub struct ThrottledLoudness {
    latest: Arc<ArrayQueue<LoudnessEvent>>,
    woken: Receiver<()>,
    throttle: Throttle,
}

impl ThrottledLoudness {
    fn new(latest: Arc<ArrayQueue<LoudnessEvent>>, woken: Receiver<()>, interval: Duration) -> Self {
        Self {
            latest,
            woken,
            throttle: Throttle::new(interval),
        }
    }

    /// Feeds the newest published value, if any, through the throttle.
    fn take_latest(&mut self, now: Instant) -> Option<f32> {
        let event = self.latest.pop()?;
        self.throttle.push(event.value, now)
    }

    /// Returns a value if one is due, without blocking.
    pub fn try_next(&mut self) -> Option<f32> {
        while self.woken.try_recv().is_ok() {}
        let now = Instant::now();
        self.take_latest(now).or_else(|| self.throttle.poll(now))
    }

    /// Blocks until the next throttled value. Returns `None` once the
    /// producer is gone and nothing is left to deliver.
    pub fn next(&mut self) -> Option<f32> {
        loop {
            let woke = match self.throttle.deadline() {
                Some(deadline) => {
                    let wait = deadline.saturating_duration_since(Instant::now());
                    self.woken.recv_timeout(wait)
                }
                None => self.woken.recv().map_err(|_| RecvTimeoutError::Disconnected),
            };

            match woke {
                Ok(()) => {
                    if let Some(v) = self.take_latest(Instant::now()) {
                        return Some(v);
                    }
                }
                Err(RecvTimeoutError::Timeout) => {
                    if let Some(v) = self.throttle.poll(Instant::now()) {
                        return Some(v);
                    }
                }
                Err(RecvTimeoutError::Disconnected) => {
                    // flush the last value regardless of the interval
                    if let Some(event) = self.latest.pop() {
                        self.throttle.pending = Some(event.value);
                    }
                    return self.throttle.pending.take();
                }
            }
        }
    }
}
