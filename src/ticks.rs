//! Host scheduler primitives: the "next animation tick" a session waits on.

use std::collections::VecDeque;
use std::time::Duration;

use async_trait::async_trait;
use tokio::time::{Instant, Interval, MissedTickBehavior};

use crate::foundation::core::Timestamp;
use crate::foundation::error::{CaptureError, CaptureResult};

pub const DEFAULT_REFRESH_HZ: u32 = 60;

/// Delivers monotonically increasing timestamps at the host's display cadence.
///
/// `next_tick` must be cancel safe: the session races it against encoder completions and drops
/// the losing future.
#[async_trait]
pub trait TickSource: Send {
    async fn next_tick(&mut self) -> CaptureResult<Timestamp>;
}

/// Real-time ticks at a fixed refresh rate, timestamped from the moment the source was created.
pub struct IntervalTicks {
    interval: Interval,
    epoch: Instant,
}

impl IntervalTicks {
    pub fn new(refresh_hz: u32) -> CaptureResult<Self> {
        if refresh_hz == 0 {
            return Err(CaptureError::scheduler("refresh rate must be non-zero"));
        }
        let period = Duration::from_secs_f64(1.0 / f64::from(refresh_hz));
        let mut interval = tokio::time::interval(period);
        // A slow frame skips host ticks instead of bursting to catch up.
        interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
        Ok(Self {
            interval,
            epoch: Instant::now(),
        })
    }
}

#[async_trait]
impl TickSource for IntervalTicks {
    async fn next_tick(&mut self) -> CaptureResult<Timestamp> {
        let at = self.interval.tick().await;
        let ms = at.saturating_duration_since(self.epoch).as_secs_f64() * 1000.0;
        Ok(Timestamp(ms))
    }
}

/// Synthetic ticks a fixed step apart, delivered without waiting. Renders offline faster than
/// real time while producing the same frame timeline.
pub struct SimulatedTicks {
    next: f64,
    step_ms: f64,
}

impl SimulatedTicks {
    pub fn new(refresh_hz: u32) -> CaptureResult<Self> {
        if refresh_hz == 0 {
            return Err(CaptureError::scheduler("refresh rate must be non-zero"));
        }
        Ok(Self {
            next: 0.0,
            step_ms: 1000.0 / f64::from(refresh_hz),
        })
    }
}

#[async_trait]
impl TickSource for SimulatedTicks {
    async fn next_tick(&mut self) -> CaptureResult<Timestamp> {
        // Stay cooperative: let encoder completions make progress between ticks.
        tokio::task::yield_now().await;
        let ts = Timestamp(self.next);
        self.next += self.step_ms;
        Ok(ts)
    }
}

/// A fixed list of timestamps; fails once exhausted.
#[derive(Clone, Debug, Default)]
pub struct ScriptedTicks {
    queue: VecDeque<Timestamp>,
}

impl ScriptedTicks {
    pub fn new(timestamps: impl IntoIterator<Item = f64>) -> Self {
        Self {
            queue: timestamps.into_iter().map(Timestamp).collect(),
        }
    }

    /// `count` ticks `step_ms` apart starting at `start_ms`.
    pub fn uniform(start_ms: f64, step_ms: f64, count: usize) -> Self {
        Self::new((0..count).map(|i| start_ms + (i as f64) * step_ms))
    }

    pub fn remaining(&self) -> usize {
        self.queue.len()
    }
}

#[async_trait]
impl TickSource for ScriptedTicks {
    async fn next_tick(&mut self) -> CaptureResult<Timestamp> {
        tokio::task::yield_now().await;
        self.queue
            .pop_front()
            .ok_or_else(|| CaptureError::scheduler("tick source exhausted"))
    }
}
