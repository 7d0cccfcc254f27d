use crate::foundation::core::{FrameIndex, Tick, Timestamp};

/// Outcome of feeding one scheduler tick to a [`FrameClock`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FrameAdvance {
    /// The kickoff call: no timestamp yet, nothing to render.
    NotStarted,
    /// A frame index not emitted before has been reached.
    NewFrame(FrameIndex),
    /// Still inside an already emitted frame bucket.
    SameFrame,
    /// The capture window is over.
    Elapsed,
}

/// Maps monotonically increasing scheduler timestamps onto fixed-rate frame indices.
///
/// Frame boundaries come from elapsed wall-clock time split into `1000 / frame_rate` ms buckets,
/// so jitter or skipped ticks never shift later frames; they only skip indices.
#[derive(Clone, Debug)]
pub struct FrameClock {
    duration_ms: f64,
    frame_rate: u32,
    frame_count: u64,
    origin: Option<Timestamp>,
    last_emitted: Option<u64>,
    elapsed: bool,
}

impl FrameClock {
    pub fn new(duration_ms: u32, frame_rate: u32) -> Self {
        // ceil(duration * rate / 1000) frames fit in the window.
        let frame_count = (u64::from(duration_ms) * u64::from(frame_rate)).div_ceil(1000);
        Self {
            duration_ms: f64::from(duration_ms),
            frame_rate,
            frame_count,
            origin: None,
            last_emitted: None,
            elapsed: false,
        }
    }

    /// Total number of indices this clock can emit.
    pub fn frame_count(&self) -> u64 {
        self.frame_count
    }

    pub fn origin(&self) -> Option<Timestamp> {
        self.origin
    }

    pub fn last_emitted(&self) -> Option<FrameIndex> {
        self.last_emitted.map(FrameIndex)
    }

    /// `floor(elapsed / 1000 * frame_rate)`, the exact bucketing contract.
    pub fn index_at(&self, elapsed_ms: f64) -> i64 {
        (elapsed_ms / 1000.0 * f64::from(self.frame_rate)).floor() as i64
    }

    pub fn advance(&mut self, tick: Tick) -> FrameAdvance {
        if self.elapsed {
            return FrameAdvance::Elapsed;
        }

        let ts = match (tick, self.origin) {
            (Tick::Kickoff, None) => return FrameAdvance::NotStarted,
            (Tick::Kickoff, Some(_)) => return FrameAdvance::SameFrame,
            (Tick::At(ts), None) => {
                // The origin tick never triggers the duration check.
                self.origin = Some(ts);
                return self.emit(0);
            }
            (Tick::At(ts), Some(_)) => ts,
        };

        let elapsed = self.elapsed_since_origin(ts);
        if elapsed > self.duration_ms {
            self.elapsed = true;
            return FrameAdvance::Elapsed;
        }

        let index = self.index_at(elapsed);
        if index < 0 {
            return FrameAdvance::SameFrame;
        }
        self.emit(index as u64)
    }

    fn elapsed_since_origin(&self, ts: Timestamp) -> f64 {
        self.origin.map(|o| ts.since(o)).unwrap_or(0.0)
    }

    fn emit(&mut self, index: u64) -> FrameAdvance {
        if index >= self.frame_count {
            return FrameAdvance::SameFrame;
        }
        match self.last_emitted {
            Some(last) if index <= last => FrameAdvance::SameFrame,
            _ => {
                self.last_emitted = Some(index);
                FrameAdvance::NewFrame(FrameIndex(index))
            }
        }
    }
}
