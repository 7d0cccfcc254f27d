use tokio::sync::mpsc;

use crate::encode::format::MimeType;
use crate::foundation::core::{Canvas, Timestamp};
use crate::foundation::error::CaptureResult;
use crate::render::surface::Surface;

/// Configuration handed to a [`StreamEncoder`] when capture begins.
#[derive(Clone, Debug)]
pub struct StreamConfig {
    pub canvas: Canvas,
    pub frame_rate: u32,
    pub mime: MimeType,
}

/// Asynchronous notifications from a running stream encoder, delivered in order.
#[derive(Debug)]
pub enum EncoderEvent {
    /// A piece of the encoded container. May be empty.
    Chunk(Vec<u8>),
    /// The encoder finished after `stop`; no further events follow.
    Stopped,
    /// The encoder failed; no further events follow.
    Error(String),
}

/// Continuous encoder capability.
///
/// Contract:
/// - `begin` is called exactly once and ties the encoder's clock origin to that moment.
/// - `present` hands over the live surface; the encoder samples it at its own cadence.
/// - `stop` asks the encoder to flush. Completion is signalled by `EncoderEvent::Stopped` on the
///   receiver returned from `begin`.
pub trait StreamEncoder: Send {
    fn is_type_supported(&self, mime: &str) -> bool;

    fn begin(&mut self, cfg: &StreamConfig) -> CaptureResult<mpsc::UnboundedReceiver<EncoderEvent>>;

    fn present(&mut self, surface: &Surface, at: Timestamp) -> CaptureResult<()>;

    fn stop(&mut self) -> CaptureResult<()>;
}

/// Decides which sampling slots a `present` call fills, at a fixed rate from the first
/// presented timestamp.
///
/// Slots skipped between two presents are filled with the most recent surface so the encoded
/// timeline keeps a constant frame rate.
#[derive(Clone, Debug)]
pub struct SampleCadence {
    frame_rate: u32,
    origin: Option<Timestamp>,
    next_slot: u64,
    max_burst: u64,
}

impl SampleCadence {
    pub fn new(frame_rate: u32) -> Self {
        Self {
            frame_rate: frame_rate.max(1),
            origin: None,
            next_slot: 0,
            max_burst: u64::from(frame_rate.max(1)) * 2,
        }
    }

    /// Number of samples to emit for a present at `at`.
    pub fn samples_due(&mut self, at: Timestamp) -> u64 {
        let origin = *self.origin.get_or_insert(at);
        let elapsed = at.since(origin).max(0.0);
        let slot = (elapsed / 1000.0 * f64::from(self.frame_rate)).floor() as u64;
        if slot < self.next_slot {
            return 0;
        }
        let due = slot - self.next_slot + 1;
        self.next_slot = slot + 1;
        due.min(self.max_burst)
    }
}
