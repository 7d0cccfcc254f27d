//! Capture strategies: what a session does with each clock outcome.
//!
//! A strategy never sees timestamps directly except to forward them to a stream encoder; frame
//! pacing is the [`FrameClock`](crate::clock::FrameClock)'s job.

pub mod buffer;
pub mod sequence;
pub mod streaming;

use async_trait::async_trait;

use crate::clock::FrameAdvance;
use crate::foundation::core::Tick;
use crate::foundation::error::CaptureResult;
use crate::render::step::Stage;

pub use buffer::{FrameBuffer, FrameSequence};
pub use sequence::SequenceCapture;
pub use streaming::StreamingCapture;

/// A finished stream: one blob typed by the negotiated mime type.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StreamArtifact {
    pub mime_type: String,
    pub data: Vec<u8>,
}

/// What a successful session resolves with.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum CaptureArtifact {
    Stream(StreamArtifact),
    Sequence(FrameSequence),
}

impl CaptureArtifact {
    pub fn as_stream(&self) -> Option<&StreamArtifact> {
        match self {
            Self::Stream(s) => Some(s),
            Self::Sequence(_) => None,
        }
    }

    pub fn as_sequence(&self) -> Option<&FrameSequence> {
        match self {
            Self::Sequence(s) => Some(s),
            Self::Stream(_) => None,
        }
    }
}

/// Shared interface of the streaming and sequence strategies.
///
/// The session calls `on_tick` once per clock outcome, races `progress` against the next
/// scheduler tick, and calls `finalize` exactly once after [`FrameAdvance::Elapsed`].
#[async_trait]
pub trait CaptureStrategy: Send {
    fn on_tick(&mut self, tick: Tick, advance: FrameAdvance, stage: &mut Stage)
    -> CaptureResult<()>;

    /// Wait for and absorb one asynchronous completion from the encoder.
    ///
    /// Must be cancel safe. Never resolves when nothing is outstanding.
    async fn progress(&mut self) -> CaptureResult<()>;

    /// Wait for outstanding encoder work and produce the artifact.
    async fn finalize(&mut self) -> CaptureResult<CaptureArtifact>;
}
