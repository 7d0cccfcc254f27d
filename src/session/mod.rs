//! Recording sessions: single-session guard, scheduling loop and finalization.

mod manager;
mod recording;

use std::sync::Arc;
use std::time::Duration;

use crate::encode::still::{PngEncoder, StillEncoder};
use crate::encode::stream::StreamEncoder;
use crate::ticks::TickSource;

pub use manager::SessionManager;
pub use recording::Recording;

pub const DEFAULT_FINALIZE_GRACE: Duration = Duration::from_millis(250);

/// Lifecycle of the process-wide session slot.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum SessionState {
    Idle,
    Recording,
    Finalizing,
    Failed,
}

impl SessionState {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Recording => "recording",
            Self::Finalizing => "finalizing",
            Self::Failed => "failed",
        }
    }
}

impl std::fmt::Display for SessionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SessionConfig {
    /// How long sequence finalization waits for in-flight still encodes.
    pub finalize_grace: Duration,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            finalize_grace: DEFAULT_FINALIZE_GRACE,
        }
    }
}

/// Host capabilities one session consumes. Moved into the session on `start`.
pub struct Capabilities {
    pub ticks: Box<dyn TickSource>,
    pub stream_encoder: Option<Box<dyn StreamEncoder>>,
    pub still_encoder: Arc<dyn StillEncoder>,
}

impl Capabilities {
    /// Tick source only; PNG still encoding, no stream encoder.
    pub fn new(ticks: impl TickSource + 'static) -> Self {
        Self {
            ticks: Box::new(ticks),
            stream_encoder: None,
            still_encoder: Arc::new(PngEncoder),
        }
    }

    pub fn with_stream_encoder(mut self, encoder: impl StreamEncoder + 'static) -> Self {
        self.stream_encoder = Some(Box::new(encoder));
        self
    }

    pub fn with_still_encoder(mut self, encoder: Arc<dyn StillEncoder>) -> Self {
        self.still_encoder = encoder;
        self
    }
}

impl std::fmt::Debug for Capabilities {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Capabilities")
            .field("stream_encoder", &self.stream_encoder.is_some())
            .field("still_encoder", &self.still_encoder.mime_type())
            .finish_non_exhaustive()
    }
}
