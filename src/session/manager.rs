use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::Mutex;

use crate::capture::{CaptureArtifact, CaptureStrategy, SequenceCapture, StreamingCapture};
use crate::clock::FrameClock;
use crate::encode::stream::StreamConfig;
use crate::foundation::error::{CaptureError, CaptureResult};
use crate::options::{CaptureOptions, OutputKind};
use crate::render::source::SourceBitmap;
use crate::render::step::Stage;
use crate::render::surface::Surface;
use crate::session::recording::Recording;
use crate::session::{Capabilities, SessionConfig, SessionState};

#[derive(Clone, Copy, Debug)]
struct ActiveSlot {
    id: u64,
    state: SessionState,
}

#[derive(Debug)]
struct Shared {
    slot: Mutex<Option<ActiveSlot>>,
    next_id: AtomicU64,
    config: SessionConfig,
}

/// Owner of the "a session is recording" flag. Cloning shares the flag.
///
/// At most one session exists at a time: `start` while another session is live fails with
/// [`CaptureError::AlreadyRecording`] and leaves the running session untouched.
#[derive(Clone, Debug)]
pub struct SessionManager {
    shared: Arc<Shared>,
}

impl Default for SessionManager {
    fn default() -> Self {
        Self::new()
    }
}

impl SessionManager {
    pub fn new() -> Self {
        Self::with_config(SessionConfig::default())
    }

    pub fn with_config(config: SessionConfig) -> Self {
        Self {
            shared: Arc::new(Shared {
                slot: Mutex::new(None),
                next_id: AtomicU64::new(1),
                config,
            }),
        }
    }

    pub fn config(&self) -> &SessionConfig {
        &self.shared.config
    }

    pub fn state(&self) -> SessionState {
        self.shared
            .slot
            .lock()
            .map_or(SessionState::Idle, |slot| slot.state)
    }

    pub fn is_recording(&self) -> bool {
        self.shared.slot.lock().is_some()
    }

    /// Claim the session slot and prepare everything the scheduling loop needs.
    ///
    /// Nothing runs until [`Recording::run`] is awaited. Any failure after the slot is claimed
    /// releases it again.
    pub fn start(&self, options: CaptureOptions, caps: Capabilities) -> CaptureResult<Recording> {
        let guard = self.acquire()?;
        options.validate()?;

        let Capabilities {
            ticks,
            stream_encoder,
            still_encoder,
        } = caps;

        let strategy: Box<dyn CaptureStrategy> = match &options.output {
            OutputKind::Stream { mime } => {
                let encoder = stream_encoder.ok_or_else(|| {
                    CaptureError::unsupported_format(format!("{mime} (no stream encoder)"))
                })?;
                let config = StreamConfig {
                    canvas: options.canvas(),
                    frame_rate: options.frame_rate,
                    mime: mime.clone(),
                };
                Box::new(StreamingCapture::new(encoder, config)?)
            }
            OutputKind::Sequence => Box::new(SequenceCapture::new(
                still_encoder,
                self.shared.config.finalize_grace,
            )),
        };

        let bitmap = SourceBitmap::rasterize(&options.source, options.width, options.height)?;
        let surface = Surface::new(options.canvas())?;
        let stage = Stage::new(surface, bitmap, options.background);
        let clock = FrameClock::new(options.duration_ms, options.frame_rate);

        tracing::info!(
            session = guard.id(),
            source = options.source.name(),
            width = options.width,
            height = options.height,
            duration_ms = options.duration_ms,
            frame_rate = options.frame_rate,
            frames = clock.frame_count(),
            "recording started"
        );

        Ok(Recording::new(guard, clock, strategy, stage, ticks))
    }

    /// `start` followed by `run`.
    pub async fn record(
        &self,
        options: CaptureOptions,
        caps: Capabilities,
    ) -> CaptureResult<CaptureArtifact> {
        self.start(options, caps)?.run().await
    }

    fn acquire(&self) -> CaptureResult<SessionGuard> {
        let mut slot = self.shared.slot.lock();
        if slot.is_some() {
            return Err(CaptureError::AlreadyRecording);
        }
        let id = self.shared.next_id.fetch_add(1, Ordering::Relaxed);
        *slot = Some(ActiveSlot {
            id,
            state: SessionState::Recording,
        });
        Ok(SessionGuard {
            shared: self.shared.clone(),
            id,
        })
    }
}

/// Scoped claim on the session slot; dropping it returns the manager to idle.
#[derive(Debug)]
pub(crate) struct SessionGuard {
    shared: Arc<Shared>,
    id: u64,
}

impl SessionGuard {
    pub(crate) fn id(&self) -> u64 {
        self.id
    }

    pub(crate) fn set_state(&self, state: SessionState) {
        let mut slot = self.shared.slot.lock();
        match slot.as_mut() {
            Some(active) if active.id == self.id => active.state = state,
            _ => tracing::error!(
                session = self.id,
                %state,
                "state change on a slot this session does not own"
            ),
        }
    }
}

impl Drop for SessionGuard {
    fn drop(&mut self) {
        let mut slot = self.shared.slot.lock();
        match slot.take() {
            Some(active) if active.id == self.id => {
                tracing::debug!(session = self.id, "session slot released");
            }
            other => {
                // Double clear or a foreign owner: restore and report.
                *slot = other;
                tracing::error!(session = self.id, "session slot was not held by this session");
                debug_assert!(
                    std::thread::panicking(),
                    "session slot released by a session that does not own it"
                );
            }
        }
    }
}
