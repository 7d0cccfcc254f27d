use crate::capture::{CaptureArtifact, CaptureStrategy};
use crate::clock::{FrameAdvance, FrameClock};
use crate::foundation::core::Tick;
use crate::foundation::error::CaptureResult;
use crate::render::step::Stage;
use crate::session::SessionState;
use crate::session::manager::SessionGuard;
use crate::ticks::TickSource;

/// A started session, ready to run its scheduling loop.
///
/// Owns the backing surface, the capabilities and the session slot. Everything is released
/// when the recording is dropped, whether `run` finished, failed or was never called.
pub struct Recording {
    // Field order is drop order: encoders and surface go before the slot is released.
    strategy: Box<dyn CaptureStrategy>,
    stage: Stage,
    ticks: Box<dyn TickSource>,
    clock: FrameClock,
    guard: SessionGuard,
}

impl Recording {
    pub(crate) fn new(
        guard: SessionGuard,
        clock: FrameClock,
        strategy: Box<dyn CaptureStrategy>,
        stage: Stage,
        ticks: Box<dyn TickSource>,
    ) -> Self {
        Self {
            strategy,
            stage,
            ticks,
            clock,
            guard,
        }
    }

    pub fn id(&self) -> u64 {
        self.guard.id()
    }

    pub fn frame_count(&self) -> u64 {
        self.clock.frame_count()
    }

    /// Drive the session to completion and resolve with its artifact.
    #[tracing::instrument(skip(self), fields(session = self.guard.id()))]
    pub async fn run(mut self) -> CaptureResult<CaptureArtifact> {
        let result = self.drive().await;
        match &result {
            Ok(artifact) => match artifact {
                CaptureArtifact::Stream(stream) => {
                    tracing::info!(
                        bytes = stream.data.len(),
                        mime = %stream.mime_type,
                        "recording finished"
                    );
                }
                CaptureArtifact::Sequence(seq) => {
                    tracing::info!(
                        frames = seq.len(),
                        dropped = seq.dropped_frame_count,
                        "recording finished"
                    );
                }
            },
            Err(err) => {
                self.guard.set_state(SessionState::Failed);
                tracing::warn!(error = %err, "recording failed");
            }
        }
        result
    }

    async fn drive(&mut self) -> CaptureResult<CaptureArtifact> {
        let kickoff = self.clock.advance(Tick::Kickoff);
        tracing::debug!("kickoff");
        self.strategy.on_tick(Tick::Kickoff, kickoff, &mut self.stage)?;

        loop {
            let at = tokio::select! {
                biased;
                done = self.strategy.progress() => {
                    done?;
                    continue;
                }
                at = self.ticks.next_tick() => at?,
            };

            let tick = Tick::At(at);
            let advance = self.clock.advance(tick);
            if let FrameAdvance::NewFrame(index) = advance {
                tracing::trace!(frame = index.0, at_ms = at.as_millis(), "new frame");
            }
            self.strategy.on_tick(tick, advance, &mut self.stage)?;
            if advance == FrameAdvance::Elapsed {
                break;
            }
        }

        self.guard.set_state(SessionState::Finalizing);
        tracing::debug!("capture window elapsed; finalizing");
        self.strategy.finalize().await
    }
}

impl std::fmt::Debug for Recording {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Recording")
            .field("id", &self.guard.id())
            .field("clock", &self.clock)
            .finish_non_exhaustive()
    }
}
