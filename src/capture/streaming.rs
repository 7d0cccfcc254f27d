use async_trait::async_trait;
use tokio::sync::mpsc;

use crate::capture::{CaptureArtifact, CaptureStrategy, StreamArtifact};
use crate::clock::FrameAdvance;
use crate::encode::stream::{EncoderEvent, StreamConfig, StreamEncoder};
use crate::foundation::core::Tick;
use crate::foundation::error::{CaptureError, CaptureResult};
use crate::render::step::Stage;

/// Continuous capture: the encoder samples the live surface at its own cadence.
///
/// Rendering happens on every tick once started, independent of frame buckets. Chunks are kept
/// in arrival order and joined only after the encoder confirms it stopped.
pub struct StreamingCapture {
    encoder: Box<dyn StreamEncoder>,
    config: StreamConfig,
    events: Option<mpsc::UnboundedReceiver<EncoderEvent>>,
    chunks: Vec<Vec<u8>>,
    stop_requested: bool,
    stopped: bool,
}

impl StreamingCapture {
    pub fn new(encoder: Box<dyn StreamEncoder>, config: StreamConfig) -> CaptureResult<Self> {
        if !encoder.is_type_supported(config.mime.as_str()) {
            return Err(CaptureError::unsupported_format(config.mime.to_string()));
        }
        Ok(Self {
            encoder,
            config,
            events: None,
            chunks: Vec::new(),
            stop_requested: false,
            stopped: false,
        })
    }

    pub fn is_started(&self) -> bool {
        self.events.is_some()
    }

    /// Bytes received so far, before concatenation.
    pub fn buffered_len(&self) -> usize {
        self.chunks.iter().map(Vec::len).sum()
    }

    fn begin(&mut self) -> CaptureResult<()> {
        if self.events.is_some() {
            return Err(CaptureError::encoding("stream encoder started twice"));
        }
        tracing::debug!(mime = %self.config.mime, "starting stream encoder");
        self.events = Some(self.encoder.begin(&self.config)?);
        Ok(())
    }

    fn request_stop(&mut self) -> CaptureResult<()> {
        if self.stop_requested || self.events.is_none() {
            return Ok(());
        }
        self.stop_requested = true;
        tracing::debug!("stopping stream encoder");
        self.encoder.stop()
    }

    fn absorb(&mut self, event: Option<EncoderEvent>) -> CaptureResult<()> {
        match event {
            Some(EncoderEvent::Chunk(data)) => {
                if !data.is_empty() {
                    self.chunks.push(data);
                }
                Ok(())
            }
            Some(EncoderEvent::Stopped) if self.stop_requested => {
                self.stopped = true;
                Ok(())
            }
            Some(EncoderEvent::Stopped) => {
                Err(CaptureError::encoding("stream encoder stopped unexpectedly"))
            }
            Some(EncoderEvent::Error(msg)) => Err(CaptureError::EncodingFailed(msg)),
            None => Err(CaptureError::encoding(
                "stream encoder closed without completing",
            )),
        }
    }
}

#[async_trait]
impl CaptureStrategy for StreamingCapture {
    fn on_tick(
        &mut self,
        tick: Tick,
        advance: FrameAdvance,
        stage: &mut Stage,
    ) -> CaptureResult<()> {
        match advance {
            FrameAdvance::NotStarted => self.begin(),
            FrameAdvance::NewFrame(_) | FrameAdvance::SameFrame => {
                stage.render()?;
                match tick.timestamp() {
                    Some(at) => self.encoder.present(stage.surface(), at),
                    None => Ok(()),
                }
            }
            FrameAdvance::Elapsed => self.request_stop(),
        }
    }

    async fn progress(&mut self) -> CaptureResult<()> {
        if self.stopped {
            return std::future::pending().await;
        }
        let event = match self.events.as_mut() {
            Some(events) => events.recv().await,
            None => return std::future::pending().await,
        };
        self.absorb(event)
    }

    async fn finalize(&mut self) -> CaptureResult<CaptureArtifact> {
        if self.events.is_none() {
            return Err(CaptureError::encoding("stream encoder was never started"));
        }
        self.request_stop()?;
        while !self.stopped {
            let event = match self.events.as_mut() {
                Some(events) => events.recv().await,
                None => None,
            };
            self.absorb(event)?;
        }
        self.events = None;

        let data = std::mem::take(&mut self.chunks).concat();
        tracing::debug!(bytes = data.len(), "stream encoder finished");
        Ok(CaptureArtifact::Stream(StreamArtifact {
            mime_type: self.config.mime.to_string(),
            data,
        }))
    }
}
