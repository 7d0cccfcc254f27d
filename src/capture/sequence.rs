use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use futures_util::future::BoxFuture;
use futures_util::stream::FuturesUnordered;
use futures_util::{FutureExt, StreamExt};

use crate::capture::buffer::FrameBuffer;
use crate::capture::{CaptureArtifact, CaptureStrategy};
use crate::clock::FrameAdvance;
use crate::encode::still::{EncodedImage, StillEncoder};
use crate::foundation::core::{FrameIndex, Tick};
use crate::foundation::error::{CaptureError, CaptureResult};
use crate::render::step::Stage;

type PendingEncode = BoxFuture<'static, (FrameIndex, CaptureResult<Option<EncodedImage>>)>;

/// Discrete capture: one render and one still encode per new frame index.
///
/// Encodes run concurrently and may finish in any order; results are written into the buffer
/// by index.
pub struct SequenceCapture {
    encoder: Arc<dyn StillEncoder>,
    buffer: FrameBuffer,
    pending: FuturesUnordered<PendingEncode>,
    finalize_grace: Duration,
}

impl SequenceCapture {
    pub fn new(encoder: Arc<dyn StillEncoder>, finalize_grace: Duration) -> Self {
        Self {
            encoder,
            buffer: FrameBuffer::new(),
            pending: FuturesUnordered::new(),
            finalize_grace,
        }
    }

    pub fn in_flight(&self) -> usize {
        self.pending.len()
    }

    pub fn buffer(&self) -> &FrameBuffer {
        &self.buffer
    }

    fn submit(&mut self, index: FrameIndex, stage: &mut Stage) -> CaptureResult<()> {
        stage.render()?;
        self.buffer.mark_reached(index);
        let encode = self.encoder.encode(stage.surface());
        self.pending
            .push(async move { (index, encode.await) }.boxed());
        tracing::trace!(frame = index.0, in_flight = self.pending.len(), "frame submitted");
        Ok(())
    }

    fn store(
        &mut self,
        index: FrameIndex,
        result: CaptureResult<Option<EncodedImage>>,
    ) -> CaptureResult<()> {
        match result {
            Ok(Some(image)) if !image.is_empty() => {
                self.buffer.insert(index, image);
                Ok(())
            }
            Ok(_) => {
                tracing::debug!(frame = index.0, "encoder produced no image");
                Ok(())
            }
            Err(CaptureError::EncodingFailed(msg)) => Err(CaptureError::EncodingFailed(msg)),
            Err(e) => Err(CaptureError::encoding(format!("frame {}: {e}", index.0))),
        }
    }
}

#[async_trait]
impl CaptureStrategy for SequenceCapture {
    fn on_tick(
        &mut self,
        _tick: Tick,
        advance: FrameAdvance,
        stage: &mut Stage,
    ) -> CaptureResult<()> {
        match advance {
            FrameAdvance::NewFrame(index) => self.submit(index, stage),
            FrameAdvance::NotStarted | FrameAdvance::SameFrame | FrameAdvance::Elapsed => Ok(()),
        }
    }

    async fn progress(&mut self) -> CaptureResult<()> {
        match self.pending.next().await {
            Some((index, result)) => self.store(index, result),
            None => std::future::pending().await,
        }
    }

    async fn finalize(&mut self) -> CaptureResult<CaptureArtifact> {
        let deadline = tokio::time::Instant::now() + self.finalize_grace;
        while !self.pending.is_empty() {
            match tokio::time::timeout_at(deadline, self.pending.next()).await {
                Ok(Some((index, result))) => self.store(index, result)?,
                Ok(None) => break,
                Err(_) => {
                    tracing::warn!(
                        abandoned = self.pending.len(),
                        grace_ms = self.finalize_grace.as_millis() as u64,
                        "still encodes did not finish in time; treating them as dropped"
                    );
                    self.pending.clear();
                }
            }
        }

        let sequence = std::mem::take(&mut self.buffer).finish()?;
        tracing::debug!(
            frames = sequence.len(),
            dropped = sequence.dropped_frame_count,
            "frame sequence assembled"
        );
        Ok(CaptureArtifact::Sequence(sequence))
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicU64, Ordering};

    use super::*;
    use crate::encode::still::EncodeFuture;
    use crate::foundation::core::{Canvas, Rgb8, Timestamp};
    use crate::render::source::{SourceBitmap, SvgSource};
    use crate::render::surface::Surface;

    /// Tags each image with its call number; `stall` calls never complete, `empty` calls yield
    /// nothing.
    struct TaggingEncoder {
        calls: AtomicU64,
        stall: Vec<u64>,
        empty: Vec<u64>,
    }

    impl TaggingEncoder {
        fn new(stall: Vec<u64>, empty: Vec<u64>) -> Arc<Self> {
            Arc::new(Self {
                calls: AtomicU64::new(0),
                stall,
                empty,
            })
        }
    }

    impl StillEncoder for TaggingEncoder {
        fn mime_type(&self) -> &str {
            "image/png"
        }

        fn encode(&self, _surface: &Surface) -> EncodeFuture {
            let n = self.calls.fetch_add(1, Ordering::SeqCst);
            if self.stall.contains(&n) {
                return futures_util::future::pending().boxed();
            }
            let out = if self.empty.contains(&n) {
                None
            } else {
                Some(EncodedImage::new("image/png", vec![n as u8]))
            };
            async move { Ok(out) }.boxed()
        }
    }

    fn stage() -> Stage {
        let svg = br##"<svg xmlns="http://www.w3.org/2000/svg" width="2" height="2"/>"##;
        let src = SvgSource::from_data("blank.svg", svg).unwrap();
        Stage::new(
            Surface::new(Canvas::new(2, 2).unwrap()).unwrap(),
            SourceBitmap::rasterize(&src, 2, 2).unwrap(),
            Rgb8::WHITE,
        )
    }

    fn feed(cap: &mut SequenceCapture, stage: &mut Stage, advances: &[FrameAdvance]) {
        for (i, adv) in advances.iter().enumerate() {
            cap.on_tick(Tick::At(Timestamp(i as f64)), *adv, stage)
                .unwrap();
        }
    }

    fn new_frames(n: u64) -> Vec<FrameAdvance> {
        (0..n).map(|i| FrameAdvance::NewFrame(FrameIndex(i))).collect()
    }

    #[tokio::test]
    async fn one_encode_per_new_frame_only() {
        let enc = TaggingEncoder::new(vec![], vec![]);
        let mut cap = SequenceCapture::new(enc.clone(), Duration::from_millis(50));
        let mut stage = stage();
        feed(
            &mut cap,
            &mut stage,
            &[
                FrameAdvance::NotStarted,
                FrameAdvance::NewFrame(FrameIndex(0)),
                FrameAdvance::SameFrame,
                FrameAdvance::NewFrame(FrameIndex(1)),
                FrameAdvance::Elapsed,
            ],
        );
        assert_eq!(enc.calls.load(Ordering::SeqCst), 2);

        let artifact = cap.finalize().await.unwrap();
        let seq = artifact.as_sequence().unwrap();
        assert_eq!(seq.len(), 2);
        assert_eq!(seq.dropped_frame_count, 0);
    }

    #[tokio::test]
    async fn progress_stores_completions_by_index() {
        let enc = TaggingEncoder::new(vec![], vec![]);
        let mut cap = SequenceCapture::new(enc, Duration::from_millis(50));
        let mut stage = stage();
        feed(&mut cap, &mut stage, &new_frames(3));
        assert_eq!(cap.in_flight(), 3);
        for _ in 0..3 {
            cap.progress().await.unwrap();
        }
        assert_eq!(cap.in_flight(), 0);
        assert_eq!(cap.buffer().captured(), 3);
        assert_eq!(
            cap.buffer().get(FrameIndex(2)).map(|img| img.data[0]),
            Some(2)
        );
    }

    #[tokio::test(start_paused = true)]
    async fn stalled_encode_is_abandoned_after_grace_and_counted() {
        let enc = TaggingEncoder::new(vec![2], vec![]);
        let mut cap = SequenceCapture::new(enc, Duration::from_millis(250));
        let mut stage = stage();
        feed(&mut cap, &mut stage, &new_frames(4));

        let artifact = cap.finalize().await.unwrap();
        let seq = artifact.as_sequence().unwrap();
        assert_eq!(seq.len(), 4);
        assert_eq!(seq.frames[2], seq.frames[1]);
        assert_eq!(seq.frames[3].data[0], 3);
        assert_eq!(seq.dropped_frame_count, 1);
    }

    #[tokio::test]
    async fn empty_results_are_drops_not_failures() {
        let enc = TaggingEncoder::new(vec![], vec![1, 2]);
        let mut cap = SequenceCapture::new(enc, Duration::from_millis(50));
        let mut stage = stage();
        feed(&mut cap, &mut stage, &new_frames(4));

        let artifact = cap.finalize().await.unwrap();
        let seq = artifact.as_sequence().unwrap();
        assert_eq!(seq.len(), 4);
        assert_eq!(seq.dropped_frame_count, 2);
        assert_eq!(seq.frames[1].data[0], 0);
        assert_eq!(seq.frames[2].data[0], 0);
    }

    #[tokio::test]
    async fn all_empty_is_no_frames_captured() {
        let enc = TaggingEncoder::new(vec![], vec![0, 1, 2]);
        let mut cap = SequenceCapture::new(enc, Duration::from_millis(50));
        let mut stage = stage();
        feed(&mut cap, &mut stage, &new_frames(3));
        assert!(matches!(
            cap.finalize().await,
            Err(CaptureError::NoFramesCaptured)
        ));
    }

    #[test]
    fn encoder_errors_become_encoding_failed() {
        let enc = TaggingEncoder::new(vec![], vec![]);
        let mut cap = SequenceCapture::new(enc, Duration::ZERO);
        let err = cap
            .store(FrameIndex(4), Err(CaptureError::render("bad surface")))
            .unwrap_err();
        assert!(matches!(err, CaptureError::EncodingFailed(m) if m.contains("frame 4")));
    }
}
