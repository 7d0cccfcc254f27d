use crate::encode::still::EncodedImage;
use crate::foundation::core::FrameIndex;
use crate::foundation::error::{CaptureError, CaptureResult};

/// Finished sequence output: one image per index, contiguous from 0.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FrameSequence {
    pub frames: Vec<EncodedImage>,
    /// Indices after the first captured one that held the previous frame instead of their own.
    /// Leading indices that borrow the first captured frame are not counted.
    pub dropped_frame_count: u64,
}

impl FrameSequence {
    pub fn len(&self) -> usize {
        self.frames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }
}

/// Index-addressed sparse frame store. Encodes complete in any order, so writes go by index.
#[derive(Clone, Debug, Default)]
pub struct FrameBuffer {
    slots: Vec<Option<EncodedImage>>,
    highest_reached: Option<u64>,
}

impl FrameBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record that `index` was emitted by the clock, whether or not its encode ever lands.
    pub fn mark_reached(&mut self, index: FrameIndex) {
        self.highest_reached = Some(self.highest_reached.map_or(index.0, |h| h.max(index.0)));
    }

    pub fn highest_reached(&self) -> Option<FrameIndex> {
        self.highest_reached.map(FrameIndex)
    }

    /// Store a finished encode. Empty images leave the slot unfilled.
    pub fn insert(&mut self, index: FrameIndex, image: EncodedImage) {
        if image.is_empty() {
            return;
        }
        let i = index.0 as usize;
        if self.slots.len() <= i {
            self.slots.resize(i + 1, None);
        }
        self.slots[i] = Some(image);
    }

    pub fn get(&self, index: FrameIndex) -> Option<&EncodedImage> {
        self.slots.get(index.0 as usize).and_then(Option::as_ref)
    }

    pub fn captured(&self) -> usize {
        self.slots.iter().filter(|s| s.is_some()).count()
    }

    /// Close the buffer, filling every gap with the nearest earlier frame.
    ///
    /// The output spans `0..=` the last captured index. Indices before the first captured frame
    /// borrow that frame; any other substitution counts as a drop.
    pub fn finish(self) -> CaptureResult<FrameSequence> {
        let Some(last) = self.slots.iter().rposition(Option::is_some) else {
            return Err(CaptureError::NoFramesCaptured);
        };
        let Some(first) = self.slots.iter().position(Option::is_some) else {
            return Err(CaptureError::NoFramesCaptured);
        };

        if let Some(reached) = self.highest_reached {
            let truncated = reached.saturating_sub(last as u64);
            if truncated > 0 {
                tracing::debug!(truncated, "trailing frames never captured; sequence shortened");
            }
        }
        if first > 0 {
            tracing::debug!(leading = first, "leading frames borrow the first captured frame");
        }

        let mut frames = Vec::with_capacity(last + 1);
        let mut dropped = 0u64;
        let mut held: Option<EncodedImage> = None;
        for (i, slot) in self.slots.into_iter().take(last + 1).enumerate() {
            let image = match slot {
                Some(image) => image,
                None if i < first => continue,
                None => {
                    dropped += 1;
                    tracing::debug!(index = i, "frame dropped; holding previous frame");
                    held.clone().ok_or(CaptureError::NoFramesCaptured)?
                }
            };
            if frames.len() < i {
                // Backfill the leading gap with the first captured frame.
                frames.resize(i, image.clone());
            }
            held = Some(image.clone());
            frames.push(image);
        }

        Ok(FrameSequence {
            frames,
            dropped_frame_count: dropped,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn img(tag: u8) -> EncodedImage {
        EncodedImage::new("image/png", vec![tag])
    }

    fn buffer_with(reached: u64, captured: &[u64]) -> FrameBuffer {
        let mut buf = FrameBuffer::new();
        for i in 0..=reached {
            buf.mark_reached(FrameIndex(i));
        }
        for &i in captured {
            buf.insert(FrameIndex(i), img(i as u8));
        }
        buf
    }

    #[test]
    fn gap_holds_previous_frame_and_counts_a_drop() {
        let seq = buffer_with(3, &[0, 1, 3]).finish().unwrap();
        assert_eq!(seq.len(), 4);
        assert_eq!(seq.frames[2], seq.frames[1]);
        assert_eq!(seq.frames[3], img(3));
        assert_eq!(seq.dropped_frame_count, 1);
    }

    #[test]
    fn out_of_order_inserts_land_by_index() {
        let mut buf = FrameBuffer::new();
        buf.insert(FrameIndex(2), img(2));
        buf.insert(FrameIndex(0), img(0));
        buf.insert(FrameIndex(1), img(1));
        let seq = buf.finish().unwrap();
        assert_eq!(seq.frames, vec![img(0), img(1), img(2)]);
        assert_eq!(seq.dropped_frame_count, 0);
    }

    #[test]
    fn leading_gap_borrows_forward_without_counting() {
        let seq = buffer_with(4, &[2, 4]).finish().unwrap();
        assert_eq!(seq.frames, vec![img(2), img(2), img(2), img(2), img(4)]);
        assert_eq!(seq.dropped_frame_count, 1);
    }

    #[test]
    fn long_leading_gap_alone_counts_no_drops() {
        let seq = buffer_with(5, &[3, 4, 5]).finish().unwrap();
        assert_eq!(seq.len(), 6);
        assert!(seq.frames[..4].iter().all(|f| *f == img(3)));
        assert_eq!(seq.dropped_frame_count, 0);
    }

    #[test]
    fn trailing_uncaptured_frames_are_truncated() {
        let seq = buffer_with(9, &[0, 1, 2, 4, 5, 6, 7, 8]).finish().unwrap();
        assert_eq!(seq.len(), 9);
        assert_eq!(seq.dropped_frame_count, 1);
    }

    #[test]
    fn nothing_captured_is_an_error() {
        let err = buffer_with(5, &[]).finish().unwrap_err();
        assert!(matches!(err, CaptureError::NoFramesCaptured));
        assert!(matches!(
            FrameBuffer::new().finish(),
            Err(CaptureError::NoFramesCaptured)
        ));
    }

    #[test]
    fn empty_images_do_not_fill_slots() {
        let mut buf = buffer_with(1, &[0]);
        buf.insert(FrameIndex(1), EncodedImage::new("image/png", Vec::new()));
        assert!(buf.get(FrameIndex(1)).is_none());
        assert_eq!(buf.captured(), 1);
        assert_eq!(buf.highest_reached(), Some(FrameIndex(1)));
    }

    #[test]
    fn every_nth_failure_is_counted_between_first_and_last() {
        // Encode fails on every third index over 0..30.
        let captured: Vec<u64> = (0..30).filter(|i| i % 3 != 0 || *i == 0).collect();
        let seq = buffer_with(29, &captured).finish().unwrap();
        let expected = (1..29).filter(|i| i % 3 == 0).count() as u64;
        assert_eq!(seq.dropped_frame_count, expected);
        assert_eq!(seq.len(), 30);
    }
}
