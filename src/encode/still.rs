use std::io::Cursor;
use std::sync::Arc;

use anyhow::Context;
use futures_util::future::BoxFuture;

use crate::encode::format::STILL_MIME_TYPE;
use crate::foundation::core::Canvas;
use crate::foundation::error::{CaptureError, CaptureResult};
use crate::render::surface::Surface;

/// One encoded still image.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EncodedImage {
    pub mime_type: String,
    pub data: Arc<Vec<u8>>,
}

impl EncodedImage {
    pub fn new(mime_type: impl Into<String>, data: Vec<u8>) -> Self {
        Self {
            mime_type: mime_type.into(),
            data: Arc::new(data),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

/// Completion of one still encode. `Ok(None)` means the encoder produced nothing for this
/// frame, which callers treat as a drop rather than a failure.
pub type EncodeFuture = BoxFuture<'static, CaptureResult<Option<EncodedImage>>>;

/// Still-image encoder capability.
///
/// `encode` snapshots the surface synchronously and returns a future that resolves whenever the
/// encode finishes. Futures from consecutive calls may resolve in any order.
pub trait StillEncoder: Send + Sync {
    fn mime_type(&self) -> &str;

    fn encode(&self, surface: &Surface) -> EncodeFuture;
}

/// PNG encoding on the blocking thread pool.
#[derive(Clone, Copy, Debug, Default)]
pub struct PngEncoder;

impl PngEncoder {
    pub fn encode_rgba8(width: u32, height: u32, rgba: Vec<u8>) -> CaptureResult<Vec<u8>> {
        let img = image::RgbaImage::from_raw(width, height, rgba)
            .ok_or_else(|| CaptureError::encoding("png: pixel buffer does not match size"))?;

        let mut buf = Vec::new();
        image::DynamicImage::ImageRgba8(img)
            .write_to(&mut Cursor::new(&mut buf), image::ImageFormat::Png)
            .context("encode png")?;
        Ok(buf)
    }
}

impl StillEncoder for PngEncoder {
    fn mime_type(&self) -> &str {
        STILL_MIME_TYPE
    }

    fn encode(&self, surface: &Surface) -> EncodeFuture {
        let canvas = surface.canvas();
        let rgba = surface.to_rgba8_straight();
        Box::pin(encode_png_blocking(canvas, rgba))
    }
}

async fn encode_png_blocking(
    canvas: Canvas,
    rgba: Vec<u8>,
) -> CaptureResult<Option<EncodedImage>> {
    let data = tokio::task::spawn_blocking(move || {
        PngEncoder::encode_rgba8(canvas.width, canvas.height, rgba)
    })
    .await
    .map_err(|e| CaptureError::encoding(format!("png encode task failed: {e}")))??;

    if data.is_empty() {
        return Ok(None);
    }
    Ok(Some(EncodedImage::new(STILL_MIME_TYPE, data)))
}
