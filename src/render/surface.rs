use crate::foundation::core::Canvas;
use crate::foundation::error::{CaptureError, CaptureResult};

/// The off-screen backing surface a session renders into.
///
/// Pixels are premultiplied RGBA8, row-major, tightly packed.
pub struct Surface {
    pixmap: resvg::tiny_skia::Pixmap,
}

impl Surface {
    pub fn new(canvas: Canvas) -> CaptureResult<Self> {
        let pixmap = resvg::tiny_skia::Pixmap::new(canvas.width, canvas.height).ok_or_else(
            || {
                CaptureError::render(format!(
                    "failed to allocate {}x{} surface",
                    canvas.width, canvas.height
                ))
            },
        )?;
        Ok(Self { pixmap })
    }

    pub fn canvas(&self) -> Canvas {
        Canvas {
            width: self.pixmap.width(),
            height: self.pixmap.height(),
        }
    }

    pub fn data_premul(&self) -> &[u8] {
        self.pixmap.data()
    }

    /// Snapshot the surface as straight-alpha RGBA8.
    pub fn to_rgba8_straight(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(self.canvas().bytes_rgba8());
        for px in self.pixmap.pixels() {
            let c = px.demultiply();
            out.extend_from_slice(&[c.red(), c.green(), c.blue(), c.alpha()]);
        }
        out
    }

    pub(crate) fn pixmap_mut(&mut self) -> &mut resvg::tiny_skia::Pixmap {
        &mut self.pixmap
    }
}

impl std::fmt::Debug for Surface {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Surface")
            .field("width", &self.pixmap.width())
            .field("height", &self.pixmap.height())
            .finish()
    }
}
