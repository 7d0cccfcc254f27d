use crate::foundation::core::Rgb8;
use crate::foundation::error::CaptureResult;
use crate::render::source::SourceBitmap;
use crate::render::surface::Surface;

/// Fill the whole surface with `background`, then composite `source` over it (source-over),
/// stretched to the surface size.
///
/// Every call fully overwrites the surface, so repeated calls with the same inputs produce
/// identical pixels.
pub fn render_into(
    surface: &mut Surface,
    background: Rgb8,
    source: &SourceBitmap,
) -> CaptureResult<()> {
    let canvas = surface.canvas();
    let pixmap = surface.pixmap_mut();
    pixmap.fill(resvg::tiny_skia::Color::from_rgba8(
        background.r,
        background.g,
        background.b,
        255,
    ));

    let sx = (canvas.width as f32) / (source.width() as f32);
    let sy = (canvas.height as f32) / (source.height() as f32);
    pixmap.draw_pixmap(
        0,
        0,
        source.pixmap().as_ref(),
        &resvg::tiny_skia::PixmapPaint::default(),
        resvg::tiny_skia::Transform::from_scale(sx, sy),
        None,
    );
    Ok(())
}

/// Everything the render step needs, owned by one session.
pub struct Stage {
    surface: Surface,
    source: SourceBitmap,
    background: Rgb8,
}

impl Stage {
    pub fn new(surface: Surface, source: SourceBitmap, background: Rgb8) -> Self {
        Self {
            surface,
            source,
            background,
        }
    }

    pub fn render(&mut self) -> CaptureResult<()> {
        render_into(&mut self.surface, self.background, &self.source)
    }

    pub fn surface(&self) -> &Surface {
        &self.surface
    }
}

impl Drop for Stage {
    fn drop(&mut self) {
        let canvas = self.surface.canvas();
        tracing::debug!(
            width = canvas.width,
            height = canvas.height,
            "released backing surface"
        );
    }
}
