use std::path::Path;
use std::sync::Arc;

use anyhow::Context;

use crate::foundation::error::{CaptureError, CaptureResult};

/// Cheaply clonable handle to a decoded vector source.
pub type SourceHandle = Arc<SvgSource>;

/// A parsed SVG document (plain or gzip-compressed).
pub struct SvgSource {
    name: String,
    tree: usvg::Tree,
}

impl std::fmt::Debug for SvgSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let (w, h) = self.natural_size();
        f.debug_struct("SvgSource")
            .field("name", &self.name)
            .field("natural_size", &format_args!("{w}x{h}"))
            .finish()
    }
}

impl SvgSource {
    pub fn from_data(name: impl Into<String>, bytes: &[u8]) -> CaptureResult<Self> {
        let mut opts = usvg::Options::default();
        opts.fontdb_mut().load_system_fonts();

        let name = name.into();
        let tree = usvg::Tree::from_data(bytes, &opts)
            .map_err(|e| CaptureError::source(format!("parse svg '{name}': {e}")))?;
        Ok(Self { name, tree })
    }

    pub fn from_path(path: &Path) -> CaptureResult<Self> {
        let bytes = std::fs::read(path)
            .with_context(|| format!("read svg source '{}'", path.display()))?;
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string());
        Self::from_data(name, &bytes)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn tree(&self) -> &usvg::Tree {
        &self.tree
    }

    /// Intrinsic size in whole pixels (rounded up, at least 1x1).
    pub fn natural_size(&self) -> (u32, u32) {
        let size = self.tree.size();
        let to_px = |v: f32| {
            if v.is_finite() && v > 0.0 {
                (v.ceil() as u32).max(1)
            } else {
                1
            }
        };
        (to_px(size.width()), to_px(size.height()))
    }
}

// Avoid pathological allocations from hostile width/height input.
const MAX_DIM: u32 = 16_384;

/// The source rasterized once at the capture size (premultiplied RGBA8).
pub struct SourceBitmap {
    pixmap: resvg::tiny_skia::Pixmap,
}

impl SourceBitmap {
    pub fn rasterize(source: &SvgSource, width: u32, height: u32) -> CaptureResult<Self> {
        if width == 0 || height == 0 {
            return Err(CaptureError::render("source bitmap width/height must be non-zero"));
        }
        if width > MAX_DIM || height > MAX_DIM {
            return Err(CaptureError::render(format!(
                "source bitmap too large: {width}x{height} (max {MAX_DIM}x{MAX_DIM})"
            )));
        }

        let mut pixmap = resvg::tiny_skia::Pixmap::new(width, height)
            .ok_or_else(|| CaptureError::render("failed to allocate source pixmap"))?;

        let size = source.tree().size();
        let sx = (width as f32) / size.width();
        let sy = (height as f32) / size.height();
        let xform = resvg::tiny_skia::Transform::from_scale(sx, sy);

        resvg::render(source.tree(), xform, &mut pixmap.as_mut());
        Ok(Self { pixmap })
    }

    pub fn width(&self) -> u32 {
        self.pixmap.width()
    }

    pub fn height(&self) -> u32 {
        self.pixmap.height()
    }

    pub(crate) fn pixmap(&self) -> &resvg::tiny_skia::Pixmap {
        &self.pixmap
    }
}
