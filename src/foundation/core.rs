use crate::foundation::error::{CaptureError, CaptureResult};

/// Zero-based frame ordinal within a capture window.
#[derive(
    Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, serde::Serialize, serde::Deserialize,
)]
pub struct FrameIndex(pub u64);

/// Host scheduler timestamp in milliseconds (monotonic, high resolution).
#[derive(Clone, Copy, Debug, PartialEq, PartialOrd, serde::Serialize, serde::Deserialize)]
pub struct Timestamp(pub f64);

impl Timestamp {
    pub fn as_millis(self) -> f64 {
        self.0
    }

    /// Milliseconds elapsed since `origin`.
    pub fn since(self, origin: Timestamp) -> f64 {
        self.0 - origin.0
    }
}

/// One invocation of the scheduling callback.
///
/// `Kickoff` is the synchronous first call made before any host tick has been delivered; it
/// never carries a time. Every later call carries the host timestamp, including a timestamp of
/// exactly zero.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Tick {
    Kickoff,
    At(Timestamp),
}

impl Tick {
    pub fn timestamp(self) -> Option<Timestamp> {
        match self {
            Tick::Kickoff => None,
            Tick::At(ts) => Some(ts),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct Canvas {
    pub width: u32,
    pub height: u32,
}

impl Canvas {
    pub fn new(width: u32, height: u32) -> CaptureResult<Self> {
        if width == 0 || height == 0 {
            return Err(CaptureError::render("canvas width/height must be non-zero"));
        }
        Ok(Self { width, height })
    }

    pub fn bytes_rgba8(self) -> usize {
        (self.width as usize) * (self.height as usize) * 4
    }
}

/// Opaque background fill, parsed from `#RRGGBB`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub struct Rgb8 {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl Rgb8 {
    pub const WHITE: Rgb8 = Rgb8 {
        r: 255,
        g: 255,
        b: 255,
    };

    /// Parse exactly `#` followed by six hex digits (either case).
    pub fn parse_hex(s: &str) -> Option<Self> {
        let hex = s.strip_prefix('#')?;
        if hex.len() != 6 || !hex.bytes().all(|b| b.is_ascii_hexdigit()) {
            return None;
        }

        let byte = |i: usize| u8::from_str_radix(&hex[i..i + 2], 16).ok();
        Some(Self {
            r: byte(0)?,
            g: byte(2)?,
            b: byte(4)?,
        })
    }

    pub fn to_hex(self) -> String {
        format!("#{:02x}{:02x}{:02x}", self.r, self.g, self.b)
    }
}
