#![forbid(unsafe_code)]

pub mod capture;
pub mod clock;
pub mod deliver;
pub mod encode;
pub mod foundation;
pub mod options;
pub mod render;
pub mod session;
pub mod ticks;

pub use capture::{CaptureArtifact, FrameSequence, StreamArtifact};
pub use clock::{FrameAdvance, FrameClock};
pub use encode::ffmpeg::FfmpegStreamEncoder;
pub use encode::format::{FormatOption, MimeType, supported_formats};
pub use encode::still::{EncodedImage, PngEncoder, StillEncoder};
pub use encode::stream::{EncoderEvent, StreamConfig, StreamEncoder};
pub use foundation::core::{Canvas, FrameIndex, Rgb8, Tick, Timestamp};
pub use foundation::error::{CaptureError, CaptureResult};
pub use options::{CaptureOptions, OutputKind, Placeholders, RawFields, normalize};
pub use render::source::{SourceHandle, SvgSource};
pub use session::{Capabilities, Recording, SessionConfig, SessionManager, SessionState};
pub use ticks::{IntervalTicks, ScriptedTicks, SimulatedTicks, TickSource};
