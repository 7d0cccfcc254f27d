//! Encoder capabilities consumed by the capture strategies.

/// `ffmpeg`-backed stream encoder (system binary, piped stdin/stdout).
pub mod ffmpeg;
/// Container/codec tables and format negotiation.
pub mod format;
/// Still-image encoder capability and the built-in PNG encoder.
pub mod still;
/// Continuous stream encoder capability.
pub mod stream;
