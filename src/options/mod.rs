//! Options normalization: raw user-facing fields in, a validated [`CaptureOptions`] out.
//!
//! Validation is collected, not fail-fast: every violated field is reported in one pass, and
//! nothing outside the input is touched.

mod normalize;

pub use normalize::{
    DEFAULT_DURATION_MS, DEFAULT_FRAME_RATE, Placeholders, RawFields, normalize, scale_linked,
};

use crate::encode::format::MimeType;
use crate::foundation::core::{Canvas, Rgb8};
use crate::foundation::error::{CaptureError, CaptureResult};
use crate::render::source::SourceHandle;

/// How the captured frames leave the session.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum OutputKind {
    /// One continuously encoded container blob.
    Stream { mime: MimeType },
    /// One still image per frame index.
    Sequence,
}

/// Validated, immutable capture parameters.
#[derive(Clone, Debug)]
pub struct CaptureOptions {
    pub source: SourceHandle,
    pub width: u32,
    pub height: u32,
    pub duration_ms: u32,
    pub frame_rate: u32,
    pub background: Rgb8,
    pub output: OutputKind,
}

impl CaptureOptions {
    pub fn validate(&self) -> CaptureResult<()> {
        let mut errors = Vec::new();
        if self.width == 0 {
            errors.push(ValidationError::new(Field::Width, ValidationErrorKind::InvalidNumber));
        }
        if self.height == 0 {
            errors.push(ValidationError::new(Field::Height, ValidationErrorKind::InvalidNumber));
        }
        if self.duration_ms == 0 {
            errors.push(ValidationError::new(
                Field::Duration,
                ValidationErrorKind::InvalidNumber,
            ));
        }
        if self.frame_rate == 0 {
            errors.push(ValidationError::new(
                Field::Framerate,
                ValidationErrorKind::InvalidNumber,
            ));
        }
        if errors.is_empty() {
            Ok(())
        } else {
            Err(CaptureError::Validation(ValidationErrors(errors)))
        }
    }

    pub fn canvas(&self) -> Canvas {
        Canvas {
            width: self.width,
            height: self.height,
        }
    }
}

/// User-facing field names, as they appear in forms and option files.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Field {
    Svg,
    Width,
    Height,
    Duration,
    Framerate,
    Background,
    Format,
}

impl Field {
    pub fn as_str(self) -> &'static str {
        match self {
            Field::Svg => "svg",
            Field::Width => "width",
            Field::Height => "height",
            Field::Duration => "duration",
            Field::Framerate => "framerate",
            Field::Background => "background",
            Field::Format => "format",
        }
    }
}

impl std::fmt::Display for Field {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ValidationErrorKind {
    MissingFile,
    InvalidNumber,
    /// Width/height left blank and no natural image size to fall back to.
    MissingDimensions,
    /// Duration/framerate left blank and no fallback value configured.
    MissingValue,
    MissingColor,
    InvalidColor(String),
    UnsupportedFormat(String),
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ValidationError {
    pub field: Field,
    pub kind: ValidationErrorKind,
}

impl ValidationError {
    pub fn new(field: Field, kind: ValidationErrorKind) -> Self {
        Self { field, kind }
    }
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.kind {
            ValidationErrorKind::MissingFile => write!(f, "{}: no file selected", self.field),
            ValidationErrorKind::InvalidNumber => {
                write!(f, "{}: the {} is not a valid number", self.field, self.field)
            }
            ValidationErrorKind::MissingDimensions => write!(
                f,
                "{}: no value given and the source has no natural size",
                self.field
            ),
            ValidationErrorKind::MissingValue => {
                write!(f, "{}: no value given and no default configured", self.field)
            }
            ValidationErrorKind::MissingColor => {
                write!(f, "{}: the background color must be defined", self.field)
            }
            ValidationErrorKind::InvalidColor(v) => {
                write!(f, "{}: the background value is not a valid color: {v}", self.field)
            }
            ValidationErrorKind::UnsupportedFormat(v) => {
                write!(f, "{}: unsupported output format: {v:?}", self.field)
            }
        }
    }
}

/// All violations found in one normalization pass, in field order.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ValidationErrors(pub Vec<ValidationError>);

impl ValidationErrors {
    pub fn iter(&self) -> impl Iterator<Item = &ValidationError> {
        self.0.iter()
    }

    pub fn for_field(&self, field: Field) -> impl Iterator<Item = &ValidationError> {
        self.0.iter().filter(move |e| e.field == field)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl std::fmt::Display for ValidationErrors {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        for (i, e) in self.0.iter().enumerate() {
            if i > 0 {
                f.write_str("; ")?;
            }
            write!(f, "{e}")?;
        }
        Ok(())
    }
}

impl std::error::Error for ValidationErrors {}
