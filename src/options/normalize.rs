use crate::encode::format::{MimeType, STILL_MIME_TYPE};
use crate::foundation::core::Rgb8;
use crate::options::{
    CaptureOptions, Field, OutputKind, ValidationError, ValidationErrorKind, ValidationErrors,
};
use crate::render::source::{SourceHandle, SvgSource};

pub const DEFAULT_DURATION_MS: u32 = 5_000;
pub const DEFAULT_FRAME_RATE: u32 = 30;

/// Field values exactly as the user entered them. Blank numeric fields mean "use the
/// placeholder".
#[derive(Clone, Debug, Default)]
pub struct RawFields {
    pub svg: Option<SourceHandle>,
    pub width: String,
    pub height: String,
    pub duration: String,
    pub framerate: String,
    pub background: String,
    pub format: String,
    /// Keep the aspect ratio when only one of width/height is given.
    pub link_dimensions: bool,
}

/// Fallbacks for blank numeric fields.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Placeholders {
    pub width: Option<u32>,
    pub height: Option<u32>,
    pub duration_ms: Option<u32>,
    pub frame_rate: Option<u32>,
}

impl Default for Placeholders {
    fn default() -> Self {
        Self {
            width: None,
            height: None,
            duration_ms: Some(DEFAULT_DURATION_MS),
            frame_rate: Some(DEFAULT_FRAME_RATE),
        }
    }
}

impl Placeholders {
    /// Natural source size for width/height, defaults for the rest.
    pub fn for_source(source: &SvgSource) -> Self {
        let (w, h) = source.natural_size();
        Self {
            width: Some(w),
            height: Some(h),
            ..Self::default()
        }
    }
}

fn is_positive_int(s: &str) -> bool {
    let mut bytes = s.bytes();
    matches!(bytes.next(), Some(b'1'..=b'9')) && bytes.all(|b| b.is_ascii_digit())
}

/// Lexically check a supplied number; blank means "not supplied".
fn check_number(
    field: Field,
    value: &str,
    errors: &mut Vec<ValidationError>,
) -> Option<u32> {
    if value.is_empty() {
        return None;
    }
    match value.parse::<u32>() {
        Ok(n) if is_positive_int(value) => Some(n),
        _ => {
            errors.push(ValidationError::new(field, ValidationErrorKind::InvalidNumber));
            None
        }
    }
}

fn check_format(value: &str, errors: &mut Vec<ValidationError>) -> Option<OutputKind> {
    if value == STILL_MIME_TYPE {
        return Some(OutputKind::Sequence);
    }
    match MimeType::parse(value) {
        Some(mime) => Some(OutputKind::Stream { mime }),
        None => {
            errors.push(ValidationError::new(
                Field::Format,
                ValidationErrorKind::UnsupportedFormat(value.to_owned()),
            ));
            None
        }
    }
}

/// Scale the unsupplied side proportionally to the supplied one.
pub fn scale_linked(value: u32, own_placeholder: u32, other_placeholder: u32) -> u32 {
    if own_placeholder == 0 {
        return other_placeholder.max(1);
    }
    let ratio = f64::from(value) / f64::from(own_placeholder);
    let scaled = (f64::from(other_placeholder) * ratio).round();
    scaled.clamp(1.0, f64::from(u32::MAX)) as u32
}

/// Validate `raw` and coerce it into [`CaptureOptions`].
///
/// Pure: reads its inputs and nothing else. All violations are returned together.
pub fn normalize(
    raw: &RawFields,
    placeholders: &Placeholders,
) -> Result<CaptureOptions, ValidationErrors> {
    let mut errors = Vec::new();

    if raw.svg.is_none() {
        errors.push(ValidationError::new(Field::Svg, ValidationErrorKind::MissingFile));
    }

    let width = check_number(Field::Width, &raw.width, &mut errors);
    let height = check_number(Field::Height, &raw.height, &mut errors);
    let duration = check_number(Field::Duration, &raw.duration, &mut errors);
    let framerate = check_number(Field::Framerate, &raw.framerate, &mut errors);

    let background = if raw.background.is_empty() {
        errors.push(ValidationError::new(
            Field::Background,
            ValidationErrorKind::MissingColor,
        ));
        None
    } else {
        let parsed = Rgb8::parse_hex(&raw.background);
        if parsed.is_none() {
            errors.push(ValidationError::new(
                Field::Background,
                ValidationErrorKind::InvalidColor(raw.background.clone()),
            ));
        }
        parsed
    };

    let output = check_format(&raw.format, &mut errors);

    // Coercion only happens once every supplied value passed validation.
    let (Some(source), Some(background), Some(output), true) =
        (raw.svg.clone(), background, output, errors.is_empty())
    else {
        return Err(ValidationErrors(errors));
    };

    let (width, height) = match (width, height, raw.link_dimensions) {
        (Some(w), None, true) => match (placeholders.width, placeholders.height) {
            (Some(pw), Some(ph)) => (Some(w), Some(scale_linked(w, pw, ph))),
            _ => (Some(w), placeholders.height),
        },
        (None, Some(h), true) => match (placeholders.width, placeholders.height) {
            (Some(pw), Some(ph)) => (Some(scale_linked(h, ph, pw)), Some(h)),
            _ => (placeholders.width, Some(h)),
        },
        (w, h, _) => (w.or(placeholders.width), h.or(placeholders.height)),
    };

    let mut require = |field: Field, value: Option<u32>, missing: ValidationErrorKind| {
        if value.is_none() {
            errors.push(ValidationError::new(field, missing));
        }
        value.unwrap_or_default()
    };
    let width = require(Field::Width, width, ValidationErrorKind::MissingDimensions);
    let height = require(Field::Height, height, ValidationErrorKind::MissingDimensions);
    let duration_ms = require(
        Field::Duration,
        duration.or(placeholders.duration_ms),
        ValidationErrorKind::MissingValue,
    );
    let frame_rate = require(
        Field::Framerate,
        framerate.or(placeholders.frame_rate),
        ValidationErrorKind::MissingValue,
    );

    if !errors.is_empty() {
        return Err(ValidationErrors(errors));
    }

    Ok(CaptureOptions {
        source,
        width,
        height,
        duration_ms,
        frame_rate,
        background,
        output,
    })
}
