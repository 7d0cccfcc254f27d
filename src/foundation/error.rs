use crate::options::ValidationErrors;

pub type CaptureResult<T> = Result<T, CaptureError>;

#[derive(thiserror::Error, Debug)]
pub enum CaptureError {
    #[error("validation error: {0}")]
    Validation(ValidationErrors),

    #[error("already recording: a capture session is in progress")]
    AlreadyRecording,

    #[error("unsupported format: {0}")]
    UnsupportedFormat(String),

    #[error("encoding failed: {0}")]
    EncodingFailed(String),

    #[error("no frames captured: the session never produced a usable frame")]
    NoFramesCaptured,

    #[error("render error: {0}")]
    Render(String),

    #[error("source error: {0}")]
    Source(String),

    #[error("scheduler error: {0}")]
    Scheduler(String),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl CaptureError {
    pub fn unsupported_format(msg: impl Into<String>) -> Self {
        Self::UnsupportedFormat(msg.into())
    }

    pub fn encoding(msg: impl Into<String>) -> Self {
        Self::EncodingFailed(msg.into())
    }

    pub fn render(msg: impl Into<String>) -> Self {
        Self::Render(msg.into())
    }

    pub fn source(msg: impl Into<String>) -> Self {
        Self::Source(msg.into())
    }

    pub fn scheduler(msg: impl Into<String>) -> Self {
        Self::Scheduler(msg.into())
    }
}

impl From<ValidationErrors> for CaptureError {
    fn from(errors: ValidationErrors) -> Self {
        Self::Validation(errors)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_prefixes_are_stable() {
        assert!(
            CaptureError::encoding("x")
                .to_string()
                .starts_with("encoding failed:")
        );
        assert!(CaptureError::render("x").to_string().starts_with("render error:"));
        assert!(CaptureError::source("x").to_string().starts_with("source error:"));
        assert!(
            CaptureError::scheduler("x")
                .to_string()
                .starts_with("scheduler error:")
        );
        assert!(
            CaptureError::unsupported_format("video/foo")
                .to_string()
                .contains("video/foo")
        );
        assert!(
            CaptureError::AlreadyRecording
                .to_string()
                .starts_with("already recording")
        );
        assert!(
            CaptureError::NoFramesCaptured
                .to_string()
                .starts_with("no frames captured")
        );
    }

    #[test]
    fn other_preserves_source() {
        let base = std::io::Error::other("boom");
        let err = CaptureError::Other(anyhow::Error::new(base));
        assert!(err.to_string().contains("boom"));
    }
}
