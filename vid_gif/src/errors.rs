use crate::invocation::Step;
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum GifError {
    #[error("{engine} is not installed or not callable: {reason}")]
    EngineUnavailable { engine: String, reason: String },

    #[error("Video file not found: {}", .0.display())]
    InputNotFound(PathBuf),

    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Start offset {start}s lies past the end of the input ({length:.2}s long)")]
    WindowOutOfRange { start: f64, length: f64 },

    #[error("Palette generation failed: {summary}")]
    PaletteGenerationFailed { summary: String, diagnostic: String },

    #[error("GIF encoding failed: {summary}")]
    EncodingFailed { summary: String, diagnostic: String },

    #[error("{step} timed out after {}s", .timeout.as_secs())]
    TimedOut { step: Step, timeout: Duration },

    #[error("{step} cancelled")]
    Cancelled { step: Step },

    #[error("{context}: {source}")]
    Io {
        context: String,
        #[source]
        source: std::io::Error,
    },
}

impl GifError {
    pub(crate) fn io(context: impl Into<String>, source: std::io::Error) -> Self {
        GifError::Io {
            context: context.into(),
            source,
        }
    }

    /// Full engine output for the two engine failure kinds.
    pub fn diagnostic(&self) -> Option<&str> {
        match self {
            GifError::PaletteGenerationFailed { diagnostic, .. }
            | GifError::EncodingFailed { diagnostic, .. } => Some(diagnostic),
            _ => None,
        }
    }

    /// Stable short name, used as a structured log field.
    pub fn kind(&self) -> &'static str {
        match self {
            GifError::EngineUnavailable { .. } => "engine_unavailable",
            GifError::InputNotFound(_) => "input_not_found",
            GifError::InvalidRequest(_) => "invalid_request",
            GifError::WindowOutOfRange { .. } => "window_out_of_range",
            GifError::PaletteGenerationFailed { .. } => "palette_generation_failed",
            GifError::EncodingFailed { .. } => "encoding_failed",
            GifError::TimedOut { .. } => "timed_out",
            GifError::Cancelled { .. } => "cancelled",
            GifError::Io { .. } => "io",
        }
    }
}

pub type Result<T> = std::result::Result<T, GifError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_messages_are_human_readable() {
        let err = GifError::InputNotFound(PathBuf::from("/videos/clip.mp4"));
        assert_eq!(err.to_string(), "Video file not found: /videos/clip.mp4");

        let err = GifError::TimedOut {
            step: Step::Encoding,
            timeout: Duration::from_secs(600),
        };
        assert_eq!(err.to_string(), "GIF encoding timed out after 600s");

        let err = GifError::WindowOutOfRange {
            start: 30.0,
            length: 12.5,
        };
        assert_eq!(
            err.to_string(),
            "Start offset 30s lies past the end of the input (12.50s long)"
        );
    }

    #[test]
    fn test_diagnostic_only_on_engine_failures() {
        let err = GifError::PaletteGenerationFailed {
            summary: "Conversion failed!".into(),
            diagnostic: "full stderr".into(),
        };
        assert_eq!(err.diagnostic(), Some("full stderr"));
        assert_eq!(err.kind(), "palette_generation_failed");
        assert_eq!(GifError::InvalidRequest("x".into()).diagnostic(), None);
    }
}
