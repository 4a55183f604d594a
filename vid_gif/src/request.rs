//! Conversion request: parameters, validation and output path resolution.

use crate::errors::{GifError, Result};
use crate::invocation::{FrameSettings, TimeWindow};
use crate::quality::QualityPreset;
use std::path::{Path, PathBuf};

pub const DEFAULT_START_SECS: f64 = 3.0;
pub const DEFAULT_DURATION_SECS: f64 = 10.0;
pub const DEFAULT_FPS: u32 = 10;
pub const DEFAULT_MAX_WIDTH: u32 = 480;
pub const OUTPUT_EXTENSION: &str = "gif";

#[derive(Debug, Clone, PartialEq)]
pub struct ConversionRequest {
    pub input: PathBuf,
    /// Seek offset in seconds.
    pub start: f64,
    /// Window length in seconds.
    pub duration: f64,
    pub fps: u32,
    /// Output width in pixels; height follows the aspect ratio.
    pub max_width: u32,
    /// Explicit output path. `None` derives `<input stem>.gif` next to the input.
    pub output: Option<PathBuf>,
    pub quality: QualityPreset,
}

impl ConversionRequest {
    pub fn new<P: AsRef<Path>>(input: P) -> Self {
        Self {
            input: input.as_ref().to_path_buf(),
            start: DEFAULT_START_SECS,
            duration: DEFAULT_DURATION_SECS,
            fps: DEFAULT_FPS,
            max_width: DEFAULT_MAX_WIDTH,
            output: None,
            quality: QualityPreset::default(),
        }
    }

    pub fn with_window(mut self, start: f64, duration: f64) -> Self {
        self.start = start;
        self.duration = duration;
        self
    }

    pub fn with_fps(mut self, fps: u32) -> Self {
        self.fps = fps;
        self
    }

    pub fn with_max_width(mut self, max_width: u32) -> Self {
        self.max_width = max_width;
        self
    }

    pub fn with_output<P: AsRef<Path>>(mut self, output: P) -> Self {
        self.output = Some(output.as_ref().to_path_buf());
        self
    }

    pub fn with_quality(mut self, quality: QualityPreset) -> Self {
        self.quality = quality;
        self
    }

    /// Range checks only; nothing here touches the filesystem.
    pub fn validate(&self) -> Result<()> {
        shared_utils::validate_path(&self.input)
            .map_err(|e| GifError::InvalidRequest(format!("input: {}", e)))?;
        if let Some(output) = &self.output {
            shared_utils::validate_path(output)
                .map_err(|e| GifError::InvalidRequest(format!("output: {}", e)))?;
        }
        if !self.start.is_finite() || self.start < 0.0 {
            return Err(GifError::InvalidRequest(format!(
                "start must be a finite number of seconds >= 0, got {}",
                self.start
            )));
        }
        if !self.duration.is_finite() || self.duration <= 0.0 {
            return Err(GifError::InvalidRequest(format!(
                "duration must be a finite number of seconds > 0, got {}",
                self.duration
            )));
        }
        if self.fps == 0 {
            return Err(GifError::InvalidRequest("fps must be at least 1".to_string()));
        }
        if self.max_width == 0 {
            return Err(GifError::InvalidRequest(
                "max width must be at least 1 pixel".to_string(),
            ));
        }
        Ok(())
    }

    pub fn window(&self) -> TimeWindow {
        TimeWindow {
            start: self.start,
            duration: self.duration,
        }
    }

    pub fn frames(&self) -> FrameSettings {
        FrameSettings {
            fps: self.fps,
            max_width: self.max_width,
        }
    }

    pub fn output_path(&self) -> PathBuf {
        self.output
            .clone()
            .unwrap_or_else(|| derive_output_path(&self.input))
    }
}

/// Same directory and stem as the input, `.gif` extension.
pub fn derive_output_path(input: &Path) -> PathBuf {
    input.with_extension(OUTPUT_EXTENSION)
}

/// Directory the output (and the run's temporaries) live in.
pub fn output_dir(output: &Path) -> PathBuf {
    match output.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => PathBuf::from("."),
    }
}

/// Create the output directory tree; already present is fine.
pub fn prepare_output_dir(output: &Path) -> Result<PathBuf> {
    let dir = output_dir(output);
    std::fs::create_dir_all(&dir).map_err(|e| {
        GifError::io(format!("Failed to create output directory {}", dir.display()), e)
    })?;
    Ok(dir)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let req = ConversionRequest::new("clip.mp4");
        assert_eq!(req.start, 3.0);
        assert_eq!(req.duration, 10.0);
        assert_eq!(req.fps, 10);
        assert_eq!(req.max_width, 480);
        assert_eq!(req.output, None);
        assert_eq!(req.quality, QualityPreset::Medium);
        assert!(req.validate().is_ok());
    }

    #[test]
    fn test_derived_output_path() {
        assert_eq!(
            ConversionRequest::new("/videos/clip.mp4").output_path(),
            PathBuf::from("/videos/clip.gif")
        );
        assert_eq!(derive_output_path(Path::new("movie.final.mkv")), PathBuf::from("movie.final.gif"));
        assert_eq!(derive_output_path(Path::new("noext")), PathBuf::from("noext.gif"));
    }

    #[test]
    fn test_explicit_output_wins() {
        let req = ConversionRequest::new("clip.mp4").with_output("out/result.gif");
        assert_eq!(req.output_path(), PathBuf::from("out/result.gif"));
    }

    #[test]
    fn test_output_dir() {
        assert_eq!(output_dir(Path::new("result.gif")), PathBuf::from("."));
        assert_eq!(output_dir(Path::new("out/result.gif")), PathBuf::from("out"));
        assert_eq!(output_dir(Path::new("/a/b/c.gif")), PathBuf::from("/a/b"));
    }

    #[test]
    fn test_invalid_parameters() {
        let base = ConversionRequest::new("clip.mp4");
        let bad = [
            base.clone().with_window(-1.0, 10.0),
            base.clone().with_window(f64::NAN, 10.0),
            base.clone().with_window(0.0, 0.0),
            base.clone().with_window(0.0, -2.0),
            base.clone().with_window(0.0, f64::INFINITY),
            base.clone().with_fps(0),
            base.clone().with_max_width(0),
            base.clone().with_output(""),
            ConversionRequest::new(""),
        ];
        for req in bad {
            assert!(
                matches!(req.validate(), Err(GifError::InvalidRequest(_))),
                "should be rejected: {:?}",
                req
            );
        }
    }

    #[test]
    fn test_zero_start_is_valid() {
        assert!(ConversionRequest::new("clip.mp4").with_window(0.0, 0.5).validate().is_ok());
    }

    #[test]
    fn test_prepare_output_dir_creates_tree() {
        let dir = tempfile::tempdir().unwrap();
        let output = dir.path().join("out/nested/result.gif");
        let created = prepare_output_dir(&output).unwrap();
        assert!(created.is_dir());
        // second call on an existing tree succeeds
        assert_eq!(prepare_output_dir(&output).unwrap(), created);
    }
}
