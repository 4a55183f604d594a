//! vid-gif - Video segment → animated GIF via FFmpeg
//!
//! Cuts a time window out of a video and converts it with FFmpeg's two-pass
//! palette workflow (`palettegen`, then `paletteuse`):
//! - quality presets map to palette size and dithering
//! - every engine call is time-bounded and cancellable
//! - intermediate files are unique per run, so concurrent runs are safe
//!
//! ```rust,ignore
//! use vid_gif::{convert, ConversionRequest, FfmpegEngine, QualityPreset, RunControl};
//!
//! let request = ConversionRequest::new("clip.mp4")
//!     .with_window(5.0, 15.0)
//!     .with_quality(QualityPreset::High);
//! let engine = FfmpegEngine::locate(None);
//! let report = convert(&request, &engine, &RunControl::default())?;
//! println!("{} ({})", report.output.display(), report.size);
//! ```

pub mod conversion_api;
pub mod engine;
pub mod errors;
pub mod invocation;
pub mod quality;
pub mod request;

pub use conversion_api::{convert, convert_with_observer, ConversionReport, RunState};
pub use engine::{EngineFailure, FfmpegEngine, RunControl, VideoEngine, FFMPEG_ENV_VAR};
pub use errors::{GifError, Result};
pub use invocation::{Invocation, Step, TimeWindow};
pub use quality::{QualityPreset, QualityProfile};
pub use request::ConversionRequest;
