//! Shared Utilities for the vid-gif tool
//!
//! - FFmpeg/ffprobe process management (stderr draining, timeouts, cancellation)
//! - Logging setup and external tool logging
//! - External tools detection
//! - Path safety and input/output conflict checks
//! - Type-safe file sizes
//! - Terminal spinner

pub mod cancel;
pub mod ffmpeg_process;
pub mod ffprobe;
pub mod logging;
pub mod path_safety;
pub mod path_validator;
pub mod progress;
pub mod tools;
pub mod types;

pub use cancel::{install_ctrlc_handler, CancelFlag};
pub use ffmpeg_process::{
    format_ffmpeg_error, get_error_suggestion, FfmpegProcess, FinishedProcess, Termination,
};
pub use path_safety::safe_path_arg;
pub use path_validator::{check_input_output_conflict, validate_path, PathValidationError};
pub use progress::create_spinner;
pub use tools::{locate_sibling, locate_tool, ToolLocation, ToolSource};
pub use types::FileSize;
