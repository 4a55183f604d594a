//! FFprobe wrapper - container duration lookup

use crate::cancel::CancelFlag;
use crate::ffmpeg_process::FfmpegProcess;
use crate::path_safety::safe_path_arg;
use std::path::Path;
use std::process::Command;
use std::time::Duration;

/// Container duration in seconds, or `None` when ffprobe fails, times out,
/// is cancelled, or reports no usable duration.
pub fn get_duration(
    ffprobe: &Path,
    input: &Path,
    timeout: Option<Duration>,
    cancel: &CancelFlag,
) -> Option<f64> {
    let mut cmd = Command::new(ffprobe);
    cmd.args([
        "-v",
        "quiet",
        "-show_entries",
        "format=duration",
        "-of",
        "default=noprint_wrappers=1:nokey=1",
    ])
    .arg(safe_path_arg(input));

    let finished = match FfmpegProcess::spawn_capturing(&mut cmd)
        .and_then(|process| process.wait_bounded(timeout, cancel))
    {
        Ok(finished) => finished,
        Err(e) => {
            tracing::debug!(error = %e, "ffprobe could not be run");
            return None;
        }
    };

    if finished.success() {
        parse_duration(&finished.stdout)
    } else {
        None
    }
}

/// Parse ffprobe's bare `format=duration` output ("12.480000", "N/A").
pub fn parse_duration(stdout: &str) -> Option<f64> {
    stdout
        .trim()
        .parse::<f64>()
        .ok()
        .filter(|d| d.is_finite() && *d > 0.0)
}
