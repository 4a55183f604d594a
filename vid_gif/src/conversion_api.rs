//! Conversion orchestrator: preflight, palette generation, encoding, cleanup.
//!
//! ## Run lifecycle
//! ```text
//! Idle → Validating → GeneratingPalette → Encoding → CleaningUp → Done
//!            │               │               │
//!            └───────────────┴───────────────┴──→ Failed
//! ```
//! No step is retried. The palette and the staging output are run-scoped
//! temp files in the output directory, removed on every exit path; the final
//! GIF only appears once encoding has fully succeeded.

use crate::engine::{EngineFailure, RunControl, VideoEngine};
use crate::errors::{GifError, Result};
use crate::invocation::{self, Invocation, Step, TimeWindow};
use crate::quality::{QualityPreset, QualityProfile};
use crate::request::{self, ConversionRequest};
use shared_utils::{format_ffmpeg_error, get_error_suggestion, FileSize};
use std::fmt;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};
use tempfile::TempPath;
use tracing::{debug, error, info, warn};

const PALETTE_PREFIX: &str = ".vid-gif-palette-";
const STAGING_PREFIX: &str = ".vid-gif-encode-";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunState {
    Idle,
    Validating,
    GeneratingPalette,
    Encoding,
    CleaningUp,
    Done,
    Failed,
}

impl RunState {
    pub fn can_transition_to(self, next: RunState) -> bool {
        use RunState::*;
        matches!(
            (self, next),
            (Idle, Validating)
                | (Validating, GeneratingPalette)
                | (GeneratingPalette, Encoding)
                | (Encoding, CleaningUp)
                | (CleaningUp, Done)
                | (Validating, Failed)
                | (GeneratingPalette, Failed)
                | (Encoding, Failed)
        )
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, RunState::Done | RunState::Failed)
    }
}

impl fmt::Display for RunState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            RunState::Idle => "idle",
            RunState::Validating => "validating",
            RunState::GeneratingPalette => "generating palette",
            RunState::Encoding => "encoding",
            RunState::CleaningUp => "cleaning up",
            RunState::Done => "done",
            RunState::Failed => "failed",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ConversionReport {
    pub output: PathBuf,
    pub size: FileSize,
    pub quality: QualityPreset,
    pub profile: QualityProfile,
    /// Window actually handed to the engine.
    pub window: TimeWindow,
    /// The requested window ran past the end of the input and was shortened.
    pub clamped: bool,
    pub engine_version: String,
    pub elapsed: Duration,
}

/// Tracks the run's state and forwards every transition to the observer.
struct RunTracker<'a> {
    state: RunState,
    observer: &'a mut dyn FnMut(RunState),
}

impl<'a> RunTracker<'a> {
    fn new(observer: &'a mut dyn FnMut(RunState)) -> Self {
        Self {
            state: RunState::Idle,
            observer,
        }
    }

    fn enter(&mut self, next: RunState) {
        debug_assert!(
            self.state.can_transition_to(next),
            "illegal run transition {:?} -> {:?}",
            self.state,
            next
        );
        debug!(from = %self.state, to = %next, "Run state transition");
        self.state = next;
        (self.observer)(next);
    }
}

/// Convert with no state observer.
pub fn convert(
    request: &ConversionRequest,
    engine: &dyn VideoEngine,
    control: &RunControl,
) -> Result<ConversionReport> {
    convert_with_observer(request, engine, control, &mut |_| {})
}

/// Convert, reporting every state transition to `observer` (progress UI).
pub fn convert_with_observer(
    request: &ConversionRequest,
    engine: &dyn VideoEngine,
    control: &RunControl,
    observer: &mut dyn FnMut(RunState),
) -> Result<ConversionReport> {
    let started = Instant::now();
    let mut run = RunTracker::new(observer);
    run.enter(RunState::Validating);

    match execute(request, engine, control, &mut run, started) {
        Ok(report) => {
            run.enter(RunState::Done);
            info!(
                output = %report.output.display(),
                size_bytes = report.size.bytes(),
                elapsed_secs = report.elapsed.as_secs_f64(),
                "GIF conversion complete"
            );
            Ok(report)
        }
        Err(e) => {
            error!(
                kind = e.kind(),
                state = %run.state,
                input = %request.input.display(),
                error = %e,
                "GIF conversion failed"
            );
            run.enter(RunState::Failed);
            Err(e)
        }
    }
}

fn execute(
    request: &ConversionRequest,
    engine: &dyn VideoEngine,
    control: &RunControl,
    run: &mut RunTracker<'_>,
    started: Instant,
) -> Result<ConversionReport> {
    // ── Validating ──
    request.validate()?;

    if !request.input.is_file() {
        return Err(GifError::InputNotFound(request.input.clone()));
    }

    let engine_version = engine.version().map_err(|reason| GifError::EngineUnavailable {
        engine: engine.name().to_string(),
        reason,
    })?;
    info!(engine = %engine_version, "Video engine available");

    let output = request.output_path();
    shared_utils::check_input_output_conflict(&request.input, &output)
        .map_err(|e| GifError::InvalidRequest(e.to_string()))?;

    let probed = engine.probe_duration(&request.input, control);
    let (window, clamped) = pin_window(request.window(), probed)?;

    let output_dir = request::prepare_output_dir(&output)?;
    let palette = create_temp(&output_dir, PALETTE_PREFIX, ".png", false)?;
    if &*palette == output.as_path() {
        return Err(GifError::InvalidRequest(format!(
            "palette path collides with output path {}",
            output.display()
        )));
    }

    let frames = request.frames();
    let profile = request.quality.profile();
    info!(
        input = %request.input.display(),
        output = %output.display(),
        start = window.start,
        duration = window.duration,
        fps = frames.fps,
        max_width = frames.max_width,
        quality = %request.quality,
        max_colors = profile.max_colors,
        dither = profile.dither,
        "Starting GIF conversion"
    );

    // ── GeneratingPalette ──
    run.enter(RunState::GeneratingPalette);
    let step = invocation::palette_invocation(&request.input, &palette, window, frames, profile);
    if let Err(e) = run_step(engine, &step, control) {
        discard(palette, "palette");
        return Err(e);
    }
    if file_is_empty(&palette) {
        discard(palette, "palette");
        return Err(GifError::PaletteGenerationFailed {
            summary: "engine produced no palette (no frames in the selected window?)".to_string(),
            diagnostic: String::new(),
        });
    }

    // ── Encoding ──
    run.enter(RunState::Encoding);
    let staging = match create_temp(&output_dir, STAGING_PREFIX, ".gif.part", true) {
        Ok(staging) => staging,
        Err(e) => {
            discard(palette, "palette");
            return Err(e);
        }
    };
    let step =
        invocation::encode_invocation(&request.input, &palette, &staging, window, frames, profile);
    if let Err(e) = run_step(engine, &step, control) {
        discard(staging, "staging output");
        discard(palette, "palette");
        return Err(e);
    }
    if file_is_empty(&staging) {
        discard(staging, "staging output");
        discard(palette, "palette");
        return Err(GifError::EncodingFailed {
            summary: "engine produced an empty GIF".to_string(),
            diagnostic: String::new(),
        });
    }

    let size = match commit_output(staging, &output) {
        Ok(size) => size,
        Err(e) => {
            discard(palette, "palette");
            return Err(e);
        }
    };

    // ── CleaningUp ──
    run.enter(RunState::CleaningUp);
    discard(palette, "palette");

    Ok(ConversionReport {
        output,
        size,
        quality: request.quality,
        profile,
        window,
        clamped,
        engine_version,
        elapsed: started.elapsed(),
    })
}

/// Fit the requested window to the probed input length.
///
/// Unknown length passes the window through unchanged. A start at or past
/// the end is an error; an end past the end is clamped.
pub fn pin_window(window: TimeWindow, input_length: Option<f64>) -> Result<(TimeWindow, bool)> {
    let Some(length) = input_length else {
        return Ok((window, false));
    };

    if window.start >= length {
        return Err(GifError::WindowOutOfRange {
            start: window.start,
            length,
        });
    }

    if window.end() > length {
        let clamped = TimeWindow {
            start: window.start,
            duration: length - window.start,
        };
        warn!(
            requested_duration = window.duration,
            clamped_duration = clamped.duration,
            input_length = length,
            "Requested window runs past the end of the input, clamping"
        );
        return Ok((clamped, true));
    }

    Ok((window, false))
}

fn run_step(engine: &dyn VideoEngine, step: &Invocation, control: &RunControl) -> Result<()> {
    if control.cancel.is_cancelled() {
        return Err(GifError::Cancelled { step: step.step });
    }

    engine
        .run(step, control)
        .map_err(|failure| map_engine_failure(step.step, failure, control))
}

fn map_engine_failure(step: Step, failure: EngineFailure, control: &RunControl) -> GifError {
    let (summary, diagnostic) = match failure {
        EngineFailure::TimedOut => {
            return GifError::TimedOut {
                step,
                timeout: control.timeout.unwrap_or_default(),
            }
        }
        EngineFailure::Cancelled => return GifError::Cancelled { step },
        EngineFailure::Spawn(reason) => (reason.clone(), reason),
        EngineFailure::Exited { code, stderr } => {
            let mut summary = format_ffmpeg_error(&stderr);
            if let Some(code) = code {
                summary = format!("{} (exit code {})", summary, code);
            }
            if let Some(hint) = get_error_suggestion(&stderr) {
                summary = format!("{}. Hint: {}", summary, hint);
            }
            (summary, stderr)
        }
    };

    match step {
        Step::PaletteGeneration => GifError::PaletteGenerationFailed {
            summary,
            diagnostic,
        },
        Step::Encoding => GifError::EncodingFailed {
            summary,
            diagnostic,
        },
    }
}

/// `shareable` creates the file like `File::create` would (0666 filtered by
/// the umask) instead of owner-only, for files that become the final output.
fn create_temp(dir: &Path, prefix: &str, suffix: &str, shareable: bool) -> Result<TempPath> {
    let mut builder = tempfile::Builder::new();
    builder.prefix(prefix).suffix(suffix);
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        if shareable {
            builder.permissions(std::fs::Permissions::from_mode(0o666));
        }
    }
    #[cfg(not(unix))]
    let _ = shareable;

    builder
        .tempfile_in(dir)
        .map(|file| file.into_temp_path())
        .map_err(|e| {
            GifError::io(
                format!("Failed to create temporary file in {}", dir.display()),
                e,
            )
        })
}

fn file_is_empty(path: &Path) -> bool {
    std::fs::metadata(path).map(|m| m.len() == 0).unwrap_or(true)
}

/// Best-effort removal; a failure is logged and never replaces the run's
/// own error.
fn discard(temp: TempPath, what: &str) {
    let path = temp.to_path_buf();
    if let Err(e) = temp.close() {
        warn!(path = %path.display(), error = %e, "[cleanup] Failed to remove temporary {}", what);
    } else {
        debug!(path = %path.display(), "[cleanup] Removed temporary {}", what);
    }
}

/// Atomically move the staging file over `output`, replacing any existing
/// file, and return the committed size. On a failed rename the staging file
/// is dropped (and removed) with the error.
fn commit_output(staging: TempPath, output: &Path) -> Result<FileSize> {
    staging.persist(output).map_err(|e| {
        GifError::io(format!("Failed to write {}", output.display()), e.error)
    })?;

    FileSize::of_file(output)
        .map_err(|e| GifError::io(format!("Failed to read size of {}", output.display()), e))
}


#[cfg(test)]
mod prop_tests {
    use super::*;
    use proptest::prelude::*;

    proptest! {
        /// A pinned window never extends past the input and never moves the start.
        #[test]
        fn prop_pinned_window_fits_input(
            start in 0.0f64..100.0,
            duration in 0.01f64..100.0,
            length in 0.01f64..200.0
        ) {
            let requested = TimeWindow { start, duration };
            match pin_window(requested, Some(length)) {
                Ok((window, clamped)) => {
                    prop_assert!(start < length);
                    prop_assert_eq!(window.start, start);
                    prop_assert!(window.duration > 0.0);
                    prop_assert!(window.end() <= length + 1e-9);
                    prop_assert_eq!(clamped, requested.end() > length);
                }
                Err(GifError::WindowOutOfRange { .. }) => prop_assert!(start >= length),
                Err(other) => prop_assert!(false, "unexpected error {:?}", other),
            }
        }
    }
}
