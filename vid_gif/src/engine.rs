//! Binding to the external video engine.
//!
//! The orchestrator only talks to [`VideoEngine`]; [`FfmpegEngine`] is the
//! production implementation backed by the `ffmpeg`/`ffprobe` binaries.

use crate::invocation::Invocation;
use shared_utils::ffmpeg_process::{FfmpegProcess, Termination};
use shared_utils::{locate_sibling, locate_tool, CancelFlag, ToolLocation};
use std::path::{Path, PathBuf};
use std::process::Command;
use std::time::Duration;

/// Environment variable naming the ffmpeg binary.
pub const FFMPEG_ENV_VAR: &str = "VID_GIF_FFMPEG";

const VERSION_TIMEOUT: Duration = Duration::from_secs(15);
const PROBE_TIMEOUT: Duration = Duration::from_secs(30);

/// Per-run limits applied to every engine invocation.
#[derive(Debug, Clone, Default)]
pub struct RunControl {
    /// `None` waits indefinitely.
    pub timeout: Option<Duration>,
    pub cancel: CancelFlag,
}

impl RunControl {
    pub fn new(timeout: Option<Duration>, cancel: CancelFlag) -> Self {
        Self { timeout, cancel }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EngineFailure {
    /// The engine could not be started or waited on.
    Spawn(String),
    /// The engine ran and reported failure.
    Exited { code: Option<i32>, stderr: String },
    TimedOut,
    Cancelled,
}

pub trait VideoEngine: Send + Sync {
    /// Short name for messages ("ffmpeg").
    fn name(&self) -> &str;

    /// Health check. `Err` carries a human-readable reason.
    fn version(&self) -> Result<String, String>;

    /// Input length in seconds, when the engine can tell.
    fn probe_duration(&self, input: &Path, control: &RunControl) -> Option<f64>;

    /// Run one invocation to completion.
    fn run(&self, invocation: &Invocation, control: &RunControl) -> Result<(), EngineFailure>;
}

/// `ffmpeg` found via flag, `VID_GIF_FFMPEG`, or `PATH`.
#[derive(Debug, Clone)]
pub struct FfmpegEngine {
    ffmpeg: Option<ToolLocation>,
    ffprobe: Option<PathBuf>,
}

impl FfmpegEngine {
    pub fn locate(explicit: Option<&Path>) -> Self {
        let ffmpeg = locate_tool(explicit, FFMPEG_ENV_VAR, "ffmpeg");
        let ffprobe = ffmpeg
            .as_ref()
            .and_then(|loc| locate_sibling(&loc.path, "ffprobe"));
        match &ffmpeg {
            Some(loc) => tracing::debug!(
                ffmpeg = %loc.path.display(),
                source = ?loc.source,
                ffprobe = ?ffprobe,
                "Located video engine"
            ),
            None => tracing::debug!("ffmpeg not located"),
        }
        Self { ffmpeg, ffprobe }
    }

    pub fn binary(&self) -> Option<&Path> {
        self.ffmpeg.as_ref().map(|loc| loc.path.as_path())
    }
}

impl VideoEngine for FfmpegEngine {
    fn name(&self) -> &str {
        "ffmpeg"
    }

    fn version(&self) -> Result<String, String> {
        let binary = self.binary().ok_or_else(|| {
            format!(
                "not found in PATH (install FFmpeg, pass --ffmpeg or set {})",
                FFMPEG_ENV_VAR
            )
        })?;

        let mut cmd = Command::new(binary);
        cmd.arg("-version");
        let finished = FfmpegProcess::spawn_capturing(&mut cmd)
            .and_then(|p| p.wait_bounded(Some(VERSION_TIMEOUT), &CancelFlag::new()))
            .map_err(|e| format!("{:#}", e))?;

        if !finished.success() {
            return Err(format!(
                "`{} -version` failed: {}",
                binary.display(),
                shared_utils::format_ffmpeg_error(&finished.stderr)
            ));
        }

        Ok(finished
            .stdout
            .lines()
            .next()
            .map(|l| l.trim().to_string())
            .filter(|l| !l.is_empty())
            .unwrap_or_else(|| "ffmpeg (unknown version)".to_string()))
    }

    fn probe_duration(&self, input: &Path, control: &RunControl) -> Option<f64> {
        let ffprobe = self.ffprobe.as_deref()?;
        let timeout = control
            .timeout
            .map_or(PROBE_TIMEOUT, |t| t.min(PROBE_TIMEOUT));
        shared_utils::ffprobe::get_duration(ffprobe, input, Some(timeout), &control.cancel)
    }

    fn run(&self, invocation: &Invocation, control: &RunControl) -> Result<(), EngineFailure> {
        let binary = self
            .binary()
            .ok_or_else(|| EngineFailure::Spawn("ffmpeg binary not located".to_string()))?;

        tracing::info!(
            step = %invocation.step,
            command = %invocation.command_line(&binary.display().to_string()),
            "Running engine step"
        );

        let mut cmd = Command::new(binary);
        cmd.args(&invocation.args);
        let finished = FfmpegProcess::spawn(&mut cmd)
            .and_then(|p| p.wait_bounded(control.timeout, &control.cancel))
            .map_err(|e| EngineFailure::Spawn(format!("{:#}", e)))?;

        step_outcome(finished.termination, finished.stderr, &control.cancel)
    }
}

/// A Ctrl-C in the terminal also reaches FFmpeg, which then exits non-zero
/// on its own before the flag is polled. Once the flag is set, any failed
/// exit counts as a cancellation.
fn step_outcome(
    termination: Termination,
    stderr: String,
    cancel: &CancelFlag,
) -> Result<(), EngineFailure> {
    match termination {
        Termination::Exited(status) if status.success() => Ok(()),
        Termination::Exited(_) if cancel.is_cancelled() => Err(EngineFailure::Cancelled),
        Termination::Exited(status) => Err(EngineFailure::Exited {
            code: status.code(),
            stderr,
        }),
        Termination::TimedOut => Err(EngineFailure::TimedOut),
        Termination::Cancelled => Err(EngineFailure::Cancelled),
    }
}

/// Scriptable in-process engine for orchestrator tests.
#[cfg(test)]
pub(crate) mod fake {
    use super::*;
    use crate::invocation::Step;
    use std::sync::Mutex;

    pub const GIF_BYTES: &[u8] = b"GIF89a fake animation";
    pub const PALETTE_BYTES: &[u8] = b"\x89PNG fake palette";

    #[derive(Debug, Clone)]
    pub enum Behaviour {
        Succeed,
        /// Write a partial file, then fail.
        Fail { stderr: String },
        /// Succeed without writing anything.
        WriteNothing,
        TimeOut,
        Cancel,
    }

    #[derive(Debug)]
    pub struct FakeEngine {
        pub available: bool,
        pub duration: Option<f64>,
        pub palette: Behaviour,
        pub encode: Behaviour,
        /// Content written for successful encodes.
        pub gif_bytes: Vec<u8>,
        pub calls: Mutex<Vec<Invocation>>,
        pub version_calls: Mutex<u32>,
        /// Files seen on disk while each step ran.
        pub palette_existed_during_encode: Mutex<Option<bool>>,
    }

    impl Default for FakeEngine {
        fn default() -> Self {
            Self {
                available: true,
                duration: None,
                palette: Behaviour::Succeed,
                encode: Behaviour::Succeed,
                gif_bytes: GIF_BYTES.to_vec(),
                calls: Mutex::new(Vec::new()),
                version_calls: Mutex::new(0),
                palette_existed_during_encode: Mutex::new(None),
            }
        }
    }

    impl FakeEngine {
        pub fn calls(&self) -> Vec<Invocation> {
            self.calls.lock().unwrap().clone()
        }

        pub fn version_calls(&self) -> u32 {
            *self.version_calls.lock().unwrap()
        }
    }

    impl VideoEngine for FakeEngine {
        fn name(&self) -> &str {
            "fake-ffmpeg"
        }

        fn version(&self) -> Result<String, String> {
            *self.version_calls.lock().unwrap() += 1;
            if self.available {
                Ok("fake-ffmpeg version 1.0".to_string())
            } else {
                Err("not found in PATH".to_string())
            }
        }

        fn probe_duration(&self, _input: &Path, _control: &RunControl) -> Option<f64> {
            self.duration
        }

        fn run(&self, invocation: &Invocation, _control: &RunControl) -> Result<(), EngineFailure> {
            self.calls.lock().unwrap().push(invocation.clone());
            let (behaviour, bytes) = match invocation.step {
                Step::PaletteGeneration => (&self.palette, PALETTE_BYTES.to_vec()),
                Step::Encoding => {
                    // palette is the argument after the second `-i`
                    let palette_path = invocation
                        .args
                        .iter()
                        .enumerate()
                        .filter(|(_, a)| a.to_string_lossy() == "-i")
                        .nth(1)
                        .and_then(|(i, _)| invocation.args.get(i + 1))
                        .map(PathBuf::from);
                    *self.palette_existed_during_encode.lock().unwrap() =
                        palette_path.map(|p| p.is_file());
                    (&self.encode, self.gif_bytes.clone())
                }
            };
            match behaviour {
                Behaviour::Succeed => {
                    std::fs::write(&invocation.output, bytes)
                        .map_err(|e| EngineFailure::Spawn(e.to_string()))?;
                    Ok(())
                }
                Behaviour::Fail { stderr } => {
                    let _ = std::fs::write(&invocation.output, b"partial");
                    Err(EngineFailure::Exited {
                        code: Some(1),
                        stderr: stderr.clone(),
                    })
                }
                Behaviour::WriteNothing => Ok(()),
                Behaviour::TimeOut => Err(EngineFailure::TimedOut),
                Behaviour::Cancel => Err(EngineFailure::Cancelled),
            }
        }
    }
}
