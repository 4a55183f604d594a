//! FFmpeg 进程管理模块 - bounded, cancellable FFmpeg child processes
//!
//! ## 问题背景
//!
//! FFmpeg writes its diagnostics to stderr. If stderr is piped but never read,
//! a chatty run fills the pipe buffer (~64KB) and the child blocks forever.
//! A child that hangs for any other reason would also hang the caller, since
//! `Command::output()` has no deadline.
//!
//! ## 解决方案
//!
//! - stderr is drained on a dedicated thread for the whole life of the child.
//! - The caller waits by polling `try_wait`, and kills the child when the
//!   deadline passes or the shared [`CancelFlag`] is tripped.
//! - On unix the child leads its own process group and the whole group is
//!   killed, so wrapper scripts cannot leave a grandchild running.
//! - Output collection after the child is gone is bounded as well: a
//!   descendant holding the pipe open does not stall the caller.
//!
//! ## 使用示例
//!
//! ```ignore
//! use shared_utils::ffmpeg_process::{FfmpegProcess, Termination};
//! use shared_utils::CancelFlag;
//! use std::process::Command;
//! use std::time::Duration;
//!
//! let mut cmd = Command::new("ffmpeg");
//! cmd.arg("-i").arg("input.mp4").arg("output.gif");
//!
//! let finished = FfmpegProcess::spawn(&mut cmd)?
//!     .wait_bounded(Some(Duration::from_secs(600)), &CancelFlag::new())?;
//! if let Termination::Exited(status) = finished.termination {
//!     // ...
//! }
//! ```

use crate::cancel::CancelFlag;
use anyhow::{Context, Result};
use std::io::{BufRead, BufReader, Read};
use std::process::{Child, Command, ExitStatus, Stdio};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError};
use std::thread;
use std::time::{Duration, Instant};
use tracing::{debug, warn};

/// How often a running child is polled for exit, timeout and cancellation.
const POLL_INTERVAL: Duration = Duration::from_millis(50);

/// How long output is still collected once the child has ended.
const OUTPUT_GRACE: Duration = Duration::from_secs(2);

// ═══════════════════════════════════════════════════════════════
// FfmpegProcess - 防死锁、可超时的 FFmpeg 进程包装器
// ═══════════════════════════════════════════════════════════════

/// How a child process came to an end.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Termination {
    /// The process exited on its own.
    Exited(ExitStatus),
    /// The deadline passed and the process was killed.
    TimedOut,
    /// The cancellation flag was tripped and the process was killed.
    Cancelled,
}

/// Result of a finished (or killed) child.
#[derive(Debug)]
pub struct FinishedProcess {
    pub termination: Termination,
    /// Everything the child wrote to stdout, when captured.
    pub stdout: String,
    /// Everything the child wrote to stderr before it ended.
    pub stderr: String,
    pub elapsed: Duration,
}

impl FinishedProcess {
    pub fn success(&self) -> bool {
        matches!(self.termination, Termination::Exited(status) if status.success())
    }

    pub fn exit_code(&self) -> Option<i32> {
        match self.termination {
            Termination::Exited(status) => status.code(),
            _ => None,
        }
    }
}

/// FFmpeg 进程包装器 - stderr is consumed on a background thread so the child
/// can never block on a full pipe.
///
/// Dropping a still-running process kills it, which keeps temporaries owned
/// by the caller from being written after they were released.
pub struct FfmpegProcess {
    child: Child,
    stdout_lines: Option<Receiver<String>>,
    stderr_lines: Option<Receiver<String>>,
    command: String,
    started: Instant,
}

impl FfmpegProcess {
    /// Spawn `cmd` with stdin/stdout detached and stderr captured.
    ///
    /// # Errors
    /// - the binary cannot be started
    /// - stderr cannot be captured
    pub fn spawn(cmd: &mut Command) -> Result<Self> {
        Self::spawn_inner(cmd, false)
    }

    /// Like [`FfmpegProcess::spawn`], but stdout is captured as well
    /// (ffprobe answers on stdout).
    pub fn spawn_capturing(cmd: &mut Command) -> Result<Self> {
        Self::spawn_inner(cmd, true)
    }

    fn spawn_inner(cmd: &mut Command, capture_stdout: bool) -> Result<Self> {
        let command = format!("{:?}", cmd);
        debug!(command = %command, "Executing FFmpeg command");

        cmd.stdin(Stdio::null())
            .stdout(if capture_stdout {
                Stdio::piped()
            } else {
                Stdio::null()
            })
            .stderr(Stdio::piped());

        #[cfg(unix)]
        {
            use std::os::unix::process::CommandExt;
            cmd.process_group(0);
        }

        let mut child = cmd
            .spawn()
            .with_context(|| format!("Failed to spawn process: {}", command))?;

        let stderr = child
            .stderr
            .take()
            .ok_or_else(|| anyhow::anyhow!("Failed to capture FFmpeg stderr"))?;
        let stderr_lines = Some(drain_lines(stderr));
        let stdout_lines = child.stdout.take().map(drain_lines);

        Ok(Self {
            child,
            stdout_lines,
            stderr_lines,
            command,
            started: Instant::now(),
        })
    }

    /// Wait for the child, killing it once `timeout` elapses or `cancel` is
    /// tripped. `None` waits without a deadline (still cancellable).
    pub fn wait_bounded(
        mut self,
        timeout: Option<Duration>,
        cancel: &CancelFlag,
    ) -> Result<FinishedProcess> {
        let termination = loop {
            if let Some(status) = self
                .child
                .try_wait()
                .context("Failed to check FFmpeg status")?
            {
                break Termination::Exited(status);
            }
            if cancel.is_cancelled() {
                self.terminate();
                break Termination::Cancelled;
            }
            if timeout.is_some_and(|limit| self.started.elapsed() >= limit) {
                self.terminate();
                break Termination::TimedOut;
            }
            thread::sleep(POLL_INTERVAL);
        };

        let elapsed = self.started.elapsed();
        let grace_deadline = Instant::now() + OUTPUT_GRACE;
        let stdout = collect_lines(self.stdout_lines.take(), grace_deadline);
        let stderr = collect_lines(self.stderr_lines.take(), grace_deadline);

        let finished = FinishedProcess {
            termination,
            stdout,
            stderr,
            elapsed,
        };

        match termination {
            Termination::Exited(_) => crate::logging::log_external_tool(
                &self.command,
                &finished.stderr,
                finished.exit_code(),
                elapsed,
            ),
            Termination::TimedOut => warn!(
                command = %self.command,
                elapsed_secs = elapsed.as_secs_f64(),
                "FFmpeg process timed out and was killed"
            ),
            Termination::Cancelled => warn!(
                command = %self.command,
                elapsed_secs = elapsed.as_secs_f64(),
                "FFmpeg process cancelled and was killed"
            ),
        }

        Ok(finished)
    }

    /// Kill the child's process group, then the child itself, and reap.
    /// Errors are logged: the child may have exited between the last poll
    /// and the kill.
    fn terminate(&mut self) {
        // the group id is the child's pid, still reserved until it is reaped
        #[cfg(unix)]
        kill_process_group(self.child.id());

        if let Err(e) = self.child.kill() {
            debug!(error = %e, "Kill on FFmpeg process failed");
        }
        if let Err(e) = self.child.wait() {
            warn!(error = %e, "Failed to reap killed FFmpeg process");
        }
    }
}

#[cfg(unix)]
fn kill_process_group(pgid: u32) {
    let Ok(pgid) = libc::pid_t::try_from(pgid) else {
        return;
    };
    // SAFETY: kill(2) only sends a signal; a negative pid addresses the group.
    if unsafe { libc::kill(-pgid, libc::SIGKILL) } != 0 {
        debug!(
            error = %std::io::Error::last_os_error(),
            "Kill on FFmpeg process group failed"
        );
    }
}

/// Forward lines from `source` over a channel until EOF or until the
/// receiver is dropped.
fn drain_lines<R: Read + Send + 'static>(source: R) -> Receiver<String> {
    let (tx, rx) = mpsc::channel();
    thread::spawn(move || {
        for line in BufReader::new(source).lines().map_while(|l| l.ok()) {
            if tx.send(line).is_err() {
                break;
            }
        }
    });
    rx
}

/// Gather drained lines until the writer side closes or `deadline` passes.
fn collect_lines(lines: Option<Receiver<String>>, deadline: Instant) -> String {
    let Some(lines) = lines else {
        return String::new();
    };
    let mut buf = String::new();
    loop {
        match lines.recv_timeout(deadline.saturating_duration_since(Instant::now())) {
            Ok(line) => {
                buf.push_str(&line);
                buf.push('\n');
            }
            Err(RecvTimeoutError::Disconnected) => break,
            Err(RecvTimeoutError::Timeout) => {
                for line in lines.try_iter() {
                    buf.push_str(&line);
                    buf.push('\n');
                }
                debug!("Output pipe still held open after the process ended, not waiting further");
                break;
            }
        }
    }
    buf
}

impl Drop for FfmpegProcess {
    fn drop(&mut self) {
        if let Ok(None) = self.child.try_wait() {
            self.terminate();
        }
    }
}

// ═══════════════════════════════════════════════════════════════
// FFmpeg 错误格式化
// ═══════════════════════════════════════════════════════════════

/// Pull the most meaningful line out of FFmpeg's stderr.
///
/// 1. the last line mentioning "Error"/"error"
/// 2. otherwise the last non-empty line that is not a progress line
/// 3. otherwise "Unknown FFmpeg error"
pub fn format_ffmpeg_error(stderr: &str) -> String {
    if let Some(error_line) = stderr
        .lines()
        .rev()
        .find(|line| line.contains("Error") || line.contains("error"))
    {
        return error_line.trim().to_string();
    }

    stderr
        .lines()
        .rev()
        .find(|line| {
            let trimmed = line.trim();
            !trimmed.is_empty()
                && !trimmed.starts_with("frame=")
                && !trimmed.starts_with("fps=")
                && !trimmed.starts_with("size=")
        })
        .map(|s| s.trim().to_string())
        .unwrap_or_else(|| "Unknown FFmpeg error".to_string())
}

/// Map common FFmpeg failure patterns to an actionable hint.
pub fn get_error_suggestion(stderr: &str) -> Option<String> {
    let patterns = [
        ("No such file or directory", "Check that the input path is correct"),
        ("Invalid data found", "The input file may be corrupted or not a video"),
        ("Permission denied", "Check read/write permissions on input and output"),
        (
            "Output file is empty",
            "No frames were decoded; the start offset may lie past the end of the video",
        ),
        (
            "does not contain any stream",
            "The input has no video stream to convert",
        ),
        ("moov atom not found", "The MP4 file is incomplete (truncated download?)"),
        ("Invalid NAL unit size", "The video stream is damaged"),
        ("No such filter", "This FFmpeg build lacks palettegen/paletteuse; install a full build"),
    ];

    patterns
        .iter()
        .find(|(pattern, _)| stderr.contains(pattern))
        .map(|(_, suggestion)| suggestion.to_string())
}

// ═══════════════════════════════════════════════════════════════
// 单元测试
// ═══════════════════════════════════════════════════════════════

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_ffmpeg_error_with_error_line() {
        let stderr = r#"
frame=  100 fps=25.0 q=28.0 size=    1024kB time=00:00:04.00 bitrate=2097.2kbits/s
[Parsed_palettegen_2 @ 0x7f8b8c000000] Error: invalid parameter
"#;
        let error = format_ffmpeg_error(stderr);
        assert!(error.contains("Error"));
        assert!(error.contains("invalid parameter"));
    }

    #[test]
    fn test_format_ffmpeg_error_no_error_line() {
        let stderr = r#"
frame=  100 fps=25.0 q=28.0 size=    1024kB time=00:00:04.00
Conversion failed!
"#;
        assert_eq!(format_ffmpeg_error(stderr), "Conversion failed!");
    }

    #[test]
    fn test_format_ffmpeg_error_empty() {
        assert_eq!(format_ffmpeg_error(""), "Unknown FFmpeg error");
    }

    #[test]
    fn test_error_suggestion() {
        assert!(get_error_suggestion("clip.mp4: No such file or directory").is_some());
        assert!(get_error_suggestion("Output file is empty, nothing was encoded").is_some());
        assert_eq!(get_error_suggestion("all good"), None);
    }

    #[cfg(unix)]
    #[test]
    fn test_wait_bounded_collects_stderr_and_status() {
        let mut cmd = Command::new("sh");
        cmd.args(["-c", "echo 'palettegen went wrong' >&2; exit 3"]);
        let finished = FfmpegProcess::spawn(&mut cmd)
            .unwrap()
            .wait_bounded(Some(Duration::from_secs(10)), &CancelFlag::new())
            .unwrap();
        assert!(!finished.success());
        assert_eq!(finished.exit_code(), Some(3));
        assert!(finished.stderr.contains("palettegen went wrong"));
    }

    #[cfg(unix)]
    #[test]
    fn test_wait_bounded_kills_on_timeout() {
        let mut cmd = Command::new("sleep");
        cmd.arg("30");
        let finished = FfmpegProcess::spawn(&mut cmd)
            .unwrap()
            .wait_bounded(Some(Duration::from_millis(200)), &CancelFlag::new())
            .unwrap();
        assert_eq!(finished.termination, Termination::TimedOut);
        assert!(finished.elapsed < Duration::from_secs(10));
    }

    #[cfg(unix)]
    #[test]
    fn test_wait_bounded_honours_cancellation() {
        let cancel = CancelFlag::new();
        cancel.cancel();
        let mut cmd = Command::new("sleep");
        cmd.arg("30");
        let finished = FfmpegProcess::spawn(&mut cmd)
            .unwrap()
            .wait_bounded(None, &cancel)
            .unwrap();
        assert_eq!(finished.termination, Termination::Cancelled);
        assert_eq!(finished.exit_code(), None);
    }

    #[cfg(unix)]
    #[test]
    fn test_spawn_capturing_reads_stdout() {
        let mut cmd = Command::new("sh");
        cmd.args(["-c", "echo 12.480000"]);
        let finished = FfmpegProcess::spawn_capturing(&mut cmd)
            .unwrap()
            .wait_bounded(Some(Duration::from_secs(10)), &CancelFlag::new())
            .unwrap();
        assert!(finished.success());
        assert_eq!(finished.stdout.trim(), "12.480000");
    }

    #[cfg(unix)]
    #[test]
    fn test_timeout_is_enforced_through_a_wrapper_shell() {
        // no `exec`: the shell forks `sleep` and the pipe outlives the shell
        let mut cmd = Command::new("sh");
        cmd.args(["-c", "sleep 8; echo done"]);
        let started = Instant::now();
        let finished = FfmpegProcess::spawn(&mut cmd)
            .unwrap()
            .wait_bounded(Some(Duration::from_millis(300)), &CancelFlag::new())
            .unwrap();
        assert_eq!(finished.termination, Termination::TimedOut);
        assert!(started.elapsed() < Duration::from_secs(4), "took {:?}", started.elapsed());
    }

    #[cfg(unix)]
    #[test]
    fn test_kill_reaches_background_descendants() {
        let dir = tempfile::tempdir().unwrap();
        let marker = dir.path().join("late-write");
        let script = format!("(sleep 1; touch '{}') & wait", marker.display());
        let mut cmd = Command::new("sh");
        cmd.args(["-c", &script]);
        let finished = FfmpegProcess::spawn(&mut cmd)
            .unwrap()
            .wait_bounded(Some(Duration::from_millis(200)), &CancelFlag::new())
            .unwrap();
        assert_eq!(finished.termination, Termination::TimedOut);

        thread::sleep(Duration::from_millis(1500));
        assert!(!marker.exists(), "descendant survived the kill");
    }

    #[test]
    fn test_collect_lines_stops_at_deadline() {
        let (tx, rx) = mpsc::channel();
        tx.send("partial".to_string()).unwrap();
        // sender kept alive: the pipe never closes
        let collected = collect_lines(Some(rx), Instant::now() + Duration::from_millis(100));
        assert_eq!(collected, "partial\n");
        drop(tx);
    }

    #[test]
    fn test_spawn_missing_binary_fails() {
        let mut cmd = Command::new("definitely-not-a-real-ffmpeg-binary");
        assert!(FfmpegProcess::spawn(&mut cmd).is_err());
    }
}

// ═══════════════════════════════════════════════════════════════
// 属性测试
// ═══════════════════════════════════════════════════════════════
