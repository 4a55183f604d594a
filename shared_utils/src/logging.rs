//! Log setup for the vid-gif binaries.
//!
//! Two sinks share one `tracing` registry:
//! - `<dir>/<program>.log.<date>`, rotated daily, kept to the newest `max_files`
//! - stderr, normally limited to warnings so the terminal stays readable
//!
//! `RUST_LOG` replaces the default target directives when set.
//!
//! ```no_run
//! use shared_utils::logging::{init_logging, LogConfig};
//! use tracing::Level;
//!
//! let config = LogConfig::default().with_stderr_level(Level::DEBUG);
//! if let Err(e) = init_logging("vid_gif", config) {
//!     eprintln!("logging disabled: {:#}", e);
//! }
//! tracing::info!(input = "clip.mp4", "starting");
//! ```

use anyhow::{Context, Result};
use std::fs;
use std::io::IsTerminal;
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};
use tracing::Level;
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::filter::{EnvFilter, LevelFilter};
use tracing_subscriber::prelude::*;

const DEFAULT_KEEP: usize = 5;

#[derive(Debug, Clone)]
pub struct LogConfig {
    /// Where the rolling log files live. Defaults to the system temp dir.
    pub log_dir: PathBuf,
    /// Rotated files kept after startup pruning.
    pub max_files: usize,
    /// File sink level.
    pub level: Level,
    /// Terminal sink level.
    pub stderr_level: Level,
}

impl Default for LogConfig {
    fn default() -> Self {
        LogConfig {
            log_dir: std::env::temp_dir(),
            max_files: DEFAULT_KEEP,
            level: Level::INFO,
            stderr_level: Level::WARN,
        }
    }
}

impl LogConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_log_dir(self, dir: impl AsRef<Path>) -> Self {
        LogConfig {
            log_dir: dir.as_ref().into(),
            ..self
        }
    }

    pub fn with_max_files(self, max_files: usize) -> Self {
        LogConfig { max_files, ..self }
    }

    pub fn with_level(self, level: Level) -> Self {
        LogConfig { level, ..self }
    }

    pub fn with_stderr_level(self, stderr_level: Level) -> Self {
        LogConfig {
            stderr_level,
            ..self
        }
    }

    /// Directives for the program's own target and `shared_utils`, at the
    /// more verbose of the two sink levels so neither sink is starved.
    fn default_directives(&self, program: &str) -> String {
        let level = std::cmp::max(self.level, self.stderr_level);
        [program, "shared_utils"]
            .iter()
            .map(|target| format!("{}={}", target, level))
            .collect::<Vec<_>>()
            .join(",")
    }

    fn file_prefix(program: &str) -> String {
        format!("{}.log", program)
    }
}

/// Install the global subscriber. Fails if one is already installed.
pub fn init_logging(program: &str, config: LogConfig) -> Result<()> {
    fs::create_dir_all(&config.log_dir)
        .with_context(|| format!("cannot create log directory {}", config.log_dir.display()))?;

    let prefix = LogConfig::file_prefix(program);
    let appender = RollingFileAppender::new(Rotation::DAILY, &config.log_dir, &prefix);
    let filter = match EnvFilter::try_from_default_env() {
        Ok(from_env) => from_env,
        Err(_) => EnvFilter::new(config.default_directives(program)),
    };

    let to_file = tracing_subscriber::fmt::layer()
        .with_ansi(false)
        .with_thread_ids(true)
        .with_line_number(true)
        .with_writer(appender)
        .with_filter(LevelFilter::from_level(config.level));
    let to_terminal = tracing_subscriber::fmt::layer()
        .with_ansi(use_ansi(&std::io::stderr()))
        .with_target(false)
        .with_writer(std::io::stderr)
        .with_filter(LevelFilter::from_level(config.stderr_level));

    tracing_subscriber::registry()
        .with(filter)
        .with(to_file)
        .with(to_terminal)
        .try_init()
        .context("a global tracing subscriber is already installed")?;

    let removed = prune_logs(&config.log_dir, &prefix, config.max_files)?;
    tracing::info!(
        program,
        log_dir = %config.log_dir.display(),
        file_level = %config.level,
        terminal_level = %config.stderr_level,
        pruned = removed,
        "Logging initialised"
    );
    Ok(())
}

/// Colour only when the stream is an interactive terminal; piped or
/// redirected output stays plain.
fn use_ansi(stream: &impl IsTerminal) -> bool {
    stream.is_terminal()
}

/// Delete all but the `keep` most recently modified files named
/// `<prefix>*` in `dir`. Returns how many were removed.
fn prune_logs(dir: &Path, prefix: &str, keep: usize) -> Result<usize> {
    let mut logs: Vec<(SystemTime, PathBuf)> = fs::read_dir(dir)
        .with_context(|| format!("cannot list log directory {}", dir.display()))?
        .filter_map(|entry| entry.ok())
        .filter(|entry| entry.file_name().to_string_lossy().starts_with(prefix))
        .filter_map(|entry| {
            let meta = entry.metadata().ok()?;
            meta.is_file()
                .then(|| meta.modified().ok())
                .flatten()
                .map(|mtime| (mtime, entry.path()))
        })
        .collect();

    logs.sort_unstable_by(|a, b| b.0.cmp(&a.0));

    let mut removed = 0;
    for (_, path) in logs.into_iter().skip(keep) {
        match fs::remove_file(&path) {
            Ok(()) => removed += 1,
            Err(e) => tracing::warn!(path = %path.display(), error = %e, "Could not prune old log"),
        }
    }
    Ok(removed)
}

/// Record one finished external command. Failures carry the captured output;
/// successful runs only log it at `debug`.
pub fn log_external_tool(command: &str, output: &str, exit_code: Option<i32>, elapsed: Duration) {
    let secs = elapsed.as_secs_f64();
    match exit_code {
        Some(0) => {
            tracing::info!(command, elapsed_secs = secs, "External command succeeded");
            tracing::debug!(command, output, "External command output");
        }
        Some(code) => tracing::error!(
            command,
            exit_code = code,
            elapsed_secs = secs,
            output,
            "External command failed"
        ),
        None => tracing::error!(
            command,
            elapsed_secs = secs,
            output,
            "External command killed by a signal"
        ),
    }
}
