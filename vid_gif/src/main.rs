use clap::Parser;
use console::style;
use shared_utils::logging::{init_logging, LogConfig};
use shared_utils::{create_spinner, install_ctrlc_handler, CancelFlag};
use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Duration;
use tracing::{warn, Level};

use vid_gif::request::{DEFAULT_DURATION_SECS, DEFAULT_FPS, DEFAULT_MAX_WIDTH, DEFAULT_START_SECS};
use vid_gif::{
    convert_with_observer, ConversionReport, ConversionRequest, FfmpegEngine, GifError,
    QualityPreset, RunControl, RunState,
};

const LOG_DIR_ENV_VAR: &str = "VID_GIF_LOG_DIR";
const DEFAULT_TIMEOUT_SECS: u64 = 600;

const EXAMPLES: &str = "\
Examples:
  # 10 seconds starting at 3s (defaults)
  vid-gif my_video.mp4

  # 15 seconds starting from 5 seconds
  vid-gif my_video.mp4 --start 5 --duration 15

  # High quality, 15 fps
  vid-gif my_video.mp4 --quality high --fps 15

  # Custom output path
  vid-gif my_video.mp4 --output ./output/result.gif";

#[derive(Parser, Debug)]
#[command(name = "vid-gif")]
#[command(version, about = "Convert a segment of a video to a single GIF", long_about = None)]
#[command(after_help = EXAMPLES)]
struct Cli {
    /// Path to the input video file
    #[arg(value_name = "INPUT")]
    input: PathBuf,

    /// Start time in seconds
    #[arg(short, long, value_name = "SECONDS", default_value_t = DEFAULT_START_SECS)]
    start: f64,

    /// Duration in seconds
    #[arg(short, long, value_name = "SECONDS", default_value_t = DEFAULT_DURATION_SECS)]
    duration: f64,

    /// Frames per second
    #[arg(short, long, default_value_t = DEFAULT_FPS,
          value_parser = clap::value_parser!(u32).range(1..))]
    fps: u32,

    /// Maximum width in pixels (height keeps the aspect ratio)
    #[arg(short = 'w', long, value_name = "PIXELS", default_value_t = DEFAULT_MAX_WIDTH,
          value_parser = clap::value_parser!(u32).range(1..))]
    max_width: u32,

    /// Output file path (default: same name as the video with .gif extension)
    #[arg(short, long, value_name = "PATH")]
    output: Option<PathBuf>,

    /// Quality preset
    #[arg(short, long, value_enum, default_value_t = QualityPreset::Medium)]
    quality: QualityPreset,

    /// Per-step FFmpeg timeout in seconds (0 disables)
    #[arg(long, value_name = "SECONDS", default_value_t = DEFAULT_TIMEOUT_SECS)]
    timeout: u64,

    /// FFmpeg binary to use (default: $VID_GIF_FFMPEG, then PATH)
    #[arg(long, value_name = "PATH")]
    ffmpeg: Option<PathBuf>,

    /// Directory for log files (default: $VID_GIF_LOG_DIR, then the system temp dir)
    #[arg(long, value_name = "DIR")]
    log_dir: Option<PathBuf>,

    /// Show debug logging on the terminal
    #[arg(short, long)]
    verbose: bool,
}

impl Cli {
    fn request(&self) -> ConversionRequest {
        let mut request = ConversionRequest::new(&self.input)
            .with_window(self.start, self.duration)
            .with_fps(self.fps)
            .with_max_width(self.max_width)
            .with_quality(self.quality);
        if let Some(output) = &self.output {
            request = request.with_output(output);
        }
        request
    }

    fn timeout(&self) -> Option<Duration> {
        (self.timeout > 0).then(|| Duration::from_secs(self.timeout))
    }

    fn log_config(&self) -> LogConfig {
        let mut config = LogConfig::default();
        if let Some(dir) = self
            .log_dir
            .clone()
            .or_else(|| std::env::var_os(LOG_DIR_ENV_VAR).map(PathBuf::from))
        {
            config = config.with_log_dir(dir);
        }
        if self.verbose {
            config = config.with_level(Level::DEBUG).with_stderr_level(Level::DEBUG);
        }
        config
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let log_config = cli.log_config();
    let log_dir = log_config.log_dir.clone();
    if let Err(e) = init_logging("vid_gif", log_config) {
        eprintln!("⚠️  Could not initialise logging: {:#}", e);
    }

    let cancel = CancelFlag::new();
    if let Err(e) = install_ctrlc_handler(&cancel) {
        warn!(error = %e, "Ctrl-C will not cancel running FFmpeg steps");
    }

    match run(&cli, cancel) {
        Ok(report) => {
            print_report(&report);
            ExitCode::SUCCESS
        }
        Err(e) => {
            eprintln!("{} {}", style("✗ Error:").red().bold(), e);
            if let Some(diagnostic) = e.diagnostic().filter(|d| !d.trim().is_empty()) {
                if cli.verbose {
                    eprintln!("{}", style("FFmpeg output:").dim());
                    eprintln!("{}", diagnostic.trim_end());
                } else {
                    eprintln!(
                        "  Full FFmpeg output is in the log under {} (or rerun with --verbose)",
                        log_dir.display()
                    );
                }
            }
            ExitCode::from(1)
        }
    }
}

fn run(cli: &Cli, cancel: CancelFlag) -> Result<ConversionReport, GifError> {
    let request = cli.request();
    let engine = FfmpegEngine::locate(cli.ffmpeg.as_deref());
    let control = RunControl::new(cli.timeout(), cancel);

    println!("Input video: {}", request.input.display());
    println!(
        "Converting {}s starting from {}s",
        request.duration, request.start
    );
    println!("Output: {}", request.output_path().display());

    let spinner = create_spinner("Validating...", !console::user_attended_stderr());
    convert_with_observer(&request, &engine, &control, &mut |state| match state {
        RunState::GeneratingPalette => spinner.set_message("Generating color palette..."),
        RunState::Encoding => spinner.set_message("Creating GIF..."),
        RunState::CleaningUp => spinner.set_message("Cleaning up..."),
        RunState::Done | RunState::Failed => spinner.finish_and_clear(),
        RunState::Idle | RunState::Validating => {}
    })
}

fn print_report(report: &ConversionReport) {
    println!();
    println!(
        "{} Created: {}",
        style("✓ Success!").green().bold(),
        report.output.display()
    );
    println!("  File size: {}", report.size);
    if report.clamped {
        println!(
            "  {} input is shorter than requested, converted {:.2}s from {}s",
            style("note:").yellow(),
            report.window.duration,
            report.window.start
        );
    }
}
