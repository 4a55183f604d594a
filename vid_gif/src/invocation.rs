//! FFmpeg argument construction for the two conversion steps.
//!
//! Both steps share the same seek/trim window and the same
//! `fps,scale` prefix, so the frames quantised by `palettegen` are the frames
//! later dithered by `paletteuse`.

use crate::quality::QualityProfile;
use shared_utils::safe_path_arg;
use std::ffi::OsString;
use std::fmt;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    PaletteGeneration,
    Encoding,
}

impl fmt::Display for Step {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Step::PaletteGeneration => f.write_str("palette generation"),
            Step::Encoding => f.write_str("GIF encoding"),
        }
    }
}

/// Seek offset and length, both in seconds.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TimeWindow {
    pub start: f64,
    pub duration: f64,
}

impl TimeWindow {
    pub fn end(&self) -> f64 {
        self.start + self.duration
    }
}

/// Frame sampling and scaling applied before quantisation.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FrameSettings {
    pub fps: u32,
    pub max_width: u32,
}

/// One engine invocation: its arguments and the file it is expected to write.
#[derive(Debug, Clone, PartialEq)]
pub struct Invocation {
    pub step: Step,
    pub args: Vec<OsString>,
    pub output: PathBuf,
}

impl Invocation {
    /// Shell-like rendering for logs.
    pub fn command_line(&self, program: &str) -> String {
        let mut line = program.to_string();
        for arg in &self.args {
            line.push(' ');
            line.push_str(&arg.to_string_lossy());
        }
        line
    }
}

/// `fps=…,scale=W:-1:flags=lanczos`; height follows the aspect ratio.
pub fn frame_filter(frames: FrameSettings) -> String {
    format!(
        "fps={},scale={}:-1:flags=lanczos",
        frames.fps, frames.max_width
    )
}

pub fn palettegen_filter(frames: FrameSettings, profile: QualityProfile) -> String {
    format!(
        "{},palettegen=max_colors={}",
        frame_filter(frames),
        profile.max_colors
    )
}

/// Input 0 is the video, input 1 the palette image.
pub fn paletteuse_filter(frames: FrameSettings, profile: QualityProfile) -> String {
    format!(
        "{}[x];[x][1:v]paletteuse=dither={}",
        frame_filter(frames),
        profile.dither
    )
}

fn window_input_args(window: TimeWindow, input: &Path) -> Vec<OsString> {
    vec![
        "-hide_banner".into(),
        "-ss".into(),
        window.start.to_string().into(),
        "-t".into(),
        window.duration.to_string().into(),
        "-i".into(),
        safe_path_arg(input).into_owned(),
    ]
}

pub fn palette_invocation(
    input: &Path,
    palette: &Path,
    window: TimeWindow,
    frames: FrameSettings,
    profile: QualityProfile,
) -> Invocation {
    let mut args = window_input_args(window, input);
    args.push("-vf".into());
    args.push(palettegen_filter(frames, profile).into());
    args.push("-y".into());
    args.push(safe_path_arg(palette).into_owned());

    Invocation {
        step: Step::PaletteGeneration,
        args,
        output: palette.to_path_buf(),
    }
}

/// `target` is written with an explicit `-f gif`, so it may carry any
/// extension (the staging file does).
pub fn encode_invocation(
    input: &Path,
    palette: &Path,
    target: &Path,
    window: TimeWindow,
    frames: FrameSettings,
    profile: QualityProfile,
) -> Invocation {
    let mut args = window_input_args(window, input);
    args.push("-i".into());
    args.push(safe_path_arg(palette).into_owned());
    args.push("-lavfi".into());
    args.push(paletteuse_filter(frames, profile).into());
    args.push("-f".into());
    args.push("gif".into());
    args.push("-y".into());
    args.push(safe_path_arg(target).into_owned());

    Invocation {
        step: Step::Encoding,
        args,
        output: target.to_path_buf(),
    }
}
