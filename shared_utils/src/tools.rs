//! External tools detection
//! 外部工具检测

use std::ffi::OsStr;
use std::path::{Path, PathBuf};

/// Where a tool binary was found.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ToolSource {
    /// Passed explicitly (CLI flag).
    Explicit,
    /// Taken from an environment variable.
    Env(String),
    /// Found on `PATH`.
    SearchPath,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolLocation {
    pub path: PathBuf,
    pub source: ToolSource,
}

/// Resolve a tool binary: explicit path, then `env_var`, then `name` on `PATH`.
///
/// Explicit and environment paths go through `which` as well, so a bare name
/// like `ffmpeg7` is looked up on `PATH` and a path is checked for existence.
/// `None` means the tool is not installed as far as we can tell.
pub fn locate_tool(explicit: Option<&Path>, env_var: &str, name: &str) -> Option<ToolLocation> {
    if let Some(path) = explicit {
        return which::which(path).ok().map(|path| ToolLocation {
            path,
            source: ToolSource::Explicit,
        });
    }

    if let Some(value) = std::env::var_os(env_var).filter(|v| !v.is_empty()) {
        return which::which(&value).ok().map(|path| ToolLocation {
            path,
            source: ToolSource::Env(env_var.to_string()),
        });
    }

    which::which(name).ok().map(|path| ToolLocation {
        path,
        source: ToolSource::SearchPath,
    })
}

/// Find a companion binary (e.g. `ffprobe` for `ffmpeg`) in the same
/// directory as `primary`, falling back to `PATH`.
pub fn locate_sibling(primary: &Path, name: &str) -> Option<PathBuf> {
    let file_name = match primary.extension() {
        Some(ext) if ext == OsStr::new("exe") => format!("{}.exe", name),
        _ => name.to_string(),
    };
    primary
        .parent()
        .map(|dir| dir.join(&file_name))
        .filter(|candidate| candidate.is_file())
        .or_else(|| which::which(name).ok())
}
