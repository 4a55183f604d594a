//! Path Validation Module
//!
//! Input/output sanity checks done before any external tool runs.
//! 路径验证模块

use std::fmt;
use std::path::{Path, PathBuf};

/// Path validation error
/// 路径验证错误
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PathValidationError {
    /// Path is empty
    /// 路径为空
    EmptyPath,
    /// Input and output resolve to the same file
    /// 输入和输出路径相同
    InputOutputConflict { path: String },
}

impl fmt::Display for PathValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PathValidationError::EmptyPath => write!(f, "Empty path provided"),
            PathValidationError::InputOutputConflict { path } => {
                write!(f, "Input and output paths are identical: {}", path)
            }
        }
    }
}

impl std::error::Error for PathValidationError {}

/// Reject empty paths.
pub fn validate_path(path: &Path) -> Result<(), PathValidationError> {
    if path.as_os_str().is_empty() {
        return Err(PathValidationError::EmptyPath);
    }
    Ok(())
}

/// Best-effort absolute form of a path that may not exist yet.
fn absolutize(path: &Path) -> PathBuf {
    if let Ok(canonical) = path.canonicalize() {
        return canonical;
    }
    // Canonicalize the parent when only the file itself is missing.
    if let (Some(parent), Some(name)) = (path.parent(), path.file_name()) {
        let parent = if parent.as_os_str().is_empty() {
            Path::new(".")
        } else {
            parent
        };
        if let Ok(parent) = parent.canonicalize() {
            return parent.join(name);
        }
    }
    if path.is_relative() {
        std::env::current_dir().unwrap_or_default().join(path)
    } else {
        path.to_path_buf()
    }
}

/// Check if input and output paths conflict (are the same file)
/// 检查输入和输出路径是否冲突（是否为同一文件）
pub fn check_input_output_conflict(input: &Path, output: &Path) -> Result<(), PathValidationError> {
    if absolutize(input) == absolutize(output) {
        return Err(PathValidationError::InputOutputConflict {
            path: input.display().to_string(),
        });
    }
    Ok(())
}
