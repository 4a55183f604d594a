//! FileSize Type-Safe Wrapper
//!
//! 类型安全的文件大小，带自动单位显示。

use std::fmt;

/// 类型安全的文件大小（字节）
///
/// # Examples
/// ```
/// use shared_utils::types::file_size::FileSize;
///
/// let size = FileSize::new(1024 * 1024);
/// assert_eq!(size.bytes(), 1048576);
/// assert_eq!(size.display(), "1.00 MB");
/// assert_eq!(FileSize::new(512).display(), "512 B");
/// ```
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct FileSize(u64);

impl FileSize {
    pub const ZERO: FileSize = FileSize(0);

    pub const KB: u64 = 1024;
    pub const MB: u64 = 1024 * 1024;
    pub const GB: u64 = 1024 * 1024 * 1024;

    #[inline]
    pub const fn new(bytes: u64) -> Self {
        Self(bytes)
    }

    /// Size of the file at `path`.
    pub fn of_file(path: &std::path::Path) -> std::io::Result<Self> {
        std::fs::metadata(path).map(|m| Self(m.len()))
    }

    #[inline]
    pub const fn bytes(&self) -> u64 {
        self.0
    }

    #[inline]
    pub const fn is_zero(&self) -> bool {
        self.0 == 0
    }

    /// Size in mebibytes as a float.
    pub fn as_mb(&self) -> f64 {
        self.0 as f64 / Self::MB as f64
    }

    /// 格式化显示（自动选择单位）
    pub fn display(&self) -> String {
        if self.0 >= Self::GB {
            format!("{:.2} GB", self.0 as f64 / Self::GB as f64)
        } else if self.0 >= Self::MB {
            format!("{:.2} MB", self.as_mb())
        } else if self.0 >= Self::KB {
            format!("{:.2} KB", self.0 as f64 / Self::KB as f64)
        } else {
            format!("{} B", self.0)
        }
    }
}

impl fmt::Debug for FileSize {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "FileSize({} bytes)", self.0)
    }
}

impl fmt::Display for FileSize {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.display())
    }
}

impl From<u64> for FileSize {
    fn from(bytes: u64) -> Self {
        Self(bytes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_units() {
        assert_eq!(FileSize::ZERO.display(), "0 B");
        assert_eq!(FileSize::new(1023).display(), "1023 B");
        assert_eq!(FileSize::new(1536).display(), "1.50 KB");
        assert_eq!(FileSize::new(5 * FileSize::MB / 2).display(), "2.50 MB");
        assert_eq!(FileSize::new(3 * FileSize::GB).to_string(), "3.00 GB");
    }

    #[test]
    fn test_of_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.gif");
        std::fs::write(&path, vec![0u8; 2048]).unwrap();
        let size = FileSize::of_file(&path).unwrap();
        assert_eq!(size.bytes(), 2048);
        assert!(!size.is_zero());
        assert!(FileSize::of_file(&dir.path().join("missing.gif")).is_err());
    }
}
