
use std::borrow::Cow;
use std::ffi::OsStr;
use std::path::Path;

/// Make a path safe to pass as a positional FFmpeg argument.
///
/// FFmpeg has no `--` delimiter, so a relative path whose first character is
/// '-' would be parsed as an option. Such paths get a `./` prefix; everything
/// else is passed through untouched (non-UTF-8 bytes included).
pub fn safe_path_arg(path: &Path) -> Cow<'_, OsStr> {
    let starts_with_dash = path
        .as_os_str()
        .to_string_lossy()
        .starts_with('-');
    if starts_with_dash {
        Cow::Owned(Path::new(".").join(path).into_os_string())
    } else {
        Cow::Borrowed(path.as_os_str())
    }
}
