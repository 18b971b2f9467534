//! Sanitization of client-supplied upload filenames.
//!
//! Uploaded files are stored as `<job id>_<sanitized name>`, so the name
//! must never carry path components or characters that are unsafe on any
//! platform.

/// Windows reserved filenames (case-insensitive)
const WINDOWS_RESERVED_NAMES: &[&str] = &[
    "CON", "PRN", "AUX", "NUL", "COM1", "COM2", "COM3", "COM4", "COM5", "COM6", "COM7", "COM8",
    "COM9", "LPT1", "LPT2", "LPT3", "LPT4", "LPT5", "LPT6", "LPT7", "LPT8", "LPT9",
];

/// Fallback used when nothing survives sanitization.
const FALLBACK_NAME: &str = "upload";

/// Sanitize an uploaded filename for storage.
///
/// This function:
/// 1. Drops any directory components (both `/` and `\` separators)
/// 2. Keeps ASCII letters, digits, `.`, `-` and `_`; everything else
///    (whitespace, unicode, control characters) becomes `_`
/// 3. Collapses consecutive replacements into one
/// 4. Trims leading/trailing dots and underscores
/// 5. Prefixes Windows reserved names with `_`
/// 6. Returns `"upload"` if the result would be empty
///
/// # Examples
///
/// ```
/// use anime_convert::utils::filename::sanitize_upload_name;
///
/// assert_eq!(sanitize_upload_name("my clip.mp4"), "my_clip.mp4");
/// assert_eq!(sanitize_upload_name("../../etc/passwd"), "passwd");
/// assert_eq!(sanitize_upload_name(""), "upload");
/// ```
pub fn sanitize_upload_name(input: &str) -> String {
    let base = input.rsplit(['/', '\\']).next().unwrap_or(input);

    let mut result = String::with_capacity(base.len());
    let mut last_was_replacement = false;

    for c in base.chars() {
        if c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_') {
            result.push(c);
            last_was_replacement = c == '_';
        } else if !last_was_replacement {
            result.push('_');
            last_was_replacement = true;
        }
    }

    let trimmed = result.trim_matches(|c| c == '.' || c == '_');
    if trimmed.is_empty() {
        return FALLBACK_NAME.to_string();
    }

    let upper = trimmed.to_ascii_uppercase();
    for reserved in WINDOWS_RESERVED_NAMES {
        if upper == *reserved || upper.starts_with(&format!("{}.", reserved)) {
            return format!("_{}", trimmed);
        }
    }

    trimmed.to_string()
}

/// Lower-cased extension of `name` including the leading dot, if any.
///
/// ```
/// use anime_convert::utils::filename::extension_of;
///
/// assert_eq!(extension_of("Clip.MP4").as_deref(), Some(".mp4"));
/// assert_eq!(extension_of("noext"), None);
/// ```
pub fn extension_of(name: &str) -> Option<String> {
    std::path::Path::new(name)
        .extension()
        .and_then(|ext| ext.to_str())
        .filter(|ext| !ext.is_empty())
        .map(|ext| format!(".{}", ext.to_ascii_lowercase()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_string() {
        assert_eq!(sanitize_upload_name(""), "upload");
        assert_eq!(sanitize_upload_name("..."), "upload");
    }

    #[test]
    fn test_strips_directories() {
        assert_eq!(sanitize_upload_name("/tmp/video.mp4"), "video.mp4");
        assert_eq!(sanitize_upload_name("C:\\Users\\me\\video.mov"), "video.mov");
        assert_eq!(sanitize_upload_name("../../secret.mkv"), "secret.mkv");
    }

    #[test]
    fn test_whitespace_and_unicode_replaced() {
        assert_eq!(sanitize_upload_name("my holiday clip.mp4"), "my_holiday_clip.mp4");
        assert_eq!(sanitize_upload_name("观看 video.webm"), "video.webm");
    }

    #[test]
    fn test_consecutive_replacements_collapsed() {
        assert_eq!(sanitize_upload_name("a   b.mp4"), "a_b.mp4");
        assert_eq!(sanitize_upload_name("a?<>b.mp4"), "a_b.mp4");
    }

    #[test]
    fn test_windows_reserved_names() {
        assert_eq!(sanitize_upload_name("CON"), "_CON");
        assert_eq!(sanitize_upload_name("nul.mp4"), "_nul.mp4");
    }

    #[test]
    fn test_idempotency() {
        for input in ["my clip.mp4", "../x.mov", "CON.avi", "  .hidden.mkv "] {
            let once = sanitize_upload_name(input);
            let twice = sanitize_upload_name(&once);
            assert_eq!(once, twice, "Idempotency failed for input: {}", input);
        }
    }

    #[test]
    fn test_extension_of() {
        assert_eq!(extension_of("a.WebM").as_deref(), Some(".webm"));
        assert_eq!(extension_of("archive.tar.gz").as_deref(), Some(".gz"));
        assert_eq!(extension_of(".mp4"), None);
        assert_eq!(extension_of("file."), None);
    }
}
