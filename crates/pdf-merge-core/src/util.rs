//! Utility functions shared across the crate.

use std::path::PathBuf;

/// Get the user's config directory following XDG conventions.
///
/// Returns `$XDG_CONFIG_HOME` if set, otherwise `$HOME/.config`.
pub fn config_dir() -> Option<PathBuf> {
    std::env::var_os("XDG_CONFIG_HOME")
        .map(PathBuf::from)
        .or_else(|| std::env::var_os("HOME").map(|home| PathBuf::from(home).join(".config")))
}

/// Format a byte count as megabytes with one decimal, e.g. `"2.5"`.
#[allow(clippy::cast_precision_loss)]
pub fn format_megabytes(bytes: u64) -> String {
    format!("{:.1}", bytes as f64 / 1024.0 / 1024.0)
}

/// Compare a declared content type against a MIME essence.
///
/// Parameters such as `; charset=...` are ignored and the comparison is
/// case-insensitive. A missing type never matches.
pub fn mime_matches(declared: Option<&str>, expected: &str) -> bool {
    declared
        .and_then(|value| value.split(';').next())
        .is_some_and(|essence| essence.trim().eq_ignore_ascii_case(expected))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_megabytes() {
        assert_eq!(format_megabytes(0), "0.0");
        assert_eq!(format_megabytes(1024 * 1024), "1.0");
        assert_eq!(format_megabytes(25 * 1024 * 1024 + 100 * 1024), "25.1");
    }

    #[test]
    fn test_mime_matches() {
        assert!(mime_matches(Some("application/pdf"), "application/pdf"));
        assert!(mime_matches(Some("Application/PDF; name=x"), "application/pdf"));
        assert!(!mime_matches(Some("text/plain"), "application/pdf"));
        assert!(!mime_matches(Some("application/pdfx"), "application/pdf"));
        assert!(!mime_matches(None, "application/pdf"));
    }
}
