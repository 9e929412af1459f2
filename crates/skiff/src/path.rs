//! Destination path rules.
//!
//! A destination ending in a separator names a directory: the source's base
//! name is appended. Anything else is taken literally.

use std::path::Path;

/// Resolve where a transfer lands.
///
/// With `is_directory_hint` unset, `base` is returned unchanged. With it
/// set, `candidate_name` is appended, inserting a `/` if `base` does not
/// already end in a separator.
///
/// ```
/// use skiff::resolve_destination_path;
///
/// assert_eq!(resolve_destination_path("/tmp/", "a.txt", true), "/tmp/a.txt");
/// assert_eq!(resolve_destination_path("/tmp/b.txt", "a.txt", false), "/tmp/b.txt");
/// ```
#[must_use]
pub fn resolve_destination_path(base: &str, candidate_name: &str, is_directory_hint: bool) -> String {
    if !is_directory_hint {
        return base.to_string();
    }
    if base.is_empty() || base.ends_with(is_separator) {
        format!("{base}{candidate_name}")
    } else {
        format!("{base}/{candidate_name}")
    }
}

/// Separators accepted at the end of a destination.
fn is_separator(c: char) -> bool {
    c == '/' || std::path::is_separator(c)
}

/// Whether a remote destination names a directory.
#[must_use]
pub fn remote_is_directory(path: &str) -> bool {
    path.ends_with('/')
}

/// Whether a local destination names a directory.
#[must_use]
pub fn local_is_directory(path: &str) -> bool {
    path.ends_with(is_separator)
}

/// Final component of a remote (always `/`-separated) path.
///
/// Trailing separators are ignored, so `/srv/app/` yields `app`.
#[must_use]
pub fn remote_base_name(path: &str) -> &str {
    let trimmed = path.trim_end_matches('/');
    trimmed.rsplit('/').next().unwrap_or(trimmed)
}

/// Final component of a local path, lossily converted.
#[must_use]
pub fn local_base_name(path: &Path) -> Option<String> {
    path.file_name().map(|n| n.to_string_lossy().into_owned())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn directory_hint_appends_name() {
        assert_eq!(
            resolve_destination_path("/home/deploy/", "demo.go", true),
            "/home/deploy/demo.go"
        );
        assert_eq!(
            resolve_destination_path("/home/deploy", "demo.go", true),
            "/home/deploy/demo.go"
        );
        assert_eq!(resolve_destination_path("", "demo.go", true), "demo.go");
    }

    #[test]
    fn literal_path_is_kept() {
        assert_eq!(
            resolve_destination_path("/etc/motd", "banner", false),
            "/etc/motd"
        );
    }

    #[test]
    fn trailing_separator_detection() {
        assert!(remote_is_directory("/tmp/"));
        assert!(!remote_is_directory("/tmp"));
        assert!(local_is_directory("out/"));
        assert!(!local_is_directory("out"));
    }

    #[test]
    fn base_names() {
        assert_eq!(remote_base_name("/var/log/syslog"), "syslog");
        assert_eq!(remote_base_name("relative"), "relative");
        assert_eq!(remote_base_name("/var/log/"), "log");
        assert_eq!(
            local_base_name(Path::new("/tmp/build.tar")).as_deref(),
            Some("build.tar")
        );
        assert_eq!(local_base_name(Path::new("/")), None);
    }
}
