//! Path sanitization.
//!
//! The core takes paths as byte strings from the host bridge. A leading
//! `file://` scheme is stripped (hosts hand over URLs as often as paths);
//! anything containing a parent-directory segment is rejected outright so
//! a hostile path cannot climb out of the host's sandbox.

use crate::error::{IndexError, Result};
use std::path::{Component, Path};

/// Validates and normalizes a host-supplied path.
///
/// Returns the path with any `file://` prefix removed.
///
/// # Errors
///
/// [`IndexError::Path`] when the path is empty (before or after
/// stripping) or contains a `..` segment.
pub fn sanitize(path: &str) -> Result<&str> {
    if path.is_empty() {
        return Err(IndexError::Path("empty path".into()));
    }

    let stripped = path.strip_prefix("file://").unwrap_or(path);
    if stripped.is_empty() {
        return Err(IndexError::Path("empty path".into()));
    }

    let has_parent = Path::new(stripped)
        .components()
        .any(|c| matches!(c, Component::ParentDir));
    if has_parent {
        return Err(IndexError::Path(format!(
            "path traversal rejected: {stripped}"
        )));
    }

    Ok(stripped)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plain_path_passes_through() {
        assert_eq!(sanitize("/tmp/index.bin").unwrap(), "/tmp/index.bin");
        assert_eq!(sanitize("relative/index.bin").unwrap(), "relative/index.bin");
    }

    #[test]
    fn file_scheme_is_stripped() {
        assert_eq!(sanitize("file:///tmp/index.bin").unwrap(), "/tmp/index.bin");
    }

    #[test]
    fn empty_rejected() {
        assert!(matches!(sanitize(""), Err(IndexError::Path(_))));
        assert!(matches!(sanitize("file://"), Err(IndexError::Path(_))));
    }

    #[test]
    fn parent_segments_rejected() {
        assert!(matches!(sanitize("../etc/passwd"), Err(IndexError::Path(_))));
        assert!(matches!(
            sanitize("/data/../../etc/passwd"),
            Err(IndexError::Path(_))
        ));
        assert!(matches!(
            sanitize("file:///a/../b"),
            Err(IndexError::Path(_))
        ));
    }

    #[test]
    fn dotdot_in_file_name_is_allowed() {
        // Only a standalone `..` segment is traversal.
        assert!(sanitize("/tmp/archive..bin").is_ok());
    }
}
