use std::path::{Path, PathBuf};

use crate::error::{ExtractError, Result};
use crate::zip::ZipEntry;

/// Where `entry` lands under `root`.
///
/// A leading separator does not make the entry absolute, and `..` is refused
/// outright rather than resolved. So is a leading drive prefix such as `C:`.
pub fn entry_destination(root: &Path, entry: &ZipEntry) -> Result<PathBuf> {
    let segments = entry.segments();
    let drive_prefix = segments.first().is_some_and(|s| is_drive(s));
    if drive_prefix || segments.iter().any(|s| is_unsafe_segment(s)) {
        return Err(ExtractError::UnsafePath {
            entry: entry.name.clone(),
        });
    }

    let mut path = root.to_path_buf();
    path.extend(segments);
    Ok(path)
}

fn is_drive(segment: &str) -> bool {
    let bytes = segment.as_bytes();
    bytes.len() == 2 && bytes[0].is_ascii_alphabetic() && bytes[1] == b':'
}

#[cfg(not(windows))]
fn is_unsafe_segment(segment: &str) -> bool {
    segment == ".."
}

// `a:b` names an alternate data stream or a drive-relative path on Windows
#[cfg(windows)]
fn is_unsafe_segment(segment: &str) -> bool {
    segment == ".." || segment.contains(':')
}
