//! Tree path normalization and ordering utilities

use std::cmp::Ordering;
use unicode_normalization::UnicodeNormalization;

/// Normalize a tree path
///
/// This function:
/// 1. Normalizes Unicode to NFC
/// 2. Converts backslashes to forward slashes
/// 3. Trims leading and trailing separators
/// 4. Collapses empty segments (`a//b` becomes `a/b`)
///
/// The empty string denotes the root.
pub fn normalize_path(path: &str) -> String {
    let normalized: String = path.nfc().collect();
    let normalized = normalized.replace('\\', "/");
    normalized
        .split('/')
        .filter(|segment| !segment.is_empty())
        .collect::<Vec<_>>()
        .join("/")
}

/// Split a path into normalized segments. The root yields no segments.
pub fn split_path(path: &str) -> Vec<String> {
    let normalized = normalize_path(path);
    if normalized.is_empty() {
        return Vec::new();
    }
    normalized.split('/').map(str::to_string).collect()
}

/// Join a parent path and an entry name.
pub fn join_path(parent: &str, name: &str) -> String {
    if parent.is_empty() {
        name.to_string()
    } else {
        format!("{}/{}", parent, name)
    }
}

/// Order paths segment by segment, matching tree entry order.
///
/// `a/b` sorts before `a.txt` because the segment `a` sorts before `a.txt`,
/// which plain string comparison gets wrong (`.` < `/`).
pub fn compare_paths(a: &str, b: &str) -> Ordering {
    a.split('/').cmp(b.split('/'))
}
