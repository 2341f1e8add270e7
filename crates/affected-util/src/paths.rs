use std::path::Path;

/// Convert a path to a forward-slashed string, regardless of platform.
///
/// Used throughout the engine so cache keys and set membership comparisons
/// are stable across Windows and POSIX checkouts of the same repository.
#[must_use]
pub fn to_forward_slash(path: &Path) -> String {
    path.to_string_lossy().replace('\\', "/")
}

/// Returns `true` if `path` lies under `root`, comparing forward-slashed
/// strings with an explicit path-separator boundary so `/root` does not
/// match a sibling like `/rootx`.
#[must_use]
pub fn is_under(root: &str, path: &str) -> bool {
    let root = root.trim_end_matches('/');
    if path == root {
        return true;
    }
    path.starts_with(root) && path.as_bytes().get(root.len()) == Some(&b'/')
}
