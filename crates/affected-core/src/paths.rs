use std::path::{Path, PathBuf};

/// Find the project root by walking up from `cwd` looking for `package.json`
/// or `.git`.
#[must_use]
pub fn project_root(cwd: &Path) -> Option<PathBuf> {
    let mut current = cwd.to_path_buf();

    loop {
        if current.join("package.json").exists() || current.join(".git").exists() {
            return Some(current);
        }
        if !current.pop() {
            return None;
        }
    }
}

/// Name of the persistent-state directory (spec §3 Disk Layout).
pub const STATE_DIR_NAME: &str = ".vitest-affected";

/// Directory under the project root holding `graph.json` and transient
/// `.tmp-*` files. Unlike the teacher's XDG-style global cache directory,
/// this state is project-local: the reverse map is meaningless outside the
/// repository it was built from.
#[must_use]
pub fn cache_dir(root: &Path) -> PathBuf {
    root.join(STATE_DIR_NAME)
}

/// Path to the cache document within `cache_dir(root)`.
#[must_use]
pub fn graph_path(root: &Path) -> PathBuf {
    cache_dir(root).join("graph.json")
}
