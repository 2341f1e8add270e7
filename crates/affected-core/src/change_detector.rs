//! Version-control change detector (spec §4.2).
//!
//! Built on `git2` rather than shelling out to a `git` binary, so there is
//! no subprocess-spawn failure mode to model beyond `git2::Error`. The
//! spec's "concurrently collect" language is a performance framing, not a
//! correctness requirement: each query here runs sequentially, in the
//! exact order the tie-break rule depends on (committed, staged-changed,
//! staged-deleted, unstaged/untracked), so "first occurrence wins" is
//! trivially correct without a post-hoc merge of concurrent orderings.

use crate::error::AffectedError;
use git2::{Delta, Repository, StatusOptions};
use indexmap::IndexSet;
use std::path::Path;
use tracing::warn;

/// A pair of disjoint canonical path lists (spec §3 Change set).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChangeSet {
    /// Paths that changed and still exist on disk.
    pub changed: Vec<String>,
    /// Paths referenced by the diff but absent from disk.
    pub deleted: Vec<String>,
}

impl ChangeSet {
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.changed.is_empty() && self.deleted.is_empty()
    }

    /// The union of changed and deleted paths, in insertion order.
    #[must_use]
    pub fn union(&self) -> Vec<String> {
        self.changed.iter().chain(self.deleted.iter()).cloned().collect()
    }
}

/// Detect the pending change set in `root_dir` relative to `reference` (or
/// the working tree if `None`).
///
/// Returns `Ok(ChangeSet::default())` (a soft fallback, spec §4.2
/// `NotVersionControlled`) when `root_dir` is not inside a git work tree.
/// Returns `Err(AffectedError::ShallowHistory)` (the one `Hard` kind, spec
/// §7) only when a reference diff is requested against a shallow checkout.
pub fn detect(root_dir: &Path, reference: Option<&str>) -> Result<ChangeSet, AffectedError> {
    let repo = match Repository::discover(root_dir) {
        Ok(repo) => repo,
        Err(e) => {
            warn!("[vitest-affected] not inside a git work tree: {e}");
            return Ok(ChangeSet::default());
        }
    };

    if reference.is_some() && repo.is_shallow() {
        return Err(AffectedError::ShallowHistory {
            root: root_dir.to_path_buf(),
        });
    }

    let repo_root = repo
        .workdir()
        .map(Path::to_path_buf)
        .unwrap_or_else(|| root_dir.to_path_buf());

    let mut candidates: IndexSet<String> = IndexSet::new();

    if let Some(reference) = reference {
        match collect_committed(&repo, reference) {
            Ok(paths) => candidates.extend(paths),
            Err(e) => {
                warn!("[vitest-affected] failed to diff against {reference}: {e}");
                return Ok(ChangeSet::default());
            }
        }
    }

    let statuses = match collect_working_tree_statuses(&repo) {
        Ok(s) => s,
        Err(e) => {
            warn!("[vitest-affected] failed to read git status: {e}");
            return Ok(ChangeSet::default());
        }
    };

    candidates.extend(statuses.staged_changed);
    candidates.extend(statuses.staged_deleted);
    candidates.extend(statuses.unstaged);

    let mut changed = Vec::new();
    let mut deleted = Vec::new();
    for rel in candidates {
        let abs = repo_root.join(&rel);
        let canonical = crate::normalize::normalize(&abs.to_string_lossy());
        if abs.exists() {
            changed.push(canonical);
        } else {
            deleted.push(canonical);
        }
    }

    Ok(ChangeSet { changed, deleted })
}

fn collect_committed(repo: &Repository, reference: &str) -> Result<Vec<String>, git2::Error> {
    let ref_tree = repo.revparse_single(reference)?.peel_to_tree()?;
    let head_tree = repo.head()?.peel_to_tree()?;
    let diff = repo.diff_tree_to_tree(Some(&ref_tree), Some(&head_tree), None)?;

    let mut paths = Vec::new();
    for delta in diff.deltas() {
        if !matches!(
            delta.status(),
            Delta::Added | Delta::Copied | Delta::Modified | Delta::Renamed | Delta::Deleted
        ) {
            continue;
        }
        if let Some(p) = delta.new_file().path().or_else(|| delta.old_file().path()) {
            paths.push(p.to_string_lossy().into_owned());
        }
    }
    Ok(paths)
}

struct WorkingTreeStatuses {
    staged_changed: Vec<String>,
    staged_deleted: Vec<String>,
    unstaged: Vec<String>,
}

fn collect_working_tree_statuses(repo: &Repository) -> Result<WorkingTreeStatuses, git2::Error> {
    let mut opts = StatusOptions::new();
    opts.include_untracked(true)
        .recurse_untracked_dirs(true)
        .include_ignored(false);

    let statuses = repo.statuses(Some(&mut opts))?;

    let mut staged_changed = Vec::new();
    let mut staged_deleted = Vec::new();
    let mut unstaged = Vec::new();

    for entry in statuses.iter() {
        let status = entry.status();
        let Some(path) = entry.path() else { continue };

        if status.is_index_new() || status.is_index_modified() || status.is_index_renamed() {
            staged_changed.push(path.to_string());
        }
        if status.is_index_deleted() {
            staged_deleted.push(path.to_string());
        }
        if status.is_wt_modified() || status.is_wt_new() {
            unstaged.push(path.to_string());
        }
    }

    Ok(WorkingTreeStatuses {
        staged_changed,
        staged_deleted,
        unstaged,
    })
}

/// Returns `true` if `root_dir` is not inside a git work tree.
#[must_use]
pub fn is_not_version_controlled(root_dir: &Path) -> bool {
    Repository::discover(root_dir).is_err()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use std::process::Command;
    use tempfile::tempdir;

    fn git(dir: &Path, args: &[&str]) {
        let status = Command::new("git")
            .args(args)
            .current_dir(dir)
            .env("GIT_AUTHOR_NAME", "test")
            .env("GIT_AUTHOR_EMAIL", "test@example.com")
            .env("GIT_COMMITTER_NAME", "test")
            .env("GIT_COMMITTER_EMAIL", "test@example.com")
            .status()
            .expect("git command should run");
        assert!(status.success(), "git {args:?} failed");
    }

    fn init_repo() -> tempfile::TempDir {
        let dir = tempdir().unwrap();
        git(dir.path(), &["init", "-q"]);
        dir
    }

    #[test]
    fn test_not_version_controlled_returns_empty_set() {
        let dir = tempdir().unwrap();
        let result = detect(dir.path(), None).unwrap();
        assert!(result.is_empty());
    }

    #[test]
    fn test_untracked_file_is_changed() {
        let dir = init_repo();
        fs::write(dir.path().join("a.ts"), "export {}").unwrap();

        let result = detect(dir.path(), None).unwrap();
        assert_eq!(result.changed.len(), 1);
        assert!(result.changed[0].ends_with("a.ts"));
        assert!(result.deleted.is_empty());
    }

    #[test]
    fn test_staged_new_file_is_changed() {
        let dir = init_repo();
        fs::write(dir.path().join("a.ts"), "export {}").unwrap();
        git(dir.path(), &["add", "a.ts"]);

        let result = detect(dir.path(), None).unwrap();
        assert_eq!(result.changed.len(), 1);
    }

    #[test]
    fn test_deleted_tracked_file_is_deleted() {
        let dir = init_repo();
        fs::write(dir.path().join("a.ts"), "export {}").unwrap();
        git(dir.path(), &["add", "a.ts"]);
        git(dir.path(), &["commit", "-q", "-m", "init"]);
        fs::remove_file(dir.path().join("a.ts")).unwrap();

        let result = detect(dir.path(), None).unwrap();
        assert!(result.changed.is_empty());
        assert_eq!(result.deleted.len(), 1);
        assert!(result.deleted[0].ends_with("a.ts"));
    }

    #[test]
    fn test_union_preserves_order() {
        let set = ChangeSet {
            changed: vec!["/a.ts".to_string()],
            deleted: vec!["/b.ts".to_string()],
        };
        assert_eq!(set.union(), vec!["/a.ts".to_string(), "/b.ts".to_string()]);
    }
}
