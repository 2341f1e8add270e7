use std::fs::{self, File};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};

/// Prefix used for transient files produced by [`atomic_write_in_dir`].
pub const TMP_PREFIX: &str = ".tmp-";

static TMP_COUNTER: AtomicU64 = AtomicU64::new(0);

/// Build a process- and call-unique `.tmp-<random>` name inside `dir`.
fn unique_tmp_name() -> String {
    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_nanos())
        .unwrap_or(0);
    let seq = TMP_COUNTER.fetch_add(1, Ordering::Relaxed);
    format!("{TMP_PREFIX}{:x}-{:x}-{:x}", std::process::id(), nanos, seq)
}

/// Atomically write `bytes` to `final_path`, which must live in `dir`.
///
/// Writes to a fresh `.tmp-<random>` file in `dir` first, then renames it
/// over `final_path`. Any observer of `final_path` sees either the prior
/// content or the full new content, never a partial write. Orphaned
/// `.tmp-*` files left behind by a crashed writer are the caller's
/// responsibility to clean up (see `clean_orphaned_tmp_files`).
///
/// # Errors
/// Returns an error if the directory cannot be written to or the rename fails.
pub fn atomic_write_in_dir(dir: &Path, final_path: &Path, bytes: &[u8]) -> io::Result<()> {
    fs::create_dir_all(dir)?;
    let tmp_path = dir.join(unique_tmp_name());

    {
        let mut file = File::create(&tmp_path)?;
        file.write_all(bytes)?;
        file.sync_all()?;
    }

    match fs::rename(&tmp_path, final_path) {
        Ok(()) => Ok(()),
        Err(e) => {
            let _ = fs::remove_file(&tmp_path);
            Err(e)
        }
    }
}

/// Remove orphaned `.tmp-*` files left behind by a crashed or interrupted
/// writer. Best-effort: failures to remove an individual entry are ignored.
pub fn clean_orphaned_tmp_files(dir: &Path) {
    let Ok(entries) = fs::read_dir(dir) else {
        return;
    };

    for entry in entries.flatten() {
        let path: PathBuf = entry.path();
        let is_tmp = path
            .file_name()
            .and_then(|n| n.to_str())
            .is_some_and(|n| n.starts_with(TMP_PREFIX));
        if is_tmp {
            let _ = fs::remove_file(&path);
        }
    }
}
