//! `affected clear-cache`: remove the persisted `.vitest-affected/` cache
//! directory (spec SPEC_FULL §6).

use miette::{IntoDiagnostic, Result};
use serde::Serialize;
use std::path::Path;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ClearCacheReport {
    cache_dir: std::path::PathBuf,
    removed: bool,
}

pub fn run(cwd: &Path, json: bool) -> Result<()> {
    let cache_dir = affected_core::paths::cache_dir(cwd);
    let existed = cache_dir.exists();

    if existed {
        std::fs::remove_dir_all(&cache_dir).into_diagnostic()?;
    }

    let report = ClearCacheReport {
        cache_dir: cache_dir.clone(),
        removed: existed,
    };

    if json {
        println!("{}", serde_json::to_string_pretty(&report).into_diagnostic()?);
    } else if existed {
        println!("removed {}", cache_dir.display());
    } else {
        println!("no cache at {}", cache_dir.display());
    }

    Ok(())
}
