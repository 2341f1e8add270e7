//! `affected doctor`: report git repository and cache health (spec SPEC_FULL
//! §6), mirroring the teacher's `doctor` command's json/human print split.

use affected_core::cache;
use git2::Repository;
use miette::{IntoDiagnostic, Result};
use serde::Serialize;
use std::io::{self, Write};
use std::path::Path;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct DoctorReport {
    root: std::path::PathBuf,
    inside_work_tree: bool,
    shallow: bool,
    cache_present: bool,
    cache_schema_version: Option<u32>,
    cache_source_count: usize,
}

pub fn run(cwd: &Path, json: bool) -> Result<()> {
    let report = collect(cwd);

    if json {
        println!("{}", serde_json::to_string_pretty(&report).into_diagnostic()?);
    } else {
        print_human(&report)?;
    }

    Ok(())
}

fn collect(cwd: &Path) -> DoctorReport {
    let repo = Repository::discover(cwd).ok();
    let inside_work_tree = repo.is_some();
    let shallow = repo.as_ref().is_some_and(Repository::is_shallow);

    let cache_dir = affected_core::paths::cache_dir(cwd);
    let outcome = cache::load_cached_reverse_map(&cache_dir, cwd, false);

    DoctorReport {
        root: cwd.to_path_buf(),
        inside_work_tree,
        shallow,
        cache_present: outcome.hit,
        cache_schema_version: outcome.hit.then_some(cache::CURRENT_SCHEMA_VERSION),
        cache_source_count: outcome.reverse.len(),
    }
}

fn print_human(report: &DoctorReport) -> Result<()> {
    let mut out = io::stdout().lock();
    w(&mut out, &format!("Root:          {}\n", report.root.display()))?;
    w(&mut out, &format!("Git work tree: {}\n", yes_no(report.inside_work_tree)))?;
    w(&mut out, &format!("Shallow clone: {}\n", yes_no(report.shallow)))?;
    w(&mut out, &format!("Cache present: {}\n", yes_no(report.cache_present)))?;
    if let Some(version) = report.cache_schema_version {
        w(&mut out, &format!("Cache schema:  v{version}\n"))?;
    }
    w(&mut out, &format!("Cache sources: {}\n", report.cache_source_count))?;
    out.flush().into_diagnostic()?;
    Ok(())
}

fn w(out: &mut impl Write, s: &str) -> Result<()> {
    out.write_all(s.as_bytes()).into_diagnostic()
}

fn yes_no(b: bool) -> &'static str {
    if b {
        "yes"
    } else {
        "no"
    }
}
