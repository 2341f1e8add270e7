//! `affected run`: drive one orchestration pass against a real working tree.
//!
//! There is no live host test-runner process behind this CLI invocation, so
//! the installed [`RuntimeEdgeReporter`](affected_core::RuntimeEdgeReporter)
//! never observes runtime edges here — this subcommand only exercises the
//! cache/change-detection/delta/BFS decision pipeline, which is exactly what
//! CI and local debugging need (spec SPEC_FULL §6).

use affected_core::orchestrator::{configure, Decision, HostProject};
use affected_core::{AffectedError, AffectedOptions};
use miette::{IntoDiagnostic, Result};
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::sync::Arc;

pub struct RunArgs {
    pub cwd: PathBuf,
    pub include: Vec<String>,
    pub exclude: Vec<String>,
    pub setup_file: Vec<PathBuf>,
    pub reference: Option<String>,
    pub threshold: f64,
    pub allow_no_tests: bool,
    pub cache: bool,
    pub stats_file: Option<PathBuf>,
    pub changed: Vec<PathBuf>,
    pub json: bool,
}

struct CliProject {
    root: PathBuf,
    include: Vec<String>,
    exclude: Vec<String>,
    setup_files: Vec<PathBuf>,
    applied_include: Option<Vec<String>>,
}

impl HostProject for CliProject {
    fn root_dir(&self) -> Option<&Path> {
        Some(&self.root)
    }
    fn include_patterns(&self) -> Option<&[String]> {
        Some(&self.include)
    }
    fn exclude_patterns(&self) -> &[String] {
        &self.exclude
    }
    fn setup_files(&self) -> &[PathBuf] {
        &self.setup_files
    }
    fn is_watch_mode(&self) -> bool {
        false
    }
    fn project_count(&self) -> usize {
        1
    }
    fn set_include(&mut self, tests: Vec<String>) {
        self.applied_include = Some(tests);
    }
}

/// Stand-in for the host's reporter-list property; the CLI has no live
/// reporter chain to reinstall into, so it just holds the handle.
struct NullRegistry {
    installed: Option<Arc<dyn affected_core::ReporterHooks>>,
}

impl affected_core::ReporterRegistry for NullRegistry {
    fn ensure_installed(&mut self, reporter: Arc<dyn affected_core::ReporterHooks>) {
        self.installed = Some(reporter);
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase", tag = "decision")]
enum RunReport {
    Disabled,
    FullSuite { reason: String },
    Selective { tests: Vec<String>, count: usize },
}

pub fn run(args: RunArgs) -> Result<()> {
    let options = AffectedOptions {
        disabled: false,
        reference: args.reference,
        changed_files: if args.changed.is_empty() { None } else { Some(args.changed) },
        verbose: false,
        threshold: args.threshold,
        allow_no_tests: args.allow_no_tests,
        cache: args.cache,
        stats_file: args.stats_file,
    }
    .with_env_override();

    let mut project = CliProject {
        root: args.cwd,
        include: args.include,
        exclude: args.exclude,
        setup_files: args.setup_file,
        applied_include: None,
    };
    let mut registry = NullRegistry { installed: None };

    let outcome = configure(&mut project, &mut registry, &options).map_err(to_miette)?;

    let report = match outcome.decision {
        Decision::Disabled => RunReport::Disabled,
        Decision::FullSuite { reason } => RunReport::FullSuite {
            reason: reason.as_str().to_string(),
        },
        Decision::Selective { tests } => RunReport::Selective {
            count: tests.len(),
            tests,
        },
    };

    if args.json {
        println!("{}", serde_json::to_string_pretty(&report).into_diagnostic()?);
    } else {
        print_human(&report);
    }

    Ok(())
}

fn print_human(report: &RunReport) {
    match report {
        RunReport::Disabled => println!("affected: disabled, no selection performed"),
        RunReport::FullSuite { reason } => println!("affected: full suite ({reason})"),
        RunReport::Selective { tests, count } => {
            println!("affected: {count} test file(s) selected");
            for test in tests {
                println!("  {test}");
            }
        }
    }
}

fn to_miette(err: AffectedError) -> miette::Report {
    miette::Report::msg(err.to_string())
}
