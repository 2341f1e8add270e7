//! Workspace-level end-to-end scenarios (spec §8): fixture repos built with
//! `tempfile`, driven through the real orchestrator pipeline twice — a cold
//! run that warms the cache via the runtime-edge reporter, and a second run
//! against a targeted change.

use affected_core::orchestrator::{configure, Decision, HostProject};
use affected_core::{AffectedOptions, ReporterHooks, ReporterRegistry};
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;
use std::sync::Arc;

struct FixtureProject {
    root: PathBuf,
    include: Vec<String>,
    applied: Option<Vec<String>>,
}

impl FixtureProject {
    fn new(root: PathBuf) -> Self {
        Self {
            root,
            include: vec!["tests/**/*.test.ts".to_string()],
            applied: None,
        }
    }
}

impl HostProject for FixtureProject {
    fn root_dir(&self) -> Option<&Path> {
        Some(&self.root)
    }
    fn include_patterns(&self) -> Option<&[String]> {
        Some(&self.include)
    }
    fn exclude_patterns(&self) -> &[String] {
        &[]
    }
    fn setup_files(&self) -> &[PathBuf] {
        &[]
    }
    fn is_watch_mode(&self) -> bool {
        false
    }
    fn project_count(&self) -> usize {
        1
    }
    fn set_include(&mut self, tests: Vec<String>) {
        self.applied = Some(tests);
    }
}

struct CapturingRegistry {
    reporter: Option<Arc<dyn ReporterHooks>>,
}

impl ReporterRegistry for CapturingRegistry {
    fn ensure_installed(&mut self, reporter: Arc<dyn ReporterHooks>) {
        self.reporter = Some(reporter);
    }
}

fn git(dir: &Path, args: &[&str]) {
    let status = Command::new("git")
        .args(args)
        .current_dir(dir)
        .env("GIT_AUTHOR_NAME", "test")
        .env("GIT_AUTHOR_EMAIL", "test@example.com")
        .env("GIT_COMMITTER_NAME", "test")
        .env("GIT_COMMITTER_EMAIL", "test@example.com")
        .status()
        .expect("git should run");
    assert!(status.success(), "git {args:?} failed");
}

fn path_str(p: &Path) -> String {
    p.to_string_lossy().to_string()
}

/// Run one orchestration pass, and if a reporter was installed, feed it a
/// runtime observation of `test_file` importing every path in `imported`
/// before the run ends — simulating the host runner actually executing the
/// warm test once the selection decision has been made.
fn run_and_observe(
    project: &mut FixtureProject,
    options: &AffectedOptions,
    observations: &[(&Path, &[&Path])],
) -> Decision {
    let mut registry = CapturingRegistry { reporter: None };
    let outcome = configure(project, &mut registry, options).unwrap();

    if let Some(reporter) = &outcome.reporter {
        reporter.set_root_dir(&project.root);
        for (test_file, imports) in observations {
            let mut map = HashMap::new();
            for imported in *imports {
                map.insert(path_str(imported), 1.0);
            }
            reporter.on_test_module_end(&path_str(test_file), &map);
        }
        reporter.on_test_run_end("pass");
    }

    outcome.decision
}

#[test]
fn scenario_linear_chain() {
    let dir = tempfile::tempdir().unwrap();
    git(dir.path(), &["init", "-q"]);
    fs::create_dir_all(dir.path().join("src")).unwrap();
    fs::create_dir_all(dir.path().join("tests")).unwrap();
    let a = dir.path().join("src").join("a.ts");
    let b = dir.path().join("src").join("b.ts");
    let c = dir.path().join("src").join("c.ts");
    let test = dir.path().join("tests").join("a.test.ts");
    fs::write(&a, "import './b';").unwrap();
    fs::write(&b, "import './c';").unwrap();
    fs::write(&c, "export const c = 1;").unwrap();
    fs::write(&test, "import '../src/a';").unwrap();

    let options = AffectedOptions::default();
    let mut project = FixtureProject::new(dir.path().to_path_buf());

    // First run: cold cache, full suite; observe the test importing all
    // three source files at runtime.
    let decision = run_and_observe(&mut project, &options, &[(&test, &[&a, &b, &c])]);
    assert_eq!(
        decision,
        Decision::FullSuite {
            reason: affected_core::FallbackReason::CacheMiss
        }
    );

    // Second run: modify c.ts only; selection must narrow to a.test.ts.
    fs::write(&c, "export const c = 2;").unwrap();
    let mut options2 = AffectedOptions::default();
    options2.changed_files = Some(vec![c.clone()]);

    let decision = run_and_observe(&mut project, &options2, &[]);
    match decision {
        Decision::Selective { tests } => {
            assert_eq!(tests.len(), 1);
            assert!(tests[0].ends_with("a.test.ts"));
        }
        other => panic!("expected selective decision, got {other:?}"),
    }
}

#[test]
fn scenario_diamond_dedup() {
    let dir = tempfile::tempdir().unwrap();
    git(dir.path(), &["init", "-q"]);
    fs::create_dir_all(dir.path().join("src")).unwrap();
    fs::create_dir_all(dir.path().join("tests")).unwrap();
    let a = dir.path().join("src").join("a.ts");
    let b = dir.path().join("src").join("b.ts");
    let c = dir.path().join("src").join("c.ts");
    let d = dir.path().join("src").join("d.ts");
    let test = dir.path().join("tests").join("a.test.ts");
    fs::write(&a, "import './b'; import './d';").unwrap();
    fs::write(&b, "import './c';").unwrap();
    fs::write(&d, "import './c';").unwrap();
    fs::write(&c, "export const c = 1;").unwrap();
    fs::write(&test, "import '../src/a';").unwrap();

    let options = AffectedOptions::default();
    let mut project = FixtureProject::new(dir.path().to_path_buf());

    run_and_observe(&mut project, &options, &[(&test, &[&a, &b, &c, &d])]);

    fs::write(&c, "export const c = 2;").unwrap();
    let mut options2 = AffectedOptions::default();
    options2.changed_files = Some(vec![c.clone()]);

    let decision = run_and_observe(&mut project, &options2, &[]);
    match decision {
        Decision::Selective { tests } => assert_eq!(tests, vec![path_str(&test)]),
        other => panic!("expected selective decision, got {other:?}"),
    }
}

#[test]
fn scenario_config_change_forces_full_suite() {
    let dir = tempfile::tempdir().unwrap();
    git(dir.path(), &["init", "-q"]);
    fs::create_dir_all(dir.path().join("src")).unwrap();
    fs::create_dir_all(dir.path().join("tests")).unwrap();
    let a = dir.path().join("src").join("a.ts");
    let test = dir.path().join("tests").join("a.test.ts");
    fs::write(&a, "export const a = 1;").unwrap();
    fs::write(&test, "import '../src/a';").unwrap();
    fs::write(dir.path().join("package.json"), "{}").unwrap();

    let mut project = FixtureProject::new(dir.path().to_path_buf());
    let mut options = AffectedOptions::default();
    options.changed_files = Some(vec![a.clone()]);
    run_and_observe(&mut project, &options, &[(&test, &[&a])]);

    let mut options2 = AffectedOptions::default();
    options2.changed_files = Some(vec![dir.path().join("package.json")]);

    let decision = run_and_observe(&mut project, &options2, &[]);
    assert_eq!(
        decision,
        Decision::FullSuite {
            reason: affected_core::FallbackReason::ConfigChange
        }
    );
}

#[test]
fn scenario_new_import_seeds_delta_parser() {
    let dir = tempfile::tempdir().unwrap();
    git(dir.path(), &["init", "-q"]);
    fs::create_dir_all(dir.path().join("src")).unwrap();
    fs::create_dir_all(dir.path().join("tests")).unwrap();
    let a = dir.path().join("src").join("a.ts");
    let b = dir.path().join("src").join("b.ts");
    let e = dir.path().join("src").join("e.ts");
    let test = dir.path().join("tests").join("a.test.ts");
    fs::write(&a, "import './b';").unwrap();
    fs::write(&b, "export const b = 1;").unwrap();
    fs::write(&e, "export const e = 1;").unwrap();
    fs::write(&test, "import '../src/a';").unwrap();

    let mut project = FixtureProject::new(dir.path().to_path_buf());
    let mut options = AffectedOptions::default();
    options.changed_files = Some(vec![a.clone()]);
    run_and_observe(&mut project, &options, &[(&test, &[&a, &b])]);

    // a.ts now also imports e.ts, previously unknown to the reverse map.
    fs::write(&a, "import './b'; import './e';").unwrap();
    let mut options2 = AffectedOptions::default();
    options2.changed_files = Some(vec![a.clone()]);

    let decision = run_and_observe(&mut project, &options2, &[]);
    match decision {
        Decision::Selective { tests } => assert_eq!(tests, vec![path_str(&test)]),
        other => panic!("expected selective decision, got {other:?}"),
    }

    // The new edge (e.ts, a.test.ts) was not recorded by this run (no live
    // reporter observation fed it), so a direct edit to e.ts alone still
    // falls back - confirming the delta seed only affects *this* cycle's
    // BFS, not the persisted map, until a real runtime observation occurs.
    fs::write(&e, "export const e = 2;").unwrap();
    let mut options3 = AffectedOptions::default();
    options3.changed_files = Some(vec![e.clone()]);
    let decision = run_and_observe(&mut project, &options3, &[]);
    assert_eq!(decision, Decision::FullSuite { reason: affected_core::FallbackReason::NoTestsAffected });
}

#[test]
fn scenario_circular_imports() {
    let dir = tempfile::tempdir().unwrap();
    git(dir.path(), &["init", "-q"]);
    fs::create_dir_all(dir.path().join("src")).unwrap();
    fs::create_dir_all(dir.path().join("tests")).unwrap();
    let a = dir.path().join("src").join("a.ts");
    let b = dir.path().join("src").join("b.ts");
    let test = dir.path().join("tests").join("a.test.ts");
    fs::write(&a, "import './b'; export const a = 1;").unwrap();
    fs::write(&b, "import './a'; export const b = 1;").unwrap();
    fs::write(&test, "import '../src/a';").unwrap();

    let options = AffectedOptions::default();
    let mut project = FixtureProject::new(dir.path().to_path_buf());

    // First run: cold cache, full suite. Feed the reporter edges for the
    // mutually-importing pair itself, not just the test -- a.ts "completing"
    // with b.ts among its imports and vice versa -- so the persisted reverse
    // map contains a genuine a.ts <-> b.ts cycle, not merely the single-hop
    // leaf-to-test edges a lone test-module-end event would produce.
    let decision = run_and_observe(
        &mut project,
        &options,
        &[(&a, &[&b]), (&b, &[&a]), (&test, &[&a])],
    );
    assert_eq!(
        decision,
        Decision::FullSuite {
            reason: affected_core::FallbackReason::CacheMiss
        }
    );

    // Both sides of the cycle appear as keys in the persisted cache.
    let cache_dir = affected_core::paths::cache_dir(dir.path());
    let outcome = affected_core::cache::load_cached_reverse_map(&cache_dir, dir.path(), false);
    assert!(outcome.reverse.contains_key(&path_str(&a)));
    assert!(outcome.reverse.contains_key(&path_str(&b)));

    // Second run: modify a.ts. BFS must terminate despite the a<->b cycle
    // reachable through the reverse map, and select the test exactly once.
    fs::write(&a, "import './b'; export const a = 2;").unwrap();
    let mut options2 = AffectedOptions::default();
    options2.changed_files = Some(vec![a.clone()]);

    let decision = run_and_observe(&mut project, &options2, &[]);
    match decision {
        Decision::Selective { tests } => assert_eq!(tests, vec![path_str(&test)]),
        other => panic!("expected selective decision, got {other:?}"),
    }
}

#[test]
fn scenario_interrupted_run_preserves_cache() {
    let dir = tempfile::tempdir().unwrap();
    git(dir.path(), &["init", "-q"]);
    fs::create_dir_all(dir.path().join("src")).unwrap();
    fs::create_dir_all(dir.path().join("tests")).unwrap();
    let a = dir.path().join("src").join("a.ts");
    let test = dir.path().join("tests").join("a.test.ts");
    fs::write(&a, "export const a = 1;").unwrap();
    fs::write(&test, "import '../src/a';").unwrap();

    let mut project = FixtureProject::new(dir.path().to_path_buf());
    let mut options = AffectedOptions::default();
    options.changed_files = Some(vec![a.clone()]);
    run_and_observe(&mut project, &options, &[(&test, &[&a])]);

    let cache_path = affected_core::paths::graph_path(dir.path());
    let before = fs::read(&cache_path).unwrap();

    // Second run: warm cache, a.ts changes again, but the run is cancelled
    // mid-flight. The reporter must discard its accumulated edges before
    // they ever reach the sink, so the persisted cache is untouched byte
    // for byte.
    fs::write(&a, "export const a = 2;").unwrap();
    let mut options2 = AffectedOptions::default();
    options2.changed_files = Some(vec![a.clone()]);

    let mut registry = CapturingRegistry { reporter: None };
    let outcome = configure(&mut project, &mut registry, &options2).unwrap();
    let reporter = outcome.reporter.expect("warm run installs a reporter");
    reporter.set_root_dir(&project.root);
    let mut imports = HashMap::new();
    imports.insert(path_str(&a), 1.0);
    reporter.on_test_module_end(&path_str(&test), &imports);
    reporter.on_test_run_end("interrupted");

    let after = fs::read(&cache_path).unwrap();
    assert_eq!(
        before, after,
        "interrupted run must leave the persisted cache byte-identical"
    );
}
