//! The orchestrator (spec §4.7): the single pipeline invoked once per run,
//! composing every other component behind one safety invariant — the only
//! way the host's test-file include list narrows is the conjunction of a
//! valid cache hit, detected changes, no full-suite trigger, and a
//! non-empty, below-threshold affected set. Every other path leaves the
//! include list untouched.

use crate::bfs::bfs_affected_tests;
use crate::cache::{self, ReverseMap};
use crate::change_detector;
use crate::config::{AffectedOptions, DISABLED_ENV_VAR, FULL_SUITE_TRIGGER_BASENAMES};
use crate::delta::delta_parse_new_imports;
use crate::error::{AffectedError, FallbackReason};
use crate::normalize::normalize;
use crate::paths::cache_dir;
use crate::reporter::{ReporterHooks, ReporterRegistry, RuntimeEdgeReporter};
use crate::stats::{append_stats_line, format_iso8601, StatsAction, StatsLine};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::{Instant, SystemTime};
use tracing::warn;

/// The peripheral host-runner config surface (spec §6 Inputs) abstracted so
/// the orchestrator is fully testable without an actual Vitest process.
pub trait HostProject {
    fn root_dir(&self) -> Option<&Path>;
    fn include_patterns(&self) -> Option<&[String]>;
    fn exclude_patterns(&self) -> &[String];
    fn setup_files(&self) -> &[PathBuf];
    fn is_watch_mode(&self) -> bool;
    fn project_count(&self) -> usize;
    fn set_include(&mut self, tests: Vec<String>);
}

/// The outcome of a single run of a run (spec §7's four error kinds,
/// folded into data: only [`AffectedError`]'s `Hard` variant ever escapes
/// as an `Err`, everything else is a [`Decision`]).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Decision {
    /// Plugin disabled (option or `VITEST_AFFECTED_DISABLED=1`); no
    /// warning, no stats line, no cache touched.
    Disabled,
    /// Include list left untouched; the host runs its full suite.
    FullSuite { reason: FallbackReason },
    /// Include list replaced with this non-empty, strictly narrower set
    /// (or, when `allow_no_tests` permits it, an empty set).
    Selective { tests: Vec<String> },
}

/// Everything a single `configure` call produces: the selection decision,
/// and (when not disabled) the reporter the caller must install into its
/// actual reporter chain so runtime edges flow back into the cache at run
/// end (spec §4.5/§4.7 step 6).
pub struct OrchestratorOutcome {
    pub decision: Decision,
    pub reporter: Option<Arc<RuntimeEdgeReporter>>,
}

/// Run the orchestration pipeline once (spec §4.7, all 19 steps).
///
/// # Errors
/// Only ever returns `Err` for [`AffectedError::ShallowHistory`] (spec §7
/// `Hard`) — a reference diff requested against a shallow checkout.
pub fn configure(
    project: &mut dyn HostProject,
    registry: &mut dyn ReporterRegistry,
    options: &AffectedOptions,
) -> Result<OrchestratorOutcome, AffectedError> {
    let start = Instant::now();

    // Steps 1-2: environment override / disabled short-circuit.
    let env_disabled = std::env::var(DISABLED_ENV_VAR).as_deref() == Ok("1");
    if options.disabled || env_disabled {
        return Ok(OrchestratorOutcome {
            decision: Decision::Disabled,
            reporter: None,
        });
    }

    // Step 3: workspace guard.
    if project.project_count() > 1 {
        let decision = fall_back(FallbackReason::MultiProjectWorkspace);
        record_stats(options, &decision, 0, 0, None, None, 0, false, start);
        return Ok(OrchestratorOutcome { decision, reporter: None });
    }

    // Step 4: config-shape guard.
    let (Some(root_dir), Some(include_patterns)) = (project.root_dir(), project.include_patterns()) else {
        let decision = fall_back(FallbackReason::InvalidHostConfig);
        record_stats(options, &decision, 0, 0, None, None, 0, false, start);
        return Ok(OrchestratorOutcome { decision, reporter: None });
    };
    let root_dir = root_dir.to_path_buf();
    let include_patterns = include_patterns.to_vec();

    // Step 5: load cache.
    let cdir = cache_dir(&root_dir);
    let load_outcome = if options.cache {
        cache::load_cached_reverse_map(&cdir, &root_dir, options.verbose)
    } else {
        cache::LoadOutcome::default()
    };
    let graph_size = load_outcome.reverse.len();
    let reverse = Arc::new(Mutex::new(load_outcome.reverse));
    let hit = load_outcome.hit;

    // Step 6: install the runtime-edge reporter, wiring its sink to
    // strip-then-merge-then-persist (best-effort: a save failure is
    // non-fatal per spec §7 `BestEffort`).
    let reporter = Arc::new(RuntimeEdgeReporter::new({
        let reverse = reverse.clone();
        let cache_dir = cdir.clone();
        let cache_enabled = options.cache;
        Box::new(move |new_edges| {
            if !cache_enabled {
                return;
            }
            let mut guard = reverse.lock().unwrap();
            guard.merge_run_edges(&new_edges);
            if let Err(e) = cache::save_cache_sync(&cache_dir, &guard) {
                warn!("[vitest-affected] failed to persist cache: {e}");
            }
        })
    }));
    reporter.set_root_dir(&root_dir);
    registry.ensure_installed(reporter.clone() as Arc<dyn ReporterHooks>);

    // Step 7: watch-mode filter. The host's own module graph governs
    // watch-time selection; this orchestrator run still completes and may
    // narrow the *initial* include list the same as a non-watch run.
    let _watch_mode = project.is_watch_mode();

    // Step 8: determine the change set.
    let change_set = if let Some(files) = &options.changed_files {
        resolve_explicit_change_set(files)
    } else {
        change_detector::detect(&root_dir, options.reference.as_deref())?
    };

    // Step 9: no-change short-circuit (no warning per spec §6).
    if change_set.is_empty() {
        let decision = Decision::FullSuite {
            reason: FallbackReason::NoChanges,
        };
        record_stats(options, &decision, 0, 0, None, None, graph_size, hit, start);
        return Ok(OrchestratorOutcome {
            decision,
            reporter: Some(reporter),
        });
    }

    let changed_count = change_set.changed.len() as u32;
    let deleted_count = change_set.deleted.len() as u32;

    // Step 10: full-suite triggers (config file / setup file touched).
    if let Some(reason) = full_suite_trigger_reason(&change_set.union(), project.setup_files()) {
        let decision = fall_back(reason);
        record_stats(options, &decision, changed_count, deleted_count, None, None, graph_size, hit, start);
        return Ok(OrchestratorOutcome { decision, reporter: Some(reporter) });
    }

    // Step 11: cold-cache full suite.
    if !hit {
        let decision = fall_back(FallbackReason::CacheMiss);
        record_stats(options, &decision, changed_count, deleted_count, None, None, graph_size, hit, start);
        return Ok(OrchestratorOutcome { decision, reporter: Some(reporter) });
    }

    // Step 12: delta parse + seed the BFS.
    let reverse_snapshot = reverse.lock().unwrap().clone();
    let delta_seeds = delta_parse_new_imports(&change_set.changed, &reverse_snapshot, &root_dir, options.verbose);

    let mut seeds: Vec<String> = Vec::new();
    let mut seen_seeds: HashSet<String> = HashSet::new();
    for s in change_set.changed.iter().chain(change_set.deleted.iter()).chain(delta_seeds.iter()) {
        if seen_seeds.insert(s.clone()) {
            seeds.push(s.clone());
        }
    }

    // Step 13: resolve the test universe.
    let universe = match glob_test_universe(&root_dir, &include_patterns, project.exclude_patterns()) {
        Ok(u) if !u.is_empty() => u,
        _ => {
            let decision = fall_back(FallbackReason::EmptyTestUniverse);
            record_stats(options, &decision, changed_count, deleted_count, None, None, graph_size, hit, start);
            return Ok(OrchestratorOutcome { decision, reporter: Some(reporter) });
        }
    };

    // Step 14: BFS.
    let affected = bfs_affected_tests(&seeds, &reverse_snapshot, |p| universe.contains(p));

    // Step 15: zero-affected policy.
    if affected.is_empty() {
        if options.allow_no_tests {
            project.set_include(Vec::new());
            let decision = Decision::Selective { tests: Vec::new() };
            record_stats(
                options,
                &decision,
                changed_count,
                deleted_count,
                Some(0),
                Some(universe.len() as u32),
                graph_size,
                hit,
                start,
            );
            return Ok(OrchestratorOutcome { decision, reporter: Some(reporter) });
        }
        let decision = fall_back(FallbackReason::NoTestsAffected);
        record_stats(
            options,
            &decision,
            changed_count,
            deleted_count,
            Some(0),
            Some(universe.len() as u32),
            graph_size,
            hit,
            start,
        );
        return Ok(OrchestratorOutcome { decision, reporter: Some(reporter) });
    }

    // Step 16: threshold gate.
    let ratio = affected.len() as f64 / universe.len() as f64;
    if ratio > options.threshold {
        let decision = fall_back(FallbackReason::ThresholdExceeded);
        record_stats(
            options,
            &decision,
            changed_count,
            deleted_count,
            Some(affected.len() as u32),
            Some(universe.len() as u32),
            graph_size,
            hit,
            start,
        );
        return Ok(OrchestratorOutcome { decision, reporter: Some(reporter) });
    }

    // Step 17: disk existence filter.
    let surviving: Vec<String> = affected
        .into_iter()
        .filter(|t| {
            let exists = Path::new(t).exists();
            if !exists {
                warn!("[vitest-affected] dropping affected test no longer on disk: {t}");
            }
            exists
        })
        .collect();

    // Step 18: apply.
    project.set_include(surviving.clone());

    let decision = Decision::Selective { tests: surviving };
    record_stats(
        options,
        &decision,
        changed_count,
        deleted_count,
        Some(match &decision {
            Decision::Selective { tests } => tests.len() as u32,
            Decision::FullSuite { .. } | Decision::Disabled => 0,
        }),
        Some(universe.len() as u32),
        graph_size,
        hit,
        start,
    );

    Ok(OrchestratorOutcome { decision, reporter: Some(reporter) })
}

fn fall_back(reason: FallbackReason) -> Decision {
    warn!("[vitest-affected] falling back to full suite: {reason}");
    Decision::FullSuite { reason }
}

fn resolve_explicit_change_set(files: &[PathBuf]) -> change_detector::ChangeSet {
    let mut changed = Vec::new();
    let mut deleted = Vec::new();
    for f in files {
        let canonical = normalize(&affected_util::paths::to_forward_slash(f));
        if f.exists() {
            changed.push(canonical);
        } else {
            deleted.push(canonical);
        }
    }
    change_detector::ChangeSet { changed, deleted }
}

fn full_suite_trigger_reason(union: &[String], setup_files: &[PathBuf]) -> Option<FallbackReason> {
    let setup_canonical: HashSet<String> = setup_files
        .iter()
        .map(|p| normalize(&affected_util::paths::to_forward_slash(p)))
        .collect();

    for path in union {
        let basename = Path::new(path).file_name().and_then(|n| n.to_str()).unwrap_or("");
        if FULL_SUITE_TRIGGER_BASENAMES.contains(&basename) {
            return Some(FallbackReason::ConfigChange);
        }
        if setup_canonical.contains(path) {
            return Some(FallbackReason::SetupFileChange);
        }
    }
    None
}

fn glob_test_universe(
    root_dir: &Path,
    include_patterns: &[String],
    exclude_patterns: &[String],
) -> Result<HashSet<String>, AffectedError> {
    let mut universe = HashSet::new();

    for pattern in include_patterns {
        let full_pattern = root_dir.join(pattern);
        let full_pattern_str = full_pattern.to_string_lossy().into_owned();
        let entries = glob::glob(&full_pattern_str)
            .map_err(|e| AffectedError::other(format!("invalid include pattern {pattern}: {e}")))?;

        for entry in entries.flatten() {
            if !entry.is_file() {
                continue;
            }
            let canonical = normalize(&affected_util::paths::to_forward_slash(&entry));
            if is_excluded(&canonical, exclude_patterns) {
                continue;
            }
            universe.insert(canonical);
        }
    }

    Ok(universe)
}

fn is_excluded(path: &str, exclude_patterns: &[String]) -> bool {
    if path.contains("/node_modules/") {
        return true;
    }
    exclude_patterns.iter().any(|pattern| glob_match_simple(pattern, path))
}

/// Minimal glob matcher for exclude patterns: delegates to the `glob`
/// crate's `Pattern` for full `*`/`**`/`?` support.
fn glob_match_simple(pattern: &str, path: &str) -> bool {
    glob::Pattern::new(pattern)
        .map(|p| p.matches(path))
        .unwrap_or(false)
}

#[allow(clippy::too_many_arguments)]
fn record_stats(
    options: &AffectedOptions,
    decision: &Decision,
    changed_files: u32,
    deleted_files: u32,
    affected_tests: Option<u32>,
    total_tests: Option<u32>,
    graph_size: usize,
    cache_hit: bool,
    start: Instant,
) {
    let Some(stats_path) = &options.stats_file else {
        return;
    };

    let (action, reason) = match decision {
        Decision::Selective { .. } => (StatsAction::Selective, None),
        Decision::FullSuite { reason } => (StatsAction::FullSuite, Some(reason.as_str().to_string())),
        Decision::Disabled => return,
    };

    let timestamp = format_iso8601(SystemTime::now());

    let line = StatsLine {
        timestamp,
        action,
        reason,
        changed_files,
        deleted_files,
        affected_tests,
        total_tests,
        graph_size: graph_size as u32,
        cache_hit,
        duration_ms: start.elapsed().as_millis() as u64,
    };

    append_stats_line(stats_path, &line);
}
