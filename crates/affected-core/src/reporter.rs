//! Runtime-edge reporter (spec §4.5).
//!
//! A passive observer plugged into the host runner's reporter chain.
//! Because the actual host-runner reporter contract (and the "reporter
//! array gets reassigned after plugin configuration" quirk, spec §4.5/§9)
//! is JS-side plumbing out of scope per spec §1, this models the two hooks
//! as a plain Rust trait (`ReporterHooks`) plus a `ReporterRegistry` seam
//! the orchestrator installs into, so the "idempotently ensure this
//! reporter survives a list replacement" contract is testable with a mock
//! registry instead of reimplemented via host-specific object tricks.

use crate::normalize::normalize;
use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tracing::trace;

/// The two host-runner reporter hooks this system cares about.
pub trait ReporterHooks: Send + Sync {
    /// Called after a test module finishes; `imports` maps every module id
    /// the test imported during execution to its import duration (only
    /// keys are used, per spec §6's "per-test-module diagnostic").
    fn on_test_module_end(&self, test_path: &str, imports: &HashMap<String, f64>);

    /// Called once at run end. `reason` is `"interrupted"` or any other
    /// terminal reason (`pass`, `fail`, `timeout`, `user-skip`, ...).
    fn on_test_run_end(&self, reason: &str);
}

/// Seam standing in for the host's reporter-list property (spec §4.5's
/// "property-setter interception ... direct-append fallback").
pub trait ReporterRegistry {
    /// Idempotently ensure `reporter` is present, regardless of how many
    /// times the host previously replaced its reporter list.
    fn ensure_installed(&mut self, reporter: std::sync::Arc<dyn ReporterHooks>);
}

/// Sink invoked at run end with a defensive snapshot of the accumulated
/// reverse edges, for every terminal reason except `interrupted`.
pub type EdgeSink = Box<dyn Fn(HashMap<String, HashSet<String>>) + Send + Sync>;

struct Inner {
    root_dir: Option<PathBuf>,
    accumulator: HashMap<String, HashSet<String>>,
}

/// Records, for each completed test module, the modules it actually
/// imported at runtime, and emits a reverse-adjacency snapshot at run end.
pub struct RuntimeEdgeReporter {
    inner: Mutex<Inner>,
    sink: EdgeSink,
}

impl RuntimeEdgeReporter {
    #[must_use]
    pub fn new(sink: EdgeSink) -> Self {
        Self {
            inner: Mutex::new(Inner {
                root_dir: None,
                accumulator: HashMap::new(),
            }),
            sink,
        }
    }

    /// Root-directory injection seam (spec §4.5): edges are only recorded
    /// once the root is known, since the reporter is constructed before the
    /// host resolves its project root.
    pub fn set_root_dir(&self, dir: &Path) {
        self.inner.lock().unwrap().root_dir = Some(dir.to_path_buf());
    }
}

impl ReporterHooks for RuntimeEdgeReporter {
    fn on_test_module_end(&self, test_path: &str, imports: &HashMap<String, f64>) {
        let mut inner = self.inner.lock().unwrap();
        let Some(root_dir) = inner.root_dir.clone() else {
            trace!("[vitest-affected] root dir not yet set, dropping module-end edges");
            return;
        };
        let root = affected_util::paths::to_forward_slash(&root_dir);
        let test_canonical = normalize(test_path);

        for raw_import in imports.keys() {
            let m = normalize(raw_import);

            if m.starts_with('\0') || m.starts_with("/@id/") {
                continue;
            }
            if m.contains("/node_modules/") {
                continue;
            }
            if m == test_canonical {
                continue;
            }
            if !affected_util::paths::is_under(&root, &m) {
                continue;
            }

            inner
                .accumulator
                .entry(m)
                .or_default()
                .insert(test_canonical.clone());
        }
    }

    fn on_test_run_end(&self, reason: &str) {
        let mut inner = self.inner.lock().unwrap();

        if reason == "interrupted" {
            trace!("[vitest-affected] run interrupted, discarding accumulated edges");
            inner.accumulator.clear();
            return;
        }

        let snapshot = inner.accumulator.clone();
        inner.accumulator.clear();
        drop(inner);

        (self.sink)(snapshot);
    }
}
