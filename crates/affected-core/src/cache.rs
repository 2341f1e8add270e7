//! Persistent reverse-dependency cache (spec §4.3).
//!
//! Grounded on the teacher's `fastnode-daemon::cache` reverse-index shape
//! (a `HashMap<PathBuf, HashSet<_>>` invalidated by path) and the pack's
//! write-temp-then-rename cache implementations. Unlike the teacher's
//! in-memory `RwLock`-guarded caches, this one is the single persisted
//! document the whole system is built around, so it owns (de)serialization,
//! prototype-pollution-safe parsing, and prune/merge directly.

use crate::error::AffectedError;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::{HashMap, HashSet};
use std::path::Path;
use std::time::{SystemTime, UNIX_EPOCH};
use tracing::{debug, warn};

/// Current schema version written by this build. Readers accept `{1, 2}`.
pub const CURRENT_SCHEMA_VERSION: u32 = 2;

/// Object keys that would pollute `Object.prototype` if blindly assigned on
/// the JS side that eventually consumes this cache; rejected at any
/// nesting level (spec §3, §8).
const PROHIBITED_KEYS: &[&str] = &["__proto__", "constructor", "prototype"];

/// The in-memory reverse map: source file -> set of tests that imported it.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReverseMap {
    edges: HashMap<String, HashSet<String>>,
}

impl ReverseMap {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.edges.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.edges.is_empty()
    }

    #[must_use]
    pub fn contains_key(&self, source: &str) -> bool {
        self.edges.contains_key(source)
    }

    #[must_use]
    pub fn get(&self, source: &str) -> Option<&HashSet<String>> {
        self.edges.get(source)
    }

    pub fn sources(&self) -> impl Iterator<Item = &String> {
        self.edges.keys()
    }

    /// Record a single `(source, test)` edge, creating the source's entry
    /// if needed. A key with an empty value set is never left behind by any
    /// other operation in this module, but `insert_edge` itself only adds.
    pub fn insert_edge(&mut self, source: impl Into<String>, test: impl Into<String>) {
        self.edges.entry(source.into()).or_default().insert(test.into());
    }

    /// Ensure `source` is present as a key, with an empty set if new. Used
    /// by the delta parser's seeding contract, which only cares about key
    /// presence, never the value.
    pub fn ensure_key(&mut self, source: impl Into<String>) {
        self.edges.entry(source.into()).or_default();
    }

    /// Remove `test` from every value set. Deletes any key whose set
    /// becomes empty as a result. Returns the number of sources touched.
    pub fn remove_test_everywhere(&mut self, test: &str) -> usize {
        let mut touched = 0;
        self.edges.retain(|_, tests| {
            if tests.remove(test) {
                touched += 1;
            }
            !tests.is_empty()
        });
        touched
    }

    /// Prune: drop any key whose source path fails `source_exists`, drop any
    /// test reference whose path fails `test_exists`, then drop any key
    /// whose value set becomes empty (spec §4.3 `pruneRuntimeEdges`).
    pub fn prune(&mut self, source_exists: impl Fn(&str) -> bool, test_exists: impl Fn(&str) -> bool) {
        self.edges.retain(|source, tests| {
            if !source_exists(source) {
                return false;
            }
            tests.retain(|t| test_exists(t));
            !tests.is_empty()
        });
    }

    /// Per-test overwrite merge (spec §4.3 `mergeRunEdges`): the tests that
    /// ran this cycle (the union of `new_edges`' value sets) have every
    /// prior contribution removed first, then the fresh edges are added
    /// back. Tests that did not run this cycle are left untouched.
    pub fn merge_run_edges(&mut self, new_edges: &HashMap<String, HashSet<String>>) {
        let ran_tests: HashSet<&str> = new_edges
            .values()
            .flat_map(|tests| tests.iter())
            .map(String::as_str)
            .collect();

        for test in &ran_tests {
            self.remove_test_everywhere(test);
        }

        for (source, tests) in new_edges {
            for test in tests {
                self.insert_edge(source.clone(), test.clone());
            }
        }
    }

    fn to_document(&self, built_at_ms: u64) -> CacheDocument {
        let mut runtime_edges: HashMap<String, Vec<String>> = HashMap::new();
        for (source, tests) in &self.edges {
            let mut sorted: Vec<String> = tests.iter().cloned().collect();
            sorted.sort();
            runtime_edges.insert(source.clone(), sorted);
        }
        CacheDocument {
            version: CURRENT_SCHEMA_VERSION,
            built_at_ms,
            runtime_edges,
        }
    }

    fn from_runtime_edges(runtime_edges: HashMap<String, Vec<String>>) -> Self {
        let mut edges = HashMap::new();
        for (source, tests) in runtime_edges {
            edges.insert(source, tests.into_iter().collect());
        }
        Self { edges }
    }
}

/// The versioned on-disk cache document (spec §3 Cache document, §6).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheDocument {
    pub version: u32,
    #[serde(rename = "builtAt")]
    pub built_at_ms: u64,
    #[serde(rename = "runtimeEdges")]
    pub runtime_edges: HashMap<String, Vec<String>>,
}

/// Result of [`load_cached_reverse_map`].
#[derive(Debug, Clone, Default)]
pub struct LoadOutcome {
    pub reverse: ReverseMap,
    /// `true` iff `graph.json` existed and parsed into a valid document.
    pub hit: bool,
}

/// Recursively reject any object key in `PROHIBITED_KEYS`, at any nesting
/// level (spec §3, §8's poisoning-resistance property).
fn contains_prohibited_key(value: &Value) -> bool {
    match value {
        Value::Object(map) => map.iter().any(|(k, v)| {
            PROHIBITED_KEYS.contains(&k.as_str()) || contains_prohibited_key(v)
        }),
        Value::Array(items) => items.iter().any(contains_prohibited_key),
        _ => false,
    }
}

/// Validate the document shape per spec §4.3: version in `{1, 2}`, required
/// fields present with the right type.
fn validate_shape(value: &Value) -> bool {
    let Some(obj) = value.as_object() else {
        return false;
    };
    let Some(version) = obj.get("version").and_then(Value::as_u64) else {
        return false;
    };
    if version != 1 && version != 2 {
        return false;
    }
    if obj.get("builtAt").and_then(Value::as_u64).is_none() {
        return false;
    }
    matches!(obj.get("runtimeEdges"), Some(Value::Object(_)))
}

fn parse_document(raw: &str) -> Option<CacheDocument> {
    let value: Value = serde_json::from_str(raw).ok()?;

    if contains_prohibited_key(&value) {
        warn!("[vitest-affected] graph.json contains a prohibited prototype key, discarding");
        return None;
    }

    if !validate_shape(&value) {
        warn!("[vitest-affected] graph.json failed shape validation, discarding");
        return None;
    }

    // Version 1 -> 2 migration: discard the v1-only inlined-edges field,
    // keep runtimeEdges untouched. Both versions carry the same field name.
    serde_json::from_value(value).ok()
}

/// Clean orphaned `.tmp-*` writers, read `graph.json`, parse with the
/// prototype-pollution guard, then prune against current disk state (spec
/// §4.3 `loadCachedReverseMap`).
///
/// Never returns an error: any failure (missing file, parse failure,
/// invalid shape) is a soft miss — `hit=false`, empty map — matching the
/// orchestrator's "cache-miss"/"cache-invalid" fallback reasons.
pub fn load_cached_reverse_map(cache_dir: &Path, root_dir: &Path, verbose: bool) -> LoadOutcome {
    affected_util::fs::clean_orphaned_tmp_files(cache_dir);

    let graph_path = cache_dir.join("graph.json");
    let raw = match std::fs::read_to_string(&graph_path) {
        Ok(raw) => raw,
        Err(e) => {
            if verbose {
                debug!("[vitest-affected] no cache at {}: {e}", graph_path.display());
            }
            return LoadOutcome::default();
        }
    };

    let Some(doc) = parse_document(&raw) else {
        return LoadOutcome::default();
    };

    let mut reverse = ReverseMap::from_runtime_edges(doc.runtime_edges);
    reverse.prune(
        |source| root_dir.join(strip_leading_slash_if_relative(source)).exists() || Path::new(source).exists(),
        |test| root_dir.join(strip_leading_slash_if_relative(test)).exists() || Path::new(test).exists(),
    );

    if verbose {
        debug!(
            "[vitest-affected] loaded cache with {} source entries",
            reverse.len()
        );
    }

    LoadOutcome { reverse, hit: true }
}

/// Canonical paths are already absolute; this only guards against a path
/// that was stored relative in an older/foreign document.
fn strip_leading_slash_if_relative(p: &str) -> &str {
    p.trim_start_matches('/')
}

/// Serialize `reverse` into the current-version cache document and write it
/// atomically to `cache_dir/graph.json` (spec §4.3 `saveCacheSync`).
pub fn save_cache_sync(cache_dir: &Path, reverse: &ReverseMap) -> Result<(), AffectedError> {
    std::fs::create_dir_all(cache_dir)?;

    let built_at_ms = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0);

    let doc = reverse.to_document(built_at_ms);
    let bytes = serde_json::to_vec_pretty(&doc)
        .map_err(|e| AffectedError::other(format!("failed to serialize cache: {e}")))?;

    let graph_path = cache_dir.join("graph.json");
    affected_util::fs::atomic_write_in_dir(cache_dir, &graph_path, &bytes)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    #[test]
    fn test_insert_and_get() {
        let mut map = ReverseMap::new();
        map.insert_edge("/src/a.ts", "/tests/a.test.ts");
        assert!(map.get("/src/a.ts").unwrap().contains("/tests/a.test.ts"));
    }

    #[test]
    fn test_remove_test_everywhere_drops_empty_key() {
        let mut map = ReverseMap::new();
        map.insert_edge("/src/a.ts", "/tests/a.test.ts");
        map.remove_test_everywhere("/tests/a.test.ts");
        assert!(!map.contains_key("/src/a.ts"));
    }

    #[test]
    fn test_remove_test_everywhere_keeps_other_tests() {
        let mut map = ReverseMap::new();
        map.insert_edge("/src/a.ts", "/tests/a.test.ts");
        map.insert_edge("/src/a.ts", "/tests/b.test.ts");
        map.remove_test_everywhere("/tests/a.test.ts");
        assert!(map.contains_key("/src/a.ts"));
        assert!(map.get("/src/a.ts").unwrap().contains("/tests/b.test.ts"));
    }

    #[test]
    fn test_prune_drops_missing_source() {
        let mut map = ReverseMap::new();
        map.insert_edge("/missing.ts", "/tests/a.test.ts");
        map.prune(|_| false, |_| true);
        assert!(map.is_empty());
    }

    #[test]
    fn test_prune_drops_missing_test_and_empties_key() {
        let mut map = ReverseMap::new();
        map.insert_edge("/src/a.ts", "/tests/missing.test.ts");
        map.prune(|_| true, |_| false);
        assert!(map.is_empty());
    }

    #[test]
    fn test_merge_per_test_overwrite_drops_stale_edge() {
        let mut map = ReverseMap::new();
        map.insert_edge("/src/old.ts", "/tests/a.test.ts");

        let mut new_edges: HashMap<String, HashSet<String>> = HashMap::new();
        new_edges
            .entry("/src/new.ts".to_string())
            .or_default()
            .insert("/tests/a.test.ts".to_string());

        map.merge_run_edges(&new_edges);

        assert!(!map.contains_key("/src/old.ts"));
        assert!(map.get("/src/new.ts").unwrap().contains("/tests/a.test.ts"));
    }

    #[test]
    fn test_merge_leaves_tests_that_did_not_run() {
        let mut map = ReverseMap::new();
        map.insert_edge("/src/a.ts", "/tests/a.test.ts");
        map.insert_edge("/src/b.ts", "/tests/b.test.ts");

        let mut new_edges: HashMap<String, HashSet<String>> = HashMap::new();
        new_edges
            .entry("/src/a.ts".to_string())
            .or_default()
            .insert("/tests/a.test.ts".to_string());

        map.merge_run_edges(&new_edges);

        assert!(map.contains_key("/src/a.ts"));
        assert!(map.contains_key("/src/b.ts"), "untouched test's edges must survive");
    }

    #[test]
    fn test_merge_no_edges_is_noop_when_nothing_ran() {
        let mut map = ReverseMap::new();
        map.insert_edge("/src/a.ts", "/tests/a.test.ts");
        let before = map.clone();
        map.merge_run_edges(&HashMap::new());
        assert_eq!(map, before);
    }

    #[test]
    fn test_save_then_load_round_trips() {
        let dir = tempdir().unwrap();
        let cache_dir = dir.path().join(".vitest-affected");
        let src = dir.path().join("a.ts");
        let test = dir.path().join("a.test.ts");
        fs::write(&src, "").unwrap();
        fs::write(&test, "").unwrap();

        let mut map = ReverseMap::new();
        map.insert_edge(src.to_string_lossy().to_string(), test.to_string_lossy().to_string());

        save_cache_sync(&cache_dir, &map).unwrap();
        let outcome = load_cached_reverse_map(&cache_dir, dir.path(), false);

        assert!(outcome.hit);
        assert_eq!(outcome.reverse, map);
    }

    #[test]
    fn test_load_missing_cache_is_soft_miss() {
        let dir = tempdir().unwrap();
        let outcome = load_cached_reverse_map(&dir.path().join(".vitest-affected"), dir.path(), false);
        assert!(!outcome.hit);
        assert!(outcome.reverse.is_empty());
    }

    #[test]
    fn test_load_rejects_proto_pollution_key() {
        let dir = tempdir().unwrap();
        let cache_dir = dir.path().join(".vitest-affected");
        fs::create_dir_all(&cache_dir).unwrap();
        fs::write(
            cache_dir.join("graph.json"),
            r#"{"version":2,"builtAt":1,"runtimeEdges":{"__proto__":["x"]}}"#,
        )
        .unwrap();

        let outcome = load_cached_reverse_map(&cache_dir, dir.path(), false);
        assert!(!outcome.hit);
        assert!(outcome.reverse.is_empty());
    }

    #[test]
    fn test_load_rejects_unknown_version() {
        let dir = tempdir().unwrap();
        let cache_dir = dir.path().join(".vitest-affected");
        fs::create_dir_all(&cache_dir).unwrap();
        fs::write(
            cache_dir.join("graph.json"),
            r#"{"version":99,"builtAt":1,"runtimeEdges":{}}"#,
        )
        .unwrap();

        let outcome = load_cached_reverse_map(&cache_dir, dir.path(), false);
        assert!(!outcome.hit);
    }

    #[test]
    fn test_load_corrupt_json_is_soft_miss() {
        let dir = tempdir().unwrap();
        let cache_dir = dir.path().join(".vitest-affected");
        fs::create_dir_all(&cache_dir).unwrap();
        fs::write(cache_dir.join("graph.json"), "{not json").unwrap();

        let outcome = load_cached_reverse_map(&cache_dir, dir.path(), false);
        assert!(!outcome.hit);
    }

    #[test]
    fn test_load_migrates_v1_document() {
        let dir = tempdir().unwrap();
        let cache_dir = dir.path().join(".vitest-affected");
        let src = dir.path().join("a.ts");
        let test = dir.path().join("a.test.ts");
        fs::write(&src, "").unwrap();
        fs::write(&test, "").unwrap();
        fs::create_dir_all(&cache_dir).unwrap();
        fs::write(
            cache_dir.join("graph.json"),
            format!(
                r#"{{"version":1,"builtAt":1,"inlinedEdges":{{"stale":true}},"runtimeEdges":{{"{}":["{}"]}}}}"#,
                src.to_string_lossy().replace('\\', "\\\\"),
                test.to_string_lossy().replace('\\', "\\\\"),
            ),
        )
        .unwrap();

        let outcome = load_cached_reverse_map(&cache_dir, dir.path(), false);
        assert!(outcome.hit);
        assert_eq!(outcome.reverse.len(), 1);
    }

    #[test]
    fn test_orphaned_tmp_cleaned_on_load() {
        let dir = tempdir().unwrap();
        let cache_dir = dir.path().join(".vitest-affected");
        fs::create_dir_all(&cache_dir).unwrap();
        fs::write(cache_dir.join(".tmp-orphan"), b"junk").unwrap();

        load_cached_reverse_map(&cache_dir, dir.path(), false);

        assert!(!cache_dir.join(".tmp-orphan").exists());
    }
}
