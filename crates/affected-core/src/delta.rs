//! Delta static-import parser (spec §4.4).
//!
//! Parses the files in this cycle's change set, resolves their import
//! specifiers to absolute paths with `affected_parser`, and reports every
//! resolved target that is not already a key of the reverse map, so the
//! BFS can be seeded with imports the runtime reporter has not observed
//! yet (spec's "why": BFS only walks *existing* reverse edges; a newly
//! introduced import has none until the next run records it).

use crate::cache::ReverseMap;
use affected_parser::{
    is_in_node_modules, resolve, scan_imports, ImportKind, PathMapping, ResolveConfig, ResolveOutcome,
};
use serde_json::Value;
use std::collections::BTreeSet;
use std::path::Path;
use tracing::{debug, warn};

/// Read `rootDir/tsconfig.json`'s `compilerOptions.paths` (if present) into
/// the resolver's flat prefix-substitution table (spec §4.4: "implemented
/// as a minimal prefix-substitution table", a deliberate simplification of
/// a full TS resolver).
fn read_tsconfig_path_mappings(root_dir: &Path) -> Vec<PathMapping> {
    let tsconfig_path = root_dir.join("tsconfig.json");
    let Ok(raw) = std::fs::read_to_string(&tsconfig_path) else {
        return Vec::new();
    };
    let Ok(value) = serde_json::from_str::<Value>(&raw) else {
        return Vec::new();
    };

    let Some(paths) = value
        .get("compilerOptions")
        .and_then(|c| c.get("paths"))
        .and_then(Value::as_object)
    else {
        return Vec::new();
    };

    let mut mappings = Vec::new();
    for (pattern, targets) in paths {
        // Only the common non-wildcard-or-single-star-suffix form is
        // supported: "@app/*" -> ["src/app/*"]. Anything fancier falls back
        // to bare-specifier / node_modules resolution.
        let Some(prefix) = pattern.strip_suffix('*') else {
            continue;
        };
        let Some(first_target) = targets.as_array().and_then(|a| a.first()).and_then(Value::as_str) else {
            continue;
        };
        let Some(target_prefix) = first_target.strip_suffix('*') else {
            continue;
        };
        mappings.push(PathMapping {
            prefix: prefix.to_string(),
            target_dir: root_dir.join(target_prefix),
        });
    }
    mappings
}

/// For each file in `changed_files`, scan its non-type-only imports and
/// re-exports plus plain-string dynamic imports, resolve each specifier,
/// and collect every resolved path that is not yet a key in `reverse_map`.
///
/// Read errors on an individual file are skipped (spec §4.4 step 1);
/// unresolvable/built-in/`node_modules` specifiers are soft misses; any
/// resolved path outside `root_dir` is dropped by the path-boundary guard.
#[must_use]
pub fn delta_parse_new_imports(
    changed_files: &[String],
    reverse_map: &ReverseMap,
    root_dir: &Path,
    verbose: bool,
) -> Vec<String> {
    let mut config = ResolveConfig::default();
    config.path_mappings = read_tsconfig_path_mappings(root_dir);
    let root_forward_slash = affected_util::paths::to_forward_slash(root_dir);

    let mut seeds: BTreeSet<String> = BTreeSet::new();

    for changed in changed_files {
        let path = Path::new(changed);
        let source = match std::fs::read_to_string(path) {
            Ok(s) => s,
            Err(e) => {
                if verbose {
                    debug!("[vitest-affected] delta parser: skipping unreadable {changed}: {e}");
                }
                continue;
            }
        };

        let Some(importer_dir) = path.parent() else {
            continue;
        };

        for spec in scan_imports(&source) {
            if spec.kind.is_type_only() {
                continue;
            }
            if !matches!(
                spec.kind,
                ImportKind::EsmImport | ImportKind::DynamicImport | ImportKind::CjsRequire | ImportKind::ReExport
            ) {
                continue;
            }

            let resolved = match resolve(&config, importer_dir, &spec.raw) {
                ResolveOutcome::Resolved(p) => p,
                ResolveOutcome::Unresolvable => continue,
            };

            if is_in_node_modules(&resolved) {
                continue;
            }

            let canonical = crate::normalize::normalize(&affected_util::paths::to_forward_slash(&resolved));

            if !affected_util::paths::is_under(&root_forward_slash, &canonical) {
                warn!(
                    "[vitest-affected] delta parser: dropping out-of-root resolution {canonical} for {changed}"
                );
                continue;
            }

            if !reverse_map.contains_key(&canonical) {
                seeds.insert(canonical);
            }
        }
    }

    seeds.into_iter().collect()
}
