//! Specifier resolution: relative/absolute/bare specifiers to absolute
//! filesystem paths.
//!
//! Trimmed from a Node-style resolver: no `package.json` `exports`/`imports`
//! conditional resolution (not required for a reverse-dependency edge, and
//! a real TS/JS toolchain already owns that concern at build time). Kept:
//! extension probing, directory `index.*`/`main` resolution, `node_modules`
//! walk-up, and a minimal `tsconfig.json` `compilerOptions.paths`-style
//! prefix substitution table.

use std::path::{Path, PathBuf};

/// Default extensions probed when a specifier has none, in priority order.
pub const DEFAULT_EXTENSIONS: &[&str] = &["ts", "tsx", "js", "jsx", "mjs", "cjs", "json"];

/// A single `compilerOptions.paths`-style mapping: a specifier prefix (e.g.
/// `"@app/"`) to the absolute directory it is rewritten to.
#[derive(Debug, Clone)]
pub struct PathMapping {
    pub prefix: String,
    pub target_dir: PathBuf,
}

/// Resolver configuration.
#[derive(Debug, Clone)]
pub struct ResolveConfig {
    /// Extensions to probe, in order, without the leading dot.
    pub extensions: Vec<String>,
    /// `tsconfig.json` path mappings, longest-prefix matched first.
    pub path_mappings: Vec<PathMapping>,
}

impl Default for ResolveConfig {
    fn default() -> Self {
        Self {
            extensions: DEFAULT_EXTENSIONS.iter().map(|s| (*s).to_string()).collect(),
            path_mappings: Vec::new(),
        }
    }
}

/// Outcome of resolving a single specifier.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResolveOutcome {
    /// Resolved to an absolute, existing file.
    Resolved(PathBuf),
    /// A built-in module, URL-scheme, or otherwise unresolvable specifier.
    /// Treated as a soft miss: skip, don't error.
    Unresolvable,
}

/// Resolve `specifier` as imported from `importer_dir` (the directory
/// containing the importing file).
#[must_use]
pub fn resolve(config: &ResolveConfig, importer_dir: &Path, specifier: &str) -> ResolveOutcome {
    if specifier.is_empty()
        || specifier.contains("://")
        || specifier.starts_with("node:")
        || specifier.starts_with("data:")
    {
        return ResolveOutcome::Unresolvable;
    }

    if let Some(mapped) = apply_path_mapping(config, specifier) {
        return resolve_path(config, &mapped);
    }

    if specifier.starts_with("./") || specifier.starts_with("../") {
        return resolve_path(config, &importer_dir.join(specifier));
    }

    if is_absolute_path(specifier) {
        return resolve_path(config, &PathBuf::from(specifier));
    }

    resolve_bare(config, importer_dir, specifier)
}

fn apply_path_mapping(config: &ResolveConfig, specifier: &str) -> Option<PathBuf> {
    config
        .path_mappings
        .iter()
        .filter(|m| specifier.starts_with(m.prefix.as_str()))
        .max_by_key(|m| m.prefix.len())
        .map(|m| m.target_dir.join(&specifier[m.prefix.len()..]))
}

fn is_absolute_path(spec: &str) -> bool {
    if spec.starts_with('/') {
        return true;
    }
    let chars: Vec<char> = spec.chars().collect();
    if chars.len() >= 3
        && chars[0].is_ascii_alphabetic()
        && chars[1] == ':'
        && (chars[2] == '\\' || chars[2] == '/')
    {
        return true;
    }
    spec.starts_with("\\\\")
}

fn resolve_path(config: &ResolveConfig, base: &Path) -> ResolveOutcome {
    if base.is_file() {
        return ResolveOutcome::Resolved(canonical(base));
    }

    // ESM-TS convention: a specifier written with a `.js`/`.mjs`/`.cjs`/`.jsx`
    // extension may resolve to the `.ts`/`.tsx` source that produces it.
    if has_swappable_extension(base) {
        for ext in &config.extensions {
            let swapped = base.with_extension(ext);
            if swapped != base && swapped.is_file() {
                return ResolveOutcome::Resolved(canonical(&swapped));
            }
        }
    }

    for ext in &config.extensions {
        let with_ext = append_extension(base, ext);
        if with_ext.is_file() {
            return ResolveOutcome::Resolved(canonical(&with_ext));
        }
    }

    if base.is_dir() {
        return resolve_directory(config, base);
    }

    ResolveOutcome::Unresolvable
}

fn has_swappable_extension(base: &Path) -> bool {
    matches!(
        base.extension().and_then(|e| e.to_str()),
        Some("js" | "jsx" | "mjs" | "cjs")
    )
}

/// `base.with_extension` replaces an existing extension; specifiers like
/// `./dep` have none, and `./dep.js` resolving to `./dep.ts` must not
/// collapse to `dep.ts` in place of `dep.js.ts`. Always append.
fn append_extension(base: &Path, ext: &str) -> PathBuf {
    let mut name = base
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    name.push('.');
    name.push_str(ext);
    base.with_file_name(name)
}

fn resolve_directory(config: &ResolveConfig, dir: &Path) -> ResolveOutcome {
    let pkg_json_path = dir.join("package.json");
    if pkg_json_path.is_file() {
        if let Ok(content) = std::fs::read_to_string(&pkg_json_path) {
            if let Ok(value) = serde_json::from_str::<serde_json::Value>(&content) {
                if let Some(main) = value.get("main").and_then(|v| v.as_str()) {
                    let main_path = dir.join(main);
                    match resolve_path(config, &main_path) {
                        ResolveOutcome::Resolved(p) => return ResolveOutcome::Resolved(p),
                        ResolveOutcome::Unresolvable => {}
                    }
                }
            }
        }
    }

    for ext in &config.extensions {
        let index = dir.join(format!("index.{ext}"));
        if index.is_file() {
            return ResolveOutcome::Resolved(canonical(&index));
        }
    }

    ResolveOutcome::Unresolvable
}

fn resolve_bare(config: &ResolveConfig, importer_dir: &Path, spec: &str) -> ResolveOutcome {
    let pkg_name = parse_bare_package_name(spec);
    let subpath = spec[pkg_name.len()..].trim_start_matches('/');

    let mut current = Some(importer_dir);
    while let Some(dir) = current {
        let pkg_dir = dir.join("node_modules").join(pkg_name);
        if pkg_dir.is_dir() {
            let target = if subpath.is_empty() {
                pkg_dir
            } else {
                pkg_dir.join(subpath)
            };
            return resolve_path(config, &target);
        }
        current = dir.parent();
    }

    ResolveOutcome::Unresolvable
}

fn parse_bare_package_name(spec: &str) -> &str {
    if spec.starts_with('@') {
        let mut slash_count = 0;
        for (i, c) in spec.char_indices() {
            if c == '/' {
                slash_count += 1;
                if slash_count == 2 {
                    return &spec[..i];
                }
            }
        }
        return spec;
    }
    spec.split('/').next().unwrap_or(spec)
}

fn canonical(path: &Path) -> PathBuf {
    path.canonicalize().unwrap_or_else(|_| path.to_path_buf())
}

/// Returns `true` if `resolved` lies inside a `node_modules` directory —
/// an external leaf the delta parser must not seed the BFS with.
#[must_use]
pub fn is_in_node_modules(resolved: &Path) -> bool {
    resolved
        .components()
        .any(|c| c.as_os_str() == "node_modules")
}
