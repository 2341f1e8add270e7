//! Module-identifier normalizer (spec §4.1).
//!
//! Pure, total, deterministic: strips host-runner-specific prefixes and
//! query suffixes from module identifiers to produce the canonical,
//! forward-slashed absolute paths used as every graph key and seed.

/// Sentinel byte Vite-style dev servers prepend to virtual module ids.
const VIRTUAL_MODULE_SENTINEL: char = '\0';

/// Filesystem-dev-server prefix exposing an absolute path outside the
/// served root (Vite's `/@fs/`).
const FS_PREFIX: &str = "/@fs/";

/// Pre-bundled dependency prefix (Vite's `/@id/`). Left untouched: these
/// identifiers are deliberately kept out of the reverse map, and callers
/// treat them conservatively (always include the importing test).
const BUNDLED_DEP_PREFIX: &str = "/@id/";

/// Normalize a module identifier to a canonical path.
///
/// `normalize` is idempotent: `normalize(normalize(x)) == normalize(x)`.
#[must_use]
pub fn normalize(id: &str) -> String {
    let mut s = id;

    if let Some(rest) = s.strip_prefix(VIRTUAL_MODULE_SENTINEL) {
        s = rest;
    }

    let had_fs_prefix = s.starts_with(FS_PREFIX);
    if had_fs_prefix {
        s = &s[FS_PREFIX.len()..];
        // `/@fs//abs/path` (doubled separator) must not produce `//abs/path`.
        s = s.trim_start_matches('/');
    }

    let stripped_query = match s.find('?') {
        Some(idx) => &s[..idx],
        None => s,
    };

    let mut out = stripped_query.replace('\\', "/");

    if had_fs_prefix && !out.starts_with('/') {
        out.insert(0, '/');
    }

    if out.starts_with(BUNDLED_DEP_PREFIX) {
        return out;
    }

    out
}
