//! Import specifier scanner.
//!
//! Scans JavaScript/TypeScript source code for import/require/re-export
//! specifiers without full parsing, classifying each by kind so the delta
//! parser can decide which ones carry a real runtime (or type-level) edge.

use std::collections::HashSet;

/// Kind of import specifier found in source code.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImportKind {
    /// `import ... from "spec"` / `import "spec"`, not type-only.
    EsmImport,
    /// `import type ... from "spec"` (or every named entry typed).
    EsmImportTypeOnly,
    /// `const x = require("spec")`.
    CjsRequire,
    /// `import("spec")` with a plain string argument.
    DynamicImport,
    /// `export { x } from "spec"` / `export * from "spec"`, not type-only.
    ReExport,
    /// `export type { x } from "spec"`.
    ReExportTypeOnly,
}

impl ImportKind {
    /// Whether this kind carries a real (non type-only) module edge.
    #[must_use]
    pub fn is_type_only(self) -> bool {
        matches!(self, Self::EsmImportTypeOnly | Self::ReExportTypeOnly)
    }
}

/// Import specifier found in source code.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImportSpec {
    /// Specifier exactly as found (unquoted).
    pub raw: String,
    /// Kind of import.
    pub kind: ImportKind,
    /// Line number (1-indexed, best-effort).
    pub line: Option<u32>,
}

impl ImportSpec {
    #[must_use]
    pub fn new(raw: impl Into<String>, kind: ImportKind, line: Option<u32>) -> Self {
        Self {
            raw: raw.into(),
            kind,
            line,
        }
    }
}

/// Extensions treated as binary assets: never worth resolving as a module edge.
pub const BINARY_ASSET_EXTENSIONS: &[&str] = &[
    ".png", ".jpg", ".jpeg", ".gif", ".webp", ".avif", ".ico", ".bmp", ".svg", ".woff", ".woff2",
    ".ttf", ".otf", ".eot",
];

/// Returns `true` if `specifier`'s extension matches a known binary asset type.
#[must_use]
pub fn is_binary_asset(specifier: &str) -> bool {
    let lower = specifier.to_ascii_lowercase();
    BINARY_ASSET_EXTENSIONS
        .iter()
        .any(|ext| lower.ends_with(ext))
}

/// Scan source code for import/require/re-export specifiers.
///
/// Returns discovered imports in first-appearance order, deduplicated by
/// `(raw, kind)`. Binary asset specifiers (per [`is_binary_asset`]) are
/// dropped before dedup.
#[must_use]
pub fn scan_imports(source: &str) -> Vec<ImportSpec> {
    let mut results = Vec::new();
    let mut seen = HashSet::new();
    let mut line_num: u32 = 1;
    let chars: Vec<char> = source.chars().collect();
    let len = chars.len();
    let mut i = 0;

    while i < len {
        if chars[i] == '\n' {
            line_num += 1;
            i += 1;
            continue;
        }

        if i + 1 < len && chars[i] == '/' && chars[i + 1] == '/' {
            while i < len && chars[i] != '\n' {
                i += 1;
            }
            continue;
        }

        if i + 1 < len && chars[i] == '/' && chars[i + 1] == '*' {
            i += 2;
            while i + 1 < len && !(chars[i] == '*' && chars[i + 1] == '/') {
                if chars[i] == '\n' {
                    line_num += 1;
                }
                i += 1;
            }
            i += 2;
            continue;
        }

        if matches_keyword(&chars, i, "import") {
            let start_i = i;
            i += 6;
            if let Some((clause_is_type, after_keyword)) = skip_type_keyword(&chars, i) {
                i = after_keyword;
                let _ = clause_is_type;
            }
            if let Some((spec, kind, end)) = scan_import_statement(&chars, start_i, i, &mut line_num)
            {
                record(&mut results, &mut seen, spec, kind, line_num);
                i = end;
                continue;
            }
            i = start_i + 1;
            continue;
        }

        if matches_keyword(&chars, i, "export") {
            let start_i = i;
            i += 6;
            if let Some((spec, kind, end)) = scan_export_from(&chars, i, &mut line_num) {
                record(&mut results, &mut seen, spec, kind, line_num);
                i = end;
                continue;
            }
            i = start_i + 1;
            continue;
        }

        if matches_keyword(&chars, i, "require") {
            let start_i = i;
            i += 7;
            if let Some((spec, end)) = scan_require_call(&chars, i) {
                record(&mut results, &mut seen, spec, ImportKind::CjsRequire, line_num);
                i = end;
                continue;
            }
            i = start_i + 1;
            continue;
        }

        i += 1;
    }

    results
}

fn record(
    results: &mut Vec<ImportSpec>,
    seen: &mut HashSet<(String, &'static str)>,
    spec: String,
    kind: ImportKind,
    line: u32,
) {
    if spec.is_empty() || is_binary_asset(&spec) {
        return;
    }
    let kind_tag: &'static str = match kind {
        ImportKind::EsmImport => "esm_import",
        ImportKind::EsmImportTypeOnly => "esm_import_type",
        ImportKind::CjsRequire => "cjs_require",
        ImportKind::DynamicImport => "dynamic_import",
        ImportKind::ReExport => "re_export",
        ImportKind::ReExportTypeOnly => "re_export_type",
    };
    if seen.insert((spec.clone(), kind_tag)) {
        results.push(ImportSpec::new(spec, kind, Some(line)));
    }
}

fn matches_keyword(chars: &[char], pos: usize, keyword: &str) -> bool {
    let kw: Vec<char> = keyword.chars().collect();
    let klen = kw.len();

    if pos + klen > chars.len() {
        return false;
    }
    if pos > 0 && (chars[pos - 1].is_alphanumeric() || chars[pos - 1] == '_') {
        return false;
    }
    for (j, &c) in kw.iter().enumerate() {
        if chars[pos + j] != c {
            return false;
        }
    }
    if pos + klen < chars.len() && (chars[pos + klen].is_alphanumeric() || chars[pos + klen] == '_')
    {
        return false;
    }
    true
}

/// If the clause starting at `pos` begins with the `type` keyword (with a
/// trailing word boundary, e.g. `type {` or `type Foo`), returns
/// `(true, position after "type" and following whitespace)`.
fn skip_type_keyword(chars: &[char], pos: usize) -> Option<(bool, usize)> {
    let mut i = pos;
    while i < chars.len() && chars[i].is_whitespace() && chars[i] != '\n' {
        i += 1;
    }
    if matches_keyword(chars, i, "type") {
        let mut j = i + 4;
        // `type` must be followed by whitespace, not e.g. `type()` or `typeX`.
        if j < chars.len() && chars[j].is_whitespace() {
            while j < chars.len() && chars[j].is_whitespace() {
                j += 1;
            }
            return Some((true, j));
        }
    }
    None
}

/// Whether every named entry inside a `{ ... }` import/export clause is
/// individually marked `type` (mixed clauses keep the edge per spec).
fn clause_entries_all_typed(clause: &str) -> bool {
    let entries: Vec<&str> = clause
        .trim_matches(|c: char| c == '{' || c == '}' || c.is_whitespace())
        .split(',')
        .map(str::trim)
        .filter(|e| !e.is_empty())
        .collect();
    if entries.is_empty() {
        return false;
    }
    entries.iter().all(|e| e.starts_with("type "))
}

/// Scan an import statement for the "from" specifier and its import kind.
/// `start_i` is the index of the `import` keyword itself (for the type-only
/// named-brace heuristic); `start` is where scanning resumes (past `type `
/// if present).
fn scan_import_statement(
    chars: &[char],
    start_i: usize,
    start: usize,
    line_num: &mut u32,
) -> Option<(String, ImportKind, usize)> {
    let len = chars.len();
    let mut i = start;
    let leading_type = start != start_i + 6;

    while i < len && chars[i].is_whitespace() {
        if chars[i] == '\n' {
            *line_num += 1;
        }
        i += 1;
    }

    // Dynamic import: import("...")
    if i < len && chars[i] == '(' {
        i += 1;
        while i < len && chars[i].is_whitespace() {
            if chars[i] == '\n' {
                *line_num += 1;
            }
            i += 1;
        }
        if i < len && (chars[i] == '"' || chars[i] == '\'' || chars[i] == '`') {
            let (spec, end, had_expr) = scan_quoted(chars, i, line_num);
            if had_expr {
                return None;
            }
            return Some((spec, ImportKind::DynamicImport, end));
        }
        return None;
    }

    // Track whether a brace-delimited clause appears and whether it's fully typed.
    let mut brace_all_typed: Option<bool> = None;

    while i < len {
        if chars[i] == '\n' {
            *line_num += 1;
        }

        if chars[i] == '{' {
            let brace_start = i;
            let mut depth = 1;
            i += 1;
            while i < len && depth > 0 {
                match chars[i] {
                    '{' => depth += 1,
                    '}' => depth -= 1,
                    '\n' => *line_num += 1,
                    _ => {}
                }
                i += 1;
            }
            let clause: String = chars[brace_start..i].iter().collect();
            brace_all_typed = Some(clause_entries_all_typed(&clause));
            continue;
        }

        if matches_keyword(chars, i, "from") {
            i += 4;
            while i < len && chars[i].is_whitespace() {
                if chars[i] == '\n' {
                    *line_num += 1;
                }
                i += 1;
            }
            if i < len && (chars[i] == '"' || chars[i] == '\'' || chars[i] == '`') {
                let (spec, end, _) = scan_quoted(chars, i, line_num);
                let type_only = leading_type || brace_all_typed.unwrap_or(false);
                let kind = if type_only {
                    ImportKind::EsmImportTypeOnly
                } else {
                    ImportKind::EsmImport
                };
                return Some((spec, kind, end));
            }
        }

        // Side-effect import: import "specifier";
        if chars[i] == '"' || chars[i] == '\'' || chars[i] == '`' {
            let (spec, end, _) = scan_quoted(chars, i, line_num);
            return Some((spec, ImportKind::EsmImport, end));
        }

        if chars[i] == ';' {
            break;
        }

        i += 1;
        if i > start + 1000 {
            break;
        }
    }

    None
}

/// Scan an `export ... from "..."` or `export type ... from "..."` statement.
fn scan_export_from(
    chars: &[char],
    start: usize,
    line_num: &mut u32,
) -> Option<(String, ImportKind, usize)> {
    let len = chars.len();
    let mut i = start;
    let mut leading_type = false;
    if let Some((is_type, after)) = skip_type_keyword(chars, i) {
        leading_type = is_type;
        i = after;
    }

    let mut brace_all_typed: Option<bool> = None;
    let limit = (i + 500).min(len);
    while i < limit {
        if chars[i] == '\n' {
            *line_num += 1;
        }

        if chars[i] == '{' {
            let brace_start = i;
            let mut depth = 1;
            i += 1;
            while i < len && depth > 0 {
                match chars[i] {
                    '{' => depth += 1,
                    '}' => depth -= 1,
                    '\n' => *line_num += 1,
                    _ => {}
                }
                i += 1;
            }
            let clause: String = chars[brace_start..i].iter().collect();
            brace_all_typed = Some(clause_entries_all_typed(&clause));
            continue;
        }

        if matches_keyword(chars, i, "from") {
            i += 4;
            while i < len && chars[i].is_whitespace() {
                if chars[i] == '\n' {
                    *line_num += 1;
                }
                i += 1;
            }
            if i < len && (chars[i] == '"' || chars[i] == '\'' || chars[i] == '`') {
                let (spec, end, _) = scan_quoted(chars, i, line_num);
                let type_only = leading_type || brace_all_typed.unwrap_or(false);
                let kind = if type_only {
                    ImportKind::ReExportTypeOnly
                } else {
                    ImportKind::ReExport
                };
                return Some((spec, kind, end));
            }
        }

        i += 1;
    }

    None
}

/// Scan a `require("...")` call.
fn scan_require_call(chars: &[char], start: usize) -> Option<(String, usize)> {
    let len = chars.len();
    let mut i = start;

    while i < len && chars[i].is_whitespace() && chars[i] != '\n' {
        i += 1;
    }
    if i >= len || chars[i] != '(' {
        return None;
    }
    i += 1;
    while i < len && chars[i].is_whitespace() && chars[i] != '\n' {
        i += 1;
    }
    if i >= len || (chars[i] != '"' && chars[i] != '\'' && chars[i] != '`') {
        return None;
    }

    let mut line_num = 0; // require() specifiers never span lines in practice
    let (spec, mut end, had_expr) = scan_quoted(chars, i, &mut line_num);
    if had_expr {
        return None;
    }

    while end < len && chars[end].is_whitespace() && chars[end] != '\n' {
        end += 1;
    }
    if end < len && chars[end] == ')' {
        end += 1;
    }

    Some((spec, end))
}

/// Scan a quoted string starting at a quote character. Returns
/// `(content, position after closing quote, had_template_expression)`.
/// For backtick strings, a `${` sequence sets `had_template_expression`.
fn scan_quoted(chars: &[char], start: usize, line_num: &mut u32) -> (String, usize, bool) {
    let len = chars.len();
    let quote = chars[start];
    let mut i = start + 1;
    let spec_start = i;
    let mut had_expr = false;

    while i < len && chars[i] != quote {
        if chars[i] == '\n' {
            *line_num += 1;
        }
        if chars[i] == '\\' && i + 1 < len {
            i += 2;
            continue;
        }
        if quote == '`' && chars[i] == '$' && i + 1 < len && chars[i + 1] == '{' {
            had_expr = true;
        }
        i += 1;
    }

    let spec: String = chars[spec_start..i].iter().collect();
    if i < len {
        i += 1; // skip closing quote
    }
    (spec, i, had_expr)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_esm_import_from() {
        let source = r#"import { foo } from "./dep";"#;
        let imports = scan_imports(source);
        assert_eq!(imports.len(), 1);
        assert_eq!(imports[0].raw, "./dep");
        assert_eq!(imports[0].kind, ImportKind::EsmImport);
    }

    #[test]
    fn test_esm_import_default() {
        let imports = scan_imports(r#"import foo from "lodash";"#);
        assert_eq!(imports[0].raw, "lodash");
        assert_eq!(imports[0].kind, ImportKind::EsmImport);
    }

    #[test]
    fn test_esm_import_side_effect() {
        let imports = scan_imports(r#"import "./polyfill";"#);
        assert_eq!(imports[0].raw, "./polyfill");
    }

    #[test]
    fn test_dynamic_import_string() {
        let imports = scan_imports(r#"const mod = await import("./dynamic");"#);
        assert_eq!(imports[0].raw, "./dynamic");
        assert_eq!(imports[0].kind, ImportKind::DynamicImport);
    }

    #[test]
    fn test_dynamic_import_backtick_without_expression_is_included() {
        let imports = scan_imports("const mod = await import(`./dynamic`);");
        assert_eq!(imports.len(), 1);
        assert_eq!(imports[0].raw, "./dynamic");
    }

    #[test]
    fn test_dynamic_import_backtick_with_expression_is_excluded() {
        let imports = scan_imports("const mod = await import(`./dynamic-${name}`);");
        assert!(imports.is_empty());
    }

    #[test]
    fn test_cjs_require() {
        let imports = scan_imports(r#"const dep = require("./dep");"#);
        assert_eq!(imports[0].raw, "./dep");
        assert_eq!(imports[0].kind, ImportKind::CjsRequire);
    }

    #[test]
    fn test_esm_export_from() {
        let imports = scan_imports(r#"export { foo } from "./dep";"#);
        assert_eq!(imports[0].raw, "./dep");
        assert_eq!(imports[0].kind, ImportKind::ReExport);
    }

    #[test]
    fn test_export_star_from() {
        let imports = scan_imports(r#"export * from "./dep";"#);
        assert_eq!(imports[0].raw, "./dep");
        assert_eq!(imports[0].kind, ImportKind::ReExport);
    }

    #[test]
    fn test_import_type_default_is_type_only() {
        let imports = scan_imports(r#"import type Foo from "./types";"#);
        assert_eq!(imports[0].kind, ImportKind::EsmImportTypeOnly);
        assert!(imports[0].kind.is_type_only());
    }

    #[test]
    fn test_import_type_braced_is_type_only() {
        let imports = scan_imports(r#"import type { Foo } from "./types";"#);
        assert_eq!(imports[0].kind, ImportKind::EsmImportTypeOnly);
    }

    #[test]
    fn test_import_all_named_entries_typed_is_type_only() {
        let imports = scan_imports(r#"import { type Foo, type Bar } from "./types";"#);
        assert_eq!(imports[0].kind, ImportKind::EsmImportTypeOnly);
    }

    #[test]
    fn test_import_mixed_typed_and_value_entries_is_not_type_only() {
        let imports = scan_imports(r#"import { type Foo, bar } from "./mixed";"#);
        assert_eq!(imports[0].kind, ImportKind::EsmImport);
    }

    #[test]
    fn test_export_type_from_is_type_only() {
        let imports = scan_imports(r#"export type { Foo } from "./types";"#);
        assert_eq!(imports[0].kind, ImportKind::ReExportTypeOnly);
    }

    #[test]
    fn test_rejects_binary_asset_extension() {
        let imports = scan_imports(r#"import logo from "./logo.svg";"#);
        assert!(imports.is_empty());
    }

    #[test]
    fn test_allows_js_extension_resolving_conceptually_to_ts() {
        // The scanner only extracts the raw specifier; whether ".js" resolves
        // to a ".ts" file on disk is the resolver's job (see resolve.rs).
        let imports = scan_imports(r#"import { x } from "./dep.js";"#);
        assert_eq!(imports[0].raw, "./dep.js");
    }

    #[test]
    fn test_ignores_line_comment() {
        let source = "\n// import foo from \"commented\"\nimport bar from \"./real\";\n";
        let imports = scan_imports(source);
        assert_eq!(imports.len(), 1);
        assert_eq!(imports[0].raw, "./real");
    }

    #[test]
    fn test_ignores_block_comment() {
        let source = "\n/* import foo from \"commented\" */\nimport bar from \"./real\";\n";
        let imports = scan_imports(source);
        assert_eq!(imports.len(), 1);
        assert_eq!(imports[0].raw, "./real");
    }

    #[test]
    fn test_multiple_imports_stable_order() {
        let source = "import a from \"./a\";\nimport b from \"./b\";\nimport c from \"./c\";\n";
        let imports = scan_imports(source);
        assert_eq!(imports.len(), 3);
        assert_eq!(imports[0].raw, "./a");
        assert_eq!(imports[1].raw, "./b");
        assert_eq!(imports[2].raw, "./c");
    }

    #[test]
    fn test_deduplicates_same_kind() {
        let source = "import a from \"./dep\";\nimport b from \"./dep\";\n";
        let imports = scan_imports(source);
        assert_eq!(imports.len(), 1);
    }

    #[test]
    fn test_scoped_package() {
        let imports = scan_imports(r#"import test from "@scope/package";"#);
        assert_eq!(imports[0].raw, "@scope/package");
    }

    #[test]
    fn test_empty_source() {
        assert!(scan_imports("").is_empty());
    }

    #[test]
    fn test_no_imports() {
        assert!(scan_imports("console.log('hello');").is_empty());
    }
}
