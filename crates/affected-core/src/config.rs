use std::path::PathBuf;

/// Plugin options (spec §6), all optional, mirrored with their documented
/// defaults.
#[derive(Debug, Clone)]
pub struct AffectedOptions {
    /// Skip entirely.
    pub disabled: bool,
    /// Version-control reference to diff against.
    pub reference: Option<String>,
    /// Bypass the change detector with an explicit list; split by existence
    /// on disk by the orchestrator.
    pub changed_files: Option<Vec<PathBuf>>,
    /// Emit diagnostic log lines.
    pub verbose: bool,
    /// Full-suite fallback when `affected / universe` exceeds this value.
    /// Range 0.0–1.0; `1.0` (the default) effectively disables the gate.
    pub threshold: f64,
    /// If true and selection is empty, skip all tests; else fall back.
    pub allow_no_tests: bool,
    /// Enable the persistent cache.
    pub cache: bool,
    /// Append-only JSON-lines journal path, absolute or project-relative.
    pub stats_file: Option<PathBuf>,
}

impl Default for AffectedOptions {
    fn default() -> Self {
        Self {
            disabled: false,
            reference: None,
            changed_files: None,
            verbose: false,
            threshold: 1.0,
            allow_no_tests: false,
            cache: true,
            stats_file: None,
        }
    }
}

/// Environment variable that disables the plugin outright when set to `1`
/// (spec §4.7 step 1 / §6).
pub const DISABLED_ENV_VAR: &str = "VITEST_AFFECTED_DISABLED";

impl AffectedOptions {
    /// Apply the environment-variable override (spec §4.7 step 1).
    #[must_use]
    pub fn with_env_override(mut self) -> Self {
        if std::env::var(DISABLED_ENV_VAR).as_deref() == Ok("1") {
            self.disabled = true;
        }
        self
    }
}

/// Basename set that forces a full-suite run when touched (spec §4.7 step
/// 10): package manifests, lockfiles across common package managers,
/// TS-config, and host-runner/bundler config variants.
pub const FULL_SUITE_TRIGGER_BASENAMES: &[&str] = &[
    "package.json",
    "package-lock.json",
    "yarn.lock",
    "pnpm-lock.yaml",
    "bun.lockb",
    "bun.lock",
    "tsconfig.json",
    "tsconfig.base.json",
    "vitest.config.ts",
    "vitest.config.js",
    "vitest.config.mjs",
    "vite.config.ts",
    "vite.config.js",
    "vite.config.mjs",
    "webpack.config.js",
    "rollup.config.js",
    "rollup.config.mjs",
    "esbuild.config.js",
];
