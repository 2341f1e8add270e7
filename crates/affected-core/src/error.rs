use std::path::PathBuf;
use thiserror::Error;

/// The only error kind allowed to escape the orchestrator (spec §7 `Hard`).
/// Every other failure mode is represented as data — a [`FallbackReason`] —
/// so the type system enforces "no error reaches the test-file include
/// list" rather than relying on callers to remember to catch everything.
#[derive(Error, Debug)]
pub enum AffectedError {
    #[error("reference diff requested against a shallow checkout at {root}")]
    ShallowHistory { root: PathBuf },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to read config at {path}: {source}")]
    ConfigRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config at {path}: {source}")]
    ConfigParse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("project root not found from {start}")]
    ProjectNotFound { start: PathBuf },

    #[error("{0}")]
    Other(String),
}

impl AffectedError {
    #[must_use]
    pub fn other(msg: impl Into<String>) -> Self {
        Self::Other(msg.into())
    }
}

/// Why a run fell back to the full suite (spec §7 `SafeFallback` /
/// `ForceFullSuite`). Carried as data on [`crate::orchestrator::Decision`],
/// never thrown: only [`AffectedError::ShallowHistory`] (the `Hard` kind)
/// is ever surfaced as an `Err`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FallbackReason {
    /// The host config did not expose a usable project root / include set.
    InvalidHostConfig,
    /// More than one test project is configured; selection disengages.
    MultiProjectWorkspace,
    /// No cache on disk yet; the first run always populates it.
    CacheMiss,
    /// `graph.json` existed but failed to parse or validate.
    CacheInvalid,
    /// Neither `changed` nor `deleted` contained anything.
    NoChanges,
    /// A changed/deleted path's basename matched a configuration file.
    ConfigChange,
    /// A changed/deleted path matched a configured setup file.
    SetupFileChange,
    /// The glob of include patterns produced no test files at all.
    EmptyTestUniverse,
    /// BFS produced zero affected tests and `allow_no_tests` is false.
    NoTestsAffected,
    /// `affected / universe` exceeded the configured threshold.
    ThresholdExceeded,
    /// An otherwise-uncaught error occurred inside the orchestrator.
    UncaughtError(String),
}

impl FallbackReason {
    /// The stable string written to `stats.jsonl`'s `reason` field.
    #[must_use]
    pub fn as_str(&self) -> &str {
        match self {
            Self::InvalidHostConfig => "invalid-host-config",
            Self::MultiProjectWorkspace => "multi-project-workspace",
            Self::CacheMiss => "cache-miss",
            Self::CacheInvalid => "cache-invalid",
            Self::NoChanges => "no-changes",
            Self::ConfigChange => "config-change",
            Self::SetupFileChange => "setup-file-change",
            Self::EmptyTestUniverse => "empty-test-universe",
            Self::NoTestsAffected => "no-tests-affected",
            Self::ThresholdExceeded => "threshold-exceeded",
            Self::UncaughtError(_) => "uncaught-error",
        }
    }
}

impl std::fmt::Display for FallbackReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::UncaughtError(msg) => write!(f, "uncaught-error: {msg}"),
            other => write!(f, "{}", other.as_str()),
        }
    }
}
