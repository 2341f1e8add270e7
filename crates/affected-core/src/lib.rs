#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::too_many_lines)]
#![allow(clippy::cast_possible_truncation)]
#![allow(clippy::needless_pass_by_value)]
#![allow(clippy::return_self_not_must_use)]

//! The test-selection engine: reverse dependency cache, change detector,
//! delta parser orchestration, runtime-edge reporter, BFS selector, and the
//! orchestrator that composes them behind the safety invariant that only a
//! valid cache hit, detected changes, no full-suite trigger and a
//! non-empty below-threshold affected set ever narrows the test-file
//! include list.

pub mod bfs;
pub mod cache;
pub mod change_detector;
pub mod config;
pub mod delta;
pub mod error;
pub mod normalize;
pub mod orchestrator;
pub mod paths;
pub mod reporter;
pub mod stats;

pub use bfs::bfs_affected_tests;
pub use cache::{load_cached_reverse_map, save_cache_sync, CacheDocument, LoadOutcome, ReverseMap};
pub use change_detector::{detect, ChangeSet};
pub use delta::delta_parse_new_imports;
pub use config::AffectedOptions;
pub use error::{AffectedError, FallbackReason};
pub use orchestrator::{configure, Decision, HostProject};
pub use reporter::{ReporterHooks, ReporterRegistry, RuntimeEdgeReporter};
pub use stats::StatsLine;
