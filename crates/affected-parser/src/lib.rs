#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

//! Import-specifier scanning and module resolution for `vitest-affected`.
//!
//! Deliberately not a full JS/TS/JSX parser: the delta parser only needs
//! the set of specifiers a file imports, not a faithful AST, so this
//! crate scans source text directly (see [`scan`]) and resolves the
//! resulting specifiers to absolute paths with a trimmed-down Node-style
//! resolution algorithm (see [`resolve`]).

pub mod resolve;
pub mod scan;

pub use resolve::{is_in_node_modules, resolve, PathMapping, ResolveConfig, ResolveOutcome};
pub use scan::{scan_imports, ImportKind, ImportSpec};
