//! `affected show-graph`: dump the current reverse dependency map (spec
//! SPEC_FULL §6).

use affected_core::cache;
use miette::{IntoDiagnostic, Result};
use std::collections::BTreeMap;
use std::path::Path;

pub fn run(cwd: &Path, json: bool) -> Result<()> {
    let cache_dir = affected_core::paths::cache_dir(cwd);
    let outcome = cache::load_cached_reverse_map(&cache_dir, cwd, false);

    let mut sorted: BTreeMap<String, Vec<String>> = BTreeMap::new();
    for source in outcome.reverse.sources() {
        let mut tests: Vec<String> = outcome
            .reverse
            .get(source)
            .map(|set| set.iter().cloned().collect())
            .unwrap_or_default();
        tests.sort();
        sorted.insert(source.clone(), tests);
    }

    if json {
        println!("{}", serde_json::to_string_pretty(&sorted).into_diagnostic()?);
    } else if sorted.is_empty() {
        println!("(no cache at {})", cache_dir.display());
    } else {
        for (source, tests) in &sorted {
            println!("{source}");
            for test in tests {
                println!("  -> {test}");
            }
        }
    }

    Ok(())
}
