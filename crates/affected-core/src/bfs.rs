//! Pure BFS over the reverse map (spec §4.6).
//!
//! Index-based queue (no `VecDeque`/linear-shift cost), visited set for
//! cycle safety, output sorted and deduplicated via a `BTreeSet`.

use crate::cache::ReverseMap;
use std::collections::{BTreeSet, HashSet};

/// Walk reverse edges from `seeds`, collecting every visited node that
/// satisfies `is_test_file`, sorted lexicographically and deduplicated.
///
/// Terminates on cyclic graphs: the visited set guarantees each node is
/// enqueued at most once.
#[must_use]
pub fn bfs_affected_tests(
    seeds: &[String],
    reverse: &ReverseMap,
    is_test_file: impl Fn(&str) -> bool,
) -> Vec<String> {
    let mut visited: HashSet<String> = HashSet::new();
    let mut queue: Vec<String> = Vec::new();
    let mut out: BTreeSet<String> = BTreeSet::new();

    for seed in seeds {
        if visited.insert(seed.clone()) {
            queue.push(seed.clone());
        }
    }

    let mut cursor = 0;
    while cursor < queue.len() {
        let node = &queue[cursor];
        cursor += 1;

        if is_test_file(node) {
            out.insert(node.clone());
        }

        if let Some(dependents) = reverse.get(node) {
            for next in dependents {
                if visited.insert(next.clone()) {
                    queue.push(next.clone());
                }
            }
        }
    }

    out.into_iter().collect()
}
