//! Append-only JSON-lines statistics journal (spec §3 `stats.jsonl`, §6).
//!
//! Best-effort by design (spec §7 `BestEffort`): a write failure here must
//! never propagate, since the journal only feeds CI dashboards, not the
//! selection decision itself.

use serde::Serialize;
use std::fs::OpenOptions;
use std::io::Write;
use std::path::Path;
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use tracing::warn;

/// One line of `stats.jsonl` (spec §6). Numeric fields are optional because
/// several actions (e.g. `no-changes`) never compute a test universe.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StatsLine {
    pub timestamp: String,
    pub action: StatsAction,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    pub changed_files: u32,
    pub deleted_files: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub affected_tests: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub total_tests: Option<u32>,
    pub graph_size: u32,
    pub cache_hit: bool,
    pub duration_ms: u64,
}

/// Whether a run narrowed the include list or left it untouched.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum StatsAction {
    Selective,
    FullSuite,
}

/// Render `t` as an ISO 8601 UTC timestamp (`YYYY-MM-DDTHH:MM:SSZ`), the
/// format spec §6 documents for `stats.jsonl`'s `timestamp` field.
///
/// Hand-rolled rather than pulled from a date/time crate: `stats.jsonl` only
/// ever needs whole-second UTC precision, and the civil-date conversion
/// (Howard Hinnant's `civil_from_days`) is a few lines of pure arithmetic.
#[must_use]
pub fn format_iso8601(t: SystemTime) -> String {
    let secs = t.duration_since(UNIX_EPOCH).unwrap_or(Duration::ZERO).as_secs();
    let days = (secs / 86_400) as i64;
    let time_of_day = secs % 86_400;
    let (year, month, day) = civil_from_days(days);
    format!(
        "{year:04}-{month:02}-{day:02}T{:02}:{:02}:{:02}Z",
        time_of_day / 3600,
        (time_of_day % 3600) / 60,
        time_of_day % 60,
    )
}

/// Convert a day count since the Unix epoch (1970-01-01) to a
/// `(year, month, day)` civil date. Howard Hinnant's `civil_from_days`
/// algorithm (<http://howardhinnant.github.io/date_algorithms.html>),
/// valid for the full `i64` range; only non-negative `z` is exercised here.
fn civil_from_days(z: i64) -> (i64, u32, u32) {
    let z = z + 719_468;
    let era = if z >= 0 { z } else { z - 146_096 } / 146_097;
    let doe = (z - era * 146_097) as u64;
    let yoe = (doe - doe / 1460 + doe / 36_524 - doe / 146_096) / 365;
    let y = yoe as i64 + era * 400;
    let doy = doe - (365 * yoe + yoe / 4 - yoe / 100);
    let mp = (5 * doy + 2) / 153;
    let d = (doy - (153 * mp + 2) / 5 + 1) as u32;
    let m = if mp < 10 { mp + 3 } else { mp - 9 } as u32;
    let y = if m <= 2 { y + 1 } else { y };
    (y, m, d)
}

/// Append one line to `path`, creating the file if needed. Any I/O failure
/// is swallowed after a warning — the stats journal never affects the
/// orchestrator's decision (spec §7 `BestEffort`).
pub fn append_stats_line(path: &Path, line: &StatsLine) {
    let Ok(json) = serde_json::to_string(line) else {
        warn!("[vitest-affected] failed to serialize stats line");
        return;
    };

    let result = (|| -> std::io::Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let mut file = OpenOptions::new().create(true).append(true).open(path)?;
        writeln!(file, "{json}")
    })();

    if let Err(e) = result {
        warn!("[vitest-affected] failed to append to stats file {}: {e}", path.display());
    }
}
