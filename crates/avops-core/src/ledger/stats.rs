//! Ledger rollup statistics.

use avops_types::run::{Run, RunStats, RunStatus};

/// Rollup over one window of runs.
///
/// `count` and the success rate cover every run in the window; the p95 is
/// taken over terminal runs only, since running ones have no duration yet.
pub fn compute_stats(runs: &[Run]) -> RunStats {
    let count = runs.len() as u64;
    if count == 0 {
        return RunStats::default();
    }

    let successes = runs
        .iter()
        .filter(|r| r.status == RunStatus::Success)
        .count() as f64;
    let success_rate = 100.0 * successes / count as f64;

    let durations: Vec<f64> = runs
        .iter()
        .filter(|r| r.status.is_terminal())
        .map(|r| r.duration_ms)
        .collect();

    let last_error = runs
        .iter()
        .filter(|r| r.status == RunStatus::Failed)
        .max_by_key(|r| r.started_at)
        .and_then(|r| r.error.clone())
        .unwrap_or_default();

    RunStats {
        count,
        success_rate,
        p95_duration_ms: p95_nearest_rank(durations),
        last_error,
    }
}

/// 95th percentile by nearest rank. Zero for an empty set.
pub fn p95_nearest_rank(mut values: Vec<f64>) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    values.sort_by(|a, b| a.total_cmp(b));
    let rank = (values.len() * 95).div_ceil(100).clamp(1, values.len());
    values[rank - 1]
}
