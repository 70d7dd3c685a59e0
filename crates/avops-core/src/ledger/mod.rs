//! Run ledger port and the pure helpers shared by its implementations.
//!
//! The ledger records one start and exactly one finish per run, plus
//! append-only steps and artifacts. Reads tolerate older records that lack
//! fields.

pub mod stats;

use avops_types::error::LedgerError;
use avops_types::id::RunId;
use avops_types::run::{
    Run, RunArtifact, RunDetails, RunFinish, RunQuery, RunStart, RunStats, RunStep,
};
use chrono::{DateTime, Utc};

pub use stats::{compute_stats, p95_nearest_rank};

/// Append/query store for runs, steps and artifacts.
pub trait RunLedger: Send + Sync {
    /// Write the start record. A start for an id that already exists is
    /// rejected with `LedgerError::Persistence`.
    fn record_start(
        &self,
        start: &RunStart,
    ) -> impl std::future::Future<Output = Result<(), LedgerError>> + Send;

    /// Seal a running run as success or failed. Finishing an unknown or
    /// already-terminal run is rejected with `LedgerError::Persistence`.
    fn record_finish(
        &self,
        id: &RunId,
        finish: &RunFinish,
    ) -> impl std::future::Future<Output = Result<(), LedgerError>> + Send;

    /// Append a step. The run must exist.
    fn record_step(
        &self,
        step: &RunStep,
    ) -> impl std::future::Future<Output = Result<(), LedgerError>> + Send;

    /// Append an artifact. The run must exist.
    fn record_artifact(
        &self,
        artifact: &RunArtifact,
    ) -> impl std::future::Future<Output = Result<(), LedgerError>> + Send;

    /// Newest runs first, filtered by status and start time.
    fn latest_runs(
        &self,
        query: &RunQuery,
    ) -> impl std::future::Future<Output = Result<Vec<Run>, LedgerError>> + Send;

    /// The run with its steps (timestamp order) and artifacts.
    fn run_details(
        &self,
        id: &RunId,
    ) -> impl std::future::Future<Output = Result<RunDetails, LedgerError>> + Send;

    /// Rollup over runs started at or after `since` (all runs when None).
    fn stats(
        &self,
        since: Option<DateTime<Utc>>,
    ) -> impl std::future::Future<Output = Result<RunStats, LedgerError>> + Send;
}

/// Milliseconds between two instants, never negative.
pub fn duration_between_ms(started_at: DateTime<Utc>, finished_at: DateTime<Utc>) -> f64 {
    let micros = (finished_at - started_at).num_microseconds().unwrap_or(i64::MAX);
    (micros.max(0) as f64) / 1000.0
}

/// Resolve the `finished_at` and `duration_ms` a finish record stores.
pub fn resolve_finish(finish: &RunFinish, now: DateTime<Utc>) -> (DateTime<Utc>, f64) {
    let finished_at = finish.finished_at.unwrap_or(now);
    let duration_ms = finish
        .duration_ms
        .unwrap_or_else(|| duration_between_ms(finish.started_at, finished_at));
    (finished_at, duration_ms)
}

/// Duration for a stored run: the stored value, else derived from both
/// timestamps, else zero.
pub fn stored_duration_ms(
    stored: Option<f64>,
    started_at: Option<DateTime<Utc>>,
    finished_at: Option<DateTime<Utc>>,
) -> f64 {
    match (stored, started_at, finished_at) {
        (Some(ms), _, _) if ms.is_finite() => ms,
        (_, Some(start), Some(end)) => duration_between_ms(start, end),
        _ => 0.0,
    }
}
