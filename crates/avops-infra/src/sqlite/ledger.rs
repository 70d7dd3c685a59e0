//! SQLite run ledger.
//!
//! Implements `RunLedger` from `avops-core`. Writes enforce the run
//! lifecycle (one start, one finish, children only under existing runs).
//! Reads are lenient: rows written by older versions may lack a status,
//! timestamps may be naive, durations may be missing.

use avops_core::ledger::{RunLedger, compute_stats, resolve_finish, stored_duration_ms};
use avops_types::error::LedgerError;
use avops_types::id::RunId;
use avops_types::run::{
    Run, RunArtifact, RunDetails, RunFinish, RunQuery, RunStart, RunStats, RunStatus, RunStep,
    StepLevel,
};
use chrono::{DateTime, Utc};
use sqlx::Row;

use super::pool::DatabasePool;
use super::{format_datetime, parse_datetime_lenient};

/// SQLite-backed implementation of `RunLedger`.
#[derive(Clone)]
pub struct SqliteRunLedger {
    pool: DatabasePool,
}

impl SqliteRunLedger {
    pub fn new(pool: DatabasePool) -> Self {
        Self { pool }
    }

    async fn run_exists(&self, id: &RunId) -> Result<bool, LedgerError> {
        let row = sqlx::query("SELECT 1 FROM runs WHERE id = ?")
            .bind(id.to_string())
            .fetch_optional(&self.pool.writer)
            .await
            .map_err(persistence)?;
        Ok(row.is_some())
    }

    /// Every readable run. Filtering and ordering happen after parsing
    /// because older rows carry naive timestamps and free-form statuses.
    async fn load_runs(&self) -> Result<Vec<Run>, LedgerError> {
        let rows = sqlx::query("SELECT * FROM runs")
            .fetch_all(&self.pool.reader)
            .await
            .map_err(persistence)?;
        Ok(rows.iter().filter_map(map_run).collect())
    }
}

const UNSPECIFIED_FAILURE: &str = "run failed without an error message";

fn persistence(err: sqlx::Error) -> LedgerError {
    LedgerError::Persistence(err.to_string())
}

fn get_opt<T>(row: &sqlx::sqlite::SqliteRow, column: &str) -> Option<T>
where
    T: for<'r> sqlx::Decode<'r, sqlx::Sqlite> + sqlx::Type<sqlx::Sqlite>,
{
    row.try_get::<Option<T>, _>(column).ok().flatten()
}

fn get_time(row: &sqlx::sqlite::SqliteRow, column: &str) -> Option<DateTime<Utc>> {
    get_opt::<String>(row, column).and_then(|s| parse_datetime_lenient(&s))
}

fn get_json(row: &sqlx::sqlite::SqliteRow, column: &str) -> serde_json::Value {
    match get_opt::<String>(row, column) {
        Some(raw) => serde_json::from_str(&raw).unwrap_or(serde_json::Value::String(raw)),
        None => serde_json::Value::Null,
    }
}

/// Map a `runs` row, substituting defaults for missing fields. Rows whose
/// id is not a run id are skipped.
fn map_run(row: &sqlx::sqlite::SqliteRow) -> Option<Run> {
    let raw_id = get_opt::<String>(row, "id").unwrap_or_default();
    let id = match raw_id.parse::<RunId>() {
        Ok(id) => id,
        Err(e) => {
            tracing::warn!(run_id = %raw_id, error = %e, "skipping run with unreadable id");
            return None;
        }
    };

    let started_at = get_time(row, "started_at");
    let finished_at = get_time(row, "finished_at");

    Some(Run {
        id,
        workflow_id: get_opt::<String>(row, "workflow_id").and_then(|s| s.parse().ok()),
        name: get_opt(row, "name").unwrap_or_default(),
        agent_id: get_opt::<String>(row, "agent_id").and_then(|s| s.parse().ok()),
        recipe_id: get_opt::<String>(row, "recipe_id").and_then(|s| s.parse().ok()),
        trigger: get_opt::<String>(row, "trigger_type")
            .and_then(|s| s.parse().ok())
            .unwrap_or_default(),
        status: RunStatus::from_stored(get_opt::<String>(row, "status").as_deref()),
        started_at,
        finished_at,
        duration_ms: stored_duration_ms(get_opt(row, "duration_ms"), started_at, finished_at),
        error: get_opt::<String>(row, "error").filter(|e| !e.is_empty()),
    })
}

fn map_step(run_id: RunId, row: &sqlx::sqlite::SqliteRow) -> RunStep {
    RunStep {
        run_id,
        phase: get_opt::<String>(row, "phase").and_then(|s| s.parse().ok()),
        message: get_opt(row, "message").unwrap_or_default(),
        payload: get_json(row, "payload"),
        result: get_json(row, "result"),
        level: StepLevel::from_stored(get_opt::<String>(row, "level").as_deref()),
        timestamp: get_time(row, "ts").unwrap_or(DateTime::<Utc>::UNIX_EPOCH),
    }
}

fn map_artifact(run_id: RunId, row: &sqlx::sqlite::SqliteRow) -> RunArtifact {
    RunArtifact {
        run_id,
        kind: get_opt(row, "kind").unwrap_or_default(),
        title: get_opt(row, "title").unwrap_or_default(),
        url: get_opt(row, "url"),
        external_id: get_opt(row, "external_id"),
        data: get_json(row, "data"),
        created_at: get_time(row, "created_at").unwrap_or(DateTime::<Utc>::UNIX_EPOCH),
    }
}

fn started_since(run: &Run, since: Option<DateTime<Utc>>) -> bool {
    match since {
        Some(since) => run.started_at.is_some_and(|t| t >= since),
        None => true,
    }
}

impl RunLedger for SqliteRunLedger {
    async fn record_start(&self, start: &RunStart) -> Result<(), LedgerError> {
        let result = sqlx::query(
            "INSERT INTO runs (id, workflow_id, name, agent_id, recipe_id, trigger_type, status, started_at)
             VALUES (?, ?, ?, ?, ?, ?, 'running', ?)",
        )
        .bind(start.id.to_string())
        .bind(start.workflow_id.map(|id| id.to_string()))
        .bind(&start.name)
        .bind(start.agent_id.map(|id| id.to_string()))
        .bind(start.recipe_id.map(|id| id.to_string()))
        .bind(start.trigger.as_str())
        .bind(format_datetime(&start.started_at))
        .execute(&self.pool.writer)
        .await;

        match result {
            Ok(_) => {
                tracing::debug!(run_id = %start.id, name = %start.name, "run started");
                Ok(())
            }
            Err(sqlx::Error::Database(db_err)) if db_err.message().contains("UNIQUE") => Err(
                LedgerError::Persistence(format!("run {} already started", start.id)),
            ),
            Err(e) => Err(persistence(e)),
        }
    }

    async fn record_finish(&self, id: &RunId, finish: &RunFinish) -> Result<(), LedgerError> {
        let (finished_at, duration_ms) = resolve_finish(finish, Utc::now());
        let status = finish.outcome.status();
        // A failed run always carries an error
        let error = match finish.outcome.error() {
            Some(e) if e.trim().is_empty() => {
                tracing::warn!(run_id = %id, "failed run finished without an error message");
                Some(UNSPECIFIED_FAILURE)
            }
            other => other,
        };

        let result = sqlx::query(
            "UPDATE runs SET status = ?, finished_at = ?, duration_ms = ?, error = ?
             WHERE id = ? AND status = 'running'",
        )
        .bind(status.as_str())
        .bind(format_datetime(&finished_at))
        .bind(duration_ms)
        .bind(error)
        .bind(id.to_string())
        .execute(&self.pool.writer)
        .await
        .map_err(persistence)?;

        if result.rows_affected() == 1 {
            tracing::debug!(run_id = %id, status = %status, duration_ms, "run finished");
            return Ok(());
        }

        let existing = sqlx::query("SELECT status FROM runs WHERE id = ?")
            .bind(id.to_string())
            .fetch_optional(&self.pool.writer)
            .await
            .map_err(persistence)?;

        Err(match existing {
            None => LedgerError::Persistence(format!("run {id} was never started")),
            Some(row) => {
                let stored = RunStatus::from_stored(get_opt::<String>(&row, "status").as_deref());
                LedgerError::Persistence(format!("run {id} is already {stored}"))
            }
        })
    }

    async fn record_step(&self, step: &RunStep) -> Result<(), LedgerError> {
        if !self.run_exists(&step.run_id).await? {
            return Err(LedgerError::Persistence(format!("run {} not found", step.run_id)));
        }

        sqlx::query(
            "INSERT INTO run_steps (run_id, phase, message, payload, result, level, ts)
             VALUES (?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(step.run_id.to_string())
        .bind(step.phase.map(|p| p.as_str()))
        .bind(&step.message)
        .bind(step.payload.to_string())
        .bind(step.result.to_string())
        .bind(step.level.as_str())
        .bind(format_datetime(&step.timestamp))
        .execute(&self.pool.writer)
        .await
        .map_err(persistence)?;
        Ok(())
    }

    async fn record_artifact(&self, artifact: &RunArtifact) -> Result<(), LedgerError> {
        if !self.run_exists(&artifact.run_id).await? {
            return Err(LedgerError::Persistence(format!(
                "run {} not found",
                artifact.run_id
            )));
        }

        sqlx::query(
            "INSERT INTO run_artifacts (run_id, kind, title, url, external_id, data, created_at)
             VALUES (?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(artifact.run_id.to_string())
        .bind(&artifact.kind)
        .bind(&artifact.title)
        .bind(&artifact.url)
        .bind(&artifact.external_id)
        .bind(artifact.data.to_string())
        .bind(format_datetime(&artifact.created_at))
        .execute(&self.pool.writer)
        .await
        .map_err(persistence)?;
        Ok(())
    }

    async fn latest_runs(&self, query: &RunQuery) -> Result<Vec<Run>, LedgerError> {
        let mut runs = self.load_runs().await?;
        runs.retain(|r| {
            started_since(r, query.since)
                && (query.statuses.is_empty() || query.statuses.contains(&r.status))
        });
        runs.sort_by(|a, b| b.started_at.cmp(&a.started_at));
        runs.truncate(query.limit as usize);
        Ok(runs)
    }

    async fn run_details(&self, id: &RunId) -> Result<RunDetails, LedgerError> {
        let row = sqlx::query("SELECT * FROM runs WHERE id = ?")
            .bind(id.to_string())
            .fetch_optional(&self.pool.reader)
            .await
            .map_err(persistence)?;
        let run = row
            .as_ref()
            .and_then(map_run)
            .ok_or_else(|| LedgerError::NotFound(id.to_string()))?;

        let steps = sqlx::query("SELECT * FROM run_steps WHERE run_id = ? ORDER BY ts, id")
            .bind(id.to_string())
            .fetch_all(&self.pool.reader)
            .await
            .map_err(persistence)?
            .iter()
            .map(|row| map_step(*id, row))
            .collect();

        let artifacts =
            sqlx::query("SELECT * FROM run_artifacts WHERE run_id = ? ORDER BY created_at, id")
                .bind(id.to_string())
                .fetch_all(&self.pool.reader)
                .await
                .map_err(persistence)?
                .iter()
                .map(|row| map_artifact(*id, row))
                .collect();

        Ok(RunDetails {
            run,
            steps,
            artifacts,
        })
    }

    async fn stats(&self, since: Option<DateTime<Utc>>) -> Result<RunStats, LedgerError> {
        let mut runs = self.load_runs().await?;
        runs.retain(|r| started_since(r, since));
        Ok(compute_stats(&runs))
    }
}
