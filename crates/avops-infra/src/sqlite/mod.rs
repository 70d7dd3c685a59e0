//! SQLite storage layer.
//!
//! Repository and ledger implementations backed by SQLite with WAL mode and
//! split read/write connection pools.

pub mod agent;
pub mod ledger;
pub mod pool;
pub mod recipe;
pub mod workflow;

use avops_types::error::RepositoryError;
use chrono::{DateTime, NaiveDateTime, SecondsFormat, Utc};

/// Timestamps are stored as fixed-width RFC 3339 UTC so that string order
/// matches time order in `ORDER BY` and range filters.
pub(crate) fn format_datetime(dt: &DateTime<Utc>) -> String {
    dt.to_rfc3339_opts(SecondsFormat::Micros, true)
}

pub(crate) fn parse_datetime(s: &str) -> Result<DateTime<Utc>, RepositoryError> {
    parse_datetime_lenient(s).ok_or_else(|| RepositoryError::Query(format!("invalid datetime: {s}")))
}

/// Accepts RFC 3339, and naive `YYYY-MM-DD HH:MM:SS[.f]` / `T`-separated
/// values which are taken as UTC.
pub(crate) fn parse_datetime_lenient(s: &str) -> Option<DateTime<Utc>> {
    let s = s.trim();
    if s.is_empty() {
        return None;
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.with_timezone(&Utc));
    }
    ["%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%dT%H:%M:%S%.f"]
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(s, fmt).ok())
        .map(|naive| naive.and_utc())
}

/// Map a write error, translating UNIQUE and FOREIGN KEY violations.
pub(crate) fn map_write_error(err: sqlx::Error, conflict: impl FnOnce() -> String) -> RepositoryError {
    match err {
        sqlx::Error::Database(db_err) if db_err.message().contains("UNIQUE") => {
            RepositoryError::Conflict(conflict())
        }
        sqlx::Error::Database(db_err) if db_err.message().contains("FOREIGN KEY") => {
            RepositoryError::Constraint(db_err.message().to_string())
        }
        e => RepositoryError::Query(e.to_string()),
    }
}

pub(crate) fn query_error(err: sqlx::Error) -> RepositoryError {
    RepositoryError::Query(err.to_string())
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::pool::DatabasePool;

    /// Fresh database in a temp dir that outlives the test.
    pub async fn test_pool() -> DatabasePool {
        let dir = tempfile::tempdir().unwrap();
        let db_path = dir.path().join("test.db");
        let url = format!("sqlite://{}?mode=rwc", db_path.display());
        // Leak the tempdir so it is not deleted while the pool is open
        std::mem::forget(dir);
        DatabasePool::new(&url).await.unwrap()
    }
}
