//! SQLite workflow repository implementation.
//!
//! Implements `WorkflowRepository` from `avops-core` using sqlx with split
//! read/write pools. Schedule columns are written separately from the
//! user-owned ones so that a scheduler pass and an edit only race on the
//! columns they each own.

use avops_core::repository::workflow::WorkflowRepository;
use avops_types::error::RepositoryError;
use avops_types::id::WorkflowId;
use avops_types::workflow::{ScheduleUpdate, WorkflowDefinition};
use chrono::{DateTime, Utc};
use sqlx::Row;

use super::pool::DatabasePool;
use super::{format_datetime, map_write_error, parse_datetime, query_error};

/// SQLite-backed implementation of `WorkflowRepository`.
#[derive(Clone)]
pub struct SqliteWorkflowRepository {
    pool: DatabasePool,
}

impl SqliteWorkflowRepository {
    /// Create a new repository backed by the given database pool.
    pub fn new(pool: DatabasePool) -> Self {
        Self { pool }
    }
}

// ---------------------------------------------------------------------------
// Internal row type
// ---------------------------------------------------------------------------

struct WorkflowRow {
    id: String,
    name: String,
    agent_id: String,
    recipe_id: String,
    trigger_type: String,
    trigger_value: Option<i64>,
    enabled: bool,
    status: String,
    last_run_at: Option<String>,
    next_run_at: Option<String>,
    created_at: String,
    updated_at: String,
}

impl WorkflowRow {
    fn from_row(row: &sqlx::sqlite::SqliteRow) -> Result<Self, sqlx::Error> {
        Ok(Self {
            id: row.try_get("id")?,
            name: row.try_get("name")?,
            agent_id: row.try_get("agent_id")?,
            recipe_id: row.try_get("recipe_id")?,
            trigger_type: row.try_get("trigger_type")?,
            trigger_value: row.try_get("trigger_value")?,
            enabled: row.try_get("enabled")?,
            status: row.try_get("status")?,
            last_run_at: row.try_get("last_run_at")?,
            next_run_at: row.try_get("next_run_at")?,
            created_at: row.try_get("created_at")?,
            updated_at: row.try_get("updated_at")?,
        })
    }

    fn into_definition(self) -> Result<WorkflowDefinition, RepositoryError> {
        let id = self
            .id
            .parse()
            .map_err(|e| RepositoryError::Query(format!("invalid workflow id: {e}")))?;
        let agent_id = self
            .agent_id
            .parse()
            .map_err(|e| RepositoryError::Query(format!("invalid agent id: {e}")))?;
        let recipe_id = self
            .recipe_id
            .parse()
            .map_err(|e| RepositoryError::Query(format!("invalid recipe id: {e}")))?;
        let trigger_type = self.trigger_type.parse().map_err(RepositoryError::Query)?;
        let status = self.status.parse().map_err(RepositoryError::Query)?;
        let trigger_value = self
            .trigger_value
            .map(u32::try_from)
            .transpose()
            .map_err(|e| RepositoryError::Query(format!("invalid trigger value: {e}")))?;

        Ok(WorkflowDefinition {
            id,
            name: self.name,
            agent_id,
            recipe_id,
            trigger_type,
            trigger_value,
            enabled: self.enabled,
            status,
            last_run_at: self.last_run_at.as_deref().map(parse_datetime).transpose()?,
            next_run_at: self.next_run_at.as_deref().map(parse_datetime).transpose()?,
            created_at: parse_datetime(&self.created_at)?,
            updated_at: parse_datetime(&self.updated_at)?,
        })
    }
}

fn map_definition(row: &sqlx::sqlite::SqliteRow) -> Result<WorkflowDefinition, RepositoryError> {
    WorkflowRow::from_row(row)
        .map_err(query_error)?
        .into_definition()
}

impl WorkflowRepository for SqliteWorkflowRepository {
    async fn create(&self, def: &WorkflowDefinition) -> Result<(), RepositoryError> {
        sqlx::query(
            "INSERT INTO workflows (id, name, agent_id, recipe_id, trigger_type, trigger_value, enabled, status, last_run_at, next_run_at, created_at, updated_at)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(def.id.to_string())
        .bind(&def.name)
        .bind(def.agent_id.to_string())
        .bind(def.recipe_id.to_string())
        .bind(def.trigger_type.as_str())
        .bind(def.trigger_value.map(i64::from))
        .bind(def.enabled)
        .bind(def.status.as_str())
        .bind(def.last_run_at.as_ref().map(format_datetime))
        .bind(def.next_run_at.as_ref().map(format_datetime))
        .bind(format_datetime(&def.created_at))
        .bind(format_datetime(&def.updated_at))
        .execute(&self.pool.writer)
        .await
        .map_err(|e| map_write_error(e, || format!("workflow '{}' already exists", def.name)))?;
        Ok(())
    }

    async fn get(&self, id: &WorkflowId) -> Result<Option<WorkflowDefinition>, RepositoryError> {
        let row = sqlx::query("SELECT * FROM workflows WHERE id = ?")
            .bind(id.to_string())
            .fetch_optional(&self.pool.reader)
            .await
            .map_err(query_error)?;
        row.as_ref().map(map_definition).transpose()
    }

    async fn find_by_name(&self, name: &str) -> Result<Option<WorkflowDefinition>, RepositoryError> {
        let row = sqlx::query("SELECT * FROM workflows WHERE name = ?")
            .bind(name.trim())
            .fetch_optional(&self.pool.reader)
            .await
            .map_err(query_error)?;
        row.as_ref().map(map_definition).transpose()
    }

    async fn list(&self) -> Result<Vec<WorkflowDefinition>, RepositoryError> {
        let rows = sqlx::query("SELECT * FROM workflows ORDER BY created_at, rowid")
            .fetch_all(&self.pool.reader)
            .await
            .map_err(query_error)?;
        rows.iter().map(map_definition).collect()
    }

    async fn list_due(
        &self,
        now: &DateTime<Utc>,
    ) -> Result<Vec<WorkflowDefinition>, RepositoryError> {
        let rows = sqlx::query(
            "SELECT * FROM workflows
             WHERE enabled = 1 AND trigger_type = 'interval'
               AND next_run_at IS NOT NULL AND next_run_at <= ?
             ORDER BY next_run_at, created_at",
        )
        .bind(format_datetime(now))
        .fetch_all(&self.pool.reader)
        .await
        .map_err(query_error)?;
        rows.iter().map(map_definition).collect()
    }

    async fn update(&self, def: &WorkflowDefinition) -> Result<(), RepositoryError> {
        let result = sqlx::query(
            "UPDATE workflows SET name = ?, agent_id = ?, recipe_id = ?, trigger_type = ?, trigger_value = ?,
                enabled = ?, status = ?, last_run_at = ?, next_run_at = ?, updated_at = ?
             WHERE id = ?",
        )
        .bind(&def.name)
        .bind(def.agent_id.to_string())
        .bind(def.recipe_id.to_string())
        .bind(def.trigger_type.as_str())
        .bind(def.trigger_value.map(i64::from))
        .bind(def.enabled)
        .bind(def.status.as_str())
        .bind(def.last_run_at.as_ref().map(format_datetime))
        .bind(def.next_run_at.as_ref().map(format_datetime))
        .bind(format_datetime(&def.updated_at))
        .bind(def.id.to_string())
        .execute(&self.pool.writer)
        .await
        .map_err(|e| map_write_error(e, || format!("workflow '{}' already exists", def.name)))?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }
        Ok(())
    }

    async fn record_schedule(
        &self,
        id: &WorkflowId,
        update: &ScheduleUpdate,
    ) -> Result<(), RepositoryError> {
        let result = sqlx::query(
            "UPDATE workflows SET last_run_at = ?, next_run_at = ?, status = ? WHERE id = ?",
        )
        .bind(update.last_run_at.as_ref().map(format_datetime))
        .bind(update.next_run_at.as_ref().map(format_datetime))
        .bind(update.status.as_str())
        .bind(id.to_string())
        .execute(&self.pool.writer)
        .await
        .map_err(query_error)?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }
        Ok(())
    }

    async fn delete(&self, id: &WorkflowId) -> Result<bool, RepositoryError> {
        let result = sqlx::query("DELETE FROM workflows WHERE id = ?")
            .bind(id.to_string())
            .execute(&self.pool.writer)
            .await
            .map_err(|e| map_write_error(e, || "workflow delete conflict".to_string()))?;
        Ok(result.rows_affected() > 0)
    }
}
