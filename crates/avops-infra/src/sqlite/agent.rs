//! SQLite agent repository implementation.

use avops_core::repository::agent::AgentRepository;
use avops_types::agent::Agent;
use avops_types::error::RepositoryError;
use avops_types::id::AgentId;
use sqlx::Row;

use super::pool::DatabasePool;
use super::{format_datetime, map_write_error, parse_datetime, query_error};

/// SQLite-backed implementation of `AgentRepository`.
#[derive(Clone)]
pub struct SqliteAgentRepository {
    pool: DatabasePool,
}

impl SqliteAgentRepository {
    pub fn new(pool: DatabasePool) -> Self {
        Self { pool }
    }
}

struct AgentRow {
    id: String,
    name: String,
    domain: String,
    config_json: String,
    created_at: String,
}

impl AgentRow {
    fn from_row(row: &sqlx::sqlite::SqliteRow) -> Result<Self, sqlx::Error> {
        Ok(Self {
            id: row.try_get("id")?,
            name: row.try_get("name")?,
            domain: row.try_get("domain")?,
            config_json: row.try_get("config_json")?,
            created_at: row.try_get("created_at")?,
        })
    }

    fn into_agent(self) -> Result<Agent, RepositoryError> {
        let id = self
            .id
            .parse::<AgentId>()
            .map_err(|e| RepositoryError::Query(format!("invalid agent id: {e}")))?;
        let config_json = serde_json::from_str(&self.config_json)
            .map_err(|e| RepositoryError::Query(format!("invalid agent config JSON: {e}")))?;

        Ok(Agent {
            id,
            name: self.name,
            domain: self.domain,
            config_json,
            created_at: parse_datetime(&self.created_at)?,
        })
    }
}

fn map_agent(row: &sqlx::sqlite::SqliteRow) -> Result<Agent, RepositoryError> {
    AgentRow::from_row(row).map_err(query_error)?.into_agent()
}

impl AgentRepository for SqliteAgentRepository {
    async fn create(&self, agent: &Agent) -> Result<(), RepositoryError> {
        sqlx::query(
            "INSERT INTO agents (id, name, domain, config_json, created_at) VALUES (?, ?, ?, ?, ?)",
        )
        .bind(agent.id.to_string())
        .bind(&agent.name)
        .bind(&agent.domain)
        .bind(agent.config_json.to_string())
        .bind(format_datetime(&agent.created_at))
        .execute(&self.pool.writer)
        .await
        .map_err(|e| map_write_error(e, || format!("agent '{}' already exists", agent.name)))?;
        Ok(())
    }

    async fn get(&self, id: &AgentId) -> Result<Option<Agent>, RepositoryError> {
        let row = sqlx::query("SELECT * FROM agents WHERE id = ?")
            .bind(id.to_string())
            .fetch_optional(&self.pool.reader)
            .await
            .map_err(query_error)?;
        row.as_ref().map(map_agent).transpose()
    }

    async fn find_by_name(&self, name: &str) -> Result<Option<Agent>, RepositoryError> {
        let row = sqlx::query("SELECT * FROM agents WHERE name = ?")
            .bind(name.trim())
            .fetch_optional(&self.pool.reader)
            .await
            .map_err(query_error)?;
        row.as_ref().map(map_agent).transpose()
    }

    async fn list(&self) -> Result<Vec<Agent>, RepositoryError> {
        let rows = sqlx::query("SELECT * FROM agents ORDER BY name")
            .fetch_all(&self.pool.reader)
            .await
            .map_err(query_error)?;
        rows.iter().map(map_agent).collect()
    }

    async fn update(&self, agent: &Agent) -> Result<(), RepositoryError> {
        let result =
            sqlx::query("UPDATE agents SET name = ?, domain = ?, config_json = ? WHERE id = ?")
                .bind(&agent.name)
                .bind(&agent.domain)
                .bind(agent.config_json.to_string())
                .bind(agent.id.to_string())
                .execute(&self.pool.writer)
                .await
                .map_err(|e| {
                    map_write_error(e, || format!("agent '{}' already exists", agent.name))
                })?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }
        Ok(())
    }

    async fn delete(&self, id: &AgentId) -> Result<bool, RepositoryError> {
        let result = sqlx::query("DELETE FROM agents WHERE id = ?")
            .bind(id.to_string())
            .execute(&self.pool.writer)
            .await
            .map_err(|e| map_write_error(e, || "agent delete conflict".to_string()))?;
        Ok(result.rows_affected() > 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sqlite::test_support::test_pool;
    use chrono::Utc;

    fn agent(name: &str) -> Agent {
        Agent {
            id: AgentId::new(),
            name: name.to_string(),
            domain: "av".to_string(),
            config_json: serde_json::json!({"site": "hq"}),
            created_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn test_create_and_get() {
        let repo = SqliteAgentRepository::new(test_pool().await);
        let a = agent("Ops Agent");
        repo.create(&a).await.unwrap();

        let loaded = repo.get(&a.id).await.unwrap().unwrap();
        assert_eq!(loaded.name, "Ops Agent");
        assert_eq!(loaded.config_json["site"], "hq");
        assert!(repo.get(&AgentId::new()).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_name_unique_case_insensitive() {
        let repo = SqliteAgentRepository::new(test_pool().await);
        repo.create(&agent("Ops Agent")).await.unwrap();

        let err = repo.create(&agent("ops agent")).await.unwrap_err();
        assert!(matches!(err, RepositoryError::Conflict(_)));

        let found = repo.find_by_name("OPS AGENT").await.unwrap().unwrap();
        assert_eq!(found.name, "Ops Agent");
    }

    #[tokio::test]
    async fn test_list_sorted_update_delete() {
        let repo = SqliteAgentRepository::new(test_pool().await);
        let mut zed = agent("zed");
        repo.create(&zed).await.unwrap();
        repo.create(&agent("Alpha")).await.unwrap();

        let names: Vec<String> = repo.list().await.unwrap().into_iter().map(|a| a.name).collect();
        assert_eq!(names, vec!["Alpha", "zed"]);

        zed.domain = "it".to_string();
        repo.update(&zed).await.unwrap();
        assert_eq!(repo.get(&zed.id).await.unwrap().unwrap().domain, "it");

        assert!(repo.delete(&zed.id).await.unwrap());
        assert!(!repo.delete(&zed.id).await.unwrap());
        let missing = repo.update(&zed).await.unwrap_err();
        assert!(matches!(missing, RepositoryError::NotFound));
    }
}
