//! SQLite recipe repository implementation.

use avops_core::repository::recipe::RecipeRepository;
use avops_types::error::RepositoryError;
use avops_types::id::RecipeId;
use avops_types::recipe::Recipe;
use sqlx::Row;

use super::pool::DatabasePool;
use super::{format_datetime, map_write_error, parse_datetime, query_error};

/// SQLite-backed implementation of `RecipeRepository`.
#[derive(Clone)]
pub struct SqliteRecipeRepository {
    pool: DatabasePool,
}

impl SqliteRecipeRepository {
    pub fn new(pool: DatabasePool) -> Self {
        Self { pool }
    }
}

fn map_recipe(row: &sqlx::sqlite::SqliteRow) -> Result<Recipe, RepositoryError> {
    let id: String = row.try_get("id").map_err(query_error)?;
    let created_at: String = row.try_get("created_at").map_err(query_error)?;
    Ok(Recipe {
        id: id
            .parse()
            .map_err(|e| RepositoryError::Query(format!("invalid recipe id: {e}")))?,
        name: row.try_get("name").map_err(query_error)?,
        yaml_text: row.try_get("yaml_text").map_err(query_error)?,
        yaml_path: row.try_get("yaml_path").map_err(query_error)?,
        created_at: parse_datetime(&created_at)?,
    })
}

impl RecipeRepository for SqliteRecipeRepository {
    async fn create(&self, recipe: &Recipe) -> Result<(), RepositoryError> {
        sqlx::query(
            "INSERT INTO recipes (id, name, yaml_text, yaml_path, created_at) VALUES (?, ?, ?, ?, ?)",
        )
        .bind(recipe.id.to_string())
        .bind(&recipe.name)
        .bind(&recipe.yaml_text)
        .bind(&recipe.yaml_path)
        .bind(format_datetime(&recipe.created_at))
        .execute(&self.pool.writer)
        .await
        .map_err(|e| map_write_error(e, || format!("recipe '{}' already exists", recipe.name)))?;
        Ok(())
    }

    async fn get(&self, id: &RecipeId) -> Result<Option<Recipe>, RepositoryError> {
        let row = sqlx::query("SELECT * FROM recipes WHERE id = ?")
            .bind(id.to_string())
            .fetch_optional(&self.pool.reader)
            .await
            .map_err(query_error)?;
        row.as_ref().map(map_recipe).transpose()
    }

    async fn find_by_name(&self, name: &str) -> Result<Option<Recipe>, RepositoryError> {
        let row = sqlx::query("SELECT * FROM recipes WHERE name = ?")
            .bind(name.trim())
            .fetch_optional(&self.pool.reader)
            .await
            .map_err(query_error)?;
        row.as_ref().map(map_recipe).transpose()
    }

    async fn list(&self) -> Result<Vec<Recipe>, RepositoryError> {
        let rows = sqlx::query("SELECT * FROM recipes ORDER BY name")
            .fetch_all(&self.pool.reader)
            .await
            .map_err(query_error)?;
        rows.iter().map(map_recipe).collect()
    }

    async fn update(&self, recipe: &Recipe) -> Result<(), RepositoryError> {
        let result =
            sqlx::query("UPDATE recipes SET name = ?, yaml_text = ?, yaml_path = ? WHERE id = ?")
                .bind(&recipe.name)
                .bind(&recipe.yaml_text)
                .bind(&recipe.yaml_path)
                .bind(recipe.id.to_string())
                .execute(&self.pool.writer)
                .await
                .map_err(|e| {
                    map_write_error(e, || format!("recipe '{}' already exists", recipe.name))
                })?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }
        Ok(())
    }

    async fn delete(&self, id: &RecipeId) -> Result<bool, RepositoryError> {
        let result = sqlx::query("DELETE FROM recipes WHERE id = ?")
            .bind(id.to_string())
            .execute(&self.pool.writer)
            .await
            .map_err(|e| map_write_error(e, || "recipe delete conflict".to_string()))?;
        Ok(result.rows_affected() > 0)
    }
}
