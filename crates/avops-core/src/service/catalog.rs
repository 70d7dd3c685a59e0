//! Agent and recipe catalog.
//!
//! Both catalogs are name-keyed: names are whitespace-normalized and unique
//! case-insensitively, the same rules the workflow store applies.

use std::path::{Path, PathBuf};

use avops_types::agent::{Agent, CreateAgentRequest};
use avops_types::error::{CatalogError, RepositoryError};
use avops_types::id::{AgentId, RecipeId};
use avops_types::name::{name_key, normalize_name};
use avops_types::recipe::Recipe;
use chrono::Utc;

use crate::recipe::{parse_recipe_document, recipe_file_path};
use crate::repository::agent::AgentRepository;
use crate::repository::recipe::RecipeRepository;
use crate::service::fs::FileSystem;

/// Where a newly registered recipe's YAML lives.
#[derive(Debug, Clone)]
pub enum RecipeSource {
    /// YAML stored in the database row.
    Inline(String),
    /// A file, absolute or relative to the recipes directory.
    File(PathBuf),
}

pub struct CatalogService<A: AgentRepository, R: RecipeRepository, F: FileSystem> {
    agents: A,
    recipes: R,
    files: F,
    recipes_dir: PathBuf,
}

impl<A: AgentRepository, R: RecipeRepository, F: FileSystem> CatalogService<A, R, F> {
    pub fn new(agents: A, recipes: R, files: F, recipes_dir: PathBuf) -> Self {
        Self {
            agents,
            recipes,
            files,
            recipes_dir,
        }
    }

    pub fn recipes_dir(&self) -> &Path {
        &self.recipes_dir
    }

    pub async fn create_agent(&self, request: CreateAgentRequest) -> Result<Agent, CatalogError> {
        let name = valid_name(&request.name, "agent")?;
        if self.find_agent(&name).await?.is_some() {
            return Err(CatalogError::Validation(format!(
                "an agent named '{name}' already exists"
            )));
        }

        let config_json = request
            .config_json
            .unwrap_or_else(|| serde_json::json!({}));
        if !config_json.is_object() {
            return Err(CatalogError::Validation(
                "agent config must be a JSON object".to_string(),
            ));
        }

        let agent = Agent {
            id: AgentId::new(),
            name,
            domain: request.domain.trim().to_string(),
            config_json,
            created_at: Utc::now(),
        };
        self.agents.create(&agent).await.map_err(conflict_as_validation)?;
        tracing::info!(agent_id = %agent.id, name = %agent.name, "agent created");
        Ok(agent)
    }

    /// Register a recipe after checking its YAML parses.
    pub async fn register_recipe(
        &self,
        name: &str,
        source: RecipeSource,
    ) -> Result<Recipe, CatalogError> {
        let name = valid_name(name, "recipe")?;
        if self.find_recipe(&name).await?.is_some() {
            return Err(CatalogError::Validation(format!(
                "a recipe named '{name}' already exists"
            )));
        }

        let (yaml_text, yaml_path, content) = match source {
            RecipeSource::Inline(text) => (Some(text.clone()), None, text),
            RecipeSource::File(path) => {
                let stored = path.to_string_lossy().into_owned();
                let full = recipe_file_path(&self.recipes_dir, &stored);
                if !self.files.exists(&full).await {
                    return Err(CatalogError::NotFound(full.display().to_string()));
                }
                let content = self
                    .files
                    .read_file(&full)
                    .await
                    .map_err(|e| CatalogError::FileSystem(e.to_string()))?;
                (None, Some(stored), content)
            }
        };
        parse_recipe_document(&content)
            .map_err(|e| CatalogError::Validation(format!("recipe '{name}' is not valid YAML: {e}")))?;

        let recipe = Recipe {
            id: RecipeId::new(),
            name,
            yaml_text,
            yaml_path,
            created_at: Utc::now(),
        };
        self.recipes.create(&recipe).await.map_err(conflict_as_validation)?;
        tracing::info!(recipe_id = %recipe.id, name = %recipe.name, "recipe registered");
        Ok(recipe)
    }

    pub async fn list_agents(&self) -> Result<Vec<Agent>, CatalogError> {
        Ok(self.agents.list().await?)
    }

    pub async fn list_recipes(&self) -> Result<Vec<Recipe>, CatalogError> {
        Ok(self.recipes.list().await?)
    }

    pub async fn get_agent(&self, id: &AgentId) -> Result<Option<Agent>, CatalogError> {
        Ok(self.agents.get(id).await?)
    }

    pub async fn get_recipe(&self, id: &RecipeId) -> Result<Option<Recipe>, CatalogError> {
        Ok(self.recipes.get(id).await?)
    }

    pub async fn find_agent(&self, name: &str) -> Result<Option<Agent>, CatalogError> {
        let key = name_key(name);
        Ok(self
            .agents
            .list()
            .await?
            .into_iter()
            .find(|a| name_key(&a.name) == key))
    }

    pub async fn find_recipe(&self, name: &str) -> Result<Option<Recipe>, CatalogError> {
        let key = name_key(name);
        Ok(self
            .recipes
            .list()
            .await?
            .into_iter()
            .find(|r| name_key(&r.name) == key))
    }
}

fn valid_name(raw: &str, kind: &str) -> Result<String, CatalogError> {
    let name = normalize_name(raw);
    if name.is_empty() {
        return Err(CatalogError::Validation(format!("{kind} name cannot be empty")));
    }
    Ok(name)
}

fn conflict_as_validation(e: RepositoryError) -> CatalogError {
    match e {
        RepositoryError::Conflict(msg) => CatalogError::Validation(msg),
        other => CatalogError::Storage(other),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{MemoryAgentRepository, MemoryFileSystem, MemoryRecipeRepository};

    fn service() -> CatalogService<MemoryAgentRepository, MemoryRecipeRepository, MemoryFileSystem> {
        CatalogService::new(
            MemoryAgentRepository::default(),
            MemoryRecipeRepository::default(),
            MemoryFileSystem::default(),
            PathBuf::from("/data/recipes"),
        )
    }

    fn agent_request(name: &str) -> CreateAgentRequest {
        CreateAgentRequest {
            name: name.to_string(),
            domain: "av".to_string(),
            config_json: None,
        }
    }

    #[tokio::test]
    async fn test_create_agent_defaults_config() {
        let svc = service();
        let agent = svc.create_agent(agent_request(" Room  Bot ")).await.unwrap();
        assert_eq!(agent.name, "Room Bot");
        assert_eq!(agent.config_json, serde_json::json!({}));
    }

    #[tokio::test]
    async fn test_create_agent_rejects_duplicate_any_case() {
        let svc = service();
        svc.create_agent(agent_request("Room Bot")).await.unwrap();
        let err = svc.create_agent(agent_request("room bot")).await.unwrap_err();
        assert!(matches!(err, CatalogError::Validation(_)));
    }

    #[tokio::test]
    async fn test_create_agent_rejects_non_object_config() {
        let svc = service();
        let mut req = agent_request("Room Bot");
        req.config_json = Some(serde_json::json!([1, 2]));
        assert!(matches!(
            svc.create_agent(req).await,
            Err(CatalogError::Validation(_))
        ));
    }

    #[tokio::test]
    async fn test_register_inline_recipe() {
        let svc = service();
        let recipe = svc
            .register_recipe("Health", RecipeSource::Inline("name: Health\nplan: [x]".into()))
            .await
            .unwrap();
        assert!(recipe.yaml_text.is_some());
        assert!(recipe.yaml_path.is_none());
        assert!(svc.find_recipe("HEALTH").await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_register_file_recipe_checks_file() {
        let svc = service();
        let err = svc
            .register_recipe("Health", RecipeSource::File("health.yaml".into()))
            .await
            .unwrap_err();
        assert!(matches!(err, CatalogError::NotFound(_)));

        svc.files.insert("/data/recipes/health.yaml", "name: Health");
        let recipe = svc
            .register_recipe("Health", RecipeSource::File("health.yaml".into()))
            .await
            .unwrap();
        assert_eq!(recipe.yaml_path.as_deref(), Some("health.yaml"));
    }

    #[tokio::test]
    async fn test_register_rejects_invalid_yaml() {
        let svc = service();
        let err = svc
            .register_recipe("Broken", RecipeSource::Inline("plan: [".into()))
            .await
            .unwrap_err();
        assert!(matches!(err, CatalogError::Validation(_)));
    }
}
