//! Application state wiring all services together.
//!
//! Services in avops-core are generic over repository/ledger/filesystem
//! traits; AppState pins them to the SQLite and local filesystem
//! implementations.

use std::path::Path;
use std::sync::Arc;

use anyhow::Context;
use avops_core::bundle::BundleService;
use avops_core::service::catalog::CatalogService;
use avops_core::workflow::engine::PhaseEngine;
use avops_core::workflow::scheduler::Scheduler;
use avops_core::workflow::service::WorkflowService;
use avops_infra::config::{DataLayout, load_config};
use avops_infra::filesystem::{LocalFileSystem, resolve_data_dir};
use avops_infra::sqlite::agent::SqliteAgentRepository;
use avops_infra::sqlite::ledger::SqliteRunLedger;
use avops_infra::sqlite::pool::{DatabasePool, database_url};
use avops_infra::sqlite::recipe::SqliteRecipeRepository;
use avops_infra::sqlite::workflow::SqliteWorkflowRepository;
use avops_types::config::AvopsConfig;

pub type ConcreteCatalog =
    CatalogService<SqliteAgentRepository, SqliteRecipeRepository, LocalFileSystem>;

pub type ConcreteWorkflowService =
    WorkflowService<SqliteWorkflowRepository, SqliteAgentRepository, SqliteRecipeRepository>;

pub type ConcreteScheduler = Scheduler<
    SqliteWorkflowRepository,
    SqliteAgentRepository,
    SqliteRecipeRepository,
    SqliteRunLedger,
    LocalFileSystem,
    PhaseEngine,
>;

pub type ConcreteBundleService = BundleService<
    SqliteAgentRepository,
    SqliteRecipeRepository,
    SqliteWorkflowRepository,
    LocalFileSystem,
>;

/// Shared application state holding all services.
#[derive(Clone)]
pub struct AppState {
    pub catalog: Arc<ConcreteCatalog>,
    pub workflows: Arc<ConcreteWorkflowService>,
    pub scheduler: Arc<ConcreteScheduler>,
    pub bundles: Arc<ConcreteBundleService>,
    pub config: AvopsConfig,
    pub layout: DataLayout,
}

impl AppState {
    /// Initialize the application state in the resolved data directory.
    pub async fn init() -> anyhow::Result<Self> {
        Self::open(&resolve_data_dir()).await
    }

    /// Load config, open the DB and wire services under `data_dir`.
    pub async fn open(data_dir: &Path) -> anyhow::Result<Self> {
        tokio::fs::create_dir_all(data_dir)
            .await
            .with_context(|| format!("cannot create data directory {}", data_dir.display()))?;

        let config = load_config(data_dir).await;
        let layout = DataLayout::new(data_dir, &config);

        let db_pool = DatabasePool::new(&database_url(&layout.database_path))
            .await
            .with_context(|| format!("cannot open database {}", layout.database_path.display()))?;

        let agents = SqliteAgentRepository::new(db_pool.clone());
        let recipes = SqliteRecipeRepository::new(db_pool.clone());
        let workflow_repo = SqliteWorkflowRepository::new(db_pool.clone());
        let ledger = SqliteRunLedger::new(db_pool.clone());
        let files = LocalFileSystem::new();

        let catalog = CatalogService::new(
            agents.clone(),
            recipes.clone(),
            files,
            layout.recipes_dir.clone(),
        );
        let workflows =
            WorkflowService::new(workflow_repo.clone(), agents.clone(), recipes.clone());
        let scheduler = Scheduler::new(
            workflow_repo.clone(),
            agents.clone(),
            recipes.clone(),
            ledger,
            files,
            PhaseEngine,
            layout.recipes_dir.clone(),
        );
        let bundles = BundleService::new(agents, recipes, workflow_repo, files);

        tracing::debug!(data_dir = %data_dir.display(), "application state ready");

        Ok(Self {
            catalog: Arc::new(catalog),
            workflows: Arc::new(workflows),
            scheduler: Arc::new(scheduler),
            bundles: Arc::new(bundles),
            config,
            layout,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use avops_core::ledger::RunLedger;
    use avops_core::service::catalog::RecipeSource;
    use avops_types::agent::CreateAgentRequest;
    use avops_types::run::{RunQuery, RunStatus};
    use avops_types::workflow::{CreateWorkflowRequest, TriggerType};

    #[tokio::test]
    async fn test_open_creates_layout_and_runs_a_workflow() {
        let dir = tempfile::tempdir().unwrap();
        let state = AppState::open(dir.path()).await.unwrap();
        assert!(state.layout.database_path.exists());

        let agent = state
            .catalog
            .create_agent(CreateAgentRequest {
                name: "Room Agent".to_string(),
                domain: "av".to_string(),
                config_json: None,
            })
            .await
            .unwrap();
        let recipe = state
            .catalog
            .register_recipe(
                "Room Check",
                RecipeSource::Inline("name: Room Check\nintake: [ping]\nverify: [report]\n".into()),
            )
            .await
            .unwrap();
        let def = state
            .workflows
            .create(CreateWorkflowRequest {
                name: "Hourly Room Check".to_string(),
                agent_id: agent.id,
                recipe_id: recipe.id,
                trigger_type: TriggerType::Interval,
                trigger_value: Some(60),
            })
            .await
            .unwrap();

        let run_id = state.scheduler.run_now(&def.id).await.unwrap();
        let details = state.scheduler.ledger().run_details(&run_id).await.unwrap();
        assert_eq!(details.run.status, RunStatus::Success);
        assert_eq!(details.steps.len(), 4);

        let runs = state
            .scheduler
            .ledger()
            .latest_runs(&RunQuery::default())
            .await
            .unwrap();
        assert_eq!(runs.len(), 1);
        assert_eq!(runs[0].name, "Hourly Room Check");

        let after = state.workflows.get(&def.id).await.unwrap();
        assert!(after.last_run_at.is_some());
        assert!(after.next_run_at.is_some());
    }

    #[tokio::test]
    async fn test_open_reads_config_from_data_dir() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join("config.toml"),
            "latest_runs_limit = 7\nrecipes_dir = \"playbooks\"\n",
        )
        .unwrap();
        let state = AppState::open(dir.path()).await.unwrap();
        assert_eq!(state.config.latest_runs_limit, 7);
        assert_eq!(state.layout.recipes_dir, dir.path().join("playbooks"));
    }
}
