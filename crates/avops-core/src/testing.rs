//! In-memory port implementations for core tests.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use avops_types::agent::Agent;
use avops_types::error::{LedgerError, RepositoryError};
use avops_types::id::{AgentId, RecipeId, RunId, WorkflowId};
use avops_types::name::name_key;
use avops_types::recipe::Recipe;
use avops_types::run::{
    Run, RunArtifact, RunDetails, RunFinish, RunQuery, RunStart, RunStats, RunStatus, RunStep,
};
use avops_types::workflow::{ScheduleUpdate, TriggerType, WorkflowDefinition};
use chrono::{DateTime, Utc};

use crate::ledger::{RunLedger, compute_stats, resolve_finish};
use crate::repository::agent::AgentRepository;
use crate::repository::recipe::RecipeRepository;
use crate::repository::workflow::WorkflowRepository;
use crate::service::fs::FileSystem;
use crate::workflow::service::WorkflowService;

// ---------------------------------------------------------------------------
// Catalog
// ---------------------------------------------------------------------------

#[derive(Clone, Default)]
pub struct MemoryAgentRepository {
    rows: Arc<Mutex<Vec<Agent>>>,
}

impl MemoryAgentRepository {
    pub fn count(&self) -> usize {
        self.rows.lock().unwrap().len()
    }
}

impl AgentRepository for MemoryAgentRepository {
    async fn create(&self, agent: &Agent) -> Result<(), RepositoryError> {
        let mut rows = self.rows.lock().unwrap();
        if rows.iter().any(|a| name_key(&a.name) == name_key(&agent.name)) {
            return Err(RepositoryError::Conflict(agent.name.clone()));
        }
        rows.push(agent.clone());
        Ok(())
    }

    async fn get(&self, id: &AgentId) -> Result<Option<Agent>, RepositoryError> {
        Ok(self.rows.lock().unwrap().iter().find(|a| &a.id == id).cloned())
    }

    async fn find_by_name(&self, name: &str) -> Result<Option<Agent>, RepositoryError> {
        let key = name_key(name);
        Ok(self
            .rows
            .lock()
            .unwrap()
            .iter()
            .find(|a| name_key(&a.name) == key)
            .cloned())
    }

    async fn list(&self) -> Result<Vec<Agent>, RepositoryError> {
        let mut rows = self.rows.lock().unwrap().clone();
        rows.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(rows)
    }

    async fn update(&self, agent: &Agent) -> Result<(), RepositoryError> {
        let mut rows = self.rows.lock().unwrap();
        let slot = rows
            .iter_mut()
            .find(|a| a.id == agent.id)
            .ok_or(RepositoryError::NotFound)?;
        *slot = agent.clone();
        Ok(())
    }

    async fn delete(&self, id: &AgentId) -> Result<bool, RepositoryError> {
        let mut rows = self.rows.lock().unwrap();
        let before = rows.len();
        rows.retain(|a| &a.id != id);
        Ok(rows.len() != before)
    }
}

#[derive(Clone, Default)]
pub struct MemoryRecipeRepository {
    rows: Arc<Mutex<Vec<Recipe>>>,
}

impl MemoryRecipeRepository {
    pub fn count(&self) -> usize {
        self.rows.lock().unwrap().len()
    }
}

impl RecipeRepository for MemoryRecipeRepository {
    async fn create(&self, recipe: &Recipe) -> Result<(), RepositoryError> {
        let mut rows = self.rows.lock().unwrap();
        if rows.iter().any(|r| name_key(&r.name) == name_key(&recipe.name)) {
            return Err(RepositoryError::Conflict(recipe.name.clone()));
        }
        rows.push(recipe.clone());
        Ok(())
    }

    async fn get(&self, id: &RecipeId) -> Result<Option<Recipe>, RepositoryError> {
        Ok(self.rows.lock().unwrap().iter().find(|r| &r.id == id).cloned())
    }

    async fn find_by_name(&self, name: &str) -> Result<Option<Recipe>, RepositoryError> {
        let key = name_key(name);
        Ok(self
            .rows
            .lock()
            .unwrap()
            .iter()
            .find(|r| name_key(&r.name) == key)
            .cloned())
    }

    async fn list(&self) -> Result<Vec<Recipe>, RepositoryError> {
        let mut rows = self.rows.lock().unwrap().clone();
        rows.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(rows)
    }

    async fn update(&self, recipe: &Recipe) -> Result<(), RepositoryError> {
        let mut rows = self.rows.lock().unwrap();
        let slot = rows
            .iter_mut()
            .find(|r| r.id == recipe.id)
            .ok_or(RepositoryError::NotFound)?;
        *slot = recipe.clone();
        Ok(())
    }

    async fn delete(&self, id: &RecipeId) -> Result<bool, RepositoryError> {
        let mut rows = self.rows.lock().unwrap();
        let before = rows.len();
        rows.retain(|r| &r.id != id);
        Ok(rows.len() != before)
    }
}

// ---------------------------------------------------------------------------
// Workflows
// ---------------------------------------------------------------------------

#[derive(Clone, Default)]
pub struct MemoryWorkflowRepository {
    rows: Arc<Mutex<Vec<WorkflowDefinition>>>,
    blocked: Arc<Mutex<HashSet<WorkflowId>>>,
    failing_writes: Arc<Mutex<bool>>,
    failing_updates: Arc<Mutex<bool>>,
}

impl MemoryWorkflowRepository {
    pub fn count(&self) -> usize {
        self.rows.lock().unwrap().len()
    }

    /// Make `delete` fail as if runs still referenced the workflow.
    pub fn block_delete(&self, id: WorkflowId) {
        self.blocked.lock().unwrap().insert(id);
    }

    /// Make every subsequent insert fail.
    pub fn fail_writes(&self) {
        *self.failing_writes.lock().unwrap() = true;
    }

    /// Make every subsequent update fail while inserts still succeed.
    pub fn fail_updates(&self) {
        *self.failing_updates.lock().unwrap() = true;
    }
}

impl WorkflowRepository for MemoryWorkflowRepository {
    async fn create(&self, def: &WorkflowDefinition) -> Result<(), RepositoryError> {
        if *self.failing_writes.lock().unwrap() {
            return Err(RepositoryError::Query("disk I/O error".to_string()));
        }
        let mut rows = self.rows.lock().unwrap();
        if rows.iter().any(|w| name_key(&w.name) == name_key(&def.name)) {
            return Err(RepositoryError::Conflict(def.name.clone()));
        }
        rows.push(def.clone());
        Ok(())
    }

    async fn get(&self, id: &WorkflowId) -> Result<Option<WorkflowDefinition>, RepositoryError> {
        Ok(self.rows.lock().unwrap().iter().find(|w| &w.id == id).cloned())
    }

    async fn find_by_name(
        &self,
        name: &str,
    ) -> Result<Option<WorkflowDefinition>, RepositoryError> {
        let key = name_key(name);
        Ok(self
            .rows
            .lock()
            .unwrap()
            .iter()
            .find(|w| name_key(&w.name) == key)
            .cloned())
    }

    async fn list(&self) -> Result<Vec<WorkflowDefinition>, RepositoryError> {
        Ok(self.rows.lock().unwrap().clone())
    }

    async fn list_due(
        &self,
        now: &DateTime<Utc>,
    ) -> Result<Vec<WorkflowDefinition>, RepositoryError> {
        Ok(self
            .rows
            .lock()
            .unwrap()
            .iter()
            .filter(|w| {
                w.enabled
                    && w.trigger_type == TriggerType::Interval
                    && w.next_run_at.is_some_and(|next| next <= *now)
            })
            .cloned()
            .collect())
    }

    async fn update(&self, def: &WorkflowDefinition) -> Result<(), RepositoryError> {
        if *self.failing_updates.lock().unwrap() {
            return Err(RepositoryError::Query("disk I/O error".to_string()));
        }
        let mut rows = self.rows.lock().unwrap();
        if rows
            .iter()
            .any(|w| w.id != def.id && name_key(&w.name) == name_key(&def.name))
        {
            return Err(RepositoryError::Conflict(def.name.clone()));
        }
        let slot = rows
            .iter_mut()
            .find(|w| w.id == def.id)
            .ok_or(RepositoryError::NotFound)?;
        *slot = def.clone();
        Ok(())
    }

    async fn record_schedule(
        &self,
        id: &WorkflowId,
        update: &ScheduleUpdate,
    ) -> Result<(), RepositoryError> {
        let mut rows = self.rows.lock().unwrap();
        let slot = rows
            .iter_mut()
            .find(|w| &w.id == id)
            .ok_or(RepositoryError::NotFound)?;
        slot.last_run_at = update.last_run_at;
        slot.next_run_at = update.next_run_at;
        slot.status = update.status;
        Ok(())
    }

    async fn delete(&self, id: &WorkflowId) -> Result<bool, RepositoryError> {
        if self.blocked.lock().unwrap().contains(id) {
            return Err(RepositoryError::Constraint("FOREIGN KEY constraint failed".to_string()));
        }
        let mut rows = self.rows.lock().unwrap();
        let before = rows.len();
        rows.retain(|w| &w.id != id);
        Ok(rows.len() != before)
    }
}

// ---------------------------------------------------------------------------
// Ledger
// ---------------------------------------------------------------------------

#[derive(Default)]
struct LedgerState {
    runs: BTreeMap<RunId, Run>,
    steps: Vec<RunStep>,
    artifacts: Vec<RunArtifact>,
}

#[derive(Clone, Default)]
pub struct MemoryLedger {
    state: Arc<Mutex<LedgerState>>,
}

impl MemoryLedger {
    pub fn runs(&self) -> Vec<Run> {
        self.state.lock().unwrap().runs.values().cloned().collect()
    }

    pub fn steps(&self, run_id: &RunId) -> Vec<RunStep> {
        self.state
            .lock()
            .unwrap()
            .steps
            .iter()
            .filter(|s| &s.run_id == run_id)
            .cloned()
            .collect()
    }
}

impl RunLedger for MemoryLedger {
    async fn record_start(&self, start: &RunStart) -> Result<(), LedgerError> {
        let mut state = self.state.lock().unwrap();
        if state.runs.contains_key(&start.id) {
            return Err(LedgerError::Persistence(format!("run {} already started", start.id)));
        }
        state.runs.insert(
            start.id,
            Run {
                id: start.id,
                workflow_id: start.workflow_id,
                name: start.name.clone(),
                agent_id: start.agent_id,
                recipe_id: start.recipe_id,
                trigger: start.trigger,
                status: RunStatus::Running,
                started_at: Some(start.started_at),
                finished_at: None,
                duration_ms: 0.0,
                error: None,
            },
        );
        Ok(())
    }

    async fn record_finish(&self, id: &RunId, finish: &RunFinish) -> Result<(), LedgerError> {
        let mut state = self.state.lock().unwrap();
        let run = state
            .runs
            .get_mut(id)
            .ok_or_else(|| LedgerError::Persistence(format!("run {id} was never started")))?;
        if run.status != RunStatus::Running {
            return Err(LedgerError::Persistence(format!("run {id} is already {}", run.status)));
        }
        let (finished_at, duration_ms) = resolve_finish(finish, Utc::now());
        run.status = finish.outcome.status();
        run.error = finish.outcome.error().map(String::from);
        run.finished_at = Some(finished_at);
        run.duration_ms = duration_ms;
        Ok(())
    }

    async fn record_step(&self, step: &RunStep) -> Result<(), LedgerError> {
        let mut state = self.state.lock().unwrap();
        if !state.runs.contains_key(&step.run_id) {
            return Err(LedgerError::Persistence(format!("run {} not found", step.run_id)));
        }
        state.steps.push(step.clone());
        Ok(())
    }

    async fn record_artifact(&self, artifact: &RunArtifact) -> Result<(), LedgerError> {
        let mut state = self.state.lock().unwrap();
        if !state.runs.contains_key(&artifact.run_id) {
            return Err(LedgerError::Persistence(format!("run {} not found", artifact.run_id)));
        }
        state.artifacts.push(artifact.clone());
        Ok(())
    }

    async fn latest_runs(&self, query: &RunQuery) -> Result<Vec<Run>, LedgerError> {
        let state = self.state.lock().unwrap();
        let mut runs: Vec<Run> = state
            .runs
            .values()
            .filter(|r| query.statuses.is_empty() || query.statuses.contains(&r.status))
            .filter(|r| match (query.since, r.started_at) {
                (Some(since), Some(started)) => started >= since,
                (Some(_), None) => false,
                (None, _) => true,
            })
            .cloned()
            .collect();
        runs.sort_by(|a, b| b.started_at.cmp(&a.started_at));
        runs.truncate(query.limit as usize);
        Ok(runs)
    }

    async fn run_details(&self, id: &RunId) -> Result<RunDetails, LedgerError> {
        let state = self.state.lock().unwrap();
        let run = state
            .runs
            .get(id)
            .cloned()
            .ok_or_else(|| LedgerError::NotFound(id.to_string()))?;
        Ok(RunDetails {
            run,
            steps: state.steps.iter().filter(|s| &s.run_id == id).cloned().collect(),
            artifacts: state
                .artifacts
                .iter()
                .filter(|a| &a.run_id == id)
                .cloned()
                .collect(),
        })
    }

    async fn stats(&self, since: Option<DateTime<Utc>>) -> Result<RunStats, LedgerError> {
        let runs: Vec<Run> = self
            .state
            .lock()
            .unwrap()
            .runs
            .values()
            .filter(|r| since.is_none_or(|s| r.started_at.is_some_and(|t| t >= s)))
            .cloned()
            .collect();
        Ok(compute_stats(&runs))
    }
}

// ---------------------------------------------------------------------------
// Filesystem
// ---------------------------------------------------------------------------

#[derive(Clone, Default)]
pub struct MemoryFileSystem {
    files: Arc<Mutex<HashMap<PathBuf, String>>>,
}

impl MemoryFileSystem {
    pub fn insert(&self, path: impl Into<PathBuf>, content: &str) {
        self.files
            .lock()
            .unwrap()
            .insert(path.into(), content.to_string());
    }

    pub fn get(&self, path: impl AsRef<Path>) -> Option<String> {
        self.files.lock().unwrap().get(path.as_ref()).cloned()
    }

    pub fn count(&self) -> usize {
        self.files.lock().unwrap().len()
    }
}

impl FileSystem for MemoryFileSystem {
    async fn write_file(&self, path: &Path, content: &str) -> Result<(), std::io::Error> {
        self.insert(path, content);
        Ok(())
    }

    async fn read_file(&self, path: &Path) -> Result<String, std::io::Error> {
        self.get(path).ok_or_else(|| {
            std::io::Error::new(std::io::ErrorKind::NotFound, path.display().to_string())
        })
    }

    async fn create_dir_all(&self, _path: &Path) -> Result<(), std::io::Error> {
        Ok(())
    }

    async fn exists(&self, path: &Path) -> bool {
        self.files.lock().unwrap().contains_key(path)
    }
}

// ---------------------------------------------------------------------------
// Fixture
// ---------------------------------------------------------------------------

/// Shared stores with one agent and one recipe already registered.
pub struct Fixture {
    pub agents: MemoryAgentRepository,
    pub recipes: MemoryRecipeRepository,
    pub workflows: MemoryWorkflowRepository,
    pub ledger: MemoryLedger,
    pub files: MemoryFileSystem,
    pub agent: Agent,
    pub recipe: Recipe,
}

pub const SAMPLE_RECIPE: &str = "name: Room Health\nintake: [ticket]\nplan: [a, b]\nact: [c]\nverify: []\n";

impl Fixture {
    pub async fn new() -> Self {
        let fx = Self::empty();
        let agent = fx.add_agent("Ops Agent", "av").await;
        let recipe = fx.add_recipe("Room Health", SAMPLE_RECIPE).await;
        Self { agent, recipe, ..fx }
    }

    /// Stores with nothing registered. `agent`/`recipe` are placeholders
    /// that exist in no store.
    pub fn empty() -> Self {
        Self {
            agents: MemoryAgentRepository::default(),
            recipes: MemoryRecipeRepository::default(),
            workflows: MemoryWorkflowRepository::default(),
            ledger: MemoryLedger::default(),
            files: MemoryFileSystem::default(),
            agent: agent("placeholder", ""),
            recipe: recipe("placeholder", ""),
        }
    }

    pub async fn add_agent(&self, name: &str, domain: &str) -> Agent {
        let a = agent(name, domain);
        self.agents.create(&a).await.unwrap();
        a
    }

    pub async fn add_recipe(&self, name: &str, yaml: &str) -> Recipe {
        let r = recipe(name, yaml);
        self.recipes.create(&r).await.unwrap();
        r
    }

    pub fn workflow_service(
        &self,
    ) -> WorkflowService<MemoryWorkflowRepository, MemoryAgentRepository, MemoryRecipeRepository>
    {
        WorkflowService::new(
            self.workflows.clone(),
            self.agents.clone(),
            self.recipes.clone(),
        )
    }
}

fn agent(name: &str, domain: &str) -> Agent {
    Agent {
        id: AgentId::new(),
        name: name.to_string(),
        domain: domain.to_string(),
        config_json: serde_json::json!({}),
        created_at: Utc::now(),
    }
}

fn recipe(name: &str, yaml: &str) -> Recipe {
    Recipe {
        id: RecipeId::new(),
        name: name.to_string(),
        yaml_text: Some(yaml.to_string()),
        yaml_path: None,
        created_at: Utc::now(),
    }
}
