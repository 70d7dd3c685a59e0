//! Trigger scheduler: `run_now` and `tick`.
//!
//! Every execution writes one ledger start record and exactly one finish
//! record, even when the recipe fails, before the result reaches the
//! caller. After every execution the workflow's schedule columns are
//! rewritten: `last_run_at` on success only, `next_run_at` always advanced
//! for scheduled workflows, `status` recomputed.

use std::path::PathBuf;

use avops_types::error::{ExecutionError, SchedulerError, WorkflowError};
use avops_types::id::{RunId, WorkflowId};
use avops_types::recipe::Phase;
use avops_types::run::{RunFinish, RunOutcome, RunStart, RunStep, StepLevel};
use avops_types::workflow::{ScheduleUpdate, TriggerType, WorkflowDefinition};
use chrono::{DateTime, Duration, Utc};

use crate::ledger::RunLedger;
use crate::recipe::load_recipe_document;
use crate::repository::agent::AgentRepository;
use crate::repository::recipe::RecipeRepository;
use crate::repository::workflow::WorkflowRepository;
use crate::service::fs::FileSystem;
use crate::workflow::engine::RecipeExecutor;
use crate::workflow::health::health_for;

/// Runs workflows on demand and on their interval.
///
/// The scheduler owns no timer; an external caller invokes `tick(now)`.
pub struct Scheduler<W, A, R, L, F, E>
where
    W: WorkflowRepository,
    A: AgentRepository,
    R: RecipeRepository,
    L: RunLedger,
    F: FileSystem,
    E: RecipeExecutor,
{
    workflows: W,
    agents: A,
    recipes: R,
    ledger: L,
    files: F,
    executor: E,
    recipes_dir: PathBuf,
}

impl<W, A, R, L, F, E> Scheduler<W, A, R, L, F, E>
where
    W: WorkflowRepository,
    A: AgentRepository,
    R: RecipeRepository,
    L: RunLedger,
    F: FileSystem,
    E: RecipeExecutor,
{
    pub fn new(
        workflows: W,
        agents: A,
        recipes: R,
        ledger: L,
        files: F,
        executor: E,
        recipes_dir: PathBuf,
    ) -> Self {
        Self {
            workflows,
            agents,
            recipes,
            ledger,
            files,
            executor,
            recipes_dir,
        }
    }

    pub fn ledger(&self) -> &L {
        &self.ledger
    }

    /// Execute one workflow now, as a manual run.
    ///
    /// Returns the run id on success. On failure the run is already sealed
    /// as failed in the ledger when the error is returned.
    pub async fn run_now(&self, id: &WorkflowId) -> Result<RunId, SchedulerError> {
        let now = Utc::now();
        let def = self
            .workflows
            .get(id)
            .await
            .map_err(WorkflowError::from)?
            .ok_or_else(|| WorkflowError::NotFound(id.to_string()))?;

        let result = self.execute(&def, TriggerType::Manual).await;
        self.advance(&def, now, result.is_ok()).await?;
        result
    }

    /// Execute every due interval workflow and return how many ran.
    ///
    /// A failing workflow is still advanced to `now + interval`, so it is
    /// retried at its normal cadence and never faster. Execution failures
    /// are logged and do not stop the tick; ledger failures do.
    pub async fn tick(&self, now: DateTime<Utc>) -> Result<u32, SchedulerError> {
        let due = self
            .workflows
            .list_due(&now)
            .await
            .map_err(WorkflowError::from)?;

        let mut executed = 0u32;
        let mut failed = 0u32;
        for def in &due {
            let result = self.execute(def, TriggerType::Interval).await;
            self.advance(def, now, result.is_ok()).await?;
            executed += 1;

            match result {
                Ok(run_id) => {
                    tracing::debug!(workflow_id = %def.id, %run_id, "scheduled run succeeded");
                }
                Err(SchedulerError::Ledger(e)) => return Err(SchedulerError::Ledger(e)),
                Err(e) => {
                    failed += 1;
                    tracing::warn!(workflow_id = %def.id, name = %def.name, error = %e, "scheduled run failed");
                }
            }
        }

        tracing::info!(due = due.len(), executed, failed, "tick complete");
        Ok(executed)
    }

    /// Start, run and seal one run.
    async fn execute(
        &self,
        def: &WorkflowDefinition,
        trigger: TriggerType,
    ) -> Result<RunId, SchedulerError> {
        let run_id = RunId::new();
        let started_at = Utc::now();
        self.ledger
            .record_start(&RunStart {
                id: run_id,
                workflow_id: Some(def.id),
                name: def.name.clone(),
                agent_id: Some(def.agent_id),
                recipe_id: Some(def.recipe_id),
                trigger,
                started_at,
            })
            .await?;
        tracing::info!(workflow_id = %def.id, %run_id, %trigger, "run started");

        let result = self.run_recipe(&run_id, def).await;

        let outcome = match &result {
            Ok(()) => RunOutcome::Success,
            Err(e) => RunOutcome::Failed {
                error: e.to_string(),
            },
        };
        let finish = RunFinish {
            outcome,
            started_at,
            finished_at: Some(Utc::now()),
            duration_ms: None,
        };
        if let Err(e) = self.ledger.record_finish(&run_id, &finish).await {
            if let Err(run_error) = &result {
                tracing::error!(%run_id, error = %run_error, "run failed and could not be sealed");
            }
            return Err(e.into());
        }

        match &result {
            Ok(()) => tracing::info!(workflow_id = %def.id, %run_id, "run succeeded"),
            Err(e) => tracing::warn!(workflow_id = %def.id, %run_id, error = %e, "run failed"),
        }
        result.map(|()| run_id)
    }

    /// Resolve the agent and recipe, run the phases and record the steps.
    async fn run_recipe(&self, run_id: &RunId, def: &WorkflowDefinition) -> Result<(), SchedulerError> {
        let agent = self
            .agents
            .get(&def.agent_id)
            .await
            .map_err(WorkflowError::from)?
            .ok_or_else(|| WorkflowError::Referential(format!("agent {} not found", def.agent_id)))?;
        let recipe = self
            .recipes
            .get(&def.recipe_id)
            .await
            .map_err(WorkflowError::from)?
            .ok_or_else(|| {
                WorkflowError::Referential(format!("recipe {} not found", def.recipe_id))
            })?;

        let document = load_recipe_document(&recipe, &self.files, &self.recipes_dir).await?;

        match self.executor.run_phases(&document) {
            Ok(outcomes) => {
                for outcome in outcomes {
                    let message = format!(
                        "{}: {} steps: {}",
                        agent.name, outcome.phase, outcome.step_count
                    );
                    self.ledger
                        .record_step(&RunStep {
                            run_id: *run_id,
                            phase: Some(outcome.phase),
                            message,
                            payload: serde_json::json!({
                                "phase": outcome.phase.as_str(),
                                "steps": outcome.step_count,
                            }),
                            result: serde_json::json!({ "summary": outcome.message }),
                            level: StepLevel::Info,
                            timestamp: Utc::now(),
                        })
                        .await?;
                }
                Ok(())
            }
            Err(e) => {
                self.record_failure_step(run_id, &e).await;
                Err(e.into())
            }
        }
    }

    /// Best effort: the finish record carries the error either way.
    async fn record_failure_step(&self, run_id: &RunId, error: &ExecutionError) {
        let phase: Option<Phase> = error.phase();
        let step = RunStep {
            run_id: *run_id,
            phase,
            message: error.to_string(),
            payload: serde_json::json!({ "phase": phase.map(|p| p.as_str()) }),
            result: serde_json::Value::Null,
            level: StepLevel::Error,
            timestamp: Utc::now(),
        };
        if let Err(e) = self.ledger.record_step(&step).await {
            tracing::warn!(%run_id, error = %e, "could not record failure step");
        }
    }

    /// Rewrite the scheduler-owned columns after an execution.
    async fn advance(
        &self,
        def: &WorkflowDefinition,
        now: DateTime<Utc>,
        succeeded: bool,
    ) -> Result<(), SchedulerError> {
        let last_run_at = if succeeded { Some(now) } else { def.last_run_at };
        let update = ScheduleUpdate {
            last_run_at,
            next_run_at: def
                .schedule_minutes()
                .map(|m| now + Duration::minutes(i64::from(m))),
            status: health_for(last_run_at, now),
        };
        self.workflows
            .record_schedule(&def.id, &update)
            .await
            .map_err(WorkflowError::from)?;
        tracing::debug!(
            workflow_id = %def.id,
            next_run_at = ?update.next_run_at,
            status = %update.status,
            "schedule advanced"
        );
        Ok(())
    }
}
