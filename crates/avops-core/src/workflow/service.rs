//! Workflow definition store.
//!
//! CRUD over workflow definitions with the naming, trigger and referential
//! rules applied on every write.

use avops_types::error::{RepositoryError, WorkflowError};
use avops_types::id::WorkflowId;
use avops_types::name::{name_key, normalize_name};
use avops_types::workflow::{
    CreateWorkflowRequest, HealthStatus, TriggerType, UpdateWorkflowRequest, WorkflowDefinition,
};
use chrono::{DateTime, Duration, Utc};

use crate::repository::agent::AgentRepository;
use crate::repository::recipe::RecipeRepository;
use crate::repository::workflow::WorkflowRepository;
use crate::workflow::health;

/// Service owning the workflow definition invariants.
///
/// Generic over the repository traits -- avops-core never depends on
/// avops-infra.
pub struct WorkflowService<W: WorkflowRepository, A: AgentRepository, R: RecipeRepository> {
    workflows: W,
    agents: A,
    recipes: R,
}

impl<W: WorkflowRepository, A: AgentRepository, R: RecipeRepository> WorkflowService<W, A, R> {
    pub fn new(workflows: W, agents: A, recipes: R) -> Self {
        Self {
            workflows,
            agents,
            recipes,
        }
    }

    pub fn repository(&self) -> &W {
        &self.workflows
    }

    pub async fn create(
        &self,
        request: CreateWorkflowRequest,
    ) -> Result<WorkflowDefinition, WorkflowError> {
        self.create_at(request, Utc::now()).await
    }

    /// Create a workflow as of `now`.
    ///
    /// Interval workflows are scheduled for `now + trigger_value` minutes.
    pub async fn create_at(
        &self,
        request: CreateWorkflowRequest,
        now: DateTime<Utc>,
    ) -> Result<WorkflowDefinition, WorkflowError> {
        let name = valid_name(&request.name)?;
        validate_trigger(request.trigger_type, request.trigger_value)?;
        self.ensure_unique_name(&name, None).await?;
        self.ensure_agent(&request.agent_id).await?;
        self.ensure_recipe(&request.recipe_id).await?;

        let mut def = WorkflowDefinition {
            id: WorkflowId::new(),
            name,
            agent_id: request.agent_id,
            recipe_id: request.recipe_id,
            trigger_type: request.trigger_type,
            trigger_value: request.trigger_value,
            enabled: true,
            status: HealthStatus::Yellow,
            last_run_at: None,
            next_run_at: None,
            created_at: now,
            updated_at: now,
        };
        def.next_run_at = def.schedule_minutes().map(|m| now + Duration::minutes(i64::from(m)));

        self.workflows.create(&def).await.map_err(|e| match e {
            RepositoryError::Conflict(msg) => WorkflowError::Validation(msg),
            other => WorkflowError::Storage(other),
        })?;

        tracing::info!(workflow_id = %def.id, name = %def.name, trigger = %def.trigger_type, "workflow created");
        Ok(def)
    }

    pub async fn update(
        &self,
        id: &WorkflowId,
        request: UpdateWorkflowRequest,
    ) -> Result<WorkflowDefinition, WorkflowError> {
        self.update_at(id, request, Utc::now()).await
    }

    /// Apply the `Some` fields of `request` as of `now`.
    ///
    /// A recipe change resets the run history (last/next run, yellow). Any
    /// change to trigger type, interval, enablement or recipe restarts the
    /// schedule from `now` while the workflow stays interval-triggered and
    /// enabled; otherwise `next_run_at` is cleared.
    pub async fn update_at(
        &self,
        id: &WorkflowId,
        request: UpdateWorkflowRequest,
        now: DateTime<Utc>,
    ) -> Result<WorkflowDefinition, WorkflowError> {
        let mut def = self.get(id).await?;
        if request.is_empty() {
            return Ok(def);
        }

        if let Some(raw) = request.name.as_deref() {
            let name = valid_name(raw)?;
            self.ensure_unique_name(&name, Some(id)).await?;
            def.name = name;
        }

        if let Some(agent_id) = request.agent_id {
            self.ensure_agent(&agent_id).await?;
            def.agent_id = agent_id;
        }

        let mut reschedule = false;

        if let Some(recipe_id) = request.recipe_id {
            self.ensure_recipe(&recipe_id).await?;
            if recipe_id != def.recipe_id {
                def.recipe_id = recipe_id;
                def.last_run_at = None;
                def.next_run_at = None;
                def.status = HealthStatus::Yellow;
                reschedule = true;
            }
        }

        if let Some(trigger_type) = request.trigger_type {
            reschedule |= trigger_type != def.trigger_type;
            def.trigger_type = trigger_type;
        }
        if let Some(value) = request.trigger_value {
            reschedule |= Some(value) != def.trigger_value;
            def.trigger_value = Some(value);
        }
        if let Some(enabled) = request.enabled {
            reschedule |= enabled != def.enabled;
            def.enabled = enabled;
        }
        validate_trigger(def.trigger_type, def.trigger_value)?;

        def.next_run_at = match def.schedule_minutes() {
            None => None,
            Some(minutes) if reschedule || def.next_run_at.is_none() => {
                Some(now + Duration::minutes(i64::from(minutes)))
            }
            Some(_) => def.next_run_at,
        };
        def.updated_at = now;

        self.workflows.update(&def).await.map_err(|e| match e {
            RepositoryError::Conflict(msg) => WorkflowError::Validation(msg),
            RepositoryError::NotFound => WorkflowError::NotFound(id.to_string()),
            other => WorkflowError::Storage(other),
        })?;

        tracing::info!(workflow_id = %def.id, name = %def.name, "workflow updated");
        Ok(def)
    }

    /// Delete a workflow. Runs that still reference it block the delete with
    /// `WorkflowError::Referential`.
    pub async fn delete(&self, id: &WorkflowId) -> Result<(), WorkflowError> {
        match self.workflows.delete(id).await {
            Ok(true) => {
                tracing::info!(workflow_id = %id, "workflow deleted");
                Ok(())
            }
            Ok(false) => Err(WorkflowError::NotFound(id.to_string())),
            Err(RepositoryError::Constraint(msg)) => Err(WorkflowError::Referential(format!(
                "workflow {id} is still referenced: {msg}"
            ))),
            Err(other) => Err(WorkflowError::Storage(other)),
        }
    }

    pub async fn list(&self) -> Result<Vec<WorkflowDefinition>, WorkflowError> {
        Ok(self.workflows.list().await?)
    }

    pub async fn get(&self, id: &WorkflowId) -> Result<WorkflowDefinition, WorkflowError> {
        self.workflows
            .get(id)
            .await?
            .ok_or_else(|| WorkflowError::NotFound(id.to_string()))
    }

    pub async fn find_by_name(
        &self,
        name: &str,
    ) -> Result<Option<WorkflowDefinition>, WorkflowError> {
        Ok(self.workflows.find_by_name(&normalize_name(name)).await?)
    }

    pub fn compute_health(&self, def: &WorkflowDefinition, now: DateTime<Utc>) -> HealthStatus {
        health::compute_health(def, now)
    }

    /// Case-insensitive uniqueness, ignoring the record being renamed.
    async fn ensure_unique_name(
        &self,
        name: &str,
        exclude: Option<&WorkflowId>,
    ) -> Result<(), WorkflowError> {
        let key = name_key(name);
        let clash = self
            .workflows
            .list()
            .await?
            .into_iter()
            .find(|w| Some(&w.id) != exclude && name_key(&w.name) == key);
        match clash {
            Some(existing) => Err(WorkflowError::Validation(format!(
                "a workflow named '{}' already exists",
                existing.name
            ))),
            None => Ok(()),
        }
    }

    async fn ensure_agent(&self, id: &avops_types::id::AgentId) -> Result<(), WorkflowError> {
        match self.agents.get(id).await? {
            Some(_) => Ok(()),
            None => Err(WorkflowError::Referential(format!("agent {id} not found"))),
        }
    }

    async fn ensure_recipe(&self, id: &avops_types::id::RecipeId) -> Result<(), WorkflowError> {
        match self.recipes.get(id).await? {
            Some(_) => Ok(()),
            None => Err(WorkflowError::Referential(format!("recipe {id} not found"))),
        }
    }
}

fn valid_name(raw: &str) -> Result<String, WorkflowError> {
    let name = normalize_name(raw);
    if name.is_empty() {
        return Err(WorkflowError::Validation(
            "workflow name cannot be empty".to_string(),
        ));
    }
    Ok(name)
}

/// Interval triggers need a positive number of minutes.
pub fn validate_trigger(
    trigger_type: TriggerType,
    trigger_value: Option<u32>,
) -> Result<(), WorkflowError> {
    match (trigger_type, trigger_value) {
        (TriggerType::Interval, None) => Err(WorkflowError::Validation(
            "interval trigger requires a value in minutes".to_string(),
        )),
        (TriggerType::Interval, Some(0)) => Err(WorkflowError::Validation(
            "interval trigger value must be a positive number of minutes".to_string(),
        )),
        _ => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{Fixture, MemoryWorkflowRepository};

    fn request(fx: &Fixture, name: &str) -> CreateWorkflowRequest {
        CreateWorkflowRequest {
            name: name.to_string(),
            agent_id: fx.agent.id,
            recipe_id: fx.recipe.id,
            trigger_type: TriggerType::Manual,
            trigger_value: None,
        }
    }

    fn interval(fx: &Fixture, name: &str, minutes: u32) -> CreateWorkflowRequest {
        CreateWorkflowRequest {
            trigger_type: TriggerType::Interval,
            trigger_value: Some(minutes),
            ..request(fx, name)
        }
    }

    #[tokio::test]
    async fn test_create_normalizes_name() {
        let fx = Fixture::new().await;
        let def = fx.workflow_service().create(request(&fx, "  Room   Sweep ")).await.unwrap();
        assert_eq!(def.name, "Room Sweep");
        assert!(def.enabled);
        assert_eq!(def.status, HealthStatus::Yellow);
        assert_eq!(def.next_run_at, None);
    }

    #[tokio::test]
    async fn test_create_rejects_case_insensitive_duplicate() {
        let fx = Fixture::new().await;
        let svc = fx.workflow_service();
        svc.create(request(&fx, "Baseline")).await.unwrap();
        let err = svc.create(request(&fx, "BASELINE")).await.unwrap_err();
        assert!(matches!(err, WorkflowError::Validation(_)));
        assert_eq!(svc.list().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_create_rejects_empty_name() {
        let fx = Fixture::new().await;
        let err = fx.workflow_service().create(request(&fx, " \t ")).await.unwrap_err();
        assert!(matches!(err, WorkflowError::Validation(_)));
    }

    #[tokio::test]
    async fn test_create_interval_requires_value() {
        let fx = Fixture::new().await;
        let svc = fx.workflow_service();
        let mut req = interval(&fx, "Sweep", 10);
        req.trigger_value = None;
        assert!(matches!(svc.create(req).await, Err(WorkflowError::Validation(_))));
        assert!(matches!(
            svc.create(interval(&fx, "Sweep", 0)).await,
            Err(WorkflowError::Validation(_))
        ));
    }

    #[tokio::test]
    async fn test_create_interval_schedules_next_run() {
        let fx = Fixture::new().await;
        let now = Utc::now();
        let def = fx
            .workflow_service()
            .create_at(interval(&fx, "Sweep", 60), now)
            .await
            .unwrap();
        assert_eq!(def.next_run_at, Some(now + Duration::minutes(60)));
    }

    #[tokio::test]
    async fn test_create_unknown_agent_is_referential() {
        let fx = Fixture::new().await;
        let mut req = request(&fx, "Sweep");
        req.agent_id = avops_types::id::AgentId::new();
        let err = fx.workflow_service().create(req).await.unwrap_err();
        assert!(matches!(err, WorkflowError::Referential(_)));
    }

    #[tokio::test]
    async fn test_rename_excludes_self_from_uniqueness() {
        let fx = Fixture::new().await;
        let svc = fx.workflow_service();
        let def = svc.create(request(&fx, "Baseline")).await.unwrap();
        svc.create(request(&fx, "Other")).await.unwrap();

        let renamed = svc
            .update(
                &def.id,
                UpdateWorkflowRequest {
                    name: Some("BASELINE".to_string()),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(renamed.name, "BASELINE");

        let err = svc
            .update(
                &def.id,
                UpdateWorkflowRequest {
                    name: Some("other".to_string()),
                    ..Default::default()
                },
            )
            .await
            .unwrap_err();
        assert!(matches!(err, WorkflowError::Validation(_)));
    }

    #[tokio::test]
    async fn test_switch_to_manual_clears_next_run() {
        let fx = Fixture::new().await;
        let svc = fx.workflow_service();
        let def = svc.create(interval(&fx, "Sweep", 15)).await.unwrap();
        assert!(def.next_run_at.is_some());

        let updated = svc
            .update(
                &def.id,
                UpdateWorkflowRequest {
                    trigger_type: Some(TriggerType::Manual),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(updated.next_run_at, None);
    }

    #[tokio::test]
    async fn test_switch_to_interval_computes_next_run_from_now() {
        let fx = Fixture::new().await;
        let svc = fx.workflow_service();
        let def = svc.create(request(&fx, "Sweep")).await.unwrap();
        let now = Utc::now() + Duration::hours(3);

        let updated = svc
            .update_at(
                &def.id,
                UpdateWorkflowRequest {
                    trigger_type: Some(TriggerType::Interval),
                    trigger_value: Some(30),
                    ..Default::default()
                },
                now,
            )
            .await
            .unwrap();
        assert_eq!(updated.next_run_at, Some(now + Duration::minutes(30)));
    }

    #[tokio::test]
    async fn test_switch_to_interval_without_value_fails() {
        let fx = Fixture::new().await;
        let svc = fx.workflow_service();
        let def = svc.create(request(&fx, "Sweep")).await.unwrap();
        let err = svc
            .update(
                &def.id,
                UpdateWorkflowRequest {
                    trigger_type: Some(TriggerType::Interval),
                    ..Default::default()
                },
            )
            .await
            .unwrap_err();
        assert!(matches!(err, WorkflowError::Validation(_)));
    }

    #[tokio::test]
    async fn test_recipe_change_resets_history() {
        let fx = Fixture::new().await;
        let svc = fx.workflow_service();
        let def = svc.create(request(&fx, "Sweep")).await.unwrap();

        let mut ran = def.clone();
        ran.last_run_at = Some(Utc::now());
        ran.status = HealthStatus::Green;
        fx.workflows.update(&ran).await.unwrap();

        let other = fx.add_recipe("Other Recipe", "name: other").await;
        let updated = svc
            .update(
                &def.id,
                UpdateWorkflowRequest {
                    recipe_id: Some(other.id),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(updated.recipe_id, other.id);
        assert_eq!(updated.last_run_at, None);
        assert_eq!(updated.next_run_at, None);
        assert_eq!(updated.status, HealthStatus::Yellow);
    }

    #[tokio::test]
    async fn test_recipe_change_on_interval_workflow_reschedules_from_now() {
        let fx = Fixture::new().await;
        let svc = fx.workflow_service();
        let def = svc.create(interval(&fx, "Sweep", 15)).await.unwrap();

        let mut ran = def.clone();
        ran.last_run_at = Some(Utc::now());
        ran.next_run_at = Some(Utc::now() + Duration::minutes(1));
        ran.status = HealthStatus::Green;
        fx.workflows.update(&ran).await.unwrap();

        let other = fx.add_recipe("Other Recipe", "name: other").await;
        let now = Utc::now() + Duration::hours(2);
        let updated = svc
            .update_at(
                &def.id,
                UpdateWorkflowRequest {
                    recipe_id: Some(other.id),
                    ..Default::default()
                },
                now,
            )
            .await
            .unwrap();
        assert_eq!(updated.last_run_at, None);
        assert_eq!(updated.status, HealthStatus::Yellow);
        // The old schedule is dropped; the new one starts from the change
        assert_eq!(updated.next_run_at, Some(now + Duration::minutes(15)));
    }

    #[tokio::test]
    async fn test_disable_clears_next_run_and_enable_restores_it() {
        let fx = Fixture::new().await;
        let svc = fx.workflow_service();
        let def = svc.create(interval(&fx, "Sweep", 5)).await.unwrap();

        let disabled = svc
            .update(
                &def.id,
                UpdateWorkflowRequest {
                    enabled: Some(false),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(disabled.next_run_at, None);

        let now = Utc::now();
        let enabled = svc
            .update_at(
                &def.id,
                UpdateWorkflowRequest {
                    enabled: Some(true),
                    ..Default::default()
                },
                now,
            )
            .await
            .unwrap();
        assert_eq!(enabled.next_run_at, Some(now + Duration::minutes(5)));
    }

    #[tokio::test]
    async fn test_update_applies_only_given_fields() {
        let fx = Fixture::new().await;
        let svc = fx.workflow_service();
        let def = svc.create(interval(&fx, "Sweep", 5)).await.unwrap();
        let updated = svc
            .update(
                &def.id,
                UpdateWorkflowRequest {
                    name: Some("Sweep Two".to_string()),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(updated.trigger_type, TriggerType::Interval);
        assert_eq!(updated.trigger_value, Some(5));
        assert_eq!(updated.next_run_at, def.next_run_at);
    }

    #[tokio::test]
    async fn test_delete_blocked_by_runs_is_referential() {
        let fx = Fixture::new().await;
        let svc = fx.workflow_service();
        let def = svc.create(request(&fx, "Sweep")).await.unwrap();
        fx.workflows.block_delete(def.id);
        let err = svc.delete(&def.id).await.unwrap_err();
        assert!(matches!(err, WorkflowError::Referential(_)));
        assert!(svc.get(&def.id).await.is_ok());
    }

    #[tokio::test]
    async fn test_delete_missing_is_not_found() {
        let svc = WorkflowService::new(
            MemoryWorkflowRepository::default(),
            crate::testing::MemoryAgentRepository::default(),
            crate::testing::MemoryRecipeRepository::default(),
        );
        let err = svc.delete(&WorkflowId::new()).await.unwrap_err();
        assert!(matches!(err, WorkflowError::NotFound(_)));
    }
}
