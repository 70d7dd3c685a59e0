use std::collections::HashSet;
use std::path::{Path, PathBuf};

use avops_types::agent::Agent;
use avops_types::bundle::{
    AgentRecord, BUNDLE_VERSION, BundleContents, BundleEntity, BundleMergeReport, MergePolicy,
    RecipeBundleItem, WorkflowRecord,
};
use avops_types::error::BundleError;
use avops_types::id::{AgentId, RecipeId, WorkflowId};
use avops_types::name::{normalize_name, slugify};
use avops_types::recipe::Recipe;
use avops_types::workflow::{CreateWorkflowRequest, TriggerType, UpdateWorkflowRequest};
use chrono::{DateTime, Utc};

use super::{BundleService, NameIndex};
use crate::repository::agent::AgentRepository;
use crate::repository::recipe::RecipeRepository;
use crate::repository::workflow::WorkflowRepository;
use crate::service::fs::FileSystem;

/// Per-import state: collision indexes and recipe files claimed so far.
struct ImportState {
    policy: MergePolicy,
    dry_run: bool,
    now: DateTime<Utc>,
    agents: NameIndex<AgentId>,
    recipes: NameIndex<RecipeId>,
    workflows: NameIndex<WorkflowId>,
    claimed_files: HashSet<PathBuf>,
    report: BundleMergeReport,
}

impl ImportState {
    fn skip(&mut self, entity: BundleEntity, message: String) {
        tracing::debug!(%entity, %message, "bundle record skipped");
        self.report.skipped.bump(entity);
        self.report.messages.push(message);
    }

    fn persistence(&self, message: String) -> BundleError {
        tracing::error!(error = %message, dry_run = self.dry_run, "bundle import stopped");
        BundleError::Persistence {
            message,
            report: Box::new(self.report.clone()),
        }
    }
}

impl<A, R, W, F> BundleService<A, R, W, F>
where
    A: AgentRepository + Clone,
    R: RecipeRepository + Clone,
    W: WorkflowRepository,
    F: FileSystem,
{
    pub async fn import(
        &self,
        contents: &BundleContents,
        recipe_dest: &Path,
        policy: MergePolicy,
        dry_run: bool,
    ) -> Result<BundleMergeReport, BundleError> {
        self.import_at(contents, recipe_dest, policy, dry_run, Utc::now())
            .await
    }

    /// Apply a bundle as of `now`: agents, then recipes, then workflows.
    ///
    /// Every record is resolved against the existing stores plus what this
    /// import created before it. With `dry_run` nothing is written, and the
    /// report is the one a live import would produce.
    ///
    /// A failed store write stops the import; the error carries the partial
    /// report.
    pub async fn import_at(
        &self,
        contents: &BundleContents,
        recipe_dest: &Path,
        policy: MergePolicy,
        dry_run: bool,
        now: DateTime<Utc>,
    ) -> Result<BundleMergeReport, BundleError> {
        if let Some(manifest) = &contents.manifest {
            if manifest.bundle_version > BUNDLE_VERSION {
                return Err(BundleError::Manifest(format!(
                    "bundle version {} is newer than supported version {BUNDLE_VERSION}",
                    manifest.bundle_version
                )));
            }
        }

        let agents = self.agents.list().await?;
        let recipes = self.recipes.list().await?;
        let workflows = self.workflows.repository().list().await?;

        let mut state = ImportState {
            policy,
            dry_run,
            now,
            agents: NameIndex::from_existing(agents.iter().map(|a| (a.name.as_str(), a.id))),
            recipes: NameIndex::from_existing(recipes.iter().map(|r| (r.name.as_str(), r.id))),
            workflows: NameIndex::from_existing(workflows.iter().map(|w| (w.name.as_str(), w.id))),
            claimed_files: HashSet::new(),
            report: BundleMergeReport::new(policy, dry_run),
        };
        state.report.messages.extend(contents.messages.iter().cloned());

        for record in &contents.agents {
            self.import_agent(record, &mut state).await?;
        }

        if !contents.recipes.is_empty() && !dry_run {
            self.files
                .create_dir_all(recipe_dest)
                .await
                .map_err(|e| state.persistence(format!("cannot create {}: {e}", recipe_dest.display())))?;
        }
        for item in &contents.recipes {
            self.import_recipe(item, recipe_dest, &mut state).await?;
        }

        for record in &contents.workflows {
            self.import_workflow(record, &mut state).await?;
        }

        let report = state.report;
        tracing::info!(
            merge = %policy,
            dry_run,
            created = report.created.total(),
            updated = report.updated.total(),
            skipped = report.skipped.total(),
            "bundle imported"
        );
        Ok(report)
    }

    // -----------------------------------------------------------------------
    // Agents
    // -----------------------------------------------------------------------

    async fn import_agent(
        &self,
        record: &AgentRecord,
        state: &mut ImportState,
    ) -> Result<(), BundleError> {
        let name = normalize_name(&record.name);
        if name.is_empty() {
            state.skip(BundleEntity::Agents, "Agent with empty name skipped".to_string());
            return Ok(());
        }

        match state.agents.lookup(&name) {
            None => {
                let id = self.create_agent(&name, record, state).await?;
                state.agents.insert(&name, id);
                state.report.created.bump(BundleEntity::Agents);
            }
            Some(existing) => match state.policy {
                MergePolicy::Skip => {
                    state.skip(BundleEntity::Agents, format!("Agent '{name}' exists; skipped"));
                }
                MergePolicy::Overwrite => {
                    if let (false, Some(id)) = (state.dry_run, existing) {
                        self.overwrite_agent(&id, record, state).await?;
                    }
                    state.report.updated.bump(BundleEntity::Agents);
                }
                MergePolicy::Rename => {
                    let renamed = state.agents.rename_candidate(&name);
                    let id = self.create_agent(&renamed, record, state).await?;
                    state.agents.insert(&renamed, id);
                    state.report.created.bump(BundleEntity::Agents);
                    state
                        .report
                        .messages
                        .push(format!("Agent '{name}' imported as '{renamed}'"));
                }
            },
        }
        Ok(())
    }

    async fn create_agent(
        &self,
        name: &str,
        record: &AgentRecord,
        state: &ImportState,
    ) -> Result<Option<AgentId>, BundleError> {
        if state.dry_run {
            return Ok(None);
        }
        let agent = Agent {
            id: AgentId::new(),
            name: name.to_string(),
            domain: record.domain.trim().to_string(),
            config_json: if record.config_json.is_object() {
                record.config_json.clone()
            } else {
                serde_json::json!({})
            },
            created_at: state.now,
        };
        self.agents
            .create(&agent)
            .await
            .map_err(|e| state.persistence(format!("cannot create agent '{name}': {e}")))?;
        Ok(Some(agent.id))
    }

    /// Domain and config are replaced only by non-empty incoming values.
    async fn overwrite_agent(
        &self,
        id: &AgentId,
        record: &AgentRecord,
        state: &ImportState,
    ) -> Result<(), BundleError> {
        let mut agent = self
            .agents
            .get(id)
            .await
            .map_err(|e| state.persistence(format!("cannot load agent {id}: {e}")))?
            .ok_or_else(|| state.persistence(format!("agent {id} disappeared during import")))?;

        if !record.domain.trim().is_empty() {
            agent.domain = record.domain.trim().to_string();
        }
        if record.config_json.as_object().is_some_and(|o| !o.is_empty()) {
            agent.config_json = record.config_json.clone();
        }
        self.agents
            .update(&agent)
            .await
            .map_err(|e| state.persistence(format!("cannot update agent '{}': {e}", agent.name)))
    }

    // -----------------------------------------------------------------------
    // Recipes
    // -----------------------------------------------------------------------

    async fn import_recipe(
        &self,
        item: &RecipeBundleItem,
        dest: &Path,
        state: &mut ImportState,
    ) -> Result<(), BundleError> {
        let name = normalize_name(&item.name);
        if name.is_empty() {
            state.skip(
                BundleEntity::Recipes,
                format!("Recipe entry without a name skipped ({})", item.file),
            );
            return Ok(());
        }
        // The decoder clears `file` when the entry's YAML member is unreadable
        if item.file.trim().is_empty() {
            state.skip(
                BundleEntity::Recipes,
                format!("Recipe '{name}' skipped: no YAML in bundle"),
            );
            return Ok(());
        }

        match state.recipes.lookup(&name) {
            None => {
                let id = self.create_recipe(&name, &item.yaml, dest, state).await?;
                state.recipes.insert(&name, id);
                state.report.created.bump(BundleEntity::Recipes);
            }
            Some(existing) => match state.policy {
                MergePolicy::Skip => {
                    state.skip(BundleEntity::Recipes, format!("Recipe '{name}' exists; skipped"));
                }
                MergePolicy::Overwrite => {
                    if let (false, Some(id)) = (state.dry_run, existing) {
                        self.overwrite_recipe(&id, &item.yaml, dest, state).await?;
                    }
                    state.report.updated.bump(BundleEntity::Recipes);
                }
                MergePolicy::Rename => {
                    let renamed = state.recipes.rename_candidate(&name);
                    let id = self.create_recipe(&renamed, &item.yaml, dest, state).await?;
                    state.recipes.insert(&renamed, id);
                    state.report.created.bump(BundleEntity::Recipes);
                    state
                        .report
                        .messages
                        .push(format!("Recipe '{name}' imported as '{renamed}'"));
                }
            },
        }
        Ok(())
    }

    async fn create_recipe(
        &self,
        name: &str,
        yaml: &str,
        dest: &Path,
        state: &mut ImportState,
    ) -> Result<Option<RecipeId>, BundleError> {
        if state.dry_run {
            return Ok(None);
        }
        let path = self.claim_recipe_file(dest, name, None, state).await;
        self.files
            .write_file(&path, yaml)
            .await
            .map_err(|e| state.persistence(format!("cannot write {}: {e}", path.display())))?;

        let recipe = Recipe {
            id: RecipeId::new(),
            name: name.to_string(),
            yaml_text: None,
            yaml_path: Some(path.to_string_lossy().into_owned()),
            created_at: state.now,
        };
        self.recipes
            .create(&recipe)
            .await
            .map_err(|e| state.persistence(format!("cannot create recipe '{name}': {e}")))?;
        Ok(Some(recipe.id))
    }

    /// Write the incoming YAML to the destination and point the recipe at it.
    async fn overwrite_recipe(
        &self,
        id: &RecipeId,
        yaml: &str,
        dest: &Path,
        state: &mut ImportState,
    ) -> Result<(), BundleError> {
        let mut recipe = self
            .recipes
            .get(id)
            .await
            .map_err(|e| state.persistence(format!("cannot load recipe {id}: {e}")))?
            .ok_or_else(|| state.persistence(format!("recipe {id} disappeared during import")))?;

        let path = self
            .claim_recipe_file(dest, &recipe.name, recipe.yaml_path.as_deref(), state)
            .await;
        self.files
            .write_file(&path, yaml)
            .await
            .map_err(|e| state.persistence(format!("cannot write {}: {e}", path.display())))?;

        recipe.yaml_text = None;
        recipe.yaml_path = Some(path.to_string_lossy().into_owned());
        self.recipes
            .update(&recipe)
            .await
            .map_err(|e| state.persistence(format!("cannot update recipe '{}': {e}", recipe.name)))
    }

    /// `{dest}/{slug}.yaml`, suffixed when the file belongs to something
    /// else. `owned` is the recipe's current path, which it may reuse.
    async fn claim_recipe_file(
        &self,
        dest: &Path,
        name: &str,
        owned: Option<&str>,
        state: &mut ImportState,
    ) -> PathBuf {
        let slug = slugify(name);
        let mut i = 1u32;
        loop {
            let file = if i == 1 {
                format!("{slug}.yaml")
            } else {
                format!("{slug}-{i}.yaml")
            };
            let path = dest.join(file);
            let ours = owned.is_some_and(|p| Path::new(p) == path);
            if !state.claimed_files.contains(&path) && (ours || !self.files.exists(&path).await) {
                state.claimed_files.insert(path.clone());
                return path;
            }
            i += 1;
        }
    }

    // -----------------------------------------------------------------------
    // Workflows
    // -----------------------------------------------------------------------

    async fn import_workflow(
        &self,
        record: &WorkflowRecord,
        state: &mut ImportState,
    ) -> Result<(), BundleError> {
        let name = normalize_name(&record.name);
        if name.is_empty() {
            state.skip(
                BundleEntity::Workflows,
                "Workflow with empty name skipped".to_string(),
            );
            return Ok(());
        }

        let agent = lookup_ref(&state.agents, &record.agent_name);
        let recipe = lookup_ref(&state.recipes, &record.recipe_name);
        let (Some(agent_id), Some(recipe_id)) = (agent, recipe) else {
            state.skip(
                BundleEntity::Workflows,
                format!(
                    "Workflow '{name}' skipped: missing agent/recipe (agent '{}', recipe '{}')",
                    record.agent_name, record.recipe_name
                ),
            );
            return Ok(());
        };

        let (trigger_type, trigger_value) = match parse_trigger(record) {
            Ok(trigger) => trigger,
            Err(reason) => {
                state.skip(
                    BundleEntity::Workflows,
                    format!("Workflow '{name}' skipped: {reason}"),
                );
                return Ok(());
            }
        };

        let incoming = IncomingWorkflow {
            agent_id,
            recipe_id,
            trigger_type,
            trigger_value,
            enabled: record.enabled,
        };

        match state.workflows.lookup(&name) {
            None => self.create_workflow(&name, &incoming, state).await?,
            Some(existing) => match state.policy {
                MergePolicy::Skip => {
                    state.skip(
                        BundleEntity::Workflows,
                        format!("Workflow '{name}' exists; skipped"),
                    );
                }
                MergePolicy::Overwrite => {
                    if let (false, Some(id)) = (state.dry_run, existing) {
                        self.overwrite_workflow(&id, &incoming, state).await?;
                    }
                    state.report.updated.bump(BundleEntity::Workflows);
                }
                MergePolicy::Rename => {
                    let renamed = state.workflows.rename_candidate(&name);
                    self.create_workflow(&renamed, &incoming, state).await?;
                    state
                        .report
                        .messages
                        .push(format!("Workflow '{name}' imported as '{renamed}'"));
                }
            },
        }
        Ok(())
    }

    async fn create_workflow(
        &self,
        name: &str,
        incoming: &IncomingWorkflow,
        state: &mut ImportState,
    ) -> Result<(), BundleError> {
        if state.dry_run {
            state.workflows.insert(name, None);
            state.report.created.bump(BundleEntity::Workflows);
            return Ok(());
        }
        let (Some(agent_id), Some(recipe_id)) = (incoming.agent_id, incoming.recipe_id) else {
            return Err(state.persistence(format!(
                "workflow '{name}' references an entity that was not written"
            )));
        };

        let def = self
            .workflows
            .create_at(
                CreateWorkflowRequest {
                    name: name.to_string(),
                    agent_id,
                    recipe_id,
                    trigger_type: incoming.trigger_type,
                    trigger_value: incoming.trigger_value,
                },
                state.now,
            )
            .await
            .map_err(|e| state.persistence(format!("cannot create workflow '{name}': {e}")))?;
        // Counted before the disable write so a failure there still reports it
        state.workflows.insert(name, Some(def.id));
        state.report.created.bump(BundleEntity::Workflows);

        if !incoming.enabled {
            self.workflows
                .update_at(
                    &def.id,
                    UpdateWorkflowRequest {
                        enabled: Some(false),
                        ..Default::default()
                    },
                    state.now,
                )
                .await
                .map_err(|e| {
                    state.persistence(format!(
                        "workflow '{name}' was created but could not be disabled: {e}"
                    ))
                })?;
        }
        Ok(())
    }

    async fn overwrite_workflow(
        &self,
        id: &WorkflowId,
        incoming: &IncomingWorkflow,
        state: &ImportState,
    ) -> Result<(), BundleError> {
        self.workflows
            .update_at(
                id,
                UpdateWorkflowRequest {
                    name: None,
                    agent_id: incoming.agent_id,
                    recipe_id: incoming.recipe_id,
                    trigger_type: Some(incoming.trigger_type),
                    trigger_value: incoming.trigger_value,
                    enabled: Some(incoming.enabled),
                },
                state.now,
            )
            .await
            .map(|_| ())
            .map_err(|e| state.persistence(format!("cannot update workflow {id}: {e}")))
    }
}

/// A validated workflow row. Ids are `None` for dry-run placeholders.
struct IncomingWorkflow {
    agent_id: Option<AgentId>,
    recipe_id: Option<RecipeId>,
    trigger_type: TriggerType,
    trigger_value: Option<u32>,
    enabled: bool,
}

fn lookup_ref<Id: Copy>(index: &NameIndex<Id>, name: &str) -> Option<Option<Id>> {
    if normalize_name(name).is_empty() {
        return None;
    }
    index.lookup(name)
}

/// Trigger type and interval of a row. An empty trigger means manual.
fn parse_trigger(record: &WorkflowRecord) -> Result<(TriggerType, Option<u32>), String> {
    let trigger_type = if record.trigger.trim().is_empty() {
        TriggerType::Manual
    } else {
        record.trigger.parse::<TriggerType>()?
    };
    let minutes = record
        .interval_minutes
        .filter(|m| *m > 0)
        .and_then(|m| u32::try_from(m).ok());

    if trigger_type == TriggerType::Interval && minutes.is_none() {
        return Err(format!(
            "interval trigger needs a positive interval, got {:?}",
            record.interval_minutes
        ));
    }
    Ok((trigger_type, minutes))
}
