use std::collections::{BTreeSet, HashMap, HashSet};
use std::path::Path;

use avops_types::bundle::{
    AgentRecord, BUNDLE_VERSION, BundleContents, BundleEntity, BundleIncludes, BundleManifest,
    ExportReport, RecipeBundleItem, WorkflowRecord,
};
use avops_types::error::BundleError;
use avops_types::name::slugify;
use chrono::{SecondsFormat, Utc};

use super::BundleService;
use crate::recipe::{load_recipe_text, stub_recipe_yaml};
use crate::repository::agent::AgentRepository;
use crate::repository::recipe::RecipeRepository;
use crate::repository::workflow::WorkflowRepository;
use crate::service::fs::FileSystem;

impl<A, R, W, F> BundleService<A, R, W, F>
where
    A: AgentRepository + Clone,
    R: RecipeRepository + Clone,
    W: WorkflowRepository,
    F: FileSystem,
{
    /// Collect the included entities by name.
    ///
    /// Recipe YAML comes from inline text, else the stored file under
    /// `recipe_source`, else a stub. Workflow references that no longer
    /// resolve export as empty names. Neither case fails the export.
    pub async fn export(
        &self,
        includes: &BTreeSet<BundleEntity>,
        recipe_source: &Path,
    ) -> Result<(BundleContents, ExportReport), BundleError> {
        let mut report = ExportReport::default();
        let mut contents = BundleContents {
            manifest: Some(BundleManifest {
                bundle_version: BUNDLE_VERSION,
                generated_at: Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true),
                includes: BundleIncludes {
                    agents: member(includes, BundleEntity::Agents),
                    recipes: member(includes, BundleEntity::Recipes),
                    workflows: member(includes, BundleEntity::Workflows),
                },
            }),
            ..Default::default()
        };

        let agents = self.agents.list().await?;
        let recipes = self.recipes.list().await?;

        if includes.contains(&BundleEntity::Agents) {
            contents.agents = agents
                .iter()
                .map(|a| AgentRecord {
                    name: a.name.clone(),
                    domain: a.domain.clone(),
                    config_json: a.config_json.clone(),
                })
                .collect();
            report.exported.agents = contents.agents.len() as u32;
        }

        if includes.contains(&BundleEntity::Recipes) {
            let mut used_files = HashSet::new();
            for recipe in &recipes {
                let yaml = match load_recipe_text(recipe, &self.files, recipe_source).await {
                    Ok(text) => text,
                    Err(e) => {
                        tracing::warn!(recipe = %recipe.name, error = %e, "exporting recipe stub");
                        report
                            .messages
                            .push(format!("Recipe '{}' exported as stub: {e}", recipe.name));
                        stub_recipe_yaml(&recipe.name)
                    }
                };
                let file = unique_member(&slugify(&recipe.name), &mut used_files);
                contents.recipes.push(RecipeBundleItem {
                    name: recipe.name.clone(),
                    file,
                    yaml,
                });
            }
            report.exported.recipes = contents.recipes.len() as u32;
        }

        if includes.contains(&BundleEntity::Workflows) {
            let agent_names: HashMap<_, _> = agents.iter().map(|a| (a.id, a.name.clone())).collect();
            let recipe_names: HashMap<_, _> =
                recipes.iter().map(|r| (r.id, r.name.clone())).collect();

            for def in self.workflows.repository().list().await? {
                let agent_name = agent_names.get(&def.agent_id).cloned().unwrap_or_default();
                let recipe_name = recipe_names.get(&def.recipe_id).cloned().unwrap_or_default();
                if agent_name.is_empty() || recipe_name.is_empty() {
                    report.messages.push(format!(
                        "Workflow '{}' exported with an unresolved agent or recipe",
                        def.name
                    ));
                }
                contents.workflows.push(WorkflowRecord {
                    name: def.name.clone(),
                    enabled: def.enabled,
                    trigger: def.trigger_type.as_str().to_string(),
                    interval_minutes: def.trigger_value.map(i64::from),
                    agent_name,
                    recipe_name,
                });
            }
            report.exported.workflows = contents.workflows.len() as u32;
        }

        tracing::info!(
            agents = report.exported.agents,
            recipes = report.exported.recipes,
            workflows = report.exported.workflows,
            "bundle exported"
        );
        Ok((contents, report))
    }
}

fn member(includes: &BTreeSet<BundleEntity>, entity: BundleEntity) -> Option<String> {
    includes
        .contains(&entity)
        .then(|| entity.member_name().to_string())
}

/// `recipes/{slug}.yaml`, suffixed when two recipe names share a slug.
fn unique_member(slug: &str, used: &mut HashSet<String>) -> String {
    let mut candidate = format!("recipes/{slug}.yaml");
    let mut i = 2;
    while used.contains(&candidate) {
        candidate = format!("recipes/{slug}-{i}.yaml");
        i += 1;
    }
    used.insert(candidate.clone());
    candidate
}
