//! Bundle portability layer.
//!
//! Moves agents, recipes and workflows between stores by human-readable
//! name. This module works on decoded `BundleContents`; the archive codec
//! lives in avops-infra.
//!
//! - `export` -- stores to contents, degrading missing recipe sources to stubs
//! - `import` -- contents to stores under a merge policy, optionally dry-run
//! - `names` -- case-insensitive name index and rename probing

mod export;
mod import;
mod names;

use crate::repository::agent::AgentRepository;
use crate::repository::recipe::RecipeRepository;
use crate::repository::workflow::WorkflowRepository;
use crate::service::fs::FileSystem;
use crate::workflow::service::WorkflowService;

pub use names::NameIndex;

/// Export and import over the shared stores.
///
/// Workflow writes go through `WorkflowService` so imported workflows obey
/// the same naming, trigger and referential rules as hand-made ones.
pub struct BundleService<A, R, W, F>
where
    A: AgentRepository + Clone,
    R: RecipeRepository + Clone,
    W: WorkflowRepository,
    F: FileSystem,
{
    agents: A,
    recipes: R,
    workflows: WorkflowService<W, A, R>,
    files: F,
}

impl<A, R, W, F> BundleService<A, R, W, F>
where
    A: AgentRepository + Clone,
    R: RecipeRepository + Clone,
    W: WorkflowRepository,
    F: FileSystem,
{
    pub fn new(agents: A, recipes: R, workflows: W, files: F) -> Self {
        let workflows = WorkflowService::new(workflows, agents.clone(), recipes.clone());
        Self {
            agents,
            recipes,
            workflows,
            files,
        }
    }
}
