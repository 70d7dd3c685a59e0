//! Bundle archives on disk.
//!
//! Glues the format-independent `BundleService` from `avops-core` to the
//! ZIP codec in [`archive`].

pub mod archive;

use std::collections::BTreeSet;
use std::path::Path;

use avops_core::bundle::BundleService;
use avops_core::repository::agent::AgentRepository;
use avops_core::repository::recipe::RecipeRepository;
use avops_core::repository::workflow::WorkflowRepository;
use avops_core::service::fs::FileSystem;
use avops_types::bundle::{BundleEntity, BundleMergeReport, ExportReport, MergePolicy};
use avops_types::error::BundleError;

pub use archive::{decode_bundle, encode_bundle};

/// Export the included entities as ZIP bytes.
///
/// `recipe_source` is the directory stored recipe paths are relative to.
pub async fn export_bundle<A, R, W, F>(
    service: &BundleService<A, R, W, F>,
    includes: &BTreeSet<BundleEntity>,
    recipe_source: &Path,
) -> Result<(Vec<u8>, ExportReport), BundleError>
where
    A: AgentRepository + Clone,
    R: RecipeRepository + Clone,
    W: WorkflowRepository,
    F: FileSystem,
{
    let (contents, report) = service.export(includes, recipe_source).await?;
    let bytes = encode_bundle(&contents)?;
    tracing::info!(
        bytes = bytes.len(),
        agents = report.exported.agents,
        recipes = report.exported.recipes,
        workflows = report.exported.workflows,
        "bundle exported"
    );
    Ok((bytes, report))
}

/// Decode ZIP bytes and import them under `policy`.
///
/// Imported recipe YAML is written under `recipe_dest` unless `dry_run`.
pub async fn import_bundle<A, R, W, F>(
    service: &BundleService<A, R, W, F>,
    bytes: &[u8],
    recipe_dest: &Path,
    policy: MergePolicy,
    dry_run: bool,
) -> Result<BundleMergeReport, BundleError>
where
    A: AgentRepository + Clone,
    R: RecipeRepository + Clone,
    W: WorkflowRepository,
    F: FileSystem,
{
    let contents = decode_bundle(bytes)?;
    if !contents.messages.is_empty() {
        tracing::warn!(count = contents.messages.len(), "bundle decoded with problems");
    }
    service.import(&contents, recipe_dest, policy, dry_run).await
}
