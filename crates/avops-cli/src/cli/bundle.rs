//! CLI bundle subcommands: export to and import from ZIP archives.

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::Utc;
use clap::Subcommand;
use comfy_table::Cell;
use console::style;

use avops_infra::bundle::{export_bundle, import_bundle};
use avops_types::bundle::{BundleEntity, BundleMergeReport, MergePolicy};
use avops_types::error::BundleError;

use super::{new_table, print_json};
use crate::state::AppState;

#[derive(Subcommand)]
pub enum BundleCommand {
    /// Write agents, recipes and workflows to a ZIP bundle.
    Export {
        /// Output file (defaults to avops-bundle-<timestamp>.zip).
        #[arg(long, short)]
        out: Option<PathBuf>,

        /// Entities to include (repeatable or comma-separated; default all).
        #[arg(long, value_delimiter = ',')]
        include: Vec<BundleEntity>,
    },

    /// Merge a ZIP bundle into the local stores.
    Import {
        /// Bundle file.
        path: PathBuf,

        /// Duplicate handling: skip, overwrite or rename (defaults to config).
        #[arg(long)]
        merge: Option<MergePolicy>,

        /// Report what would change without writing anything.
        #[arg(long)]
        dry_run: bool,
    },
}

pub async fn handle_bundle_command(
    cmd: BundleCommand,
    state: &AppState,
    json: bool,
) -> Result<()> {
    match cmd {
        BundleCommand::Export { out, include } => export(state, out, include, json).await,
        BundleCommand::Import {
            path,
            merge,
            dry_run,
        } => {
            let policy = merge.unwrap_or(state.config.default_merge_policy);
            import(state, &path, policy, dry_run, json).await
        }
    }
}

async fn export(
    state: &AppState,
    out: Option<PathBuf>,
    include: Vec<BundleEntity>,
    json: bool,
) -> Result<()> {
    let includes: BTreeSet<BundleEntity> = if include.is_empty() {
        BundleEntity::all()
    } else {
        include.into_iter().collect()
    };
    let out = out.unwrap_or_else(|| {
        PathBuf::from(format!(
            "avops-bundle-{}.zip",
            Utc::now().format("%Y%m%d-%H%M%S")
        ))
    });

    let (bytes, report) =
        export_bundle(state.bundles.as_ref(), &includes, &state.layout.recipes_dir).await?;
    tokio::fs::write(&out, &bytes)
        .await
        .with_context(|| format!("cannot write bundle to {}", out.display()))?;

    if json {
        return print_json(&serde_json::json!({
            "path": out.display().to_string(),
            "bytes": bytes.len(),
            "exported": report.exported,
            "messages": report.messages,
        }));
    }

    println!();
    println!(
        "  {} Exported bundle to {}",
        style("✓").green().bold(),
        style(out.display()).cyan()
    );
    println!(
        "  Agents: {}  Recipes: {}  Workflows: {}",
        report.exported.agents, report.exported.recipes, report.exported.workflows
    );
    print_messages(&report.messages);
    println!();
    Ok(())
}

async fn import(
    state: &AppState,
    path: &Path,
    policy: MergePolicy,
    dry_run: bool,
    json: bool,
) -> Result<()> {
    let bytes = tokio::fs::read(path)
        .await
        .with_context(|| format!("cannot read bundle {}", path.display()))?;

    match import_bundle(
        state.bundles.as_ref(),
        &bytes,
        &state.layout.recipes_dir,
        policy,
        dry_run,
    )
    .await
    {
        Ok(report) => print_report(&report, json),
        Err(BundleError::Persistence { message, report }) => {
            // Show what landed before the failure
            print_report(&report, json)?;
            Err(anyhow::anyhow!("import stopped: {message}"))
        }
        Err(e) => Err(e.into()),
    }
}

fn print_report(report: &BundleMergeReport, json: bool) -> Result<()> {
    if json {
        return print_json(report);
    }

    println!();
    let heading = if report.dry_run {
        "Dry run (nothing written)"
    } else {
        "Imported bundle"
    };
    println!(
        "  {} {heading}, merge policy {}",
        style("✓").green().bold(),
        style(report.merge).cyan()
    );
    println!();

    let mut table = new_table(&["Entity", "Created", "Updated", "Skipped"]);
    for entity in BundleEntity::ALL {
        table.add_row(vec![
            Cell::new(entity),
            Cell::new(report.created.get(entity)),
            Cell::new(report.updated.get(entity)),
            Cell::new(report.skipped.get(entity)),
        ]);
    }
    println!("{table}");
    print_messages(&report.messages);
    println!();
    Ok(())
}

fn print_messages(messages: &[String]) {
    if messages.is_empty() {
        return;
    }
    println!();
    for message in messages {
        println!("  {} {message}", style("!").yellow().bold());
    }
}
