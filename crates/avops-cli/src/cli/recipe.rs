//! `avops recipe` subcommands.

use std::path::PathBuf;

use anyhow::{Context, Result, bail};
use clap::Subcommand;
use comfy_table::Cell;
use console::style;

use avops_core::service::catalog::RecipeSource;

use super::{format_time, new_table, print_json};
use crate::state::AppState;

#[derive(Subcommand)]
pub enum RecipeCommand {
    /// Register a recipe from a YAML file.
    Add {
        /// Recipe name (unique, case-insensitive).
        name: String,

        /// YAML file, absolute or relative to the recipes directory.
        #[arg(long, conflicts_with = "inline")]
        file: Option<PathBuf>,

        /// Read this YAML file now and store its content in the database.
        #[arg(long)]
        inline: Option<PathBuf>,
    },

    /// List recipes.
    #[command(alias = "ls")]
    List,
}

pub async fn handle_recipe_command(cmd: RecipeCommand, state: &AppState, json: bool) -> Result<()> {
    match cmd {
        RecipeCommand::Add { name, file, inline } => add(state, &name, file, inline, json).await,
        RecipeCommand::List => list(state, json).await,
    }
}

async fn add(
    state: &AppState,
    name: &str,
    file: Option<PathBuf>,
    inline: Option<PathBuf>,
    json: bool,
) -> Result<()> {
    let source = match (file, inline) {
        (Some(path), None) => RecipeSource::File(path),
        (None, Some(path)) => {
            let text = tokio::fs::read_to_string(&path)
                .await
                .with_context(|| format!("cannot read {}", path.display()))?;
            RecipeSource::Inline(text)
        }
        _ => bail!("Pass exactly one of --file or --inline"),
    };

    let recipe = state.catalog.register_recipe(name, source).await?;
    if json {
        return print_json(&recipe);
    }
    println!();
    println!(
        "  {} Registered recipe '{}'",
        style("✓").green().bold(),
        style(&recipe.name).cyan()
    );
    println!("  ID: {}", recipe.id);
    match &recipe.yaml_path {
        Some(path) => println!("  Source: {path}"),
        None => println!("  Source: inline"),
    }
    println!();
    Ok(())
}

async fn list(state: &AppState, json: bool) -> Result<()> {
    let recipes = state.catalog.list_recipes().await?;
    if json {
        return print_json(&recipes);
    }
    if recipes.is_empty() {
        println!();
        println!("  No recipes registered.");
        println!(
            "  Register one with: {}",
            style("avops recipe add <name> --file <recipe.yaml>").dim()
        );
        println!();
        return Ok(());
    }

    let mut table = new_table(&["Name", "Source", "Created"]);
    for r in &recipes {
        let source = match (&r.yaml_text, &r.yaml_path) {
            (Some(text), _) if !text.trim().is_empty() => "inline".to_string(),
            (_, Some(path)) => path.clone(),
            _ => "-".to_string(),
        };
        table.add_row(vec![
            Cell::new(&r.name),
            Cell::new(source),
            Cell::new(format_time(Some(r.created_at))),
        ]);
    }
    println!();
    println!("{table}");
    println!("  Recipes directory: {}", state.catalog.recipes_dir().display());
    println!();
    Ok(())
}
