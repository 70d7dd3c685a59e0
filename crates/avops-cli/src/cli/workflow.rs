//! CLI workflow management subcommands.
//!
//! Provides create, list, update, delete and run operations over the
//! workflow definition store and the scheduler.

use anyhow::{Result, bail};
use chrono::Utc;
use clap::Subcommand;
use comfy_table::Cell;
use console::style;

use avops_types::error::SchedulerError;
use avops_types::workflow::{
    CreateWorkflowRequest, TriggerType, UpdateWorkflowRequest, WorkflowDefinition,
};

use super::{
    format_time, health_cell, new_table, print_json, resolve_agent, resolve_recipe,
    resolve_workflow,
};
use crate::state::AppState;

/// Workflow management subcommands.
#[derive(Subcommand)]
pub enum WorkflowCommand {
    /// Create a workflow binding an agent to a recipe.
    Create {
        /// Workflow name (unique, case-insensitive).
        name: String,

        /// Agent name or id.
        #[arg(long)]
        agent: String,

        /// Recipe name or id.
        #[arg(long)]
        recipe: String,

        /// Run every N minutes (omit for a manual workflow).
        #[arg(long, value_parser = clap::value_parser!(u32).range(1..))]
        every: Option<u32>,
    },

    /// List workflows with their schedule and health.
    #[command(alias = "ls")]
    List,

    /// Change a workflow. Only the given options are applied.
    Update {
        /// Workflow name or id.
        target: String,

        /// New name.
        #[arg(long)]
        name: Option<String>,

        /// New agent name or id.
        #[arg(long)]
        agent: Option<String>,

        /// New recipe name or id. Resets the run history.
        #[arg(long)]
        recipe: Option<String>,

        /// Switch to an interval trigger of N minutes.
        #[arg(long, conflicts_with = "manual", value_parser = clap::value_parser!(u32).range(1..))]
        every: Option<u32>,

        /// Switch to a manual trigger.
        #[arg(long)]
        manual: bool,

        /// Enable scheduling.
        #[arg(long, conflicts_with = "disable")]
        enable: bool,

        /// Disable scheduling.
        #[arg(long)]
        disable: bool,
    },

    /// Delete a workflow.
    #[command(alias = "rm")]
    Delete {
        /// Workflow name or id.
        target: String,
    },

    /// Run a workflow now.
    Run {
        /// Workflow name or id.
        target: String,
    },
}

/// Handle a workflow subcommand.
pub async fn handle_workflow_command(
    cmd: WorkflowCommand,
    state: &AppState,
    json: bool,
) -> Result<()> {
    match cmd {
        WorkflowCommand::Create {
            name,
            agent,
            recipe,
            every,
        } => handle_create(state, name, &agent, &recipe, every, json).await,
        WorkflowCommand::List => handle_list(state, json).await,
        WorkflowCommand::Update {
            target,
            name,
            agent,
            recipe,
            every,
            manual,
            enable,
            disable,
        } => {
            let mut request = UpdateWorkflowRequest {
                name,
                ..Default::default()
            };
            if let Some(agent) = agent {
                request.agent_id = Some(resolve_agent(state, &agent).await?.id);
            }
            if let Some(recipe) = recipe {
                request.recipe_id = Some(resolve_recipe(state, &recipe).await?.id);
            }
            if let Some(minutes) = every {
                request.trigger_type = Some(TriggerType::Interval);
                request.trigger_value = Some(minutes);
            } else if manual {
                request.trigger_type = Some(TriggerType::Manual);
            }
            if enable || disable {
                request.enabled = Some(enable);
            }
            handle_update(state, &target, request, json).await
        }
        WorkflowCommand::Delete { target } => handle_delete(state, &target, json).await,
        WorkflowCommand::Run { target } => handle_run(state, &target, json).await,
    }
}

// ---------------------------------------------------------------------------
// Create
// ---------------------------------------------------------------------------

async fn handle_create(
    state: &AppState,
    name: String,
    agent: &str,
    recipe: &str,
    every: Option<u32>,
    json: bool,
) -> Result<()> {
    let agent = resolve_agent(state, agent).await?;
    let recipe = resolve_recipe(state, recipe).await?;
    let trigger_type = if every.is_some() {
        TriggerType::Interval
    } else {
        TriggerType::Manual
    };

    let def = state
        .workflows
        .create(CreateWorkflowRequest {
            name,
            agent_id: agent.id,
            recipe_id: recipe.id,
            trigger_type,
            trigger_value: every,
        })
        .await?;

    if json {
        return print_json(&def);
    }
    println!();
    println!(
        "  {} Created workflow '{}'",
        style("✓").green().bold(),
        style(&def.name).cyan()
    );
    println!("  ID: {}", def.id);
    println!("  Agent: {}  Recipe: {}", agent.name, recipe.name);
    println!("  Trigger: {}", describe_trigger(&def));
    if def.next_run_at.is_some() {
        println!("  Next run: {}", format_time(def.next_run_at));
    }
    println!();
    Ok(())
}

// ---------------------------------------------------------------------------
// List
// ---------------------------------------------------------------------------

async fn handle_list(state: &AppState, json: bool) -> Result<()> {
    let defs = state.workflows.list().await?;
    let now = Utc::now();

    if json {
        let out: Vec<_> = defs
            .iter()
            .map(|d| {
                serde_json::json!({
                    "id": d.id.to_string(),
                    "name": d.name,
                    "agent_id": d.agent_id.to_string(),
                    "recipe_id": d.recipe_id.to_string(),
                    "trigger_type": d.trigger_type,
                    "trigger_value": d.trigger_value,
                    "enabled": d.enabled,
                    "status": state.workflows.compute_health(d, now),
                    "last_run_at": d.last_run_at,
                    "next_run_at": d.next_run_at,
                })
            })
            .collect();
        return print_json(&out);
    }

    if defs.is_empty() {
        println!();
        println!("  No workflows defined.");
        println!(
            "  Create one with: {}",
            style("avops workflow create <name> --agent <agent> --recipe <recipe>").dim()
        );
        println!();
        return Ok(());
    }

    let mut table = new_table(&["Name", "Trigger", "Enabled", "Health", "Last run", "Next run"]);
    for d in &defs {
        table.add_row(vec![
            Cell::new(&d.name),
            Cell::new(describe_trigger(d)),
            Cell::new(if d.enabled { "yes" } else { "no" }),
            health_cell(state.workflows.compute_health(d, now)),
            Cell::new(format_time(d.last_run_at)),
            Cell::new(format_time(d.next_run_at)),
        ]);
    }

    println!();
    println!("{table}");
    println!();
    Ok(())
}

fn describe_trigger(def: &WorkflowDefinition) -> String {
    match (def.trigger_type, def.trigger_value) {
        (TriggerType::Interval, Some(minutes)) => format!("every {minutes}m"),
        (trigger, _) => trigger.to_string(),
    }
}

// ---------------------------------------------------------------------------
// Update / delete
// ---------------------------------------------------------------------------

async fn handle_update(
    state: &AppState,
    target: &str,
    request: UpdateWorkflowRequest,
    json: bool,
) -> Result<()> {
    if request.is_empty() {
        bail!("Nothing to update. Pass at least one option (see --help).");
    }
    let existing = resolve_workflow(state, target).await?;
    let def = state.workflows.update(&existing.id, request).await?;

    if json {
        return print_json(&def);
    }
    println!();
    println!(
        "  {} Updated workflow '{}'",
        style("✓").green().bold(),
        style(&def.name).cyan()
    );
    println!("  Trigger: {}{}", describe_trigger(&def), if def.enabled { "" } else { " (disabled)" });
    println!("  Next run: {}", format_time(def.next_run_at));
    println!();
    Ok(())
}

async fn handle_delete(state: &AppState, target: &str, json: bool) -> Result<()> {
    let def = resolve_workflow(state, target).await?;
    state.workflows.delete(&def.id).await?;

    if json {
        return print_json(&serde_json::json!({ "deleted": def.id.to_string(), "name": def.name }));
    }
    println!();
    println!("  {} Deleted workflow '{}'", style("✓").green().bold(), def.name);
    println!();
    Ok(())
}

// ---------------------------------------------------------------------------
// Run
// ---------------------------------------------------------------------------

async fn handle_run(state: &AppState, target: &str, json: bool) -> Result<()> {
    let def = resolve_workflow(state, target).await?;

    match state.scheduler.run_now(&def.id).await {
        Ok(run_id) => {
            if json {
                return print_json(&serde_json::json!({
                    "run_id": run_id.to_string(),
                    "workflow": def.name,
                    "status": "success",
                }));
            }
            println!();
            println!(
                "  {} Ran '{}'",
                style("✓").green().bold(),
                style(&def.name).cyan()
            );
            println!("  Run ID: {run_id}");
            println!("  Details: {}", style(format!("avops runs show {run_id}")).dim());
            println!();
            Ok(())
        }
        // The ledger already holds the failed run
        Err(SchedulerError::Execution(e)) => {
            if json {
                print_json(&serde_json::json!({
                    "workflow": def.name,
                    "status": "failed",
                    "error": e.to_string(),
                }))?;
            } else {
                println!();
                println!(
                    "  {} '{}' failed: {e}",
                    style("✗").red().bold(),
                    style(&def.name).cyan()
                );
                println!("  See: {}", style("avops runs list --status failed").dim());
                println!();
            }
            bail!("workflow '{}' failed", def.name)
        }
        Err(e) => Err(e.into()),
    }
}
