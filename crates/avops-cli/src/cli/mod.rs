//! CLI command definitions for the `avops` binary.
//!
//! Uses clap derive macros. Commands follow a noun-verb pattern
//! (`avops workflow create`, `avops runs stats`).

pub mod agent;
pub mod bundle;
pub mod recipe;
pub mod runs;
pub mod tick;
pub mod workflow;

use anyhow::{Result, anyhow};
use chrono::{DateTime, Local, Utc};
use clap::{Parser, Subcommand};
use clap_complete::Shell;
use comfy_table::{Cell, Color, ContentArrangement, Table, presets};

use avops_types::agent::Agent;
use avops_types::id::{AgentId, RecipeId, WorkflowId};
use avops_types::recipe::Recipe;
use avops_types::run::RunStatus;
use avops_types::workflow::{HealthStatus, WorkflowDefinition};

use crate::state::AppState;

/// Automate AV/IT operational playbooks.
#[derive(Parser)]
#[command(name = "avops", version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Output machine-readable JSON instead of styled text.
    #[arg(long, global = true)]
    pub json: bool,

    /// Suppress all output except errors.
    #[arg(long, global = true)]
    pub quiet: bool,

    /// Detailed output (-v for verbose, -vv for trace).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Emit logs as JSON lines on stderr.
    #[arg(long, global = true)]
    pub log_json: bool,

    /// Export tracing spans to stdout via OpenTelemetry.
    #[arg(long, global = true, env = "AVOPS_OTEL")]
    pub otel: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Manage agents.
    Agent {
        #[command(subcommand)]
        action: agent::AgentCommand,
    },

    /// Manage recipes.
    Recipe {
        #[command(subcommand)]
        action: recipe::RecipeCommand,
    },

    /// Manage workflows (create, list, update, delete, run).
    #[command(alias = "wf")]
    Workflow {
        #[command(subcommand)]
        action: workflow::WorkflowCommand,
    },

    /// Run every due interval workflow.
    Tick {
        /// Keep ticking until interrupted.
        #[arg(long)]
        watch: bool,

        /// Seconds between ticks with --watch (defaults to config).
        #[arg(long)]
        every: Option<u64>,
    },

    /// Inspect the run ledger.
    Runs {
        #[command(subcommand)]
        action: runs::RunsCommand,
    },

    /// Export or import bundles of agents, recipes and workflows.
    Bundle {
        #[command(subcommand)]
        action: bundle::BundleCommand,
    },

    /// Generate shell completions.
    Completions {
        /// Shell to generate completions for.
        shell: Shell,
    },
}

// ---------------------------------------------------------------------------
// Shared helpers
// ---------------------------------------------------------------------------

/// Resolve a workflow by id or (case-insensitive) name.
pub async fn resolve_workflow(state: &AppState, target: &str) -> Result<WorkflowDefinition> {
    if let Ok(id) = target.parse::<WorkflowId>() {
        return Ok(state.workflows.get(&id).await?);
    }
    state
        .workflows
        .find_by_name(target)
        .await?
        .ok_or_else(|| anyhow!("No workflow named '{target}'"))
}

pub async fn resolve_agent(state: &AppState, target: &str) -> Result<Agent> {
    let found = match target.parse::<AgentId>() {
        Ok(id) => state.catalog.get_agent(&id).await?,
        Err(_) => state.catalog.find_agent(target).await?,
    };
    found.ok_or_else(|| anyhow!("No agent named '{target}'"))
}

pub async fn resolve_recipe(state: &AppState, target: &str) -> Result<Recipe> {
    let found = match target.parse::<RecipeId>() {
        Ok(id) => state.catalog.get_recipe(&id).await?,
        Err(_) => state.catalog.find_recipe(target).await?,
    };
    found.ok_or_else(|| anyhow!("No recipe named '{target}'"))
}

/// Table with the house style: condensed UTF-8 borders, cyan first header.
pub fn new_table(headers: &[&str]) -> Table {
    let mut table = Table::new();
    let header: Vec<Cell> = headers
        .iter()
        .enumerate()
        .map(|(i, h)| {
            if i == 0 {
                Cell::new(h).fg(Color::Cyan)
            } else {
                Cell::new(h)
            }
        })
        .collect();
    table
        .load_preset(presets::UTF8_FULL_CONDENSED)
        .set_content_arrangement(ContentArrangement::Dynamic)
        .set_header(header);
    table
}

pub fn format_time(time: Option<DateTime<Utc>>) -> String {
    match time {
        Some(t) => t.with_timezone(&Local).format("%Y-%m-%d %H:%M").to_string(),
        None => "-".to_string(),
    }
}

pub fn format_duration_ms(ms: f64) -> String {
    if ms >= 60_000.0 {
        format!("{:.1}m", ms / 60_000.0)
    } else if ms >= 1_000.0 {
        format!("{:.1}s", ms / 1_000.0)
    } else {
        format!("{ms:.0}ms")
    }
}

pub fn health_cell(status: HealthStatus) -> Cell {
    let color = match status {
        HealthStatus::Green => Color::Green,
        HealthStatus::Yellow => Color::Yellow,
        HealthStatus::Red => Color::Red,
    };
    Cell::new(status).fg(color)
}

pub fn run_status_cell(status: RunStatus) -> Cell {
    let color = match status {
        RunStatus::Success => Color::Green,
        RunStatus::Failed => Color::Red,
        RunStatus::Running => Color::Yellow,
        RunStatus::Unknown => Color::DarkGrey,
    };
    Cell::new(status).fg(color)
}

pub fn print_json(value: &impl serde::Serialize) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
