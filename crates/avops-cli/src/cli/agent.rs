//! `avops agent` subcommands.

use anyhow::{Context, Result};
use clap::Subcommand;
use comfy_table::Cell;
use console::style;

use avops_types::agent::CreateAgentRequest;

use super::{format_time, new_table, print_json};
use crate::state::AppState;

#[derive(Subcommand)]
pub enum AgentCommand {
    /// Register a new agent.
    Add {
        /// Agent name (unique, case-insensitive).
        name: String,

        /// Operational domain (e.g. av, it, facilities).
        #[arg(long, default_value = "")]
        domain: String,

        /// Agent configuration as a JSON object.
        #[arg(long)]
        config: Option<String>,
    },

    /// List agents.
    #[command(alias = "ls")]
    List,
}

pub async fn handle_agent_command(cmd: AgentCommand, state: &AppState, json: bool) -> Result<()> {
    match cmd {
        AgentCommand::Add {
            name,
            domain,
            config,
        } => add(state, name, domain, config.as_deref(), json).await,
        AgentCommand::List => list(state, json).await,
    }
}

async fn add(
    state: &AppState,
    name: String,
    domain: String,
    config: Option<&str>,
    json: bool,
) -> Result<()> {
    let config_json = config
        .map(serde_json::from_str::<serde_json::Value>)
        .transpose()
        .context("--config is not valid JSON")?;

    let agent = state
        .catalog
        .create_agent(CreateAgentRequest {
            name,
            domain,
            config_json,
        })
        .await?;

    if json {
        return print_json(&agent);
    }
    println!();
    println!(
        "  {} Added agent '{}'",
        style("✓").green().bold(),
        style(&agent.name).cyan()
    );
    println!("  ID: {}", agent.id);
    println!();
    Ok(())
}

async fn list(state: &AppState, json: bool) -> Result<()> {
    let agents = state.catalog.list_agents().await?;
    if json {
        return print_json(&agents);
    }
    if agents.is_empty() {
        println!();
        println!("  No agents registered.");
        println!("  Add one with: {}", style("avops agent add <name>").dim());
        println!();
        return Ok(());
    }

    let mut table = new_table(&["Name", "Domain", "Created", "ID"]);
    for a in &agents {
        table.add_row(vec![
            Cell::new(&a.name),
            Cell::new(&a.domain),
            Cell::new(format_time(Some(a.created_at))),
            Cell::new(a.id),
        ]);
    }
    println!();
    println!("{table}");
    println!();
    Ok(())
}
