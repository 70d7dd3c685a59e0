//! avops CLI entry point.
//!
//! Binary name: `avops`
//!
//! Parses CLI arguments, sets up tracing, opens the data directory and
//! dispatches to the command handlers.

mod cli;
mod state;

use clap::Parser;
use clap_complete::generate;

use avops_observe::tracing_setup::{TracingOptions, init_tracing, shutdown_tracing};
use cli::{Cli, Commands};
use state::AppState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let filter = match cli.verbose {
        0 if cli.quiet => "error",
        0 => "warn",
        1 => "info,avops=debug",
        _ => "trace",
    };
    init_tracing(&TracingOptions {
        default_filter: filter.to_string(),
        json: cli.log_json,
        enable_otel: cli.otel,
    })
    .map_err(|e| anyhow::anyhow!("failed to initialize tracing: {e}"))?;

    // Shell completions don't need app state
    if let Commands::Completions { shell } = &cli.command {
        let mut cmd = <Cli as clap::CommandFactory>::command();
        generate(*shell, &mut cmd, "avops", &mut std::io::stdout());
        return Ok(());
    }

    let result = run(cli).await;
    shutdown_tracing();
    result
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    let state = AppState::init().await?;
    let json = cli.json;

    match cli.command {
        Commands::Agent { action } => cli::agent::handle_agent_command(action, &state, json).await,
        Commands::Recipe { action } => {
            cli::recipe::handle_recipe_command(action, &state, json).await
        }
        Commands::Workflow { action } => {
            cli::workflow::handle_workflow_command(action, &state, json).await
        }
        Commands::Tick { watch, every } => cli::tick::handle_tick(&state, watch, every, json).await,
        Commands::Runs { action } => cli::runs::handle_runs_command(action, &state, json).await,
        Commands::Bundle { action } => {
            cli::bundle::handle_bundle_command(action, &state, json).await
        }
        Commands::Completions { .. } => unreachable!("handled above"),
    }
}
