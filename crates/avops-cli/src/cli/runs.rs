//! CLI run ledger subcommands: list, show, stats.

use anyhow::Result;
use chrono::{Duration, Utc};
use clap::Subcommand;
use comfy_table::Cell;
use console::style;

use avops_core::ledger::RunLedger;
use avops_types::id::RunId;
use avops_types::run::{RunQuery, RunStatus, StepLevel};

use super::{format_duration_ms, format_time, new_table, print_json, run_status_cell};
use crate::state::AppState;

#[derive(Subcommand)]
pub enum RunsCommand {
    /// List the most recent runs, newest first.
    #[command(alias = "ls")]
    List {
        /// Maximum number of runs (defaults to config).
        #[arg(long, short = 'n')]
        limit: Option<u32>,

        /// Only runs with this status (repeatable).
        #[arg(long)]
        status: Vec<RunStatus>,

        /// Only runs started within the last N hours.
        #[arg(long)]
        since_hours: Option<u32>,
    },

    /// Show one run with its steps and artifacts.
    Show {
        /// Run id.
        run_id: RunId,
    },

    /// Success rate, p95 duration and last error.
    Stats {
        /// Only runs started within the last N hours.
        #[arg(long)]
        since_hours: Option<u32>,
    },
}

pub async fn handle_runs_command(cmd: RunsCommand, state: &AppState, json: bool) -> Result<()> {
    match cmd {
        RunsCommand::List {
            limit,
            status,
            since_hours,
        } => {
            let query = RunQuery {
                limit: limit.unwrap_or(state.config.latest_runs_limit),
                statuses: status,
                since: since_hours.map(|h| Utc::now() - Duration::hours(i64::from(h))),
            };
            list_runs(state, &query, json).await
        }
        RunsCommand::Show { run_id } => show_run(state, &run_id, json).await,
        RunsCommand::Stats { since_hours } => stats(state, since_hours, json).await,
    }
}

async fn list_runs(state: &AppState, query: &RunQuery, json: bool) -> Result<()> {
    let runs = state.scheduler.ledger().latest_runs(query).await?;

    if json {
        return print_json(&runs);
    }

    if runs.is_empty() {
        println!();
        println!("  No runs recorded.");
        println!();
        return Ok(());
    }

    let mut table = new_table(&["Run", "Workflow", "Trigger", "Status", "Started", "Duration"]);
    for run in &runs {
        table.add_row(vec![
            Cell::new(run.id),
            Cell::new(&run.name),
            Cell::new(run.trigger),
            run_status_cell(run.status),
            Cell::new(format_time(run.started_at)),
            Cell::new(format_duration_ms(run.duration_ms)),
        ]);
    }

    println!();
    println!("{table}");
    println!();
    Ok(())
}

async fn show_run(state: &AppState, id: &RunId, json: bool) -> Result<()> {
    let details = state.scheduler.ledger().run_details(id).await?;

    if json {
        return print_json(&details);
    }

    let run = &details.run;
    println!();
    println!("  {} {}", style("Run").bold(), style(run.id).cyan());
    println!("  Workflow: {}", run.name);
    println!("  Trigger:  {}", run.trigger);
    println!("  Status:   {}", status_text(run.status));
    println!("  Started:  {}", format_time(run.started_at));
    println!("  Finished: {}", format_time(run.finished_at));
    println!("  Duration: {}", format_duration_ms(run.duration_ms));
    if let Some(error) = &run.error {
        println!("  Error:    {}", style(error).red());
    }

    if !details.steps.is_empty() {
        println!();
        let mut table = new_table(&["Phase", "Level", "Message", "Time"]);
        for step in &details.steps {
            let phase = step.phase.map(|p| p.to_string()).unwrap_or_else(|| "-".into());
            let level = match step.level {
                StepLevel::Info => Cell::new(step.level),
                StepLevel::Warn => Cell::new(step.level).fg(comfy_table::Color::Yellow),
                StepLevel::Error => Cell::new(step.level).fg(comfy_table::Color::Red),
            };
            table.add_row(vec![
                Cell::new(phase),
                level,
                Cell::new(&step.message),
                Cell::new(step.timestamp.format("%H:%M:%S%.3f")),
            ]);
        }
        println!("{table}");
    }

    if !details.artifacts.is_empty() {
        println!();
        let mut table = new_table(&["Kind", "Title", "Reference"]);
        for artifact in &details.artifacts {
            let reference = artifact
                .url
                .as_deref()
                .or(artifact.external_id.as_deref())
                .unwrap_or("-");
            table.add_row(vec![
                Cell::new(&artifact.kind),
                Cell::new(&artifact.title),
                Cell::new(reference),
            ]);
        }
        println!("{table}");
    }
    println!();
    Ok(())
}

async fn stats(state: &AppState, since_hours: Option<u32>, json: bool) -> Result<()> {
    let since = since_hours.map(|h| Utc::now() - Duration::hours(i64::from(h)));
    let stats = state.scheduler.ledger().stats(since).await?;

    if json {
        return print_json(&stats);
    }

    let window = match since_hours {
        Some(h) => format!("last {h}h"),
        None => "all time".to_string(),
    };
    println!();
    println!("  {} ({window})", style("Run stats").bold());
    println!();
    println!("  Runs:         {}", stats.count);
    println!("  Success rate: {:.1}%", stats.success_rate);
    println!("  p95 duration: {}", format_duration_ms(stats.p95_duration_ms));
    if !stats.last_error.is_empty() {
        println!("  Last error:   {}", style(&stats.last_error).red());
    }
    println!();
    Ok(())
}

fn status_text(status: RunStatus) -> String {
    match status {
        RunStatus::Success => style(status).green().to_string(),
        RunStatus::Failed => style(status).red().to_string(),
        RunStatus::Running => style(status).yellow().to_string(),
        RunStatus::Unknown => style(status).dim().to_string(),
    }
}
