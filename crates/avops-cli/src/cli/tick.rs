//! `avops tick`: run due interval workflows once, or keep ticking.

use std::time::Duration;

use anyhow::Result;
use chrono::Utc;
use console::style;
use tokio_util::sync::CancellationToken;

use super::print_json;
use crate::state::AppState;

/// Run one tick, or tick every `every` seconds until Ctrl+C / SIGTERM.
pub async fn handle_tick(
    state: &AppState,
    watch: bool,
    every: Option<u64>,
    json: bool,
) -> Result<()> {
    if !watch {
        let executed = state.scheduler.tick(Utc::now()).await?;
        return report(executed, json);
    }

    let secs = every.unwrap_or(state.config.tick_interval_secs).max(1);
    let cancel = CancellationToken::new();
    let on_signal = cancel.clone();
    tokio::spawn(async move {
        shutdown_signal().await;
        on_signal.cancel();
    });

    tracing::info!(interval_secs = secs, "watching for due workflows");
    if !json {
        println!();
        println!(
            "  Ticking every {secs}s. Press {} to stop.",
            style("Ctrl+C").bold()
        );
        println!();
    }

    let mut interval = tokio::time::interval(Duration::from_secs(secs));
    interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
    loop {
        tokio::select! {
            _ = cancel.cancelled() => break,
            _ = interval.tick() => {
                match state.scheduler.tick(Utc::now()).await {
                    Ok(executed) => report(executed, json)?,
                    // A ledger outage should not end the watch loop
                    Err(e) => tracing::error!(error = %e, "tick failed"),
                }
            }
        }
    }

    tracing::info!("tick watch stopped");
    Ok(())
}

fn report(executed: u32, json: bool) -> Result<()> {
    if json {
        return print_json(&serde_json::json!({
            "at": Utc::now(),
            "executed": executed,
        }));
    }
    if executed == 0 {
        println!("  {} nothing due", style(Utc::now().format("%H:%M:%S")).dim());
    } else {
        println!(
            "  {} ran {} workflow{}",
            style(Utc::now().format("%H:%M:%S")).dim(),
            style(executed).cyan(),
            if executed == 1 { "" } else { "s" }
        );
    }
    Ok(())
}

/// Wait for Ctrl+C or SIGTERM.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::warn!(error = %e, "failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::warn!(error = %e, "failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
