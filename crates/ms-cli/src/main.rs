//! migshell CLI - interactive migration console with gap repair

use anyhow::{Context, Result};
use clap::Parser;
use env_logger::Env;
use ms_core::ProfileStore;
use ms_db::UpOutcome;
use std::io::IsTerminal;
use std::sync::Arc;

mod cli;
mod progress;
mod prompt;
mod worker;
mod workflow;

#[cfg(test)]
mod test_utils;

use cli::Cli;
use progress::{LogReporter, ProgressReporter, SpinnerReporter};
use prompt::TerminalPrompter;
use worker::{Worker, WorkerOutcome};
use workflow::{RunSummary, Workflow};

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    env_logger::init_from_env(Env::default().default_filter_or(cli.log_filter()));

    let code = match run(cli).await {
        Ok(()) => 0,
        Err(e) => {
            eprintln!("Error: {e:#}");
            1
        }
    };

    // The stdin reader may still be parked on a blocking read; exit without
    // waiting for the runtime to drain it.
    std::process::exit(code);
}

async fn run(cli: Cli) -> Result<()> {
    let config_dir = match cli.config_dir {
        Some(dir) => dir,
        None => ProfileStore::default_dir()?,
    };
    let store = ProfileStore::init(&config_dir).context("Failed to initialize profile store")?;
    log::info!("Using profiles from {}", store.path().display());

    let reporter: Arc<dyn ProgressReporter> = if cli.quiet || !std::io::stderr().is_terminal() {
        Arc::new(LogReporter)
    } else {
        Arc::new(SpinnerReporter)
    };

    let worker = Worker::new();
    let cancel = worker.token();
    let workflow = Workflow::new(
        store,
        reporter,
        cancel.clone(),
        TerminalPrompter::new(cancel),
    );

    let interrupt = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            log::error!("Failed to listen for interrupt: {e}");
            std::future::pending::<()>().await;
        }
    };

    match worker.run(workflow.run(), interrupt).await {
        WorkerOutcome::Completed(Ok(Some(summary))) => {
            print_summary(&summary);
            Ok(())
        }
        WorkerOutcome::Completed(Ok(None)) => Ok(()),
        WorkerOutcome::Completed(Err(e)) => Err(e),
        WorkerOutcome::Cancelled => {
            println!();
            println!("Interrupted");
            Ok(())
        }
    }
}

fn print_summary(summary: &RunSummary) {
    let forward = match summary.forward {
        UpOutcome::Applied(n) => format!("{n} migration(s) applied"),
        UpOutcome::NoChange => "no pending migrations".to_string(),
    };
    println!(
        "\n{}: {}, {} missing version(s) found, {} repaired, {} failed, {} skipped",
        summary.profile,
        forward,
        summary.gaps.len(),
        summary.repaired.len(),
        summary.failed.len(),
        summary.skipped.len()
    );
}
