mod cli;
mod logging;
mod reporter;

use anyhow::{Context, Result};
use clap::Parser;
use cli::{Cli, Commands};
use colored::*;
use disk_janitor::config;
use disk_janitor::{CollectionRun, RunSummary};
use dotenv::dotenv;
use reporter::CliReporter;
use std::process;
use tracing::{error, info};

fn main() -> Result<()> {
    dotenv().ok();

    let args = Cli::parse();

    let mut config = match config::load_configuration(&args.config) {
        Ok(config) => config,
        Err(err) => {
            eprintln!(
                "{} loading configuration from {}: {}",
                "Error".red().bold(),
                args.config.display(),
                err
            );
            process::exit(1);
        }
    };
    if args.dry_run {
        config.general.dry_run = true;
    }
    if args.force {
        config.cleanup_rules.resource_thresholds.always_run = true;
    }

    let _guard = logging::init_logger(&config.general.log_level, &config.general.log_dir)
        .context("Failed to initialise logging")?;

    let engine = CollectionRun::new(config);

    match args.command.unwrap_or(Commands::Run) {
        Commands::Run => {
            let summary = engine.run_with(&CliReporter::new()).map_err(|err| {
                error!("Error during garbage collection: {}", err);
                err
            })?;
            print_summary(&summary);
        }
        Commands::CheckResources => {
            let decision = engine.check_resources();
            let verdict = if decision.should_run() {
                "cleanup would run".green()
            } else {
                "cleanup would be skipped".yellow()
            };
            println!("{}: {}", verdict, decision);
        }
        Commands::PrintConfig => {
            println!("Configuration: {:#?}", engine.config());
        }
    }

    Ok(())
}

fn print_summary(summary: &RunSummary) {
    if summary.skipped() {
        info!("{}", "Cleanup skipped, resources within limits".yellow());
        return;
    }

    let stats = &summary.stats;
    info!(
        "{} locations scanned, {} missing, in {}",
        format!("{}", summary.locations_scanned).green(),
        format!("{}", summary.locations_missing).yellow(),
        format!("{:.2}s", summary.duration.as_secs_f64()).green(),
    );
    info!(
        "{} files found, {} ignored, {} kept",
        format!("{}", stats.found).cyan(),
        format!("{}", stats.ignored).cyan(),
        format!("{}", stats.kept).cyan(),
    );
    info!(
        "{} deleted ({} bytes freed), {} would delete",
        format!("{}", stats.deleted).red(),
        format!("{}", stats.bytes_freed).red(),
        format!("{}", stats.would_delete).yellow(),
    );
    info!(
        "{} backups created, {} skipped at cap, {} failed, {} errors",
        format!("{}", stats.backups_copied).green(),
        format!("{}", stats.backups_skipped).yellow(),
        format!("{}", stats.backup_failures).red(),
        format!("{}", stats.errors).red(),
    );
    if summary.budget_exhausted {
        info!("{}", "Run time budget exhausted before all locations were scanned".yellow());
    }
}
