use clap::{Parser, Subcommand};
use disk_janitor::config::DEFAULT_CONFIG_NAME;
use std::path::PathBuf;

#[derive(Debug, Parser)] // requires `derive` feature
#[command(name = "disk-janitor")]
#[command(about = "Policy-driven disk cleanup agent", long_about = None)]
pub struct Cli {
    /// Configuration file; the extension may be omitted
    #[arg(long, short, global = true, default_value = DEFAULT_CONFIG_NAME)]
    pub config: PathBuf,

    /// Compute and log decisions without modifying any file
    #[arg(long, global = true)]
    pub dry_run: bool,

    /// Skip the resource check and clean regardless of system load
    #[arg(long, global = true)]
    pub force: bool,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Debug, Clone, Copy, Subcommand)]
pub enum Commands {
    /// Run one cleanup pass over every configured location (default)
    Run,
    /// Sample system resources and print the gate decision
    CheckResources,
    /// Print configuration values
    PrintConfig,
}
