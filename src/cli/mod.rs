//! Command-line interface.

pub mod commands;
pub mod output;

use std::path::PathBuf;

use clap::{ArgAction, Parser};

pub use commands::Commands;

/// skillshare: one source of agent skills, synced to every AI CLI.
#[derive(Parser, Debug)]
#[command(name = "skillshare", version, about, long_about = None)]
pub struct Cli {
    /// Machine-readable JSON output
    #[arg(long, global = true)]
    pub robot: bool,

    /// Increase log verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress logging
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Config file to use instead of the layered defaults
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}
