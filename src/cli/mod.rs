//! CLI module - command-line interface definitions and handlers
//!
//! Uses clap v4 with derive macros for argument parsing.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

pub mod commands;
pub mod lock;
pub mod output;

/// rollpoint - recovery points and point-in-time restore for a SQLite datastore
#[derive(Parser, Debug)]
#[command(name = "rollpoint")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Enable JSON envelope output for machine consumption
    #[arg(long, global = true)]
    pub robot: bool,

    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress all output except errors
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Config file path (default: ~/.config/rollpoint/config.toml)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Root data directory (default: ./.rollpoint)
    #[arg(long, global = true, env = "ROLLPOINT_ROOT")]
    pub data_dir: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Initialize the datastore and backup areas
    Init,
    /// Create, list, verify, and delete recovery points
    Point(commands::point::PointArgs),
    /// Restore the datastore to a recovery point
    Restore(commands::restore::RestoreArgs),
    /// Query and prune the transaction log
    Log(commands::log::LogArgs),
}
