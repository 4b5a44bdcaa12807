//! CLI command implementations
//!
//! Each subcommand has its own module with an Args struct and a `run()`
//! returning the envelope's success flag for the process exit code.

use chrono::{DateTime, Utc};

use crate::app::AppContext;
use crate::cli::Commands;
use crate::error::{Result, RollpointError};

pub mod init;
pub mod log;
pub mod point;
pub mod restore;

pub fn run(ctx: &AppContext, command: &Commands) -> Result<bool> {
    match command {
        Commands::Init => init::run(ctx),
        Commands::Point(args) => point::run(ctx, args),
        Commands::Restore(args) => restore::run(ctx, args),
        Commands::Log(args) => log::run(ctx, args),
    }
}

/// Parse an RFC 3339 timestamp argument.
pub(crate) fn parse_ts(raw: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .map(|ts| ts.with_timezone(&Utc))
        .map_err(|err| {
            RollpointError::Validation(format!("invalid timestamp '{raw}' (want RFC 3339): {err}"))
        })
}
