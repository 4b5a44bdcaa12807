//! rollpoint - recovery subsystem CLI
//!
//! Recovery points, integrity verification, and point-in-time restore for
//! a single-file SQLite datastore.

use std::process::ExitCode;

use clap::Parser;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

use rollpoint::Result;
use rollpoint::app::AppContext;
use rollpoint::cli::Cli;

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(&cli);

    match run(&cli) {
        Ok(true) => ExitCode::SUCCESS,
        // Envelope failure: already rendered by the command.
        Ok(false) => ExitCode::FAILURE,
        Err(e) => {
            if cli.robot {
                let error_json = serde_json::json!({
                    "success": false,
                    "error": { "message": e.to_string() },
                });
                println!("{}", serde_json::to_string(&error_json).unwrap_or_default());
            } else {
                eprintln!("Error: {e}");
            }
            ExitCode::FAILURE
        }
    }
}

fn run(cli: &Cli) -> Result<bool> {
    let ctx = AppContext::from_cli(cli)?;
    rollpoint::cli::commands::run(&ctx, &cli.command)
}

fn init_tracing(cli: &Cli) {
    if cli.quiet {
        return;
    }

    let filter = match cli.verbose {
        0 => "warn,rollpoint=info",
        1 => "info,rollpoint=debug",
        2 => "debug,rollpoint=trace",
        _ => "trace",
    };

    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter));

    if cli.robot {
        // JSON logging for robot mode
        tracing_subscriber::registry()
            .with(env_filter)
            .with(fmt::layer().json().with_writer(std::io::stderr))
            .init();
    } else {
        // Human-readable logging
        tracing_subscriber::registry()
            .with(env_filter)
            .with(fmt::layer().with_writer(std::io::stderr))
            .init();
    }
}
