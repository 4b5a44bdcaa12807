//! Application context shared by CLI commands.

use std::path::PathBuf;

use crate::cli::Cli;
use crate::config::Config;
use crate::error::Result;
use crate::service::RecoveryService;

/// Resolved runtime context: root directory, config, output mode.
#[derive(Debug)]
pub struct AppContext {
    pub root: PathBuf,
    pub config: Config,
    pub robot_mode: bool,
}

impl AppContext {
    /// Build the context from parsed CLI flags.
    pub fn from_cli(cli: &Cli) -> Result<Self> {
        let root = cli
            .data_dir
            .clone()
            .or_else(|| std::env::var("ROLLPOINT_ROOT").ok().map(PathBuf::from))
            .unwrap_or_else(|| PathBuf::from(".rollpoint"));

        let config = Config::load(cli.config.as_deref(), &root)?;

        Ok(Self {
            root,
            config,
            robot_mode: cli.robot,
        })
    }

    /// Open the recovery service under this context's root.
    pub fn open_service(&self) -> Result<RecoveryService> {
        RecoveryService::open(&self.root, &self.config)
    }
}
