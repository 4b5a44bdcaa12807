//! rollpoint log - transaction log query and retention.

use clap::{Args, Subcommand};

use crate::app::AppContext;
use crate::cli::commands::parse_ts;
use crate::cli::output::emit_envelope;
use crate::error::{Result, RollpointError};
use crate::txlog::{LogOperation, LogQuery};

#[derive(Args, Debug)]
pub struct LogArgs {
    #[command(subcommand)]
    pub command: LogCommand,
}

#[derive(Subcommand, Debug)]
pub enum LogCommand {
    /// Query log entries, newest-first
    Query(LogQueryArgs),
    /// Delete unpinned entries older than the retention window
    Prune(LogPruneArgs),
}

#[derive(Args, Debug)]
pub struct LogQueryArgs {
    /// Only entries at or after this timestamp (RFC 3339)
    #[arg(long)]
    pub from: Option<String>,

    /// Only entries at or before this timestamp (RFC 3339)
    #[arg(long)]
    pub to: Option<String>,

    /// Filter by table name
    #[arg(long)]
    pub table: Option<String>,

    /// Filter by operation kind (create, update, delete)
    #[arg(long)]
    pub operation: Option<String>,

    /// Filter by user id
    #[arg(long)]
    pub user: Option<i64>,

    /// 1-based page number
    #[arg(long, default_value = "1")]
    pub page: u32,

    #[arg(long, default_value = "50")]
    pub page_size: u32,
}

#[derive(Args, Debug)]
pub struct LogPruneArgs {
    /// Retention window in days (default: configured retention)
    #[arg(long)]
    pub days: Option<u32>,

    /// Apply the prune (required)
    #[arg(long)]
    pub approve: bool,
}

pub fn run(ctx: &AppContext, args: &LogArgs) -> Result<bool> {
    match &args.command {
        LogCommand::Query(query) => run_query(ctx, query),
        LogCommand::Prune(prune) => run_prune(ctx, prune),
    }
}

fn run_query(ctx: &AppContext, args: &LogQueryArgs) -> Result<bool> {
    let operation = args
        .operation
        .as_deref()
        .map(|raw| {
            LogOperation::parse(raw).ok_or_else(|| {
                RollpointError::Validation(format!(
                    "unknown operation '{raw}' (want create, update, or delete)"
                ))
            })
        })
        .transpose()?;

    let query = LogQuery {
        from: args.from.as_deref().map(parse_ts).transpose()?,
        to: args.to.as_deref().map(parse_ts).transpose()?,
        table_name: args.table.clone(),
        operation,
        user_id: args.user,
        page: args.page,
        page_size: args.page_size,
    };
    let service = ctx.open_service()?;

    let envelope = service.query_log(&query);
    emit_envelope(ctx.robot_mode, &envelope, |page| {
        if page.entries.is_empty() {
            return "No log entries found.".to_string();
        }
        let mut lines = vec![format!(
            "Log entries (page {}/{}, {} total):",
            page.page, page.total_pages, page.total
        )];
        for entry in &page.entries {
            lines.push(format!(
                "  {:>7}  {}  {:<6}  {:<16}  record {}  user {}{}",
                entry.id,
                entry.timestamp.to_rfc3339(),
                entry.operation,
                entry.table_name,
                entry
                    .record_id
                    .map_or_else(|| "-".to_string(), |id| id.to_string()),
                entry
                    .user_id
                    .map_or_else(|| "-".to_string(), |id| id.to_string()),
                if entry.recovery_point_id.is_some() {
                    "  [pinned]"
                } else {
                    ""
                },
            ));
        }
        lines.join("\n")
    })
}

fn run_prune(ctx: &AppContext, args: &LogPruneArgs) -> Result<bool> {
    if !args.approve {
        return Err(RollpointError::ApprovalRequired(
            "log prune requires --approve".to_string(),
        ));
    }
    let _lock = crate::cli::lock::GlobalLock::acquire(&ctx.root)?;
    let service = ctx.open_service()?;

    let envelope = service.prune_log(args.days);
    emit_envelope(ctx.robot_mode, &envelope, |report| {
        format!(
            "Pruned {} log entries older than {} days (pinned entries kept).",
            report.deleted, report.older_than_days
        )
    })
}
